//! Execution order of a phase's tasks

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, instrument};

use crate::task::TaskSpec;

/// Errors while ordering tasks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DagError {
    /// Cyclic dependency detected
    #[error("Cyclic dependency detected among tasks: {0}")]
    CyclicDependency(String),

    /// A dependency names a task that is not part of the phase
    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },
}

/// Tasks of one phase in an order that runs every dependency first
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    order: Vec<String>,
}

impl ExecutionPlan {
    /// Order `tasks` depth-first.
    ///
    /// Tasks are visited in name order and each dependency is placed before
    /// its dependent, so the result does not depend on the order of `tasks`.
    #[instrument(skip_all, fields(task_count = tasks.len()))]
    pub fn build(tasks: &[TaskSpec]) -> Result<Self, DagError> {
        let graph: BTreeMap<&str, Vec<&str>> = tasks
            .iter()
            .map(|task| {
                let mut deps: Vec<&str> = task.dependencies.iter().map(String::as_str).collect();
                deps.sort_unstable();
                (task.name.as_str(), deps)
            })
            .collect();

        let mut resolver = Resolver {
            graph: &graph,
            visited: HashSet::new(),
            in_progress: Vec::new(),
            order: Vec::new(),
        };
        for name in graph.keys() {
            resolver.visit(*name)?;
        }

        debug!(order = %resolver.order.join(", "), "execution order computed");
        Ok(Self {
            order: resolver.order,
        })
    }

    /// Task names in execution order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

struct Resolver<'a> {
    graph: &'a BTreeMap<&'a str, Vec<&'a str>>,
    visited: HashSet<&'a str>,
    in_progress: Vec<&'a str>,
    order: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn visit(&mut self, name: &'a str) -> Result<(), DagError> {
        if self.visited.contains(name) {
            return Ok(());
        }
        if let Some(start) = self.in_progress.iter().position(|n| *n == name) {
            let mut cycle: Vec<&str> = self.in_progress[start..].to_vec();
            cycle.push(name);
            return Err(DagError::CyclicDependency(cycle.join(" -> ")));
        }

        let graph = self.graph;
        let Some(dependencies) = graph.get(name) else {
            return Ok(());
        };

        self.in_progress.push(name);
        for dependency in dependencies {
            if !graph.contains_key(dependency) {
                return Err(DagError::UnknownDependency {
                    task: name.to_string(),
                    dependency: dependency.to_string(),
                });
            }
            self.visit(*dependency)?;
        }
        self.in_progress.pop();

        self.visited.insert(name);
        self.order.push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timberyard_core::Value;

    fn spec(name: &str, deps: &[&str]) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            task_type: "t".to_string(),
            enabled: true,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            config: Value::object(),
        }
    }

    fn permutations(items: Vec<TaskSpec>) -> Vec<Vec<TaskSpec>> {
        if items.len() <= 1 {
            return vec![items];
        }
        let mut result = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.clone();
            let head = rest.remove(i);
            for mut tail in permutations(rest) {
                tail.insert(0, head.clone());
                result.push(tail);
            }
        }
        result
    }

    #[test]
    fn test_chain_order_for_every_permutation() {
        let tasks = vec![spec("a", &[]), spec("b", &["a"]), spec("c", &["b"])];
        for permutation in permutations(tasks) {
            let plan = ExecutionPlan::build(&permutation).unwrap();
            assert_eq!(plan.order(), &["a", "b", "c"]);
        }
    }

    #[test]
    fn test_dependency_before_dependent() {
        let tasks = vec![
            spec("analysis", &[]),
            spec("build", &[]),
            spec("aaa", &["test"]),
            spec("test", &["build"]),
        ];
        let plan = ExecutionPlan::build(&tasks).unwrap();
        let position = |n: &str| plan.order().iter().position(|o| o == n).unwrap();

        assert_eq!(plan.len(), 4);
        assert!(position("build") < position("test"));
        assert!(position("test") < position("aaa"));
    }

    #[test]
    fn test_diamond_visits_once() {
        let tasks = vec![
            spec("root", &[]),
            spec("left", &["root"]),
            spec("right", &["root"]),
            spec("top", &["left", "right"]),
        ];
        let plan = ExecutionPlan::build(&tasks).unwrap();
        assert_eq!(plan.order(), &["root", "left", "right", "top"]);
    }

    #[test]
    fn test_cycle_detected() {
        let tasks = vec![spec("a", &["b"]), spec("b", &["a"])];
        let err = ExecutionPlan::build(&tasks).unwrap_err();
        assert_eq!(err, DagError::CyclicDependency("a -> b -> a".to_string()));
    }

    #[test]
    fn test_self_dependency() {
        let tasks = vec![spec("a", &["a"])];
        assert!(matches!(
            ExecutionPlan::build(&tasks),
            Err(DagError::CyclicDependency(_))
        ));
    }

    #[test]
    fn test_unknown_dependency() {
        let tasks = vec![spec("test", &["build"])];
        let err = ExecutionPlan::build(&tasks).unwrap_err();
        assert_eq!(
            err,
            DagError::UnknownDependency {
                task: "test".to_string(),
                dependency: "build".to_string()
            }
        );
    }

    #[test]
    fn test_empty_plan() {
        assert!(ExecutionPlan::build(&[]).unwrap().is_empty());
    }
}
