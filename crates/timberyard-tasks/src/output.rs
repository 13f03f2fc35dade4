//! Report helpers shared by the built-in tasks

use timberyard_core::Value;

use crate::process::ProcessOutput;

/// Process record stored in a task's details
pub fn process_record(output: &ProcessOutput) -> Value {
    let mut record = Value::object();
    record.set("binary", output.binary.as_str());
    record.set(
        "arguments",
        output.arguments.iter().map(Value::from).collect::<Value>(),
    );
    record.set("working_dir", output.working_dir.display().to_string());
    record.set(
        "output",
        output
            .lines
            .iter()
            .map(|(kind, line)| Value::from(vec![Value::from(kind.as_str()), Value::from(line)]))
            .collect::<Value>(),
    );
    record.set("exitcode", output.exit_code);
    record
}

/// Task message: the last output line, or `-` for a silent process
pub fn task_message(output: &ProcessOutput) -> String {
    output.last_line().unwrap_or("-").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::LineKind;
    use std::path::PathBuf;

    fn output(lines: Vec<(LineKind, String)>) -> ProcessOutput {
        ProcessOutput {
            binary: "/usr/bin/make".to_string(),
            arguments: vec!["-j4".to_string()],
            working_dir: PathBuf::from("/build"),
            lines,
            exit_code: 2,
        }
    }

    #[test]
    fn test_process_record() {
        let record = process_record(&output(vec![
            (LineKind::Info, "compiling".to_string()),
            (LineKind::Error, "boom".to_string()),
        ]));

        assert_eq!(record.get("binary").unwrap(), &Value::from("/usr/bin/make"));
        assert_eq!(record.get("arguments.0").unwrap(), &Value::from("-j4"));
        assert_eq!(record.get("working_dir").unwrap(), &Value::from("/build"));
        assert_eq!(record.get("output.1.0").unwrap(), &Value::from("error"));
        assert_eq!(record.get("output.1.1").unwrap(), &Value::from("boom"));
        assert_eq!(record.get("exitcode").unwrap(), &Value::from(2));
    }

    #[test]
    fn test_task_message() {
        assert_eq!(task_message(&output(Vec::new())), "-");
        assert_eq!(
            task_message(&output(vec![(LineKind::Info, "  done \t".to_string())])),
            "done"
        );
    }
}
