//! Host reports and their consolidation
//!
//! A host report is `{meta, tasks}` as written by one `run`. The
//! [`Consolidator`] folds the reports of every host that built the same
//! commit into one report; the [`ReportStore`] collects those reports until
//! they are consolidated.

mod consolidate;
mod merge;
mod store;

pub use consolidate::{consolidate, Consolidator, SHARED_META_FIELDS};
pub use merge::{Counting, DetailMerge, KeyedListMerge, TestCaseMerge};
pub use store::{PendingEntry, ReportKey, ReportStore};
