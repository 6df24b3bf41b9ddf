pub mod engine;
pub mod report;
pub mod retry;

pub use engine::{log_report, BatchChecker, INVALID_LOCATOR};
pub use report::{CheckReport, StreamResult, StreamSpec, StreamStatus};
pub use retry::{check_with_retry, RetryPolicy, Verdict, NO_RESPONSE};
