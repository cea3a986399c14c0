pub mod report;

pub use report::{ReportHeader, ReportQuery, ReportResult};
