pub mod monitor;

pub use monitor::{MonitorOutcome, RecoveryMethod, TimetableMonitor};
