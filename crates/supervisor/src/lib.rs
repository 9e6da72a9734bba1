//! Fleet-wide job health auditing and self-healing.
//!
//! This crate provides:
//! - [`Supervisor`]: reaps stuck runs, flags missing expected runs, detects
//!   high failure rates, optionally remediates, and alerts only when needed
//! - [`HealthReport`]: the transient per-cycle audit result
//! - [`RemediationTable`]: explicit job name → remediation action lookup

pub mod error;
pub mod policy;
pub mod remediation;
pub mod report;
pub mod supervisor;

pub use error::{RemediationError, SupervisorError};
pub use policy::{MonitoredJob, SupervisorPolicy, HIGH_FAILURE_RATE_FLAG};
pub use remediation::{from_fn, RemediationAction, RemediationTable};
pub use report::HealthReport;
pub use supervisor::Supervisor;
