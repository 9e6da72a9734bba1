//! Job-run ledger, stuck-run reaping, and the wrapper every job runs inside.
//!
//! This crate provides:
//! - [`JobRunLedger`] trait with in-memory and PostgreSQL implementations
//! - [`StuckJobReaper`] that force-fails runs abandoned in `running`
//! - [`JobRunner`] that brackets a [`Job`] with reap → begin → complete/fail → audit

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod reaper;
pub mod runner;

pub use error::{JobError, LedgerError};
pub use ledger::{JobRunLedger, SharedLedger};
pub use memory::InMemoryJobRunLedger;
pub use postgres::PgJobRunLedger;
pub use reaper::{ReapOutcome, StuckJobReaper, STUCK_JOB_MESSAGE};
pub use runner::{Job, JobOutcome, JobRunner, RunAudit};
