//! Job state shared across workers.
//!
//! Jobs live in memory for the lifetime of the process; nothing is
//! persisted across restarts.

mod job_store;

pub use job_store::JobStore;
