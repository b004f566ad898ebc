//! Image reconciliation
//!
//! Brings every manifest image into the local runtime, preferring the cache
//! and refreshing it when the registry has moved on.

mod engine;
mod gather;
mod record;

pub use engine::{ProgressObserver, ReconcileOptions, Reconciler};
pub use gather::{gather, Settled, TaskFailure};
pub use record::{ImageState, ImageStatus, ProcessingRecord, RunReport, RunResult};
