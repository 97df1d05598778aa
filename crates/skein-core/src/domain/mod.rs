//! Domain model (ids, status, records, errors).

pub mod errors;
pub mod ids;
pub mod state;
pub mod task;

pub use errors::{ErrorKind, ExecutionError, StoreError, StoreResult, TransitionError};
pub use ids::{ParseTaskIdError, TaskId};
pub use state::{TaskStatus, UnknownStatus};
pub use task::{NewTask, TaskRecord, stale_cutoff};
