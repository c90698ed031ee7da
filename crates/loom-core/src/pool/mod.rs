//! Build task pool.
//!
//! ```text
//! submit ─► FIFO queue ─► [slot 1..N] ─► WorkerLauncher ─► loom-worker
//!    ▲                         │
//!    └──── oneshot result ◄────┘  (slot freed, next waiter admitted)
//! ```

mod launcher;
mod task_pool;

pub use launcher::{ProcessLauncher, WorkerLauncher, WorkerOutcome};
pub use task_pool::{BuildTaskPool, DEFAULT_CAPACITY, PoolConfig, PoolHealth};
