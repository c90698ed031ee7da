//! Inter-process communication with build worker processes.
//!
//! Each build runs in its own `loom-worker` process: the parent sends one
//! [`WorkerCommand::Build`] and the worker answers with exactly one terminal
//! [`WorkerResponse`].

pub mod protocol;
mod worker;

pub use protocol::{BuildRequest, WorkerCommand, WorkerResponse, read_message, write_message};
pub use worker::{WORKER_PATH_ENV, WorkerHandle, WorkerKillHandle};
