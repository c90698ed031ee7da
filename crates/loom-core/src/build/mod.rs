//! Build orchestration: staging, compiling, bundling and publishing one job.

mod bundler;
mod job_log;
mod orchestrator;
mod types;

pub use bundler::{Bundler, SpawnHook};
pub use job_log::JobLog;
pub use orchestrator::BuildOrchestrator;
pub use types::{
    BUILD_PUBLISHED, BUILD_SUCCEEDED, BuildConfig, BuildJob, BuildResult, DEFAULT_BUILD_COMMAND,
    DEFAULT_KEY_PREFIX, DEFAULT_UPLOAD_PARALLELISM,
};
