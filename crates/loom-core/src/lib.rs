//! Core engine for Loom, the schema-to-bundle build service.
//!
//! This crate provides:
//! - Schema model and the schema compiler (imports, markup, scaffold stamping)
//! - Build orchestration (staging, external bundler, artifact verification)
//! - Artifact publishing to an object store
//! - A bounded task pool running each build in an isolated worker process

pub mod build;
pub mod compile;
pub mod error;
pub mod ipc;
pub mod paths;
pub mod pool;
pub mod publish;
pub mod schema;

pub use build::{BuildConfig, BuildJob, BuildOrchestrator, BuildResult};
pub use compile::{CompileMode, CompileOutput, DependencyIndex, PageSource, SchemaCompiler};
pub use error::{Error, Result};
pub use paths::StagingDirs;
pub use pool::{BuildTaskPool, PoolConfig, PoolHealth, WorkerLauncher, WorkerOutcome};
pub use publish::{ArtifactStore, LocalArtifactStore, Publisher};
pub use schema::{Env, Schema};
