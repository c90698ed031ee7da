//! Loom build worker.
//!
//! Reads length-prefixed commands from stdin and answers on stdout. Each
//! `Build` command runs one job to completion and produces exactly one
//! terminal response, preceded by a `Bundling` frame once the bundler starts.
//! Process logs go to stderr; stdout carries only frames.

use std::io::{self, BufReader, BufWriter};

use loom_core::BuildOrchestrator;
use loom_core::ipc::{WorkerCommand, WorkerResponse, read_message, write_message};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let mut stdin = BufReader::new(io::stdin().lock());
    let mut stdout = BufWriter::new(io::stdout());

    loop {
        let command: WorkerCommand = match read_message(&mut stdin) {
            Ok(command) => command,
            // Parent closed the pipe.
            Err(_) => break,
        };

        let response = match command {
            WorkerCommand::Ping => WorkerResponse::Pong,
            WorkerCommand::Shutdown => break,
            WorkerCommand::Build(request) => run_build(request),
        };

        write_message(&mut stdout, &response)?;
    }

    Ok(())
}

fn run_build(request: loom_core::ipc::BuildRequest) -> WorkerResponse {
    let (job, config) = match request.into_parts() {
        Ok(parts) => parts,
        Err(e) => {
            return WorkerResponse::Error {
                message: e.to_string(),
            };
        }
    };

    tracing::debug!("Worker {} building {}", std::process::id(), job.build_id);
    let orchestrator = BuildOrchestrator::new(config).on_bundler_spawn(|pgid| {
        if let Err(e) = write_message(&mut io::stdout(), &WorkerResponse::Bundling { pgid }) {
            tracing::warn!("Could not report bundler process group {}: {}", pgid, e);
        }
    });
    match orchestrator.run(&job) {
        Ok(result) => WorkerResponse::from(result),
        Err(e) => WorkerResponse::Error {
            message: e.to_string(),
        },
    }
}
