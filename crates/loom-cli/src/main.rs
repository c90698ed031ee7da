//! Loom CLI - compile page schemas into bundled web applications.

mod build;
mod colors;
mod compile;
mod publish_template;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use loom_core::Env;
use loom_core::pool::DEFAULT_CAPACITY;

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "Compile page schemas into bundled web applications")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema into a directory without bundling
    Compile {
        /// Path to the schema (.json file)
        schema: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Template directory to seed the output from
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Target environment (fat, uat, pre, pro)
        #[arg(long, default_value = "fat")]
        env: Env,

        /// Mark the build as a preview
        #[arg(long)]
        preview: bool,
    },

    /// Compile and bundle schemas, each in an isolated worker
    Build {
        /// Paths to the schemas (.json files)
        #[arg(required = true)]
        schemas: Vec<PathBuf>,

        /// Template directory
        #[arg(short, long)]
        template: PathBuf,

        /// Target environment (fat, uat, pre, pro)
        #[arg(long, default_value = "fat")]
        env: Env,

        /// Mark the builds as previews
        #[arg(long)]
        preview: bool,

        /// Publish artifacts into this local store directory
        #[arg(long)]
        publish: Option<PathBuf>,

        /// Directory for staging trees and job logs (default: next to the template)
        #[arg(long)]
        staging_root: Option<PathBuf>,

        /// Maximum number of concurrent builds
        #[arg(short = 'j', long, default_value_t = DEFAULT_CAPACITY)]
        parallelism: usize,

        /// Path to the loom-worker binary
        #[arg(long)]
        worker: Option<PathBuf>,

        /// Kill the bundler after this many seconds
        #[arg(long)]
        build_timeout: Option<u64>,

        /// Kill a worker after this many seconds
        #[arg(long)]
        worker_timeout: Option<u64>,

        /// Print one JSON result per build
        #[arg(long)]
        json: bool,
    },

    /// Publish a template directory into a local store
    PublishTemplate {
        /// Template directory
        template: PathBuf,

        /// Template namespace
        #[arg(long)]
        namespace: String,

        /// Template version
        #[arg(long)]
        version: String,

        /// Local store directory
        #[arg(long)]
        store: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format loom-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(loom_err) = err.downcast_ref::<loom_core::Error>() {
            anyhow::anyhow!("{}", loom_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Compile {
            schema,
            out,
            template,
            env,
            preview,
        } => {
            compile::execute(&schema, &out, template.as_deref(), env, preview).map_err(format_error)?;
        }

        Commands::Build {
            schemas,
            template,
            env,
            preview,
            publish,
            staging_root,
            parallelism,
            worker,
            build_timeout,
            worker_timeout,
            json,
        } => {
            build::execute(build::BuildOptions {
                schemas,
                template,
                env,
                preview,
                publish,
                staging_root,
                parallelism,
                worker,
                build_timeout,
                worker_timeout,
                json,
            })
            .await
            .map_err(format_error)?;
        }

        Commands::PublishTemplate {
            template,
            namespace,
            version,
            store,
        } => {
            publish_template::execute(&template, &namespace, &version, &store).map_err(format_error)?;
        }
    }

    Ok(())
}
