//! Build job, result and configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paths::is_plain_name;
use crate::schema::{Env, Schema};

/// Default install-and-build command run in the staged tree.
pub const DEFAULT_BUILD_COMMAND: &str = "npm install && npm run build";

/// Default first key segment for published build artifacts.
pub const DEFAULT_KEY_PREFIX: &str = "ls";

/// Default number of concurrent artifact uploads.
pub const DEFAULT_UPLOAD_PARALLELISM: usize = 4;

/// Settings for running one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Shell command that installs dependencies and bundles the staged tree.
    pub build_command: String,
    /// Kill the bundler after this long.
    pub timeout: Option<Duration>,
    /// Public base URL of the artifact store. Falls back to the store's own.
    pub public_base_url: Option<String>,
    pub key_prefix: String,
    pub upload_parallelism: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_command: DEFAULT_BUILD_COMMAND.to_string(),
            timeout: None,
            public_base_url: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            upload_parallelism: DEFAULT_UPLOAD_PARALLELISM,
        }
    }
}

impl BuildConfig {
    /// Defaults overridden by `LOOM_BUILD_COMMAND`, `LOOM_BUILD_TIMEOUT_SECS`
    /// and `LOOM_PUBLIC_BASE_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(command) = std::env::var("LOOM_BUILD_COMMAND")
            && !command.trim().is_empty()
        {
            config.build_command = command;
        }
        if let Ok(secs) = std::env::var("LOOM_BUILD_TIMEOUT_SECS") {
            match secs.trim().parse::<u64>() {
                Ok(0) => {}
                Ok(secs) => config.timeout = Some(Duration::from_secs(secs)),
                Err(_) => tracing::warn!("Ignoring invalid LOOM_BUILD_TIMEOUT_SECS={}", secs),
            }
        }
        if let Ok(url) = std::env::var("LOOM_PUBLIC_BASE_URL")
            && !url.trim().is_empty()
        {
            config.public_base_url = Some(url);
        }
        config
    }
}

/// One unit of work: compile a schema against a template and bundle it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    /// The schema document, as submitted.
    pub schema_json: String,
    /// Caller-unique identity; names the staging directory and the log.
    pub build_id: String,
    /// Template tree the staging directory is seeded from.
    pub template_path: PathBuf,
    pub env: Env,
    pub is_preview: bool,
    /// Root of a local artifact store. Publishing happens only when set.
    pub publish_to: Option<PathBuf>,
    /// Override for the shared staging root.
    pub staging_root: Option<PathBuf>,
}

impl BuildJob {
    pub fn new(
        schema_json: impl Into<String>,
        build_id: impl Into<String>,
        template_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            schema_json: schema_json.into(),
            build_id: build_id.into(),
            template_path: template_path.into(),
            env: Env::default(),
            is_preview: false,
            publish_to: None,
            staging_root: None,
        }
    }

    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    pub fn with_preview(mut self, is_preview: bool) -> Self {
        self.is_preview = is_preview;
        self
    }

    pub fn with_publish_to(mut self, root: impl Into<PathBuf>) -> Self {
        self.publish_to = Some(root.into());
        self
    }

    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    /// Check the submission contract: a build id and a template path.
    pub fn validate(&self) -> Result<()> {
        if self.build_id.trim().is_empty() {
            return Err(Error::InvalidJob("buildId is required".to_string()));
        }
        if !is_plain_name(&self.build_id) {
            return Err(Error::InvalidJob(format!(
                "buildId '{}' must be a plain name",
                self.build_id
            )));
        }
        if self.template_path.as_os_str().is_empty() {
            return Err(Error::InvalidJob("templatePath is required".to_string()));
        }
        Ok(())
    }

    /// Parse the schema document.
    pub fn parse_schema(&self) -> Result<Schema> {
        Schema::from_json(&self.schema_json)
    }
}

/// Message of a successful build that was not published.
pub const BUILD_SUCCEEDED: &str = "build succeeded";

/// Message of a successful, published build.
pub const BUILD_PUBLISHED: &str = "build published";

/// Outcome of one build. Always produced; a failed build has an empty `url`
/// and `success` unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub url: String,
    pub log_url: String,
    pub build_id: String,
    pub message: String,
    /// Milliseconds from orchestrator start.
    pub build_time: u64,
    /// Set only when the bundle was produced and, if requested, published.
    #[serde(default)]
    pub success: bool,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.success
    }
}
