//! Publish-template command implementation for Loom CLI.

use std::path::Path;

use loom_core::publish::{ArtifactStore, LocalArtifactStore, Publisher};
use loom_core::BuildConfig;

use crate::colors;

/// Upload a template directory as `<namespace>/<version>` into a local store.
pub fn execute(template: &Path, namespace: &str, version: &str, store_root: &Path) -> anyhow::Result<()> {
    if !template.is_dir() {
        anyhow::bail!("template directory {} does not exist", template.display());
    }

    let config = BuildConfig::from_env();
    let store = LocalArtifactStore::new(store_root);
    let base_url = config
        .public_base_url
        .clone()
        .or_else(|| store.public_base_url())
        .unwrap_or_default();
    let publisher = Publisher::new(base_url, config.key_prefix, config.upload_parallelism);

    let url = publisher.publish_template(&store, namespace, version, template)?;
    println!("{}Published{} {}", colors::GREEN, colors::RESET, url);
    Ok(())
}
