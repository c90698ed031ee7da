//! Artifact publishing.
//!
//! Build output is uploaded to an [`ArtifactStore`] twice per file: once under
//! its version-pinned key and once under a `latest` mirror. Template packages
//! are published under `lowcode-templates/<namespace>/<version>/`.

mod store;
mod uploader;

pub use store::{
    ArtifactStore, LONG_CACHE, LocalArtifactStore, NO_CACHE, ObjectInfo, PutOptions,
    cache_control_for, relative_key,
};
pub use uploader::{Publisher, TEMPLATE_PREFIX};
