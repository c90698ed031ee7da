//! IPC protocol messages for build worker processes.
//!
//! Uses length-prefixed rkyv messages over stdin/stdout.
//! Format: 4-byte length (u32 LE) + rkyv-encoded message.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use rkyv::{Archive, Deserialize, Serialize};

use crate::build::{BuildConfig, BuildJob, BuildResult};
use crate::error::{Error, Result};

/// Largest frame accepted from the other side (100MB).
const MAX_MESSAGE_LEN: usize = 100 * 1024 * 1024;

/// A build job and the settings to run it with, as sent to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct BuildRequest {
    pub schema_json: String,
    pub build_id: String,
    pub template_path: String,
    /// Environment tag (`fat`, `uat`, `pre`, `pro`).
    pub env: String,
    pub is_preview: bool,
    pub publish_to: Option<String>,
    pub staging_root: Option<String>,
    pub build_command: String,
    pub timeout_secs: Option<u64>,
    pub public_base_url: Option<String>,
    pub key_prefix: String,
    pub upload_parallelism: u32,
}

impl BuildRequest {
    pub fn new(job: &BuildJob, config: &BuildConfig) -> Self {
        let path = |p: &PathBuf| p.to_string_lossy().into_owned();
        Self {
            schema_json: job.schema_json.clone(),
            build_id: job.build_id.clone(),
            template_path: path(&job.template_path),
            env: job.env.as_str().to_string(),
            is_preview: job.is_preview,
            publish_to: job.publish_to.as_ref().map(path),
            staging_root: job.staging_root.as_ref().map(path),
            build_command: config.build_command.clone(),
            timeout_secs: config.timeout.map(|t| t.as_secs().max(1)),
            public_base_url: config.public_base_url.clone(),
            key_prefix: config.key_prefix.clone(),
            upload_parallelism: config.upload_parallelism as u32,
        }
    }

    /// Split back into the job and its settings.
    pub fn into_parts(self) -> Result<(BuildJob, BuildConfig)> {
        let job = BuildJob {
            schema_json: self.schema_json,
            build_id: self.build_id,
            template_path: PathBuf::from(self.template_path),
            env: self.env.parse()?,
            is_preview: self.is_preview,
            publish_to: self.publish_to.map(PathBuf::from),
            staging_root: self.staging_root.map(PathBuf::from),
        };
        let config = BuildConfig {
            build_command: self.build_command,
            timeout: self.timeout_secs.map(Duration::from_secs),
            public_base_url: self.public_base_url,
            key_prefix: self.key_prefix,
            upload_parallelism: self.upload_parallelism as usize,
        };
        Ok((job, config))
    }
}

/// Command sent from parent to worker process.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub enum WorkerCommand {
    /// Run one build to completion.
    Build(BuildRequest),

    /// Shutdown the worker process gracefully.
    Shutdown,

    /// Ping to check if worker is alive.
    Ping,
}

/// Response sent from worker to parent process.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub enum WorkerResponse {
    /// The build ran; the result may still describe a failed build.
    Finished {
        url: String,
        log_url: String,
        build_id: String,
        message: String,
        build_time: u64,
        success: bool,
    },

    /// Progress: the bundler started in process group `pgid`. Not terminal;
    /// lets the parent stop the bundler along with the worker.
    Bundling { pgid: u32 },

    /// The job was rejected before it ran.
    Error {
        /// Error message.
        message: String,
    },

    /// Response to Ping command.
    Pong,
}

impl From<BuildResult> for WorkerResponse {
    fn from(result: BuildResult) -> Self {
        Self::Finished {
            url: result.url,
            log_url: result.log_url,
            build_id: result.build_id,
            message: result.message,
            build_time: result.build_time,
            success: result.success,
        }
    }
}

/// Write a message to a writer using length-prefixed rkyv encoding.
pub fn write_message<W: Write>(
    writer: &mut W,
    message: &impl for<'a> Serialize<
        rkyv::rancor::Strategy<
            rkyv::ser::Serializer<
                rkyv::util::AlignedVec,
                rkyv::ser::allocator::ArenaHandle<'a>,
                rkyv::ser::sharing::Share,
            >,
            rkyv::rancor::Error,
        >,
    >,
) -> Result<()> {
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(message)
        .map_err(|e| Error::Serialization(format!("Failed to encode IPC message: {}", e)))?;

    let len = bytes.len() as u32;
    writer
        .write_all(&len.to_le_bytes())
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message length: {}", e)))?;
    writer
        .write_all(&bytes)
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message body: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Ipc(format!("Failed to flush IPC stream: {}", e)))?;

    Ok(())
}

/// Read a message from a reader using length-prefixed rkyv encoding.
///
/// # Safety
///
/// Uses unchecked deserialization. Only safe when reading from our own
/// worker or parent process.
pub fn read_message<R: Read, T>(reader: &mut R) -> Result<T>
where
    T: Archive,
    T::Archived: Deserialize<T, rkyv::rancor::Strategy<rkyv::de::Pool, rkyv::rancor::Error>>,
{
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message length: {}", e)))?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_LEN {
        return Err(Error::Ipc(format!("IPC message too large: {} bytes", len)));
    }

    let mut bytes = rkyv::util::AlignedVec::<16>::with_capacity(len);
    bytes.resize(len, 0);
    reader
        .read_exact(&mut bytes)
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message body: {}", e)))?;

    // SAFETY: frames only come from our own worker and parent processes.
    let message = unsafe { rkyv::from_bytes_unchecked::<T, rkyv::rancor::Error>(&bytes) }
        .map_err(|e| Error::Serialization(format!("Failed to decode IPC message: {}", e)))?;

    Ok(message)
}
