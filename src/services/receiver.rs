//! Upload Receiver: pulls `audio_file`, `bridge` and `ai_type` out of an
//! inbound multipart body and stages the audio bytes on local disk.

use crate::api::error::AppError;
use axum::extract::Multipart;
use axum::extract::multipart::Field;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub const AUDIO_FIELD: &str = "audio_file";
pub const BRIDGE_FIELD: &str = "bridge";
pub const AI_TYPE_FIELD: &str = "ai_type";

const STAGED_PREFIX: &str = "upload-";
const STAGED_SUFFIX: &str = ".m4a";

/// A request-scoped file on local disk, deleted when dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: Option<TempPath>,
}

impl StagedFile {
    /// Create a new, uniquely named `upload-*.m4a` file in `dir`.
    pub fn create_in(dir: &Path) -> std::io::Result<(Self, std::fs::File)> {
        let named = tempfile::Builder::new()
            .prefix(STAGED_PREFIX)
            .suffix(STAGED_SUFFIX)
            .tempfile_in(dir)?;
        let (file, path) = named.into_parts();
        Ok((Self { path: Some(path) }, file))
    }

    /// Take ownership of a path somebody else creates (converter output).
    /// The file does not have to exist yet.
    pub fn adopt(path: PathBuf) -> std::io::Result<Self> {
        Ok(Self {
            path: Some(TempPath::try_from_path(path)?),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        let shown = path.display().to_string();
        match path.close() {
            Ok(()) => debug!(path = %shown, "Removed staged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged file {}: {}", shown, e),
        }
    }
}

/// Everything the pipeline needs from one inbound upload.
#[derive(Debug)]
pub struct UploadRequest {
    pub staged: StagedFile,
    /// Client-supplied filename, for logging only
    pub filename: String,
    /// Bytes written to the staged file
    pub size: u64,
    pub content_type: Option<String>,
    pub bridge: String,
    pub ai_type: String,
}

struct ReceivedAudio {
    staged: StagedFile,
    filename: String,
    size: u64,
    content_type: Option<String>,
}

/// Parse the whole multipart body. The first `audio_file` part carrying a
/// filename wins, as do the first `bridge` and `ai_type` values; missing text
/// fields become "".
pub async fn receive(multipart: &mut Multipart, temp_dir: &Path) -> Result<UploadRequest, AppError> {
    let mut audio: Option<ReceivedAudio> = None;
    let mut bridge: Option<String> = None;
    let mut ai_type: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);

        match name.as_deref() {
            Some(AUDIO_FIELD) if audio.is_none() => {
                let Some(filename) = field.file_name().map(str::to_string) else {
                    debug!("Skipping \"{}\" part without a filename", AUDIO_FIELD);
                    continue;
                };
                let content_type = field.content_type().map(str::to_string);
                let (staged, size) = stage_field(&mut field, temp_dir).await?;
                audio = Some(ReceivedAudio {
                    staged,
                    filename,
                    size,
                    content_type,
                });
            }
            Some(BRIDGE_FIELD) if bridge.is_none() => bridge = Some(field.text().await?),
            Some(AI_TYPE_FIELD) if ai_type.is_none() => ai_type = Some(field.text().await?),
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    let audio = audio.ok_or_else(|| {
        AppError::BadRequest(format!("missing file field \"{}\"", AUDIO_FIELD))
    })?;

    Ok(UploadRequest {
        staged: audio.staged,
        filename: audio.filename,
        size: audio.size,
        content_type: audio.content_type,
        bridge: bridge.unwrap_or_default(),
        ai_type: ai_type.unwrap_or_default(),
    })
}

/// Copy a field verbatim into a fresh staged file. The staged file is
/// created first so a failed copy still cleans up after itself.
async fn stage_field(field: &mut Field<'_>, temp_dir: &Path) -> Result<(StagedFile, u64), AppError> {
    let (staged, file) = StagedFile::create_in(temp_dir)?;
    let mut file = tokio::fs::File::from_std(file);
    let mut size = 0u64;

    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    file.flush().await?;

    debug!(path = %staged.path().display(), size, "Staged upload");
    Ok((staged, size))
}
