use crate::api::error::AppError;
use crate::services::converter::{MediaConverter, output_path_for};
use crate::services::forwarder::{ForwardOutcome, Forwarder};
use crate::services::receiver::{self, StagedFile};
use axum::extract::Multipart;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Parsing,
    Converting,
    Forwarding,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Parsing => "parsing",
            PipelineStage::Converting => "converting",
            PipelineStage::Forwarding => "forwarding",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Receive -> convert -> forward, strictly in that order.
///
/// Both staged files are owned by `execute`'s frame and are removed whenever
/// that frame is left, including early returns and unwinding.
pub struct UploadPipeline {
    converter: Arc<dyn MediaConverter>,
    forwarder: Arc<dyn Forwarder>,
    temp_dir: PathBuf,
}

impl UploadPipeline {
    pub fn new(
        converter: Arc<dyn MediaConverter>,
        forwarder: Arc<dyn Forwarder>,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            converter,
            forwarder,
            temp_dir,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub async fn run(&self, mut multipart: Multipart) -> Result<ForwardOutcome, AppError> {
        let mut stage = PipelineStage::Parsing;
        let result = self.execute(&mut multipart, &mut stage).await;

        match &result {
            Ok(outcome) => info!(
                stage = %stage,
                downstream_status = outcome.status.as_u16(),
                "Upload pipeline finished"
            ),
            Err(e) => warn!(
                stage = %stage,
                code = e.status().as_u16(),
                "Upload pipeline failed: {}",
                e
            ),
        }

        result
    }

    async fn execute(
        &self,
        multipart: &mut Multipart,
        stage: &mut PipelineStage,
    ) -> Result<ForwardOutcome, AppError> {
        let upload = receiver::receive(multipart, &self.temp_dir).await?;
        info!(
            filename = %upload.filename,
            size = upload.size,
            content_type = upload.content_type.as_deref().unwrap_or("unknown"),
            bridge = %upload.bridge,
            ai_type = %upload.ai_type,
            "Received upload"
        );

        *stage = PipelineStage::Converting;
        // The expected output path is owned before the converter starts writing.
        let _pending_output = StagedFile::adopt(output_path_for(upload.staged.path()))?;
        let converted = StagedFile::adopt(self.converter.convert(upload.staged.path()).await?)?;
        ensure_converted(converted.path()).await?;

        *stage = PipelineStage::Forwarding;
        let outcome = self
            .forwarder
            .forward(converted.path(), &upload.bridge, &upload.ai_type)
            .await?;

        *stage = PipelineStage::Done;
        Ok(outcome)
    }
}

/// A zero exit status must be backed by a non-empty output file.
async fn ensure_converted(path: &Path) -> Result<(), AppError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(_) => Err(AppError::Conversion(format!(
            "converter produced an empty output file: {}",
            path.display()
        ))),
        Err(e) => Err(AppError::Conversion(format!(
            "converter produced no output file {}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_converted() {
        let dir = TempDir::new().unwrap();

        let missing = dir.path().join("missing.mp3");
        assert!(matches!(ensure_converted(&missing).await, Err(AppError::Conversion(_))));

        let empty = dir.path().join("empty.mp3");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(ensure_converted(&empty).await, Err(AppError::Conversion(_))));

        let full = dir.path().join("full.mp3");
        std::fs::write(&full, b"ID3").unwrap();
        assert!(ensure_converted(&full).await.is_ok());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::Parsing.to_string(), "parsing");
        assert_eq!(PipelineStage::Done.to_string(), "done");
    }
}
