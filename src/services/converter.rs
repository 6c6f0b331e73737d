use crate::api::error::AppError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Extension appended to the input path to name the converted file
pub const OUTPUT_EXTENSION: &str = ".mp3";

/// Turns one staged input file into a converted file.
///
/// On error the output file must not be assumed to exist; implementations
/// remove whatever partial output they left behind.
#[async_trait]
pub trait MediaConverter: Send + Sync {
    async fn convert(&self, input: &Path) -> Result<PathBuf, AppError>;
}

/// `<input>` + `.mp3`, e.g. `/tmp/upload-abc.m4a` -> `/tmp/upload-abc.m4a.mp3`
pub fn output_path_for(input: &Path) -> PathBuf {
    let mut name: OsString = input.as_os_str().to_owned();
    name.push(OUTPUT_EXTENSION);
    PathBuf::from(name)
}

/// Runs an ffmpeg-compatible executable as `<program> -i <input> <output>`.
pub struct FfmpegConverter {
    program: String,
    timeout: Option<Duration>,
}

impl FfmpegConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl MediaConverter for FfmpegConverter {
    async fn convert(&self, input: &Path) -> Result<PathBuf, AppError> {
        let output_path = output_path_for(input);

        debug!(
            program = %self.program,
            input = %input.display(),
            output = %output_path.display(),
            "Starting conversion"
        );

        let mut command = Command::new(&self.program);
        command
            .arg("-i")
            .arg(input)
            .arg(&output_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let run = command.output();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    discard_partial_output(&output_path).await;
                    error!("{} timed out after {:?}", self.program, limit);
                    return Err(AppError::Conversion(format!(
                        "{} timed out after {:?}",
                        self.program, limit
                    )));
                }
            },
            None => run.await,
        };

        let output = result.map_err(|e| {
            error!("Failed to launch {}: {}", self.program, e);
            AppError::Conversion(format!("failed to launch {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("{} failed ({}): {}", self.program, output.status, stderr.trim());
            discard_partial_output(&output_path).await;
            return Err(AppError::Conversion(diagnostic(
                &self.program,
                &output.status.to_string(),
                &stderr,
            )));
        }

        info!(output = %output_path.display(), "Conversion finished");
        Ok(output_path)
    }
}

/// Last non-empty stderr line, which is where ffmpeg reports the actual
/// failure after its banner and stream dump.
fn diagnostic(program: &str, status: &str, stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} exited with {}", program, status))
}

async fn discard_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial conversion output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => error!("Failed to remove partial output {}: {}", path.display(), e),
    }
}
