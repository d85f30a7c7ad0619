//! yt-dlp media engine
//!
//! Runs the `yt-dlp` binary as a subprocess. The final file path is read back
//! from `--print after_move:filepath`, which reports the path after any
//! merge or audio conversion has finished.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::errors::EngineError;
use super::types::{EngineJob, FormatSpec, AUDIO_BITRATE_KBPS, AUDIO_CODEC};
use super::MediaEngine;

/// Default program name, looked up on PATH
pub const DEFAULT_PROGRAM: &str = "yt-dlp";

/// Number of stderr lines kept in a failure message
const STDERR_TAIL_LINES: usize = 5;

/// Media engine backed by the yt-dlp CLI
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    program: PathBuf,
    merge_output_format: Option<String>,
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl YtDlpEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            merge_output_format: None,
        }
    }

    /// Force the container used when merging video and audio streams
    pub fn with_merge_output_format(mut self, format: impl Into<String>) -> Self {
        self.merge_output_format = Some(format.into());
        self
    }

    /// Build the full argument list for one job
    pub fn build_args(&self, url: &str, job: &EngineJob) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--no-progress".into(),
            "--no-playlist".into(),
            "--quiet".into(),
            "--no-simulate".into(),
            "--print".into(),
            "after_move:filepath".into(),
            "-f".into(),
            job.format.selector(),
            "-o".into(),
            job.output_template(),
        ];

        match &job.format {
            FormatSpec::Audio => {
                args.extend([
                    "--extract-audio".into(),
                    "--audio-format".into(),
                    AUDIO_CODEC.into(),
                    "--audio-quality".into(),
                    format!("{}K", AUDIO_BITRATE_KBPS),
                ]);
            }
            FormatSpec::Video { .. } => {
                if let Some(container) = &self.merge_output_format {
                    args.push("--merge-output-format".into());
                    args.push(container.clone());
                }
            }
        }

        if let Some(cookies) = &job.cookies {
            args.push("--cookies".into());
            args.push(cookies.display().to_string());
        }

        // End of options, so a URL starting with '-' is never read as a flag
        args.push("--".into());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn resolve(&self, url: &str, job: &EngineJob) -> Result<PathBuf, EngineError> {
        let args = self.build_args(url, job);
        debug!(program = %self.program.display(), ?args, "Invoking yt-dlp");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            warn!(url = url, status = %output.status, "yt-dlp failed");
            return Err(EngineError::Failed {
                status: output.status.to_string(),
                stderr: stderr_tail(&stderr),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_output_path(&stdout).ok_or(EngineError::NoOutputPath)
    }
}

/// The last non-empty line printed by `--print after_move:filepath`
fn parse_output_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(PathBuf::from)
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
