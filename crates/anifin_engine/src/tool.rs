//! Invocation of the external media fetch utility (yt-dlp compatible).

use std::path::PathBuf;
use std::process::Stdio;

use anifin_core::MediaFormat;
use engine_logging::{engine_debug, engine_warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::DownloadError;

pub const DEFAULT_PROGRAM: &str = "yt-dlp";
pub const DEFAULT_CONCURRENT_FRAGMENTS: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    pub url: String,
    pub output: PathBuf,
    pub quality: Option<String>,
    /// `None` leaves container selection to the utility.
    pub format: Option<MediaFormat>,
}

/// A line of utility output worth surfacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolLine {
    Progress(String),
    Merging,
    Warning(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTool {
    program: String,
    leading_args: Vec<String>,
    concurrent_fragments: u32,
}

impl Default for FetchTool {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            leading_args: Vec::new(),
            concurrent_fragments: DEFAULT_CONCURRENT_FRAGMENTS,
        }
    }
}

impl FetchTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Arguments placed before the generated ones, e.g. `-c <script> name`
    /// when the program is a shell.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_concurrent_fragments(mut self, fragments: u32) -> Self {
        self.concurrent_fragments = fragments.max(1);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn build_args(&self, request: &ToolRequest) -> Vec<String> {
        let mut args = vec![
            request.url.clone(),
            "-o".to_string(),
            request.output.to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
        ];
        if let Some(quality) = &request.quality {
            args.extend(["-f".to_string(), quality.clone()]);
        }
        match request.format {
            Some(format) if format.is_audio_only() => {
                args.extend(["-x", "--audio-format", format.extension()].map(String::from));
            }
            Some(format) => {
                args.extend(["--merge-output-format", format.extension()].map(String::from));
            }
            None => {}
        }
        args.extend([
            "--concurrent-fragments".to_string(),
            self.concurrent_fragments.to_string(),
            "--newline".to_string(),
        ]);
        args
    }

    /// Runs the utility to completion, handing classified output lines to
    /// `on_line`. Cancelling kills the child and yields `Cancelled`.
    pub async fn run<F>(
        &self,
        request: &ToolRequest,
        on_line: F,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError>
    where
        F: Fn(ToolLine) + Send + Sync,
    {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let args = self.build_args(request);
        engine_debug!("spawning {} {:?}", self.program, args);
        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| self.launch_error(err.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.launch_error("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| self.launch_error("stderr not captured"))?;
        // Raw segments so a non-UTF-8 line cannot stop a pipe from draining.
        let mut out_lines = BufReader::new(stdout).split(b'\n');
        let mut err_lines = BufReader::new(stderr).split(b'\n');

        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut cancelled = false;
        while stdout_open || stderr_open {
            tokio::select! {
                _ = cancel.cancelled(), if !cancelled => {
                    cancelled = true;
                    engine_warn!("cancelling {} for {}", self.program, request.url);
                    if let Err(err) = child.start_kill() {
                        engine_warn!("failed to kill {}: {err}", self.program);
                    }
                }
                segment = out_lines.next_segment(), if stdout_open => match segment {
                    Ok(Some(bytes)) => {
                        if let Some(line) = classify_stdout(&lossy_line(&bytes)) {
                            on_line(line);
                        }
                    }
                    Ok(None) => stdout_open = false,
                    Err(err) => {
                        engine_warn!("stdout of {} unreadable: {err}", self.program);
                        stdout_open = false;
                    }
                },
                segment = err_lines.next_segment(), if stderr_open => match segment {
                    Ok(Some(bytes)) => {
                        if let Some(line) = classify_stderr(&lossy_line(&bytes)) {
                            on_line(line);
                        }
                    }
                    Ok(None) => stderr_open = false,
                    Err(err) => {
                        engine_warn!("stderr of {} unreadable: {err}", self.program);
                        stderr_open = false;
                    }
                },
            }
        }
        let status = child
            .wait()
            .await
            .map_err(|err| self.launch_error(err.to_string()))?;
        if cancelled {
            return Err(DownloadError::Cancelled);
        }
        if status.success() {
            Ok(())
        } else {
            Err(DownloadError::ToolExit {
                tool: self.program.clone(),
                code: status.code(),
            })
        }
    }

    fn launch_error(&self, message: impl Into<String>) -> DownloadError {
        DownloadError::ToolLaunch {
            tool: self.program.clone(),
            message: message.into(),
        }
    }
}

fn lossy_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn classify_stdout(line: &str) -> Option<ToolLine> {
    let line = line.trim();
    if line.contains("[download]") {
        Some(ToolLine::Progress(line.to_string()))
    } else if line.contains("Merger") {
        Some(ToolLine::Merging)
    } else {
        None
    }
}

pub fn classify_stderr(line: &str) -> Option<ToolLine> {
    let line = line.trim();
    (!line.is_empty()).then(|| ToolLine::Warning(line.to_string()))
}
