//! Invocation of the external transcoder
//!
//! Only success or failure is interpreted; on failure the tool's combined
//! stdout and stderr is surfaced verbatim as the diagnostic.

use super::scratch::{Scratch, ScratchDir};
use async_trait::async_trait;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default length of a generated video sample in seconds
pub const SAMPLE_SECS: u32 = 15;

const FALLBACK_AUDIO_CODEC: &str = "libmp3lame";

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{status}")]
    Failed { status: String, output: String },

    #[error("failed to write concat list: {0}")]
    ListFile(#[from] std::io::Error),
}

impl TranscodeError {
    /// Text to show the user
    pub fn diagnostic(&self) -> String {
        match self {
            TranscodeError::Failed { status, output } => format!("{}\n{}", status, output),
            other => other.to_string(),
        }
    }
}

/// Runs the transcoder with a prepared argument vector
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<(), TranscodeError>;
}

/// `ffmpeg` on the local machine
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: String,
}

impl Ffmpeg {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn run(&self, args: &[String]) -> Result<(), TranscodeError> {
        debug!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Err(TranscodeError::Failed {
            status: output.status.to_string(),
            output: combined,
        })
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Cut `[start, end]` out of `input` without re-encoding
pub fn trim_args(input: &Path, start: &str, end: &str, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(input),
        "-ss".into(),
        start.into(),
        "-to".into(),
        end.into(),
        "-c".into(),
        "copy".into(),
        path_arg(output),
    ]
}

/// Concatenate the files named in a list file without re-encoding
pub fn concat_copy_args(list: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        path_arg(list),
        "-c".into(),
        "copy".into(),
        path_arg(output),
    ]
}

/// Decode every input and re-encode the joined audio
pub fn concat_reencode_args(inputs: &[PathBuf], output: &Path) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    for input in inputs {
        args.push("-i".into());
        args.push(path_arg(input));
    }
    args.push("-filter_complex".into());
    args.push(format!("concat=n={}:v=0:a=1", inputs.len()));
    args.push("-c:a".into());
    args.push(FALLBACK_AUDIO_CODEC.into());
    args.push(path_arg(output));
    args
}

/// Copy `length_secs` seconds starting at `offset_secs`
pub fn sample_args(input: &Path, offset_secs: f64, length_secs: u32, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-ss".into(),
        format!("{:.2}", offset_secs),
        "-i".into(),
        path_arg(input),
        "-t".into(),
        length_secs.to_string(),
        "-c".into(),
        "copy".into(),
        path_arg(output),
    ]
}

/// Quote a path for a concat list entry
pub fn escape_list_path(path: &str) -> String {
    path.replace('\'', r"'\''")
}

/// Body of a concat list file, one `file '...'` line per input
pub fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| format!("file '{}'\n", escape_list_path(&p.to_string_lossy())))
        .collect()
}

/// Random start for a sample: uniform in `[0, duration - length)`, else 0
pub fn sample_offset<R: Rng + ?Sized>(duration_secs: Option<u32>, length_secs: u32, rng: &mut R) -> f64 {
    match duration_secs {
        Some(d) if d > length_secs => rng.gen_range(0.0..f64::from(d - length_secs)),
        _ => 0.0,
    }
}

/// Join `inputs` into `output`
///
/// Stream copy through a list file is tried first; when that fails, every
/// input is re-encoded through the concat filter. The list file is tracked in
/// `scratch` so the caller reclaims it.
pub async fn merge(
    transcoder: &dyn Transcoder,
    dir: &ScratchDir,
    scratch: &mut Scratch,
    inputs: &[PathBuf],
    output: &Path,
) -> Result<(), TranscodeError> {
    let list = scratch.track(dir.path_for("concat.txt"));
    tokio::fs::write(&list, concat_list(inputs)).await?;

    match transcoder.run(&concat_copy_args(&list, output)).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("Stream-copy concat failed, re-encoding: {}", e);
            transcoder.run(&concat_reencode_args(inputs, output)).await
        }
    }
}
