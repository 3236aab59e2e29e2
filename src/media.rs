//! Audio extraction and segmentation with ffmpeg.
//!
//! Videos are reduced to an MP3 track, which is cut into fixed-length
//! `chunk_NNNN.mp3` segments short enough for one transcription call.
//! Outputs are written to a staging path and moved into place once complete,
//! so only finished outputs are reused.

use crate::error::{Result, SporError};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Run an external tool, mapping a missing binary to [`SporError::ToolNotFound`].
async fn run_tool(tool: &str, mut command: Command) -> Result<Output> {
    let result = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(output) => Ok(output),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SporError::ToolNotFound(tool.into())),
        Err(e) => Err(SporError::MediaExtraction(format!("{tool} execution failed: {e}"))),
    }
}

fn check_status(tool: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(SporError::MediaExtraction(format!("{tool} failed: {}", stderr.trim())))
}

/// Whether `tool` can be started from PATH.
pub async fn tool_available(tool: &str) -> bool {
    let mut command = Command::new(tool);
    command.arg("-version");
    matches!(run_tool(tool, command).await, Ok(o) if o.status.success())
}

/// Path of the audio track extracted from `video`.
pub fn audio_path_for(video: &Path) -> PathBuf {
    video.with_extension("mp3")
}

/// Marker written into a segment directory after its last segment.
pub const SEGMENTS_COMPLETE: &str = ".complete";

/// Staging path ffmpeg writes the audio track to before it is moved to `target`.
fn partial_path(target: &Path) -> PathBuf {
    target.with_extension("partial.mp3")
}

/// Extract the audio track of `video` next to it as MP3.
#[instrument(fields(video = %video.display()))]
pub async fn extract_audio(video: &Path) -> Result<PathBuf> {
    let target = audio_path_for(video);
    if target == video {
        return Ok(target);
    }
    if target.exists() {
        info!("Using existing audio track");
        return Ok(target);
    }

    info!("Extracting audio");
    let partial = partial_path(&target);
    let mut command = Command::new("ffmpeg");
    command
        .arg("-y")
        .arg("-i")
        .arg(video)
        .arg("-vn")
        .args(["-loglevel", "error"])
        .arg(&partial);
    let output = run_tool("ffmpeg", command).await?;
    if let Err(e) = check_status("ffmpeg", &output) {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }

    if !partial.exists() {
        return Err(SporError::MediaExtraction(format!(
            "ffmpeg produced no audio for {}",
            video.display()
        )));
    }
    std::fs::rename(&partial, &target)?;
    Ok(target)
}

/// File name of segment `index`.
pub fn chunk_name(index: usize) -> String {
    format!("chunk_{:04}.mp3", index)
}

/// `(start, length)` in seconds for each segment of a track.
pub fn segment_plan(total_seconds: f64, chunk_seconds: f64) -> Vec<(f64, f64)> {
    if total_seconds <= 0.0 || chunk_seconds <= 0.0 {
        return Vec::new();
    }
    let count = (total_seconds / chunk_seconds).ceil() as usize;
    (0..count)
        .map(|i| {
            let start = i as f64 * chunk_seconds;
            (start, chunk_seconds.min(total_seconds - start))
        })
        .collect()
}

/// Segment files in `dir`, ordered by name.
pub fn list_chunks(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut chunks: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("mp3"))
        .collect();
    chunks.sort();
    Ok(chunks)
}

/// Cut `audio` into `chunk_minutes`-long segments inside `dir`.
///
/// A directory is reused only if it carries the [`SEGMENTS_COMPLETE`] marker.
/// New segments are cut into a sibling staging directory that is renamed to
/// `dir` after the last one succeeds.
#[instrument(skip_all, fields(audio = %audio.display()))]
pub async fn split_audio(audio: &Path, chunk_minutes: u32, dir: &Path) -> Result<Vec<PathBuf>> {
    if chunk_minutes == 0 {
        return Err(SporError::InvalidInput("chunk_minutes must be at least 1".to_string()));
    }

    if dir.join(SEGMENTS_COMPLETE).exists() {
        let existing = list_chunks(dir)?;
        info!("Using {} existing audio segments", existing.len());
        return Ok(existing);
    }
    if dir.exists() {
        warn!("Discarding incomplete segments in {}", dir.display());
        std::fs::remove_dir_all(dir)?;
    }

    let parent = dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let staging = tempfile::Builder::new().prefix(".segments").tempdir_in(parent)?;

    let total = probe_duration(audio).await?;
    let plan = segment_plan(total, f64::from(chunk_minutes) * 60.0);
    info!("Cutting {:.1}s of audio into {} segments", total, plan.len());

    for (index, (start, length)) in plan.iter().enumerate() {
        let dest = staging.path().join(chunk_name(index));
        extract_segment(audio, &dest, *start, *length).await?;
        debug!("Wrote segment {} at {:.1}s", index, start);
    }
    std::fs::write(staging.path().join(SEGMENTS_COMPLETE), plan.len().to_string())?;

    std::fs::rename(staging.path(), dir)?;
    list_chunks(dir)
}

async fn extract_segment(source: &Path, dest: &Path, start: f64, length: f64) -> Result<()> {
    let start = format!("{:.3}", start);
    let length = format!("{:.3}", length);

    let mut command = Command::new("ffmpeg");
    command
        .args(["-ss", start.as_str()])
        .arg("-i")
        .arg(source)
        .args(["-t", length.as_str()])
        .args(["-c", "copy", "-y", "-loglevel", "error"])
        .arg(dest);
    let copy = run_tool("ffmpeg", command).await?;
    if copy.status.success() && dest.exists() {
        return Ok(());
    }

    warn!("Stream copy failed, re-encoding segment");
    let mut command = Command::new("ffmpeg");
    command
        .args(["-ss", start.as_str()])
        .arg("-i")
        .arg(source)
        .args(["-t", length.as_str()])
        .args(["-codec:a", "libmp3lame", "-qscale:a", "2", "-y", "-loglevel", "error"])
        .arg(dest);
    let encode = run_tool("ffmpeg", command).await?;
    check_status("ffmpeg", &encode)
}

/// Duration of a media file in seconds, from ffprobe's JSON output.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let mut command = Command::new("ffprobe");
    command
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path);
    let output = run_tool("ffprobe", command).await?;
    check_status("ffprobe", &output)?;
    parse_probe_duration(&output.stdout)
}

fn parse_probe_duration(stdout: &[u8]) -> Result<f64> {
    let parsed: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|_| SporError::MediaExtraction("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| SporError::MediaExtraction("Could not determine audio duration".into()))
}
