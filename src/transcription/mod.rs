//! Speech-to-text for meeting recordings.
//!
//! A [`Transcriber`] turns one bounded audio segment into text;
//! [`transcribe_chunks`] runs it over a directory of segments in order and
//! stores the joined transcript.

mod whisper;

pub use whisper::{is_api_key_configured, WhisperTranscriber};

use crate::error::Result;
use crate::media::list_chunks;
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one audio segment. `file_name` carries the audio format.
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String>;
}

/// Transcribe every segment in `chunk_dir` in file-name order into `dest`.
///
/// An existing `dest` is returned as is. The transcript file only appears
/// once every segment succeeded.
#[instrument(skip(transcriber, on_segment), fields(dir = %chunk_dir.display()))]
pub async fn transcribe_chunks(
    transcriber: &dyn Transcriber,
    chunk_dir: &Path,
    dest: &Path,
    on_segment: &mut (dyn FnMut(usize, usize) + Send),
) -> Result<String> {
    if dest.exists() {
        info!("Using existing transcript {}", dest.display());
        return Ok(tokio::fs::read_to_string(dest).await?);
    }

    let chunks = list_chunks(chunk_dir)?;
    info!("Transcribing {} audio segments", chunks.len());

    let mut parts = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let bytes = tokio::fs::read(chunk).await?;
        let file_name = chunk
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3");
        let text = transcriber.transcribe(bytes, file_name).await?;
        debug!("Segment {} gave {} chars", file_name, text.len());
        parts.push(text.trim().to_string());
        on_segment(index + 1, chunks.len());
    }
    let transcript = parts.join("\n");

    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(transcript.as_bytes())?;
    tmp.persist(dest).map_err(|e| e.error)?;

    Ok(transcript)
}
