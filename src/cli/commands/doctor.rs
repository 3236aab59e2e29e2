//! Doctor command: which pipelines can run and what the cache holds.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::path::Path;

/// Cache subdirectories and what they hold.
const CACHE_AREAS: &[(&str, &str)] = &[
    ("files", "documents"),
    ("embeddings", "document vectors"),
    ("site_embeddings", "site vectors"),
    ("chunks", "audio segments"),
    ("summaries", "summary checkpoints"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Ready,
    Blocked,
}

/// Whether one pipeline can run, and why not.
#[derive(Debug)]
struct PipelineCheck {
    pipeline: &'static str,
    readiness: Readiness,
    reason: Option<String>,
}

impl PipelineCheck {
    fn run(pipeline: &'static str, operation: Operation) -> Self {
        match preflight::check(operation) {
            Ok(()) => Self {
                pipeline,
                readiness: Readiness::Ready,
                reason: None,
            },
            Err(e) => Self {
                pipeline,
                readiness: Readiness::Blocked,
                reason: Some(e.to_string()),
            },
        }
    }

    fn print(&self) {
        match (&self.readiness, &self.reason) {
            (Readiness::Ready, _) => println!("  {} {}", style("✓").green(), style(self.pipeline).bold()),
            (Readiness::Blocked, reason) => {
                println!("  {} {}", style("✗").red(), style(self.pipeline).bold());
                if let Some(reason) = reason {
                    println!("    {} {}", style("→").dim(), style(reason).dim());
                }
                if self.pipeline == "meetings" {
                    println!("    {} {}", style("→").dim(), style(install_hint_ffmpeg()).dim());
                }
            }
        }
    }
}

/// Size and file count of one cache area.
#[derive(Debug, PartialEq, Eq)]
struct CacheArea {
    name: String,
    label: &'static str,
    bytes: u64,
    files: usize,
}

/// Run the doctor command. Fails when no pipeline can run.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Spor Doctor");

    println!("\n{}", style("Pipelines").bold());
    let checks = [
        PipelineCheck::run("documents and quizzes", Operation::Document),
        PipelineCheck::run("sites", Operation::Site),
        PipelineCheck::run("meetings", Operation::Meeting),
    ];
    for check in &checks {
        check.print();
    }

    println!("\n{}", style("Models").bold());
    Output::kv("Chat", &settings.llm.model);
    Output::kv(
        "Embeddings",
        &format!("{} ({} dims)", settings.embedding.model, settings.embedding.dimensions),
    );
    Output::kv("Transcription", &settings.media.transcription_model);

    let cache_dir = settings.cache_dir();
    println!("\n{}", style("Cache").bold());
    Output::kv("Location", &cache_dir.display().to_string());
    if cache_dir.exists() {
        for area in cache_report(&cache_dir) {
            Output::kv(
                &format!("{} ({})", area.name, area.label),
                &format!("{} files, {}", area.files, format_size(area.bytes)),
            );
        }
    } else {
        Output::info("Empty, created on first use");
    }
    println!();

    let blocked = checks.iter().filter(|c| c.readiness == Readiness::Blocked).count();
    if blocked == checks.len() {
        Output::error("No pipeline can run.");
        anyhow::bail!("doctor found blocking problems");
    } else if blocked > 0 {
        Output::warning(&format!("{} of {} pipelines unavailable.", blocked, checks.len()));
    } else {
        Output::success("Every pipeline is ready.");
    }
    Ok(())
}

/// Usage of each cache area, transcripts last.
fn cache_report(cache_dir: &Path) -> Vec<CacheArea> {
    let mut areas: Vec<CacheArea> = CACHE_AREAS
        .iter()
        .map(|&(name, label)| {
            let (bytes, files) = dir_usage(&cache_dir.join(name));
            CacheArea {
                name: name.to_string(),
                label,
                bytes,
                files,
            }
        })
        .collect();

    let transcripts: Vec<u64> = std::fs::read_dir(cache_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("txt"))
                .filter_map(|e| e.metadata().ok().map(|m| m.len()))
                .collect()
        })
        .unwrap_or_default();
    areas.push(CacheArea {
        name: "*.txt".to_string(),
        label: "transcripts",
        bytes: transcripts.iter().sum(),
        files: transcripts.len(),
    });
    areas
}

/// Total bytes and file count below `dir`.
fn dir_usage(dir: &Path) -> (u64, usize) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return (0, 0);
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| match e.metadata() {
            Ok(m) if m.is_dir() => dir_usage(&e.path()),
            Ok(m) => (m.len(), 1),
            Err(_) => (0, 0),
        })
        .fold((0, 0), |(b, f), (db, df)| (b + db, f + df))
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install ffmpeg with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install ffmpeg with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install ffmpeg from: https://ffmpeg.org/download.html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_report_follows_layout() {
        let dir = tempfile::tempdir().unwrap();
        let embeddings = dir.path().join("embeddings").join("report.pdf");
        std::fs::create_dir_all(&embeddings).unwrap();
        std::fs::write(embeddings.join("ab"), [0u8; 10]).unwrap();
        std::fs::write(embeddings.join("cd"), [0u8; 6]).unwrap();
        std::fs::write(dir.path().join("standup.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("standup.mp4"), [0u8; 100]).unwrap();

        let report = cache_report(dir.path());
        assert_eq!(report.len(), CACHE_AREAS.len() + 1);

        let vectors = report.iter().find(|a| a.name == "embeddings").unwrap();
        assert_eq!((vectors.bytes, vectors.files), (16, 2));
        let files = report.iter().find(|a| a.name == "files").unwrap();
        assert_eq!((files.bytes, files.files), (0, 0));
        let transcripts = report.last().unwrap();
        assert_eq!(transcripts.label, "transcripts");
        assert_eq!((transcripts.bytes, transcripts.files), (5, 1));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(dir_usage(&dir.path().join("missing")), (0, 0));
    }

    #[test]
    fn test_pipeline_without_requirements_is_ready() {
        let check = PipelineCheck::run("config", Operation::Config);
        assert_eq!(check.readiness, Readiness::Ready);
        assert!(check.reason.is_none());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
