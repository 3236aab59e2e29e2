//! Meeting command implementation.

use super::chat::chat_loop;
use crate::cli::preflight::{self, Operation};
use crate::cli::{MeetingAction, Output};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::Path;

/// Run the meeting command.
pub async fn run_meeting(video: &str, action: MeetingAction, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Meeting) {
        Output::error(&format!("{}", e));
        Output::info("Run 'spor doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let pb = Output::progress_bar(0, "Transcribing");
    let transcript = orchestrator
        .process_meeting(Path::new(video), &mut |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        })
        .await;
    pb.finish_and_clear();

    let transcript = match transcript {
        Ok(t) => t,
        Err(e) => {
            Output::error(&format!("Failed to transcribe {}: {}", video, e));
            return Err(e.into());
        }
    };

    match action {
        MeetingAction::Transcript => {
            println!("{}", transcript.text);
        }

        MeetingAction::Summary => {
            let pb = Output::progress_bar(0, "Summarizing");
            let summary = orchestrator
                .summarize_transcript(&transcript, &mut |done, total| {
                    pb.set_length(total as u64);
                    pb.set_position(done as u64);
                })
                .await;
            pb.finish_and_clear();

            Output::header("Summary");
            println!("\n{}\n", summary?.text);
        }

        MeetingAction::Chat => {
            let spinner = Output::spinner("Embedding transcript...");
            let index = orchestrator.embed_file(&transcript.path).await;
            spinner.finish_and_clear();
            chat_loop(&orchestrator, &index?).await?;
        }
    }

    Ok(())
}
