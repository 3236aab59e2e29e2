//! Site command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::site::escape_dollars;
use anyhow::Result;

/// Run the site command.
pub async fn run_site(url: &str, question: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Site) {
        Output::error(&format!("{}", e));
        Output::info("Run 'spor doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Loading website...");
    let index = match orchestrator.load_site(url).await {
        Ok(index) => index,
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to load {}: {}", url, e));
            return Err(e.into());
        }
    };

    spinner.set_message(format!("Answering from {} chunks...", index.len()));
    let answer = orchestrator.ask_site(&index, question).await;
    spinner.finish_and_clear();

    match answer {
        Ok(answer) => {
            println!("\n{}\n", escape_dollars(&answer.answer_text));
            if !answer.source.is_empty() {
                Output::source(&answer.source, answer.score);
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
