//! Interactive document chat.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{DocumentIndex, Orchestrator};
use crate::rag::ConversationState;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Run the doc command.
pub async fn run_doc(file: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Document) {
        Output::error(&format!("{}", e));
        Output::info("Run 'spor doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Embedding file...");
    let index = orchestrator.embed_file(Path::new(file)).await;
    spinner.finish_and_clear();
    let index = index?;

    chat_loop(&orchestrator, &index).await
}

/// Read questions from stdin until `exit`, answering each from `index`.
pub async fn chat_loop(orchestrator: &Orchestrator, index: &DocumentIndex) -> Result<()> {
    println!("\n{}", style(format!("Chatting with {}", index.name())).bold().cyan());
    println!(
        "{}\n",
        style("Ask anything about the file, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut state = ConversationState::new();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            state.clear();
            Output::info("Conversation history cleared.");
            continue;
        }

        print!("\n{} ", style("Spor:").cyan().bold());
        match orchestrator
            .ask_document_streaming(index, input, &mut state, &mut |t: &str| Output::token(t))
            .await
        {
            Ok(_) => println!("\n"),
            Err(e) => {
                println!();
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}
