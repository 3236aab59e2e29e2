//! Interactive quiz command.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::quiz::QuizQuestion;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Run the quiz command.
pub async fn run_quiz(file: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Document) {
        Output::error(&format!("{}", e));
        Output::info("Run 'spor doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Making quiz...");
    let quiz = orchestrator.make_quiz(Path::new(file)).await;
    spinner.finish_and_clear();
    let quiz = match quiz {
        Ok(q) => q,
        Err(e) => {
            Output::error(&format!("Failed to make a quiz: {}", e));
            return Err(e.into());
        }
    };

    let mut choices = Vec::with_capacity(quiz.questions.len());
    for (number, question) in quiz.questions.iter().enumerate() {
        let Some(choice) = ask(number + 1, question)? else {
            break;
        };
        if question.is_correct(choice) {
            Output::success("Correct!");
        } else if let Some(right) = question.correct_index() {
            Output::warning(&format!("Wrong. The answer was: {}", question.answers[right].answer));
        }
        choices.push(choice);
    }

    let score = quiz.grade(&choices);
    Output::header("Result");
    println!("\n  {} of {} correct\n", score, quiz.questions.len());
    if score == quiz.questions.len() {
        Output::success("Perfect score!");
    }

    Ok(())
}

/// Show one question and read a choice. `None` when stdin is closed.
fn ask(number: usize, question: &QuizQuestion) -> Result<Option<usize>> {
    println!("\n{} {}", style(format!("{}.", number)).bold(), style(&question.question).bold());
    for (i, answer) in question.answers.iter().enumerate() {
        Output::list_item(&format!("{}) {}", i + 1, answer.answer));
    }

    let stdin = io::stdin();
    loop {
        print!("{} ", style("Your answer:").green().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        match parse_choice(&input, question.answers.len()) {
            Some(choice) => return Ok(Some(choice)),
            None => Output::warning(&format!("Enter a number from 1 to {}", question.answers.len())),
        }
    }
}

/// Zero-based answer index from a 1-based entry.
fn parse_choice(input: &str, answers: usize) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=answers).contains(&n) => Some(n - 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("2\n", 4), Some(1));
        assert_eq!(parse_choice("0", 4), None);
        assert_eq!(parse_choice("5", 4), None);
        assert_eq!(parse_choice("b", 4), None);
    }
}
