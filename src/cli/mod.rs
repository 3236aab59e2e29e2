//! CLI module for Spor.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Spor - question answering over documents, websites and meetings
///
/// Index a file, a sitemap or a meeting recording and ask questions that are
/// answered only from its content.
#[derive(Parser, Debug)]
#[command(name = "spor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with a document (.pdf, .docx or .txt)
    Doc {
        /// Path to the document
        file: String,
    },

    /// Ask a single question about a document
    Ask {
        /// Path to the document
        file: String,

        /// The question to ask
        question: String,
    },

    /// Ask a question about a website, given its sitemap
    Site {
        /// Sitemap URL (ending in .xml)
        url: String,

        /// The question to ask
        question: String,
    },

    /// Transcribe, summarize or chat with a meeting recording
    Meeting {
        /// Path to the video file
        video: String,

        #[command(subcommand)]
        action: MeetingAction,
    },

    /// Take a multiple-choice quiz about a document
    Quiz {
        /// Path to the document
        file: String,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingAction {
    /// Print the transcript
    Transcript,

    /// Summarize the transcript
    Summary,

    /// Chat with the transcript
    Chat,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meeting_summary() {
        let cli = Cli::try_parse_from(["spor", "-v", "meeting", "standup.mp4", "summary"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Meeting { video, action } => {
                assert_eq!(video, "standup.mp4");
                assert_eq!(action, MeetingAction::Summary);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_site_requires_question() {
        assert!(Cli::try_parse_from(["spor", "site", "https://example.com/sitemap.xml"]).is_err());
    }
}
