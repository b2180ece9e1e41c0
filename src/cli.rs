//! Command-line argument parsing for askdb.

use askdb::llm::LlmProvider;
use clap::Parser;

/// Ask a natural-language question against a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "askdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The question to answer (quoting is optional)
    #[arg(value_name = "QUESTION")]
    pub question: Vec<String>,

    /// SQLite database path or URL (overrides DATABASE_URL)
    #[arg(short = 'd', long, value_name = "PATH")]
    pub database: Option<String>,

    /// Generation provider to use instead of priority-ordered fallback
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<LlmProvider>,

    /// Pretty-print the JSON answer
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the question as a single string, if one was given.
    pub fn question(&self) -> Option<String> {
        let joined = self.question.join(" ");
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
