mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codearena-cli")]
#[command(about = "CodeArena CLI - Check problems, preview harnesses, and run code against Judge0", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every problem in a problems file
    CheckProblem {
        /// Path to a JSON array of problems
        file: PathBuf,
    },

    /// Print the harness generated for one problem
    Harness {
        /// Problems file
        #[arg(short, long, default_value = "config/problems.json")]
        problems: PathBuf,

        /// Problem id
        #[arg(long)]
        problem: String,

        /// Language name (e.g., python, javascript, cpp)
        #[arg(short, long)]
        language: String,
    },

    /// Run a source file against a problem's test cases on Judge0
    Run {
        /// Problems file
        #[arg(short, long, default_value = "config/problems.json")]
        problems: PathBuf,

        /// Problem id
        #[arg(long)]
        problem: String,

        /// Language name (e.g., python, javascript, cpp)
        #[arg(short, long)]
        language: String,

        /// Judge0 language id (defaults to the problem's id, then the standard Judge0 id)
        #[arg(long)]
        language_id: Option<u32>,

        /// Source file holding the user function
        #[arg(short, long)]
        code: PathBuf,
    },

    /// Sign an API access token (uses ACCESS_TOKEN_SECRET)
    Token {
        /// User id placed in the token's `_id` claim
        #[arg(short, long)]
        user: String,

        /// Lifetime in minutes
        #[arg(long, default_value = "60")]
        ttl_minutes: i64,
    },

    /// Load a problems file into Redis
    Import {
        /// Problems file
        #[arg(short, long, default_value = "config/problems.json")]
        problems: PathBuf,

        /// Redis URL (falls back to REDIS_URL)
        #[arg(long)]
        redis_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckProblem { file } => {
            commands::check_problems(&file)?;
        }
        Commands::Harness {
            problems,
            problem,
            language,
        } => {
            commands::print_harness(&problems, &problem, &language)?;
        }
        Commands::Run {
            problems,
            problem,
            language,
            language_id,
            code,
        } => {
            commands::run_submission(&problems, &problem, &language, language_id, &code).await?;
        }
        Commands::Token { user, ttl_minutes } => {
            commands::issue_token(&user, ttl_minutes)?;
        }
        Commands::Import {
            problems,
            redis_url,
        } => {
            commands::import_problems(&problems, redis_url.as_deref()).await?;
        }
    }

    Ok(())
}
