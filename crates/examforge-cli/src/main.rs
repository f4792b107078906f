//! examforge CLI: validate, rewrite, render and grade HSK question sets.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use examforge_core::Tier;

mod commands;

#[derive(Parser)]
#[command(
    name = "examforge",
    version,
    about = "HSK exam generation, rendering and grading"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a question set and report what would be rejected
    Validate {
        /// Path to a question set JSON file or directory
        #[arg(long)]
        questions: PathBuf,

        /// Exam tier (e.g. "3" or "HSK3")
        #[arg(long, default_value = "1", value_parser = parse_tier)]
        tier: Tier,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Rewrite text toward a tier's vocabulary
    Rewrite {
        /// Target tier
        #[arg(long, value_parser = parse_tier)]
        tier: Tier,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Rewrite this many times and print the tier mixture instead
        #[arg(long)]
        trials: Option<usize>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Text to rewrite
        text: String,
    },

    /// List configured question types
    Types {
        /// Only show this tier
        #[arg(long, value_parser = parse_tier)]
        tier: Option<Tier>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print a question set as a learner would see it
    Render {
        /// Path to a question set JSON file
        #[arg(long)]
        questions: PathBuf,

        #[arg(long, default_value = "1", value_parser = parse_tier)]
        tier: Tier,

        /// Only render the question at this index
        #[arg(long)]
        index: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Print render plans as JSON
        #[arg(long)]
        json: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate a question set with the configured generator
    Generate {
        #[arg(long, value_parser = parse_tier)]
        tier: Tier,

        /// Category to request
        #[arg(long)]
        category: String,

        /// Comma-separated question types to accept (default: all)
        #[arg(long)]
        types: Option<String>,

        /// Number of questions to request
        #[arg(long, default_value = "5")]
        count: usize,

        /// Write accepted records to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Grade answers against a question set
    Grade {
        /// Path to a question set JSON file
        #[arg(long)]
        questions: PathBuf,

        /// Answers as {"<index>": ["A", ...]}
        #[arg(long)]
        answers: PathBuf,

        #[arg(long, value_parser = parse_tier)]
        tier: Tier,

        /// Output directory
        #[arg(long, default_value = "./examforge-results")]
        output: PathBuf,

        /// Also write a Markdown summary
        #[arg(long)]
        markdown: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example question set
    Init,
}

fn parse_tier(s: &str) -> Result<Tier, String> {
    s.parse::<Tier>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("examforge=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate {
            questions,
            tier,
            config,
        } => commands::validate::execute(questions, tier, config),
        Commands::Rewrite {
            tier,
            seed,
            trials,
            config,
            text,
        } => commands::rewrite::execute(text, tier, seed, trials, config),
        Commands::Types { tier, config } => commands::types::execute(tier, config),
        Commands::Render {
            questions,
            tier,
            index,
            seed,
            json,
            config,
        } => commands::render::execute(questions, tier, index, seed, json, config).await,
        Commands::Generate {
            tier,
            category,
            types,
            count,
            output,
            config,
        } => commands::generate::execute(tier, category, types, count, output, config).await,
        Commands::Grade {
            questions,
            answers,
            tier,
            output,
            markdown,
            config,
        } => commands::grade::execute(questions, answers, tier, output, markdown, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
