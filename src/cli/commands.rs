//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

use crate::models::Strategy;

#[derive(Parser)]
#[command(name = "cohort-match")]
#[command(about = "Match questionnaire answers to current members, staff and alumni")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: configured level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file (default: config.toml, then config.example.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Match one questionnaire submission read from a JSON file
    Match {
        /// Path to the intake JSON ("-" reads stdin)
        input: PathBuf,
        /// Force a strategy instead of the experiment split
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
        /// Enable CORS for all origins
        #[arg(long)]
        cors: bool,
    },
    /// Embedding index commands
    #[command(subcommand)]
    Index(IndexCommands),
    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
pub enum IndexCommands {
    /// Embed the whole corpus and write the embedding cache
    Build {
        /// Rebuild even when the cache matches the corpus
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    /// Rule-based ranking over the whole corpus
    Deterministic,
    /// Semantic shortlist, rule-based ranking
    Semantic,
    /// Semantic shortlist, generative pick
    Generative,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Deterministic => Strategy::Deterministic,
            StrategyArg::Semantic => Strategy::SemanticDeterministic,
            StrategyArg::Generative => Strategy::SemanticGenerative,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_match_with_strategy() {
        let cli = Cli::try_parse_from([
            "cohort-match",
            "-v",
            "match",
            "intake.json",
            "--strategy",
            "semantic",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Match {
                input, strategy, ..
            } => {
                assert_eq!(input, PathBuf::from("intake.json"));
                assert_eq!(strategy.map(Strategy::from), Some(Strategy::SemanticDeterministic));
            }
            _ => panic!("expected match command"),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["cohort-match", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { host, port, cors } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 3000);
                assert!(!cors);
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn test_parse_index_build() {
        let cli = Cli::try_parse_from(["cohort-match", "index", "build", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Index(IndexCommands::Build { force: true })
        ));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        assert!(Cli::try_parse_from(["cohort-match", "match", "x.json", "--strategy", "magic"]).is_err());
    }
}
