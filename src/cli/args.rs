//! Command line argument parsing for the QueryLens CLI using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// QueryLens - interactive refinement of boolean literature-search queries
#[derive(Parser, Debug, Clone)]
#[command(name = "querylens")]
#[command(about = "Interactive refinement of boolean literature-search queries")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct LensArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (TOML)
    #[arg(short, long, env = "QUERYLENS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl LensArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }

    /// Log filter used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity() {
            0 => "error",
            1 => "warn",
            2 => "info",
            _ => "debug",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP and WebSocket server
    Serve(ServeArgs),

    /// Refine one query and print the response stream
    Refine(RefineArgs),

    /// Print the effective configuration
    #[command(name = "print-config")]
    PrintConfig(ResourceArgs),
}

/// Resource paths overriding the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct ResourceArgs {
    /// Ranking model (JSON tree ensemble)
    #[arg(long, env = "QUERYLENS_MODEL")]
    pub model: Option<PathBuf>,

    /// Document collection (JSON lines)
    #[arg(long, env = "QUERYLENS_COLLECTION")]
    pub collection: Option<PathBuf>,

    /// MeSH ontology (heading<TAB>tree number)
    #[arg(long)]
    pub ontology: Option<PathBuf>,

    /// Concept embeddings
    #[arg(long)]
    pub embeddings: Option<PathBuf>,

    /// Term to concept mapping
    #[arg(long)]
    pub concept_mapping: Option<PathBuf>,

    /// Evaluation mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Directory of the shared durable result cache; enables the shared scope
    #[arg(long, env = "QUERYLENS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Arguments for the server
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address to bind
    #[arg(short, long, env = "QUERYLENS_BIND")]
    pub bind: Option<String>,

    /// Route the plugin is mounted on
    #[arg(long)]
    pub route: Option<String>,

    #[command(flatten)]
    pub resources: ResourceArgs,
}

/// Arguments for a one-shot refinement
#[derive(Args, Debug, Clone)]
pub struct RefineArgs {
    /// Query text
    #[arg(long)]
    pub query: String,

    /// Query dialect (medline, pubmed)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Relevant document ids, comma separated
    #[arg(short, long, value_delimiter = ',')]
    pub relevant: Vec<String>,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "json")]
    pub output_format: OutputFormat,

    #[command(flatten)]
    pub resources: ResourceArgs,
}

/// Evaluation mode flag values.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Collection,
    JudgedPool,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON response per line
    Json,
    /// Human-readable progress and a result table
    Human,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refine_args() {
        let args = LensArgs::try_parse_from([
            "querylens",
            "refine",
            "--query",
            "diabetes AND insulin",
            "--relevant",
            "doc1,doc2",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.verbosity(), 2);
        assert_eq!(args.log_filter(), "info");
        let Command::Refine(refine) = args.command else {
            panic!("expected refine");
        };
        assert_eq!(refine.relevant, vec!["doc1", "doc2"]);
        assert_eq!(refine.language, None);
        assert_eq!(refine.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_serve_args() {
        let args = LensArgs::try_parse_from([
            "querylens",
            "serve",
            "--bind",
            "0.0.0.0:8080",
            "--mode",
            "collection",
            "-q",
        ])
        .unwrap();
        assert_eq!(args.verbosity(), 0);
        let Command::Serve(serve) = args.command else {
            panic!("expected serve");
        };
        assert_eq!(serve.bind.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(serve.resources.mode, Some(ModeArg::Collection));
    }

    #[test]
    fn test_print_config() {
        let args = LensArgs::try_parse_from(["querylens", "print-config"]).unwrap();
        assert!(matches!(args.command, Command::PrintConfig(_)));
    }
}
