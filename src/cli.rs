use clap::{Parser, Subcommand};

use crate::models::module::CutMode;

#[derive(Parser)]
#[command(
    name = "coupling-lens",
    version,
    about = "Find cohesive modules in Java projects from method-call coupling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Pretty-print JSON output (default: compact)
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract class facts (fields, methods, calls) from every Java file
    Facts {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: String,

        /// Only analyse files matching this glob
        #[arg(short, long)]
        glob: Option<String>,
    },

    /// List normalized coupling weights between every pair of classes
    Weights {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: String,

        /// Only analyse files matching this glob
        #[arg(short, long)]
        glob: Option<String>,

        /// Edge threshold in percent of the heaviest pair (default: 0)
        #[arg(long, default_value = "0")]
        min_percent: f64,
    },

    /// Report the coupling between two classes (names are case-insensitive)
    Coupling {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: String,

        /// Only analyse files matching this glob
        #[arg(short, long)]
        glob: Option<String>,

        /// First class
        #[arg(short, long)]
        a: String,

        /// Second class
        #[arg(short, long)]
        b: String,
    },

    /// Run average-link clustering and print the merge sequence
    Cluster {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: String,

        /// Only analyse files matching this glob
        #[arg(short, long)]
        glob: Option<String>,

        /// Show the partition after this many merges (default: all)
        #[arg(long)]
        steps: Option<usize>,
    },

    /// Print the dendrogram rebuilt from the merge sequence
    Dendrogram {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: String,

        /// Only analyse files matching this glob
        #[arg(short, long)]
        glob: Option<String>,
    },

    /// Identify modules by cutting the dendrogram
    Modules {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: String,

        /// Only analyse files matching this glob
        #[arg(short, long)]
        glob: Option<String>,

        /// Cut point (default: config `cp`, 0.05)
        #[arg(long, allow_negative_numbers = true)]
        cp: Option<f64>,

        /// Cut direction (default: config `mode`, similarity)
        #[arg(long, value_enum)]
        mode: Option<CutMode>,
    },

    /// Analyse once, then answer NDJSON requests on stdin
    Session {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: String,

        /// Only analyse files matching this glob
        #[arg(short, long)]
        glob: Option<String>,
    },

    /// Generate a default configuration file
    Init {
        /// Output path (default: ~/.config/coupling-lens/config.toml)
        #[arg(short, long)]
        path: Option<std::path::PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modules_with_overrides() {
        let cli = Cli::try_parse_from([
            "coupling-lens",
            "modules",
            "--dir",
            "proj",
            "--cp",
            "0.2",
            "--mode",
            "distance",
            "--pretty",
        ])
        .unwrap();
        assert!(cli.pretty);
        match cli.command {
            Commands::Modules { dir, cp, mode, glob } => {
                assert_eq!(dir, "proj");
                assert_eq!(cp, Some(0.2));
                assert_eq!(mode, Some(CutMode::Distance));
                assert!(glob.is_none());
            }
            _ => panic!("expected modules"),
        }
    }

    #[test]
    fn coupling_requires_both_classes() {
        assert!(Cli::try_parse_from(["coupling-lens", "coupling", "--a", "Order"]).is_err());
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(
            Cli::try_parse_from(["coupling-lens", "modules", "--mode", "sideways"]).is_err()
        );
    }
}
