use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "forge.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "workshop-forge")]
#[command(about = "Provision workshop repositories and their status badges on GitHub")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the flattened workshop map as JSON
    Flatten,

    /// Render every planned file under <out>/<repo>/
    Plan {
        #[arg(long)]
        out: PathBuf,
    },

    /// Create repositories and commit their scaffold files
    Apply {
        /// Show the plan without calling the API
        #[arg(long)]
        dry_run: bool,
    },

    /// Build the gist work list from the catalog
    PrepareGists {
        #[arg(long)]
        output: PathBuf,

        /// Previous export; matching filenames keep their gist id
        #[arg(long)]
        existing: Option<PathBuf>,
    },

    /// Create, update and delete gists from a work list
    SyncGists {
        #[arg(long)]
        input: PathBuf,

        /// Where to write the updated list (defaults to --input)
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long)]
        token: Option<String>,

        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        report_csv: Option<PathBuf>,

        /// Also write the filename -> {id, raw_url} table
        #[arg(long)]
        gist_ids: Option<PathBuf>,

        /// Gist owner used to build raw URLs
        #[arg(long)]
        username: Option<String>,
    },

    /// Download gists of the authenticated user
    ExportGists {
        #[arg(long)]
        output: PathBuf,

        #[arg(long)]
        ids_output: Option<PathBuf>,

        /// Export public gists as well as secret ones
        #[arg(long)]
        include_public: bool,

        /// Also bundle the export into a zip archive
        #[arg(long)]
        archive: Option<PathBuf>,

        #[arg(long)]
        token: Option<String>,
    },
}

impl Command {
    /// Gist commands can run without a configuration file.
    pub fn needs_catalog(&self) -> bool {
        matches!(
            self,
            Command::Flatten | Command::Plan { .. } | Command::Apply { .. } | Command::PrepareGists { .. }
        )
    }
}

fn check_path(field: &str, path: &std::path::Path) -> Result<()> {
    validation::validate_path(field, &path.to_string_lossy())
}

impl Validate for Cli {
    fn validate(&self) -> Result<()> {
        check_path("config", &self.config)?;

        match &self.command {
            Command::Flatten | Command::Apply { .. } => {}
            Command::Plan { out } => check_path("out", out)?,
            Command::PrepareGists { output, existing } => {
                check_path("output", output)?;
                if let Some(existing) = existing {
                    check_path("existing", existing)?;
                }
            }
            Command::SyncGists {
                input,
                output,
                report_csv,
                gist_ids,
                username,
                ..
            } => {
                check_path("input", input)?;
                for (field, path) in [("output", output), ("report_csv", report_csv), ("gist_ids", gist_ids)] {
                    if let Some(path) = path {
                        check_path(field, path)?;
                    }
                }
                if let Some(username) = username {
                    validation::validate_owner("username", username)?;
                }
            }
            Command::ExportGists {
                output,
                ids_output,
                archive,
                ..
            } => {
                check_path("output", output)?;
                for (field, path) in [("ids_output", ids_output), ("archive", archive)] {
                    if let Some(path) = path {
                        check_path(field, path)?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_gists() {
        let cli = Cli::try_parse_from([
            "workshop-forge",
            "sync-gists",
            "--input",
            "gists.json",
            "--dry-run",
            "--username",
            "octo",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("forge.toml"));
        assert_eq!(cli.log_format, LogFormat::Compact);
        match cli.command {
            Command::SyncGists {
                input,
                dry_run,
                username,
                output,
                ..
            } => {
                assert_eq!(input, PathBuf::from("gists.json"));
                assert!(dry_run);
                assert_eq!(username.as_deref(), Some("octo"));
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(!Cli::try_parse_from(["workshop-forge", "sync-gists", "--input", "x.json"])
            .unwrap()
            .command
            .needs_catalog());
    }

    #[test]
    fn test_parse_global_flags_and_plan() {
        let cli = Cli::try_parse_from([
            "workshop-forge",
            "--config",
            "conf/forge.toml",
            "--log-format",
            "json",
            "plan",
            "--out",
            "out",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.command.needs_catalog());
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["workshop-forge"]).is_err());
        assert!(Cli::try_parse_from(["workshop-forge", "plan"]).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let cli = Cli {
            config: PathBuf::from("forge.toml"),
            verbose: false,
            log_format: LogFormat::Compact,
            command: Command::ExportGists {
                output: PathBuf::new(),
                ids_output: None,
                include_public: false,
                archive: None,
                token: None,
            },
        };
        assert!(cli.validate().is_err());
    }
}
