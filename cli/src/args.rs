//! Command-line argument definitions

use clap::{Parser, Subcommand};
use conclave_domain::Stage;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "conclave", version, about = "Staged multi-agent consensus pipeline")]
pub struct Cli {
    /// Explicit config file, merged over project and global config
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ignore all config files and use built-in defaults
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress per-step progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a fresh run for a specification
    Run {
        /// Specification identifier
        spec_id: String,
    },

    /// Start a new run at a chosen stage, reusing the spec's history
    Resume {
        spec_id: String,
        /// Stage to start from (plan, tasks, implement, validate, audit, unlock)
        #[arg(long)]
        from: Stage,
    },

    /// Continue an interrupted run from its last persisted phase
    Continue {
        /// Run identifier, as printed when the run was created
        run_id: String,
    },

    /// Show the latest run's progress for a specification
    Status {
        spec_id: String,
        /// Emit the view as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the evidence tree for a specification's latest run
    Export {
        spec_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_parses() {
        let cli = Cli::parse_from(["conclave", "run", "SPEC-42"]);
        assert!(matches!(cli.command, Command::Run { ref spec_id } if spec_id == "SPEC-42"));
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_resume_requires_stage() {
        let cli = Cli::parse_from(["conclave", "resume", "SPEC-42", "--from", "implement"]);
        match cli.command {
            Command::Resume { from, .. } => assert_eq!(from, Stage::Implement),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_verbosity_accumulates() {
        let cli = Cli::parse_from(["conclave", "-vv", "status", "SPEC-42"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_bad_stage_is_rejected() {
        let result = Cli::try_parse_from(["conclave", "resume", "SPEC-42", "--from", "nonsense"]);
        assert!(result.is_err());
    }
}
