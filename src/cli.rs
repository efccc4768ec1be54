// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use udash::search::FieldFilter;

/// udash - user directory dashboard
///
/// Browse, search and page through a remote user directory. Search terms and
/// the current page are remembered between runs.
#[derive(Parser, Debug)]
#[command(name = "udash")]
#[command(
    author,
    version,
    about,
    long_about = None,
    after_help = "Quickstart:\n  udash list\n  udash list --search kurtis --filter name\n  udash search \"romaguera\" --format json\n  udash show 3"
)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Users endpoint (overrides config)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Serve users from a saved JSON array instead of the endpoint
    #[arg(long, global = true, value_name = "FILE", conflicts_with = "api_url")]
    pub fixture: Option<PathBuf>,

    /// Keep session state in memory only
    #[arg(long, global = true)]
    pub no_persist: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Field restriction applied after search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliFilter {
    #[default]
    All,
    Name,
    Email,
    Company,
}

impl From<CliFilter> for FieldFilter {
    fn from(filter: CliFilter) -> Self {
        match filter {
            CliFilter::All => FieldFilter::All,
            CliFilter::Name => FieldFilter::Name,
            CliFilter::Email => FieldFilter::Email,
            CliFilter::Company => FieldFilter::Company,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show one page of the user directory
    #[command(visible_alias = "ls")]
    List {
        /// Page to show (defaults to the remembered page)
        #[arg(short, long)]
        page: Option<usize>,

        /// Search term (defaults to the remembered term)
        #[arg(short, long)]
        search: Option<String>,

        /// Restrict matches to one field
        #[arg(short = 'F', long, value_enum)]
        filter: Option<CliFilter>,

        /// Users per page (overrides config)
        #[arg(short = 'n', long)]
        per_page: Option<usize>,
    },

    /// Show full details of one user
    Show {
        /// User id
        id: u64,
    },

    /// Search users and print timing stats
    #[command(visible_alias = "s")]
    Search {
        /// Search query
        query: String,

        /// Restrict matches to one field
        #[arg(short = 'F', long, value_enum, default_value_t = CliFilter::All)]
        filter: CliFilter,

        /// Plain substring matching on name, email, username and company
        #[arg(long)]
        simple: bool,

        /// Maximum number of results to print
        #[arg(short = 'm', long)]
        limit: Option<usize>,
    },

    /// Read search terms from stdin and re-render as they settle
    #[command(visible_alias = "i")]
    Interactive,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
