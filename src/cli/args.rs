//! CLI argument definitions using clap
//!
//! Commands:
//! - brewauth migrate
//! - brewauth run
//! - brewauth sweep
//! - brewauth users
//! - brewauth promote --email <address>

use clap::{Parser, Subcommand};

/// brewauth - signup, verification and token sessions for the coffee shop API
#[derive(Parser, Debug)]
#[command(name = "brewauth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Run the mail worker and the unverified-user sweeper until Ctrl-C
    Run,

    /// Delete stale unverified users once and exit
    Sweep,

    /// Print all users as JSON
    Users,

    /// Grant the admin role to a user
    Promote {
        /// Address of the user to promote
        #[arg(long)]
        email: String,
    },
}
