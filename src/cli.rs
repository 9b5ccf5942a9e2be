use clap::{Parser, Subcommand};

/// SmartRoute — authentication gateway for the travel planner API
#[derive(Parser)]
#[command(name = "smartroute", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (overrides SMARTROUTE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep accounts and tokens in memory instead of Postgres
        #[arg(long)]
        memory: bool,
    },

    /// Print a fresh random signing secret for SMARTROUTE_JWT_SECRET
    GenSecret,

    /// Manage issued tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Revoke a single access token
    Revoke {
        #[arg(long)]
        token: String,
    },
    /// Revoke every live token of an account
    RevokeUser {
        #[arg(long)]
        email: String,
    },
}
