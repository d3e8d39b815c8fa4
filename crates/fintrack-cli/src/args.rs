//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fintrack")]
#[command(about = "FinTrack - budgets, categories and expenses from the terminal")]
#[command(version)]
pub struct Cli {
    /// Backend base URL (overrides FINTRACK_API_BASE_URL and the config file)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Also write logs to this file (RUST_LOG controls the level)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and load the dashboard
    Login {
        /// Username or email (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,

        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },

    /// Create a new account
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,
    },

    /// Set a new password for an account
    ResetPassword {
        /// Username or email (prompted when omitted)
        #[arg(short, long)]
        identifier: Option<String>,
    },

    /// Check the session against the server and show the account id
    Profile,

    /// Log out and clear all cached data
    Logout {
        /// Also delete the remembered password
        #[arg(long)]
        forget: bool,
    },

    /// Show the current session and cache state
    Status,

    /// Fetch fresh dashboard data
    Refresh,

    /// Show totals, spending by category, recent expenses and budgets
    Summary {
        /// Number of recent transactions to list
        #[arg(long, default_value_t = 5)]
        recent: usize,
    },

    /// Record an expense
    AddExpense {
        #[arg(short, long)]
        amount: f64,

        /// Date as YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Category name; created if it does not exist ("Other" for none)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Delete an expense by id
    DeleteExpense { id: u64 },

    /// Create a budget for a category over a date range
    AddBudget {
        /// Category name ("Other" for a global budget)
        #[arg(short, long)]
        category: String,

        #[arg(short, long)]
        limit: f64,

        /// Start date as YYYY-MM-DD
        #[arg(long)]
        start: String,

        /// End date as YYYY-MM-DD
        #[arg(long)]
        end: String,
    },

    /// Show or set the display theme
    Theme { name: Option<String> },
}
