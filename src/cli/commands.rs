use crate::models::ModelKey;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `stylegen` - style-matched, length-constrained article generation.
#[derive(Parser, Debug)]
#[command(name = "stylegen")]
#[command(version)]
#[command(about = "Write new articles in an author's own style.", long_about = None)]
pub struct Cli {
    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (default: gateway.host from config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on, 0 for a random free port (default: gateway.port from config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate one article and print the JSON result
    Generate {
        /// Caller id
        #[arg(long)]
        user: String,

        /// Target body length in characters
        #[arg(long)]
        target: i64,

        /// Content outline
        #[arg(long)]
        outline: String,

        /// Key points to cover
        #[arg(long)]
        key_points: String,

        /// Model key (deepseek, grok, gpt_5_2, gemini, opus_4_6)
        #[arg(long, default_value = "deepseek")]
        model: ModelKey,

        /// Author persona
        #[arg(long)]
        persona: Option<String>,

        /// Constraint conditions
        #[arg(long)]
        constraints: Option<String>,

        /// Concrete cases to include
        #[arg(long)]
        cases: Option<String>,

        /// Reference URLs, separated by commas or newlines
        #[arg(long)]
        references: Option<String>,

        /// Structure the body with subheadings
        #[arg(long)]
        subheadings: bool,
    },

    /// List selectable models
    Models,

    /// Show or delete generation history
    History {
        #[arg(long)]
        user: String,

        /// Number of records (1-50)
        #[arg(long, default_value = "10")]
        limit: u32,

        /// Delete the record with this id instead of listing
        #[arg(long)]
        delete: Option<String>,
    },

    /// Manage the style profile and its source articles
    Style {
        #[command(subcommand)]
        style_command: StyleCommands,
    },

    /// List uploaded articles
    Articles {
        #[arg(long)]
        user: String,
    },

    /// Verify an invite code to unlock gated models
    Verify {
        #[arg(long)]
        user: String,

        #[arg(long)]
        code: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum StyleCommands {
    /// Rebuild the style profile from uploaded articles
    Rebuild {
        #[arg(long)]
        user: String,
    },

    /// Add a plain-text article to the library
    AddArticle {
        #[arg(long)]
        user: String,

        /// Path to a UTF-8 .txt file
        #[arg(long)]
        file: PathBuf,
    },
}
