//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use crate::llm::BackendConfig;
use crate::search::SearchMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// medchat-rs: retrieval-augmented hospital chatbot.
///
/// Maintains the hospital knowledge base and answers questions through the
/// response pipeline.
#[derive(Parser, Debug)]
#[command(name = "medchat-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the knowledge-base database file.
    ///
    /// Defaults to `.medchat/medchat.db` in the current directory.
    #[arg(short, long, env = "MEDCHAT_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Path to the JSON configuration file.
    ///
    /// Defaults to `~/.config/medchat-rs/config.json` when it exists.
    #[arg(short, long, env = "MEDCHAT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Primary backend override.
    #[arg(long, value_enum, env = "MEDCHAT_BACKEND", global = true)]
    pub backend: Option<BackendKind>,

    /// Model name for the OpenAI-compatible backend.
    #[arg(long, env = "MEDCHAT_MODEL", global = true)]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint (e.g. a local server).
    #[arg(long, env = "MEDCHAT_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Backend choices on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// OpenAI-compatible chat completions.
    Openai,
    /// Offline answer built from the retrieved context.
    Extractive,
}

/// Fragment search mode on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Embedding similarity only.
    Vector,
    /// Embedding similarity fused with BM25.
    Hybrid,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Vector => Self::Vector,
            ModeArg::Hybrid => Self::Hybrid,
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the knowledge base.
    ///
    /// Creates the database file and schema if they don't exist.
    Init {
        /// Force re-initialization (destroys existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Show knowledge-base status.
    Status,

    /// Ingest documents into the fragment index.
    Ingest {
        /// Files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Display name (single file only).
        #[arg(short, long)]
        name: Option<String>,

        /// Fragment size in bytes.
        #[arg(long, default_value = "2000")]
        chunk_size: usize,

        /// Overlap between fragments in bytes.
        #[arg(long, default_value = "200")]
        overlap: usize,
    },

    /// List ingested documents.
    #[command(name = "documents", alias = "ls")]
    ListDocuments,

    /// Delete an ingested document with its fragments.
    #[command(name = "remove", alias = "rm")]
    RemoveDocument {
        /// Document ID.
        id: i64,
    },

    /// List departments and active doctors as the assistant sees them.
    ///
    /// While the departments table is empty, departments come from the
    /// configured department list.
    #[command(name = "directory", alias = "departments")]
    Directory,

    /// Import departments from a JSON array or the hospital guide text.
    ImportDepartments {
        /// JSON file (array of departments) or guide text file.
        file: PathBuf,
    },

    /// Add or update a department.
    AddDepartment {
        /// Department name, e.g. "내과".
        name: String,

        /// Short code.
        #[arg(long)]
        code: Option<String>,

        /// Description.
        #[arg(long)]
        description: Option<String>,

        /// Phone number.
        #[arg(long)]
        phone: Option<String>,

        /// Building and floor.
        #[arg(long)]
        location: Option<String>,

        /// Symptom keywords, comma separated.
        #[arg(short, long, value_delimiter = ',')]
        keywords: Vec<String>,
    },

    /// Add a doctor to a department.
    AddDoctor {
        /// Doctor name.
        name: String,

        /// Department name.
        #[arg(long)]
        department: String,

        /// Position, e.g. "교수".
        #[arg(long)]
        title: Option<String>,

        /// Clinical specialty.
        #[arg(long)]
        specialty: Option<String>,

        /// Clinic schedule.
        #[arg(long)]
        schedule: Option<String>,
    },

    /// Record a reservation for a conversation.
    AddReservation {
        /// Conversation identifier.
        #[arg(long)]
        conversation: String,

        /// Department name.
        #[arg(long)]
        department: String,

        /// Appointment time, e.g. "2026-10-20 10:30".
        #[arg(long)]
        at: String,

        /// Doctor name.
        #[arg(long)]
        doctor: Option<String>,

        /// Patient name.
        #[arg(long)]
        patient: Option<String>,
    },

    /// Search fragments directly, outside the pipeline.
    Search {
        /// Search query.
        query: String,

        /// Maximum number of results.
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,

        /// Minimum similarity.
        #[arg(short, long, default_value = "0.2")]
        threshold: f32,

        /// Search mode.
        #[arg(short, long, value_enum, default_value = "vector")]
        mode: ModeArg,
    },

    /// Answer one message through the pipeline.
    Ask {
        /// Message text.
        message: String,

        /// Conversation identifier.
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Interactive chat on stdin.
    Chat {
        /// Conversation identifier.
        #[arg(long)]
        conversation: Option<String>,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }

    /// Primary backend from the command-line overrides, if any were given.
    ///
    /// `--model` or `--base-url` alone imply the OpenAI-compatible backend.
    #[must_use]
    pub fn backend_override(&self) -> Option<BackendConfig> {
        let kind = self.backend.or_else(|| {
            (self.model.is_some() || self.base_url.is_some()).then_some(BackendKind::Openai)
        })?;
        Some(match kind {
            BackendKind::Extractive => BackendConfig::Extractive,
            BackendKind::Openai => match BackendConfig::openai() {
                BackendConfig::OpenAi {
                    model,
                    base_url,
                    api_key_env,
                } => BackendConfig::OpenAi {
                    model: self.model.clone().unwrap_or(model),
                    base_url: self.base_url.clone().or(base_url),
                    api_key_env,
                },
                other => other,
            },
        })
    }
}
