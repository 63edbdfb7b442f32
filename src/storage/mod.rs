//! Knowledge-base storage.
//!
//! `SQLite` holds the documents and fragments used for similarity search
//! and the structured hospital directory (departments, doctors,
//! reservations). [`SqliteContextStore`] exposes it to the async pipeline.

pub mod context_store;
pub mod directory;
pub mod query;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use context_store::SqliteContextStore;
pub use directory::{
    NewDepartment, NewDoctor, NewReservation, load_department_list, parse_department_list,
};
pub use query::{Filter, MAX_LOOKUP_LIMIT, RecordQuery, allowed_fields};
pub use schema::CURRENT_SCHEMA_VERSION;
pub use sqlite::SqliteStorage;
pub use traits::{ContextStore, Storage, StorageStats};

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "medchat.db";

/// Default database path relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".medchat/medchat.db";
