//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::chunking::SentenceChunker;
use crate::cli::output::{
    DirectorySource, OutputFormat, format_directory, format_document_list, format_ingest,
    format_reply, format_search_results, format_status,
};
use crate::cli::parser::{Cli, Commands};
use crate::config::PipelineConfig;
use crate::core::Entity;
use crate::embedding::{Embedder, create_embedder};
use crate::error::{CommandError, Result, StorageError};
use crate::ingest::ingest_file;
use crate::io::read_file;
use crate::pipeline::{ClearScheduler, Pipeline, ResponseCache};
use crate::search::{SearchMode, search_fragments};
use crate::storage::{
    ContextStore, MAX_LOOKUP_LIMIT, NewDepartment, NewDoctor, NewReservation, RecordQuery,
    SqliteContextStore, SqliteStorage, Storage, load_department_list, parse_department_list,
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use uuid::Uuid;

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Init { force } => cmd_init(&db_path, *force),
        Commands::Status => cmd_status(&db_path, format),
        Commands::Ingest {
            files,
            name,
            chunk_size,
            overlap,
        } => cmd_ingest(&db_path, files, name.as_deref(), *chunk_size, *overlap, format),
        Commands::ListDocuments => cmd_list_documents(&db_path, format),
        Commands::RemoveDocument { id } => cmd_remove_document(&db_path, *id, format),
        Commands::Directory => cmd_directory(cli, &db_path, format).await,
        Commands::ImportDepartments { file } => cmd_import_departments(&db_path, file, format),
        Commands::AddDepartment {
            name,
            code,
            description,
            phone,
            location,
            keywords,
        } => {
            let department = NewDepartment {
                name: name.clone(),
                code: code.clone(),
                description: description.clone(),
                phone: phone.clone(),
                location: location.clone(),
                keywords: keywords.clone(),
            };
            cmd_add_department(&db_path, &department, format)
        }
        Commands::AddDoctor {
            name,
            department,
            title,
            specialty,
            schedule,
        } => {
            let doctor = NewDoctor {
                name: name.clone(),
                department: department.clone(),
                title: title.clone(),
                specialty: specialty.clone(),
                schedule: schedule.clone(),
            };
            cmd_add_doctor(&db_path, &doctor, format)
        }
        Commands::AddReservation {
            conversation,
            department,
            at,
            doctor,
            patient,
        } => {
            let reservation = NewReservation {
                conversation_id: conversation.clone(),
                department: department.clone(),
                doctor: doctor.clone(),
                patient_name: patient.clone(),
                reserved_at: at.clone(),
                status: None,
            };
            cmd_add_reservation(&db_path, &reservation, format)
        }
        Commands::Search {
            query,
            top_k,
            threshold,
            mode,
        } => cmd_search(&db_path, query, *top_k, *threshold, (*mode).into(), format),
        Commands::Ask {
            message,
            conversation,
        } => cmd_ask(cli, &db_path, message, conversation.as_deref(), format).await,
        Commands::Chat { conversation } => {
            cmd_chat(cli, &db_path, conversation.as_deref(), format).await
        }
    }
}

/// Opens storage and ensures it's initialized.
fn open_storage(db_path: &Path) -> Result<SqliteStorage> {
    let storage = SqliteStorage::open(db_path)?;

    if !storage.is_initialized()? {
        return Err(StorageError::NotInitialized.into());
    }

    Ok(storage)
}

/// Loads the configuration and applies command-line overrides.
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(primary) = cli.backend_override() {
        config = config.with_primary(primary);
    }
    config.validate()?;
    Ok(config)
}

/// Builds the pipeline over the knowledge base at `db_path`.
fn build_pipeline(db_path: &Path, config: &PipelineConfig) -> Result<Pipeline> {
    let store = context_store(open_storage(db_path)?, config);
    let embedder: Arc<dyn Embedder> = Arc::from(create_embedder()?);

    Pipeline::from_config(
        config,
        Arc::new(store),
        embedder,
        ResponseCache::from_config(&config.cache),
    )
}

/// Context store with the configured department list as its fallback.
fn context_store(storage: SqliteStorage, config: &PipelineConfig) -> SqliteContextStore {
    let department_list = match &config.retrieval.department_list {
        Some(path) => load_department_list(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "department list unreadable");
            Vec::new()
        }),
        None => Vec::new(),
    };
    SqliteContextStore::new(storage).with_department_list(department_list)
}

fn to_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// ==================== Command Implementations ====================

fn cmd_init(db_path: &Path, force: bool) -> Result<String> {
    if db_path.exists() && !force {
        return Err(CommandError::ExecutionFailed(
            "Database already exists. Use --force to reinitialize.".to_string(),
        )
        .into());
    }

    if force && db_path.exists() {
        std::fs::remove_file(db_path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to remove existing database: {e}"))
        })?;
    }

    let mut storage = SqliteStorage::open(db_path)?;
    storage.init()?;
    info!(path = %db_path.display(), "knowledge base initialized");

    Ok(format!(
        "Initialized knowledge base at: {}\n",
        db_path.display()
    ))
}

fn cmd_status(db_path: &Path, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    let stats = storage.stats()?;
    Ok(format_status(&stats, format))
}

fn cmd_ingest(
    db_path: &Path,
    files: &[std::path::PathBuf],
    name: Option<&str>,
    chunk_size: usize,
    overlap: usize,
    format: OutputFormat,
) -> Result<String> {
    if name.is_some() && files.len() > 1 {
        return Err(CommandError::InvalidArgument(
            "--name can only be used with a single file".to_string(),
        )
        .into());
    }

    let mut storage = open_storage(db_path)?;
    let chunker = SentenceChunker::new(chunk_size, overlap)?;
    let embedder = create_embedder()?;

    let reports = files
        .iter()
        .map(|file| ingest_file(&mut storage, &chunker, embedder.as_ref(), file, name))
        .collect::<Result<Vec<_>>>()?;
    Ok(format_ingest(&reports, format))
}

fn cmd_list_documents(db_path: &Path, format: OutputFormat) -> Result<String> {
    let storage = open_storage(db_path)?;
    let documents = storage.list_documents()?;
    Ok(format_document_list(&documents, format))
}

fn cmd_remove_document(db_path: &Path, id: i64, format: OutputFormat) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    storage.delete_document(id)?;
    match format {
        OutputFormat::Text => Ok(format!("Removed document {id}\n")),
        OutputFormat::Json => Ok(to_json(&serde_json::json!({ "removed": id }))),
    }
}

async fn cmd_directory(cli: &Cli, db_path: &Path, format: OutputFormat) -> Result<String> {
    let config = load_config(cli)?;
    let storage = open_storage(db_path)?;
    let table_empty = storage.department_count()? == 0;
    let store = context_store(storage, &config);

    let departments = store
        .lookup(RecordQuery::new(Entity::Departments).limit(MAX_LOOKUP_LIMIT))
        .await?;
    let doctors = store
        .lookup(RecordQuery::new(Entity::Doctors).limit(MAX_LOOKUP_LIMIT))
        .await?;
    let source = if table_empty && !departments.is_empty() {
        DirectorySource::Fallback
    } else {
        DirectorySource::Db
    };
    Ok(format_directory(&departments, &doctors, source, format))
}

fn cmd_import_departments(db_path: &Path, file: &Path, format: OutputFormat) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    let text = read_file(file)?;

    let departments: Vec<NewDepartment> =
        if file.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            serde_json::from_str(&text).map_err(StorageError::from)?
        } else {
            parse_department_list(&text)
                .into_iter()
                .map(NewDepartment::named)
                .collect()
        };

    if departments.is_empty() {
        return Err(CommandError::ExecutionFailed(format!(
            "no departments found in {}",
            file.display()
        ))
        .into());
    }

    for department in &departments {
        storage.upsert_department(department)?;
    }

    match format {
        OutputFormat::Text => Ok(format!(
            "Imported {} departments from {}\n",
            departments.len(),
            file.display()
        )),
        OutputFormat::Json => Ok(to_json(&serde_json::json!({
            "imported": departments.len(),
            "names": departments.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        }))),
    }
}

fn cmd_add_department(
    db_path: &Path,
    department: &NewDepartment,
    format: OutputFormat,
) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    let id = storage.upsert_department(department)?;
    match format {
        OutputFormat::Text => Ok(format!("Saved department {} (ID: {id})\n", department.name)),
        OutputFormat::Json => Ok(to_json(&serde_json::json!({
            "id": id,
            "name": department.name,
            "keywords": department.keywords,
        }))),
    }
}

fn cmd_add_doctor(db_path: &Path, doctor: &NewDoctor, format: OutputFormat) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    let id = storage.add_doctor(doctor)?;
    match format {
        OutputFormat::Text => Ok(format!(
            "Added doctor {} to {} (ID: {id})\n",
            doctor.name, doctor.department
        )),
        OutputFormat::Json => Ok(to_json(&serde_json::json!({
            "id": id,
            "name": doctor.name,
            "department": doctor.department,
        }))),
    }
}

fn cmd_add_reservation(
    db_path: &Path,
    reservation: &NewReservation,
    format: OutputFormat,
) -> Result<String> {
    let mut storage = open_storage(db_path)?;
    let id = storage.add_reservation(reservation)?;
    match format {
        OutputFormat::Text => Ok(format!(
            "Reserved {} at {} for conversation {} (ID: {id})\n",
            reservation.department, reservation.reserved_at, reservation.conversation_id
        )),
        OutputFormat::Json => Ok(to_json(&serde_json::json!({
            "id": id,
            "conversation_id": reservation.conversation_id,
            "department": reservation.department,
            "reserved_at": reservation.reserved_at,
        }))),
    }
}

fn cmd_search(
    db_path: &Path,
    query: &str,
    top_k: usize,
    threshold: f32,
    mode: SearchMode,
    format: OutputFormat,
) -> Result<String> {
    let storage = open_storage(db_path)?;
    let embedder = create_embedder()?;
    let hits = search_fragments(&storage, embedder.as_ref(), query, top_k, threshold, mode)?;
    Ok(format_search_results(query, &hits, format))
}

async fn cmd_ask(
    cli: &Cli,
    db_path: &Path,
    message: &str,
    conversation: Option<&str>,
    format: OutputFormat,
) -> Result<String> {
    let config = load_config(cli)?;
    let pipeline = build_pipeline(db_path, &config)?;
    let reply = pipeline.handle_message(message, conversation).await;
    Ok(format_reply(&reply, format))
}

async fn cmd_chat(
    cli: &Cli,
    db_path: &Path,
    conversation: Option<&str>,
    format: OutputFormat,
) -> Result<String> {
    let config = load_config(cli)?;
    let pipeline = build_pipeline(db_path, &config)?;
    let scheduler = ClearScheduler::start(pipeline.cache().clone(), config.cache.daily_clear);
    let conversation = conversation.map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
    info!(conversation = %conversation, "chat started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut turns = 0usize;

    loop {
        if format == OutputFormat::Text {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if matches!(line, "exit" | "quit" | "/q") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let reply = pipeline
            .handle_message(line, Some(conversation.as_str()))
            .await;
        let rendered = match format {
            OutputFormat::Text => format_reply(&reply, format),
            OutputFormat::Json => serde_json::to_string(&reply).unwrap_or_default() + "\n",
        };
        stdout.write_all(rendered.as_bytes()).await?;
        stdout.flush().await?;
        turns += 1;
    }

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }

    match format {
        OutputFormat::Text => Ok(format!("\nChat ended after {turns} messages.\n")),
        OutputFormat::Json => Ok(String::new()),
    }
}
