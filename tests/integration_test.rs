//! Integration tests for medchat-rs.
//!
//! Exercise the pipeline end to end over a real `SQLite` knowledge base.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use medchat_rs::chunking::SentenceChunker;
use medchat_rs::core::Document;
use medchat_rs::error::BackendError;
use medchat_rs::ingest::ingest_document;
use medchat_rs::llm::{CompletionOptions, Prompt};
use medchat_rs::storage::{NewDepartment, NewDoctor, NewReservation};
use medchat_rs::{
    DEFAULT_DIMENSIONS, Embedder, ExtractiveBackend, FallbackEmbedder, Intent, LanguageModel,
    Pipeline, PipelineConfig, PipelineState, ResponseCache, SqliteContextStore, SqliteStorage,
    Storage,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const GUIDE: &str = "진료 시간은 평일 오전 9시부터 오후 5시까지입니다. \
    토요일은 오전 9시부터 12시까지 진료합니다. \
    주차장은 본관 지하 2층과 3층에 있으며 30분당 1000원입니다. \
    면회는 오후 6시부터 8시까지 가능합니다.";

/// Backend that counts calls and either echoes the context or fails.
struct Counting {
    calls: AtomicUsize,
    fail: bool,
}

impl Counting {
    fn working() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    async fn complete(
        &self,
        prompt: &Prompt,
        options: &CompletionOptions,
    ) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BackendError::Request {
                backend: "counting".to_string(),
                reason: "service unavailable".to_string(),
            });
        }
        ExtractiveBackend::new().complete(prompt, options).await
    }
}

/// Creates an initialized knowledge base with a small hospital directory
/// and one ingested guide document.
fn create_knowledge_base() -> (SqliteStorage, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut storage =
        SqliteStorage::open(temp_dir.path().join("kb.db")).expect("Failed to create storage");
    storage.init().expect("Failed to init storage");

    storage
        .upsert_department(&NewDepartment {
            phone: Some("02-1234-1000".to_string()),
            location: Some("본관 2층".to_string()),
            keywords: vec!["기침".to_string(), "발열".to_string()],
            ..NewDepartment::named("내과")
        })
        .expect("upsert_department failed");
    storage
        .upsert_department(&NewDepartment {
            keywords: vec!["관절".to_string(), "허리".to_string()],
            ..NewDepartment::named("정형외과")
        })
        .expect("upsert_department failed");
    storage
        .add_doctor(&NewDoctor {
            name: "김민준".to_string(),
            department: "내과".to_string(),
            title: Some("교수".to_string()),
            specialty: Some("호흡기".to_string()),
            schedule: Some("월 수 오전".to_string()),
        })
        .expect("add_doctor failed");
    storage
        .add_reservation(&NewReservation {
            conversation_id: "conv-7".to_string(),
            department: "정형외과".to_string(),
            doctor: None,
            patient_name: Some("홍길동".to_string()),
            reserved_at: "2026-10-20 10:30".to_string(),
            status: None,
        })
        .expect("add_reservation failed");

    let chunker = SentenceChunker::new(80, 0).expect("chunker");
    let document = Document::from_content(GUIDE.to_string()).with_name("guide");
    ingest_document(&mut storage, &chunker, &embedder(), &document).expect("ingest failed");

    (storage, temp_dir)
}

fn embedder() -> FallbackEmbedder {
    FallbackEmbedder::new(DEFAULT_DIMENSIONS)
}

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default().with_daily_clear(false);
    config.retrieval.similarity_threshold = -1.0;
    config
}

fn pipeline(
    store: SqliteContextStore,
    primary: Arc<dyn LanguageModel>,
    secondary: Option<Arc<dyn LanguageModel>>,
) -> Pipeline {
    let config = config();
    let embedder: Arc<dyn Embedder> = Arc::new(embedder());
    Pipeline::new(
        &config,
        Arc::new(store),
        embedder,
        primary,
        secondary,
        ResponseCache::from_config(&config.cache),
    )
}

#[tokio::test]
async fn test_department_question_cached_on_repeat() {
    let (storage, _temp) = create_knowledge_base();
    let backend = Counting::working();
    let pipeline = pipeline(SqliteContextStore::new(storage), backend.clone(), None);

    let first = pipeline.handle_message("내과 위치가 어디인가요?", None).await;
    assert_eq!(first.intent, Intent::InfoQuery);
    assert!(!first.degraded);
    assert!(!first.cached);
    assert!(first.response.contains("내과"));
    assert!(first.response.contains("본관 2층"));
    assert!(first.states.contains(&PipelineState::Cached));

    // Extra whitespace normalizes to the same request.
    let second = pipeline.handle_message("  내과   위치가 어디인가요?", None).await;
    assert!(second.cached);
    assert_eq!(second.response, first.response);
    assert!(second.states.contains(&PipelineState::CacheHit));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_symptom_routes_to_department_by_keyword() {
    let (storage, _temp) = create_knowledge_base();
    let pipeline = pipeline(
        SqliteContextStore::new(storage),
        Arc::new(ExtractiveBackend::new()),
        None,
    );

    let reply = pipeline.handle_message("기침이 나고 열이 나요", None).await;
    assert_eq!(reply.intent, Intent::SymptomQuery);
    assert!(!reply.degraded);
    assert!(reply.response.contains("내과"));
}

#[tokio::test]
async fn test_reservation_scoped_to_conversation() {
    let (storage, _temp) = create_knowledge_base();
    let pipeline = pipeline(
        SqliteContextStore::new(storage),
        Arc::new(ExtractiveBackend::new()),
        None,
    );

    let mine = pipeline
        .handle_message("제 예약 확인해 주세요", Some("conv-7"))
        .await;
    assert_eq!(mine.intent, Intent::ReservationQuery);
    assert!(mine.response.contains("2026-10-20 10:30"));

    let other = pipeline
        .handle_message("제 예약 확인해 주세요", Some("conv-8"))
        .await;
    assert!(!other.response.contains("2026-10-20 10:30"));
}

#[tokio::test]
async fn test_ingested_guide_answers_general_questions() {
    let (storage, _temp) = create_knowledge_base();
    let pipeline = pipeline(
        SqliteContextStore::new(storage),
        Arc::new(ExtractiveBackend::new()),
        None,
    );

    let reply = pipeline.handle_message("주차장 요금이 얼마인가요", None).await;
    assert!(!reply.degraded);
    assert!(reply.response.contains("주차장"));
}

#[tokio::test]
async fn test_department_list_used_while_table_empty() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut storage = SqliteStorage::open(temp_dir.path().join("kb.db")).expect("open");
    storage.init().expect("init");
    let store = SqliteContextStore::new(storage)
        .with_department_list(vec!["가정의학과".to_string(), "피부과".to_string()]);
    let pipeline = pipeline(store, Arc::new(ExtractiveBackend::new()), None);

    let reply = pipeline.handle_message("진료과를 알려주세요", None).await;
    assert_eq!(reply.intent, Intent::InfoQuery);
    assert!(reply.response.contains("가정의학과"));
    assert!(reply.response.contains("피부과"));
}

#[tokio::test]
async fn test_unavailable_store_degrades_and_skips_cache() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    // Never initialized: every query fails.
    let storage = SqliteStorage::open(temp_dir.path().join("kb.db")).expect("open");
    let backend = Counting::working();
    let pipeline = pipeline(SqliteContextStore::new(storage), backend.clone(), None);

    let first = pipeline.handle_message("기침이 나요", None).await;
    assert!(first.degraded);
    assert!(first.states.contains(&PipelineState::ContextDegraded));
    assert!(!first.states.contains(&PipelineState::Cached));

    let second = pipeline.handle_message("기침이 나요", None).await;
    assert!(!second.cached);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_secondary_answers_when_primary_fails() {
    let (storage, _temp) = create_knowledge_base();
    let primary = Counting::broken();
    let secondary = Counting::working();
    let pipeline = pipeline(
        SqliteContextStore::new(storage),
        primary.clone(),
        Some(secondary.clone()),
    );

    let reply = pipeline.handle_message("내과 전화번호 알려주세요", None).await;
    assert!(!reply.degraded);
    assert!(reply.response.contains("02-1234-1000"));
    assert_eq!((primary.calls(), secondary.calls()), (1, 1));
}

#[tokio::test]
async fn test_failed_generation_cools_down() {
    let (storage, _temp) = create_knowledge_base();
    let primary = Counting::broken();
    let secondary = Counting::broken();
    let config = config();
    let pipeline = pipeline(
        SqliteContextStore::new(storage),
        primary.clone(),
        Some(secondary.clone()),
    );

    let first = pipeline.handle_message("면회 시간 알려주세요", None).await;
    assert!(first.degraded);
    assert_eq!(first.response, config.replies.fallback);
    assert!(first.states.contains(&PipelineState::GenerationFallback));

    let second = pipeline.handle_message("면회 시간 알려주세요", None).await;
    assert!(second.degraded);
    assert!(second.states.contains(&PipelineState::CoolingDown));
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test]
async fn test_blank_message_gets_clarification() {
    let (storage, _temp) = create_knowledge_base();
    let backend = Counting::working();
    let pipeline = pipeline(SqliteContextStore::new(storage), backend.clone(), None);

    let reply = pipeline.handle_message(" \n\t ", None).await;
    assert!(reply.degraded);
    assert_eq!(reply.intent, Intent::Fallback);
    assert_eq!(reply.response, config().replies.clarification);
    assert_eq!(
        reply.states,
        vec![
            PipelineState::Received,
            PipelineState::Invalid,
            PipelineState::Returned
        ]
    );
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_daily_clear_empties_cache() {
    let (storage, _temp) = create_knowledge_base();
    let backend = Counting::working();
    let pipeline = pipeline(SqliteContextStore::new(storage), backend.clone(), None);

    pipeline.handle_message("내과 위치가 어디인가요?", None).await;
    pipeline.cache().clear_all();
    let again = pipeline.handle_message("내과 위치가 어디인가요?", None).await;
    assert!(!again.cached);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_store() {
    let (storage, _temp) = create_knowledge_base();
    let pipeline = Arc::new(pipeline(
        SqliteContextStore::new(storage),
        Arc::new(ExtractiveBackend::new()),
        None,
    ));

    let questions = [
        "내과 위치가 어디인가요?",
        "기침이 나고 열이 나요",
        "주차장 요금이 얼마인가요",
        "김민준 교수님 진료 일정 알려주세요",
    ];
    let replies = futures_util::future::join_all(questions.iter().map(|q| {
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.handle_message(q, None).await }
    }))
    .await;

    assert_eq!(replies.len(), questions.len());
    for reply in &replies {
        assert!(!reply.degraded, "{reply:?}");
        assert_eq!(reply.states.last(), Some(&PipelineState::Returned));
    }
    assert!(replies[3].response.contains("김민준"));
}

// ==================== CLI ====================

mod cli {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn medchat(dir: &TempDir) -> Command {
        let mut cmd = Command::cargo_bin("medchat-rs").expect("binary");
        cmd.arg("--db-path")
            .arg(dir.path().join("kb.db"))
            .env("XDG_CONFIG_HOME", dir.path())
            .env("HOME", dir.path())
            .env_remove("MEDCHAT_CONFIG")
            .env_remove("MEDCHAT_BACKEND")
            .env_remove("MEDCHAT_MODEL")
            .env_remove("MEDCHAT_BASE_URL");
        cmd
    }

    #[test]
    fn test_status_before_init_fails() {
        let dir = TempDir::new().expect("temp dir");
        medchat(&dir)
            .arg("status")
            .assert()
            .failure()
            .stderr(predicate::str::contains("not initialized"));
    }

    #[test]
    fn test_json_errors_go_to_stdout() {
        let dir = TempDir::new().expect("temp dir");
        medchat(&dir)
            .args(["--format", "json", "status"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("\"error\""));
    }

    #[test]
    fn test_init_add_and_ask() {
        let dir = TempDir::new().expect("temp dir");
        medchat(&dir).arg("init").assert().success();
        medchat(&dir)
            .args(["add-department", "내과", "--location", "본관 2층"])
            .assert()
            .success();

        medchat(&dir)
            .args(["--backend", "extractive", "ask", "내과 위치가 어디인가요?"])
            .assert()
            .success()
            .stdout(predicate::str::contains("본관 2층"))
            .stdout(predicate::str::contains("info_query"));

        medchat(&dir)
            .args(["--format", "json", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"department_count\": 1"));
    }

    #[test]
    fn test_chat_reads_stdin_until_exit() {
        let dir = TempDir::new().expect("temp dir");
        medchat(&dir).arg("init").assert().success();
        medchat(&dir)
            .args(["add-department", "피부과"])
            .assert()
            .success();

        medchat(&dir)
            .args(["--backend", "extractive", "chat"])
            .write_stdin("진료과를 알려주세요\n\nexit\n진료과를 알려주세요\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("피부과"))
            .stdout(predicate::str::contains("Chat ended after 1 messages."));
    }
}

// ==================== Properties ====================

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_every_message_gets_a_reply(text in "\\PC{0,80}") {
        let mut storage = SqliteStorage::in_memory().expect("storage");
        storage.init().expect("init");
        let pipeline = pipeline(
            SqliteContextStore::new(storage),
            Arc::new(ExtractiveBackend::new()),
            None,
        );

        let reply = runtime().block_on(pipeline.handle_message(&text, None));
        prop_assert!(!reply.response.is_empty());
        prop_assert_eq!(reply.states.first(), Some(&PipelineState::Received));
        prop_assert_eq!(reply.states.last(), Some(&PipelineState::Returned));
        if text.trim().is_empty() {
            prop_assert!(reply.degraded);
        }
    }
}
