use civicdocs_core::config::{
    AppConfig, ChunkingConfig, DatabaseConfig, EmbeddingConfig, GenerationConfig, IndexConfig,
};
use civicdocs_core::models::DocumentType;
use civicdocs_core::pipeline::App;
use sqlx::Row;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn test_config(db_url: &str, index_path: &Path) -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            path: db_url.to_string(),
        },
        index: IndexConfig {
            path: index_path.to_string_lossy().into_owned(),
        },
        chunking: ChunkingConfig {
            chunk_size: 5,
            overlap: 1,
        },
        embeddings: EmbeddingConfig {
            provider: "hash".to_string(),
            model: String::new(),
            dimension: 64,
            batch_size: 2,
        },
        generation: GenerationConfig {
            provider: "none".to_string(),
            model: String::new(),
            timeout_secs: 5,
        },
    }
}

#[tokio::test]
async fn ingest_and_query_end_to_end() {
    let temp = tempdir().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(
        docs.join("road_plan.txt"),
        "road maintenance budget road resurfacing schedule for county roads next year",
    )
    .unwrap();
    fs::write(
        docs.join("court_calendar.txt"),
        "district court hearing calendar arraignment docket for criminal cases this term",
    )
    .unwrap();
    fs::write(docs.join("scan.jpg"), "not a document").unwrap();

    let cfg = test_config(
        "sqlite://file:e2e_test?mode=memory&cache=shared",
        &temp.path().join("vectors.index"),
    );
    let app = App::init(cfg).await.unwrap();
    let ingester = app.ingester();

    let reports = ingester
        .ingest_dir(&docs, DocumentType::Policy, "Public Works", HashMap::new())
        .await
        .unwrap();
    // The jpg is skipped as unsupported.
    assert_eq!(reports.len(), 2);

    let results = app
        .retriever()
        .retrieve("road maintenance budget", 5, None, None)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].title, "road_plan");
    assert_eq!(results[0].doc_type, "policy");
    for pair in results.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }
    assert!(results[0].relevance_score > 0.0 && results[0].relevance_score <= 1.0);
}

#[tokio::test]
async fn reingest_is_idempotent() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("ordinance.txt");
    fs::write(
        &file,
        "no parking on the courthouse square between two and five in the morning",
    )
    .unwrap();

    let cfg = test_config(
        "sqlite://file:idempotent_test?mode=memory&cache=shared",
        &temp.path().join("vectors.index"),
    );
    let app = App::init(cfg).await.unwrap();
    let ingester = app.ingester();

    let first = ingester
        .ingest_file(&file, DocumentType::Ordinance, "County Clerk", HashMap::new())
        .await
        .unwrap();
    assert!(!first.replaced);

    let second = ingester
        .ingest_file(&file, DocumentType::Ordinance, "County Clerk", HashMap::new())
        .await
        .unwrap();
    assert!(second.replaced);
    assert_eq!(second.document_id, first.document_id);

    let stats = app.store().stats().await.unwrap();
    assert_eq!(stats.total_documents, 1);
    assert_eq!(stats.indexed_documents, 1);
    assert_eq!(stats.total_chunks, first.chunk_count as u64);

    // Still queryable after the replace.
    let results = app
        .retriever()
        .retrieve("parking courthouse square", 3, None, None)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].document_id, first.document_id);
}

#[tokio::test]
async fn global_ordinals_stay_in_sync_with_the_index() {
    let temp = tempdir().unwrap();
    // 12 words with chunk_size 5 / overlap 1 -> windows at 0, 4, 8 -> 3 chunks.
    let texts = [
        "alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo lima",
        "one two three four five six seven eight nine ten eleven twelve",
        "red orange yellow green blue indigo violet gray black white brown pink",
    ];
    let mut files = Vec::new();
    for (i, text) in texts.iter().enumerate() {
        let path = temp.path().join(format!("doc{}.txt", i));
        fs::write(&path, text).unwrap();
        files.push(path);
    }

    let cfg = test_config(
        "sqlite://file:ordinal_test?mode=memory&cache=shared",
        &temp.path().join("vectors.index"),
    );
    let app = App::init(cfg).await.unwrap();
    let ingester = app.ingester();

    let mut ids = Vec::new();
    for path in &files {
        let report = ingester
            .ingest_file(path, DocumentType::Procedural, "Records", HashMap::new())
            .await
            .unwrap();
        assert_eq!(report.chunk_count, 3);
        ids.push(report.document_id);
    }

    // Ordinal o must resolve to the chunk inserted o-th: documents were
    // ingested in order, three chunks each.
    for ordinal in 0..9i64 {
        let chunk = app
            .store()
            .get_chunk_by_ordinal(ordinal)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("ordinal {} unresolvable", ordinal));
        assert_eq!(chunk.doc_id, ids[(ordinal / 3) as usize]);
    }

    // Replacing the middle document compacts ordinals and moves its chunks
    // to the end; every ordinal must still resolve.
    let report = ingester
        .ingest_file(&files[1], DocumentType::Procedural, "Records", HashMap::new())
        .await
        .unwrap();
    assert!(report.replaced);
    assert_eq!(app.store().chunk_count().await.unwrap(), 9);

    let expected_docs = [&ids[0], &ids[2], &ids[1]];
    for ordinal in 0..9i64 {
        let chunk = app
            .store()
            .get_chunk_by_ordinal(ordinal)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("ordinal {} unresolvable after replace", ordinal));
        assert_eq!(&chunk.doc_id, expected_docs[(ordinal / 3) as usize]);
    }

    // And retrieval still hydrates correctly.
    let results = app
        .retriever()
        .retrieve("alpha bravo charlie", 3, None, None)
        .await
        .unwrap();
    assert_eq!(results[0].document_id, ids[0]);
}

#[tokio::test]
async fn filters_drop_rather_than_replace() {
    let temp = tempdir().unwrap();
    fs::write(
        temp.path().join("works.txt"),
        "bridge repair bids bridge inspection report river crossing load limits",
    )
    .unwrap();
    fs::write(
        temp.path().join("clerk.txt"),
        "bridge naming ceremony minutes bridge dedication attendees and speeches",
    )
    .unwrap();

    let cfg = test_config(
        "sqlite://file:filter_test?mode=memory&cache=shared",
        &temp.path().join("vectors.index"),
    );
    let app = App::init(cfg).await.unwrap();
    let ingester = app.ingester();

    ingester
        .ingest_file(
            &temp.path().join("works.txt"),
            DocumentType::Procedural,
            "Public Works",
            HashMap::new(),
        )
        .await
        .unwrap();
    ingester
        .ingest_file(
            &temp.path().join("clerk.txt"),
            DocumentType::MeetingMinutes,
            "County Clerk",
            HashMap::new(),
        )
        .await
        .unwrap();

    let unfiltered = app
        .retriever()
        .retrieve("bridge", 10, None, None)
        .await
        .unwrap();
    let clerk_only = app
        .retriever()
        .retrieve("bridge", 10, Some("County Clerk"), None)
        .await
        .unwrap();

    assert!(unfiltered.len() > clerk_only.len());
    assert!(!clerk_only.is_empty());
    assert!(clerk_only.iter().all(|r| r.department == "County Clerk"));

    let minutes_only = app
        .retriever()
        .retrieve("bridge", 10, None, Some(DocumentType::MeetingMinutes))
        .await
        .unwrap();
    assert!(minutes_only.iter().all(|r| r.doc_type == "minutes"));

    // Document-level filtered listing agrees.
    let docs = app
        .store()
        .query_documents(Some("Public Works"), None)
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].department, "Public Works");
}

#[tokio::test]
async fn ask_falls_back_and_audits() {
    let temp = tempdir().unwrap();
    let file = temp.path().join("foia_guide.txt");
    fs::write(
        &file,
        "public information requests must receive a response within ten business days",
    )
    .unwrap();

    let cfg = test_config(
        "sqlite://file:ask_test?mode=memory&cache=shared",
        &temp.path().join("vectors.index"),
    );
    let app = App::init(cfg).await.unwrap();
    app.ingester()
        .ingest_file(&file, DocumentType::FoiaResponse, "County Attorney", HashMap::new())
        .await
        .unwrap();

    let question = "how fast must foia requests be answered";
    let results = app
        .retriever()
        .retrieve(question, 5, None, None)
        .await
        .unwrap();
    let answer = app.synthesizer().answer(question, &results).await;
    assert!(!answer.is_empty());
    assert!(answer.contains("foia_guide"));

    let used: Vec<String> = results.iter().map(|r| r.document_id.clone()).collect();
    app.store()
        .record_query(question, &answer, &used, Some("tester"))
        .await
        .unwrap();

    let row = sqlx::query("SELECT query_text, user_id, documents_used FROM queries")
        .fetch_one(app.store().pool())
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("query_text"), question);
    assert_eq!(row.get::<Option<String>, _>("user_id").as_deref(), Some("tester"));
    let used_json: Vec<String> =
        serde_json::from_str(&row.get::<String, _>("documents_used")).unwrap();
    assert_eq!(used_json, used);
}

#[tokio::test]
async fn restart_reloads_or_rebuilds_the_index() {
    let temp = tempdir().unwrap();
    let db_path = temp.path().join("docs.db");
    let index_path = temp.path().join("vectors.index");
    let file = temp.path().join("minutes.txt");
    fs::write(
        &file,
        "commissioners court convened and approved the burn ban extension",
    )
    .unwrap();

    let cfg = test_config(&db_path.to_string_lossy(), &index_path);
    {
        let app = App::init(cfg.clone()).await.unwrap();
        app.ingester()
            .ingest_file(&file, DocumentType::MeetingMinutes, "Commissioners", HashMap::new())
            .await
            .unwrap();
        assert!(index_path.exists());
    }

    // Snapshot present: loads and serves queries.
    {
        let app = App::init(cfg.clone()).await.unwrap();
        let results = app
            .retriever()
            .retrieve("burn ban", 3, None, None)
            .await
            .unwrap();
        assert!(!results.is_empty());
    }

    // Snapshot lost: rebuilt from stored chunk vectors.
    fs::remove_file(&index_path).unwrap();
    {
        let app = App::init(cfg).await.unwrap();
        let results = app
            .retriever()
            .retrieve("burn ban", 3, None, None)
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(index_path.exists());
    }
}
