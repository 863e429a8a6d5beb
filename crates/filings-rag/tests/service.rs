mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use filings_rag::providers::{DirectoryDocumentStore, MemoryDocumentStore};
use filings_rag::{Answer, Error, Query};

use common::{date, filing, long_filing, open, CountingEmbedder, EchoGenerator};

#[tokio::test]
async fn indexing_unchanged_store_twice_embeds_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryDocumentStore::new());
    store.submit(long_filing("AAPL"));
    store.submit(filing("MSFT", "8-K", date(2024, 1, 15), "Cloud revenue grew strongly."));
    let embedder = CountingEmbedder::new();
    let service = open(dir.path(), embedder.clone(), store).await;

    let first = service.index_new_documents().await.unwrap();
    assert_eq!(first.documents_processed, 2);
    assert_eq!(first.chunks_embedded, 8);
    let stats = service.stats().await.unwrap();

    let second = service.index_new_documents().await.unwrap();
    assert_eq!(second.chunks_embedded, 0);
    assert_eq!(service.stats().await.unwrap(), stats);
    assert_eq!(embedder.embedded(), 8);
}

#[tokio::test]
async fn long_filing_yields_seven_marked_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(
        dir.path(),
        CountingEmbedder::new(),
        Arc::new(MemoryDocumentStore::new()),
    )
    .await;

    let report = service.index_documents(&[long_filing("AAPL")]).await.unwrap();
    assert_eq!(report.chunks_embedded, 7);
    assert!(report.is_complete());

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.indexed_chunks, 7);
    assert_eq!(stats.fingerprints, 7);
    assert_eq!(stats.dimensions, Some(256));
    assert!(service.reconcile().await.unwrap().is_clean());
}

#[tokio::test]
async fn resubmitted_filing_is_skipped_entirely() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryDocumentStore::new());
    let embedder = CountingEmbedder::new();
    let service = open(dir.path(), embedder.clone(), store.clone()).await;

    store.submit(long_filing("AAPL"));
    let first = service.index_new_documents().await.unwrap();
    assert_eq!(first.chunks_embedded, 7);

    store.submit(long_filing("AAPL"));
    let second = service.index_new_documents().await.unwrap();
    assert_eq!(second.documents_processed, 1);
    assert_eq!(second.chunks_skipped, 7);
    assert_eq!(second.chunks_embedded, 0);
    assert_eq!(embedder.embedded(), 7);
}

#[tokio::test]
async fn unknown_entity_returns_empty_result() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(
        dir.path(),
        CountingEmbedder::new(),
        Arc::new(MemoryDocumentStore::new()),
    )
    .await;
    service
        .index_documents(&[filing("AAPL", "10-Q", date(2024, 3, 1), "iPhone revenue increased.")])
        .await
        .unwrap();

    let hits = service
        .query("iPhone revenue", Some("ZZZZ"), None, false)
        .await
        .unwrap();
    assert!(hits.is_empty());

    let answer = service
        .ask(&Query::new("iPhone revenue").entity("ZZZZ"))
        .await
        .unwrap();
    assert!(matches!(answer, Answer::Declined { .. }));
}

#[tokio::test]
async fn lost_fingerprint_is_healed_without_re_embedding() {
    let dir = tempfile::tempdir().unwrap();
    let doc = long_filing("AAPL");
    let victim = {
        let service = open(
            dir.path(),
            CountingEmbedder::new(),
            Arc::new(MemoryDocumentStore::new()),
        )
        .await;
        service.index_documents(&[doc.clone()]).await.unwrap();
        service.query("lorem", None, None, false).await.unwrap()[0]
            .content_hash
            .clone()
    };

    // Crash after the index add, before the fingerprint was written
    let conn = rusqlite::Connection::open(dir.path().join("fingerprints.db")).unwrap();
    let removed = conn
        .execute("DELETE FROM fingerprints WHERE content_hash = ?1", [victim.as_str()])
        .unwrap();
    assert_eq!(removed, 1);
    drop(conn);

    let embedder = CountingEmbedder::new();
    let service = open(dir.path(), embedder.clone(), Arc::new(MemoryDocumentStore::new())).await;
    assert_eq!(service.startup_reconcile().healed, 1);
    assert_eq!(service.startup_reconcile().purged, 0);

    let report = service.index_documents(&[doc]).await.unwrap();
    assert_eq!(report.chunks_embedded, 0);
    assert_eq!(report.chunks_skipped, 7);
    assert_eq!(embedder.embedded(), 0);
    assert_eq!(service.stats().await.unwrap().indexed_chunks, 7);
}

#[tokio::test]
async fn lost_index_record_is_re_embedded_once() {
    let dir = tempfile::tempdir().unwrap();
    let doc = long_filing("AAPL");
    let victim = {
        let service = open(
            dir.path(),
            CountingEmbedder::new(),
            Arc::new(MemoryDocumentStore::new()),
        )
        .await;
        service.index_documents(&[doc.clone()]).await.unwrap();
        service.query("lorem", None, None, false).await.unwrap()[0]
            .content_hash
            .clone()
    };

    let conn = rusqlite::Connection::open(dir.path().join("vectors.db")).unwrap();
    let removed = conn
        .execute("DELETE FROM embeddings WHERE content_hash = ?1", [victim.as_str()])
        .unwrap();
    assert_eq!(removed, 1);
    drop(conn);

    let embedder = CountingEmbedder::new();
    let service = open(dir.path(), embedder.clone(), Arc::new(MemoryDocumentStore::new())).await;
    assert_eq!(service.startup_reconcile().purged, 1);
    assert_eq!(service.stats().await.unwrap().indexed_chunks, 6);

    let report = service.index_documents(&[doc]).await.unwrap();
    assert_eq!(report.chunks_embedded, 1);
    assert_eq!(report.chunks_skipped, 6);
    assert_eq!(embedder.embedded(), 1);

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.indexed_chunks, 7);
    assert_eq!(stats.fingerprints, 7);
    assert!(service.reconcile().await.unwrap().is_clean());
}

#[tokio::test]
async fn index_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryDocumentStore::new());
    store.submit(filing("NVDA", "10-Q", date(2024, 5, 20), "Data center revenue reached a record."));
    {
        let service = open(dir.path(), CountingEmbedder::new(), store.clone()).await;
        service.index_new_documents().await.unwrap();
    }

    let embedder = CountingEmbedder::new();
    let service = open(dir.path(), embedder.clone(), store).await;
    assert!(service.startup_reconcile().is_clean());

    let hits = service
        .query("data center revenue", Some("nvda"), None, false)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source_url, "https://filings.example.com/NVDA/10-Q/2024-05-20");

    let report = service.index_new_documents().await.unwrap();
    assert_eq!(report.documents_processed, 0);
    // Just the query
    assert_eq!(embedder.embedded(), 1);
}

#[tokio::test]
async fn most_recent_only_returns_latest_filing() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(
        dir.path(),
        CountingEmbedder::new(),
        Arc::new(MemoryDocumentStore::new()),
    )
    .await;
    service
        .index_documents(&[
            filing("AAPL", "10-Q", date(2024, 1, 1), "Services revenue was a record."),
            filing("AAPL", "10-Q", date(2024, 3, 1), "Services revenue grew modestly."),
            filing("AAPL", "8-K", date(2024, 6, 1), "Services revenue guidance raised."),
        ])
        .await
        .unwrap();

    let hits = service
        .query("services revenue", Some("AAPL"), Some("10-Q"), true)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.published_date == date(2024, 3, 1)));

    let all = service
        .query("services revenue", Some("AAPL"), Some("10-Q"), false)
        .await
        .unwrap();
    let dates: HashSet<_> = all.iter().map(|h| h.published_date).collect();
    assert_eq!(dates.len(), 2);
}

#[tokio::test]
async fn results_respect_similarity_floor_and_ranking() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(
        dir.path(),
        CountingEmbedder::new(),
        Arc::new(MemoryDocumentStore::new()),
    )
    .await;
    service
        .index_documents(&[
            filing("AAPL", "10-Q", date(2024, 3, 1), "Gross margin expanded on services mix."),
            filing("MSFT", "10-Q", date(2024, 3, 1), "Gross margin expanded."),
            filing("TSLA", "10-Q", date(2024, 3, 1), "Vehicle deliveries declined."),
        ])
        .await
        .unwrap();

    let floor = service.config().retrieval.min_similarity;
    let hits = service.query("gross margin expanded", None, None, false).await.unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.score >= floor));
    assert!(hits.iter().all(|h| h.entity_id != "TSLA"));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(hits[0].entity_id, "MSFT");
}

#[tokio::test]
async fn blank_question_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(
        dir.path(),
        CountingEmbedder::new(),
        Arc::new(MemoryDocumentStore::new()),
    )
    .await;
    let err = service.query("   ", None, None, false).await.unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
}

#[tokio::test]
async fn ask_grounds_answers_and_declines_without_context() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(EchoGenerator::default());
    let service = open(
        dir.path(),
        CountingEmbedder::new(),
        Arc::new(MemoryDocumentStore::new()),
    )
    .await
    .with_answer_generator(generator.clone());
    service
        .index_documents(&[filing("AAPL", "8-K", date(2024, 2, 1), "The board declared a quarterly dividend.")])
        .await
        .unwrap();

    let answer = service
        .ask(&Query::new("quarterly dividend declared").entity("AAPL"))
        .await
        .unwrap();
    match answer {
        Answer::Grounded {
            citations, sources, ..
        } => {
            assert_eq!(citations.len(), 1);
            assert_eq!(citations[0].index, 1);
            assert_eq!(sources, vec!["https://filings.example.com/AAPL/8-K/2024-02-01".to_string()]);
        }
        other => panic!("expected grounded answer, got {:?}", other),
    }

    let declined = service
        .ask(&Query::new("semiconductor export controls"))
        .await
        .unwrap();
    assert!(!declined.is_grounded());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn queries_run_while_indexing() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(
        dir.path(),
        CountingEmbedder::new(),
        Arc::new(MemoryDocumentStore::new()),
    )
    .await;
    service
        .index_documents(&[filing("AAPL", "10-Q", date(2024, 3, 1), "Operating cash flow improved.")])
        .await
        .unwrap();

    let docs: Vec<_> = ["MSFT", "NVDA", "AMZN", "GOOG"]
        .iter()
        .map(|t| long_filing(t))
        .collect();
    let (indexed, hits) = tokio::join!(
        service.index_documents(&docs),
        service.query("operating cash flow", Some("AAPL"), None, false)
    );

    assert_eq!(indexed.unwrap().chunks_embedded, 28);
    assert_eq!(hits.unwrap().len(), 1);
    assert_eq!(service.stats().await.unwrap().indexed_chunks, 29);
}

#[tokio::test]
async fn directory_store_feeds_new_files_only() {
    let data = tempfile::tempdir().unwrap();
    let inbox = tempfile::tempdir().unwrap();
    std::fs::write(
        inbox.path().join("aapl_10q.json"),
        r#"{"ticker": "AAPL", "doc_type": "10-Q", "filing_date": "2024-05-03",
            "url": "https://www.sec.gov/aapl-10q.htm", "text": "Net sales decreased slightly."}"#,
    )
    .unwrap();
    std::fs::write(inbox.path().join("garbage.json"), "[1, 2").unwrap();

    let store = Arc::new(DirectoryDocumentStore::new(inbox.path()).unwrap());
    let embedder = CountingEmbedder::new();
    let service = open(data.path(), embedder.clone(), store).await;

    let first = service.index_new_documents().await.unwrap();
    assert_eq!(first.documents_processed, 1);
    assert_eq!(first.documents_malformed, 1);
    assert_eq!(first.chunks_embedded, 1);

    std::thread::sleep(std::time::Duration::from_millis(20));
    std::fs::write(
        inbox.path().join("msft_8k.json"),
        r#"{"ticker": "MSFT", "doc_type": "8-K", "filing_date": "2024-05-10",
            "url": "https://www.sec.gov/msft-8k.htm", "text": "Leadership change announced."}"#,
    )
    .unwrap();

    let second = service.index_new_documents().await.unwrap();
    assert_eq!(second.chunks_embedded, 1);
    assert_eq!(embedder.embedded(), 2);
    assert_eq!(service.stats().await.unwrap().indexed_chunks, 2);
}
