// Counter tests against the SQLite store.
//
// Exercises the atomic counter primitives the way production traffic does:
// many concurrent increments on one item, composite vote updates racing each
// other, decrements clamped at zero, and batched counts that must report
// every requested key.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use chrono::{Duration, Utc};

use curator::db::models::{
    ContentFilter, ContentItem, ContentKind, ContentStatus, Counter, GroupKey, OrderBy, PageQuery, VoteKind,
};
use curator::db::sqlite::SqliteStore;
use curator::db::CounterStore;
use curator::engine::ContentEngine;
use curator::error::EngineError;
use curator::scoring::quality::ScoreWeights;

fn store() -> Arc<dyn CounterStore> {
    Arc::new(SqliteStore::in_memory().unwrap())
}

async fn post_engine_with(ids: &[&str]) -> ContentEngine {
    let engine = ContentEngine::posts(store());
    for id in ids {
        engine
            .create(&ContentItem::new(*id, ContentKind::Post, "alice", Utc::now()))
            .await
            .unwrap();
    }
    engine
}

// ============================================================
// Concurrency: no lost updates
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_view_increments_are_not_lost() {
    let engine = post_engine_with(&["p1"]).await;

    let mut handles = Vec::new();
    for _ in 0..1000 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.increment_views_count("p1", 1).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(engine.get("p1").await.unwrap().counters.views, 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_votes_keep_pair_consistent() {
    let engine = post_engine_with(&["p1"]).await;

    let mut handles = Vec::new();
    for i in 0..400 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let vote = if i % 3 == 0 { VoteKind::No } else { VoteKind::Yes };
            engine.increment_votes_count("p1", vote, 1).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let item = engine.get("p1").await.unwrap();
    assert_eq!(item.counters.votes, 400);
    assert_eq!(item.counters.no_votes, 134);
    assert_eq!(item.counters.yes_votes, 266);
    assert!(item.counters.votes_consistent());
    assert_eq!(engine.store().count_inconsistent_votes().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_mixed_vote_deltas_keep_pair_consistent() {
    let engine = post_engine_with(&["p1"]).await;

    let mut handles = Vec::new();
    for i in 0..400 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let (vote, delta) = match i % 4 {
                0 => (VoteKind::Yes, 2),
                1 => (VoteKind::No, 1),
                2 => (VoteKind::Yes, -1),
                _ => (VoteKind::No, -3),
            };
            engine.increment_votes_count("p1", vote, delta).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let item = engine.get("p1").await.unwrap();
    assert!(item.counters.votes_consistent());
    assert!(item.counters.yes_votes >= 0);
    assert!(item.counters.no_votes >= 0);
    assert_eq!(engine.store().count_inconsistent_votes().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn quality_write_never_erases_increments() {
    let engine = post_engine_with(&["p1"]).await;
    let snapshot = engine.get("p1").await.unwrap();

    // Counters move after the snapshot was taken.
    engine.increment_likes_count("p1", 7).await.unwrap();

    let saved = engine.update_content_quality("p1", 1.25).await.unwrap();
    assert_eq!(saved.counters.likes, 7);
    assert_eq!(saved.content_quality, 1.25);
    assert_eq!(saved.version, snapshot.version + 1);
}

// ============================================================
// Clamping and argument checks
// ============================================================

#[tokio::test]
async fn decrement_clamps_at_zero() {
    let engine = post_engine_with(&["p1"]).await;
    engine.increment_likes_count("p1", 3).await.unwrap();
    assert_eq!(engine.increment_likes_count("p1", -10).await.unwrap(), 0);
    assert_eq!(engine.increment_likes_count("p1", 2).await.unwrap(), 2);
}

#[tokio::test]
async fn vote_decrement_is_capped_by_side() {
    let engine = post_engine_with(&["p1"]).await;
    engine.increment_yes_votes_count("p1", 5).await.unwrap();
    engine.increment_no_votes_count("p1", 2).await.unwrap();

    let (votes, no) = engine.increment_no_votes_count("p1", -10).await.unwrap();
    assert_eq!((votes, no), (5, 0));

    let item = engine.get("p1").await.unwrap();
    assert_eq!(item.counters.yes_votes, 5);
    assert!(item.counters.votes_consistent());
}

#[tokio::test]
async fn vote_counters_refuse_single_increment() {
    let engine = post_engine_with(&["p1"]).await;
    let err = engine
        .counters()
        .increment_counter("p1", Counter::YesVotes, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
}

#[tokio::test]
async fn overflowing_increment_is_refused_and_item_stays_readable() {
    let engine = post_engine_with(&["p1"]).await;
    engine.increment_views_count("p1", 1).await.unwrap();

    let err = engine.increment_views_count("p1", i64::MAX).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
    assert!(!err.is_retryable());

    assert_eq!(engine.get("p1").await.unwrap().counters.views, 1);
    let page = engine
        .find_by_score(PageQuery {
            filter: ContentFilter::for_kind(ContentKind::Post),
            order_by: OrderBy::Quality,
            descending: true,
            skip: 0,
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 1);

    engine.increment_yes_votes_count("p1", 1).await.unwrap();
    assert!(engine.increment_yes_votes_count("p1", i64::MAX).await.is_err());
    assert!(engine.get("p1").await.unwrap().counters.votes_consistent());
}

#[tokio::test]
async fn duplicate_create_is_rejected_not_retryable() {
    let engine = post_engine_with(&["p1"]).await;
    let err = engine
        .create(&ContentItem::new("p1", ContentKind::Post, "bob", Utc::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
    assert!(!err.is_retryable());
    assert_eq!(engine.get("p1").await.unwrap().author_id, "alice");
}

#[tokio::test]
async fn increment_missing_item_is_not_found() {
    let engine = post_engine_with(&[]).await;
    let err = engine.increment_views_count("ghost", 1).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn ratings_fold_into_running_average() {
    let engine = post_engine_with(&["p1"]).await;
    engine.add_rating("p1", 5.0).await.unwrap();
    engine.add_rating("p1", 3.0).await.unwrap();
    let (count, average) = engine.add_rating("p1", 4.0).await.unwrap();
    assert_eq!(count, 3);
    assert!((average - 4.0).abs() < 1e-12);

    assert!(matches!(
        engine.add_rating("p1", 6.0).await,
        Err(EngineError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn recompute_reads_fresh_counters() {
    let engine = post_engine_with(&["p1"]).await;
    engine.increment_views_count("p1", 1000).await.unwrap();
    engine.increment_likes_count("p1", 50).await.unwrap();

    let weights = ScoreWeights {
        ratings: 0.0,
        ..ScoreWeights::default()
    };
    let q = engine
        .recompute_content_quality("p1", &weights, 30, Utc::now())
        .await
        .unwrap();
    assert!((q - 1.382571).abs() < 1e-4, "got {q}");
    assert_eq!(engine.get("p1").await.unwrap().content_quality, q);
}

// ============================================================
// Batched counts
// ============================================================

#[tokio::test]
async fn counts_by_parents_report_every_key() {
    let store = store();
    let comments = ContentEngine::comments(store);
    let now = Utc::now();
    for (id, parent) in [("c1", "p1"), ("c2", "p1"), ("c3", "p2")] {
        comments
            .create(&ContentItem::new(id, ContentKind::Comment, "bob", now).with_parent(parent))
            .await
            .unwrap();
    }

    let keys = vec!["p1".to_string(), "p2".to_string(), "p3".to_string(), "p1".to_string()];
    let counts = comments.get_counts_by_parents(&keys, None).await.unwrap();
    assert_eq!(counts.len(), 3);
    assert_eq!(counts["p1"], 2);
    assert_eq!(counts["p2"], 1);
    assert_eq!(counts["p3"], 0);
}

#[tokio::test]
async fn counts_respect_status_filter() {
    let engine = post_engine_with(&[]).await;
    let now = Utc::now();
    let mut hidden = ContentItem::new("p2", ContentKind::Post, "alice", now);
    hidden.status = ContentStatus::Hidden;
    engine
        .create(&ContentItem::new("p1", ContentKind::Post, "alice", now))
        .await
        .unwrap();
    engine.create(&hidden).await.unwrap();
    engine
        .create(&ContentItem::new("p3", ContentKind::Post, "carol", now - Duration::days(1)))
        .await
        .unwrap();

    let all = engine.get_counts_by_all_users(None).await.unwrap();
    assert_eq!(all["alice"], 2);
    assert_eq!(all["carol"], 1);

    let published = engine
        .get_counts_by_users(&["alice".to_string()], Some(ContentStatus::Published))
        .await
        .unwrap();
    assert_eq!(published["alice"], 1);
}

#[tokio::test]
async fn large_key_lists_are_chunked() {
    let engine = post_engine_with(&[]).await;
    let now = Utc::now();
    for i in 0..3 {
        engine
            .create(&ContentItem::new(format!("p{i}"), ContentKind::Post, format!("user{i}"), now))
            .await
            .unwrap();
    }

    let keys: Vec<String> = (0..1200).map(|i| format!("user{i}")).collect();
    let counts = engine
        .counters()
        .count_by(GroupKey::User, &keys, &ContentFilter::for_kind(ContentKind::Post))
        .await
        .unwrap();
    assert_eq!(counts.len(), 1200);
    assert_eq!(counts["user0"], 1);
    assert_eq!(counts["user1199"], 0);
}

#[tokio::test]
async fn groups_skip_items_without_group() {
    let engine = post_engine_with(&["p1"]).await;
    engine
        .create(&ContentItem::new("p2", ContentKind::Post, "alice", Utc::now()).with_group("g1"))
        .await
        .unwrap();

    let counts = engine.get_counts_by_all_groups(None).await.unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts["g1"], 1);

    let requested = engine
        .get_counts_by_groups(&["g1".to_string(), "g2".to_string()], None)
        .await
        .unwrap();
    assert_eq!(requested["g1"], 1);
    assert_eq!(requested["g2"], 0);
}
