//! Feed ingestion integration tests.
//!
//! Ingestion must be idempotent: polling an unchanged feed twice queues
//! nothing the second time, and a re-seen source id never resets the
//! pipeline state of the item it belongs to.

mod common;

use common::{entry, harness, PublishScript, ScriptedGenerator};
use relaycast::domain::ItemStatus;

#[tokio::test]
async fn test_new_entries_are_queued() {
    let h = harness(
        vec![entry("vid-a", 2), entry("vid-b", 5)],
        ScriptedGenerator::good(),
        PublishScript::Succeed,
    );

    let new_items = h.orchestrator.check_for_new_items(24.0).await.unwrap();

    assert_eq!(new_items.len(), 2);
    for item in &new_items {
        assert_eq!(item.status, ItemStatus::New);
        assert!(item.id > 0);
    }
    assert_eq!(
        h.store.list_items_by_status(ItemStatus::New).unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_second_poll_of_unchanged_feed_queues_nothing() {
    let h = harness(
        vec![entry("vid-a", 2), entry("vid-b", 5)],
        ScriptedGenerator::good(),
        PublishScript::Succeed,
    );

    let first = h.orchestrator.check_for_new_items(24.0).await.unwrap();
    let second = h.orchestrator.check_for_new_items(24.0).await.unwrap();

    assert_eq!(first.len(), 2);
    assert!(second.is_empty());
    assert_eq!(
        h.store.list_items_by_status(ItemStatus::New).unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_reseen_entry_does_not_reset_processed_item() {
    let h = harness(
        vec![entry("vid-a", 2)],
        ScriptedGenerator::good(),
        PublishScript::Succeed,
    );

    let new_items = h.orchestrator.check_for_new_items(24.0).await.unwrap();
    let item = &new_items[0];

    // Move the item past NEW, then poll the same feed again
    h.orchestrator.process_item(item).await.unwrap();
    let reprocessed = h
        .store
        .get_item_by_source_id("vid-a")
        .unwrap()
        .unwrap();
    assert_eq!(reprocessed.status, ItemStatus::PostsGenerated);

    let second = h.orchestrator.check_for_new_items(24.0).await.unwrap();
    assert!(second.is_empty());

    let after = h
        .store
        .get_item_by_source_id("vid-a")
        .unwrap()
        .unwrap();
    assert_eq!(after.status, ItemStatus::PostsGenerated);
    assert_eq!(after.id, reprocessed.id);
}

#[tokio::test]
async fn test_only_unseen_entries_from_mixed_feed() {
    let h = harness(
        vec![entry("vid-a", 2)],
        ScriptedGenerator::good(),
        PublishScript::Succeed,
    );

    h.orchestrator.check_for_new_items(24.0).await.unwrap();

    // A new video appears alongside the already-ingested one
    h.feed.entries.lock().unwrap().push(entry("vid-c", 1));

    let second = h.orchestrator.check_for_new_items(24.0).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].source_id, "vid-c");
}
