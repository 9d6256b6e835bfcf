//! Channel directory contract, exercised via the in-memory implementation.

use server_core::domains::channels::{ChannelDirectory, ChannelStatus, RegisterError};
use server_core::kernel::test_dependencies::InMemoryChannelDirectory;

#[tokio::test]
async fn every_reference_shape_lands_on_one_channel() {
    let directory = InMemoryChannelDirectory::new();

    let (first, created) = directory.register("@durov").await.unwrap();
    assert!(created);
    assert_eq!(first.tg_url, "https://t.me/durov");
    assert_eq!(first.status, ChannelStatus::Pending);

    for reference in ["durov", "t.me/durov", "https://t.me/durov", "@durov"] {
        let (channel, created) = directory.register(reference).await.unwrap();
        assert!(!created, "{reference} created a duplicate");
        assert_eq!(channel.id, first.id);
    }
    assert_eq!(directory.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_references_are_rejected() {
    let directory = InMemoryChannelDirectory::new();
    for reference in ["", "@ab", "not a handle", "https://example.com/foo"] {
        let err = directory.register(reference).await.unwrap_err();
        assert!(
            matches!(err, RegisterError::InvalidReference(_)),
            "wrong error for {reference:?}"
        );
    }
    assert!(directory.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn resolution_never_overwrites_an_existing_identity() {
    let directory = InMemoryChannelDirectory::new();
    let (channel, _) = directory.register("@durov").await.unwrap();

    directory
        .mark_resolved(channel.id, 111, "First Title")
        .await
        .unwrap();
    directory
        .mark_resolved(channel.id, 222, "Second Title")
        .await
        .unwrap();

    let channel = directory.find(channel.id).await.unwrap().unwrap();
    assert_eq!(channel.tg_id, Some(111));
    assert_eq!(channel.title.as_deref(), Some("First Title"));
    assert_eq!(channel.status, ChannelStatus::Active);
}

#[tokio::test]
async fn pending_and_active_views_track_the_lifecycle() {
    let directory = InMemoryChannelDirectory::new();
    let (a, _) = directory.register("@alpha").await.unwrap();
    let (b, _) = directory.register("@beta").await.unwrap();

    let pending: Vec<i64> = directory
        .pending_channels()
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(pending, vec![a.id, b.id]);
    assert!(directory.active_channel_ids().await.unwrap().is_empty());

    directory.mark_resolved(a.id, 1, "Alpha").await.unwrap();

    let pending: Vec<i64> = directory
        .pending_channels()
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(pending, vec![b.id]);
    assert_eq!(directory.active_channel_ids().await.unwrap(), vec![a.id]);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let directory = InMemoryChannelDirectory::new();
    let (channel, _) = directory.register("@gone").await.unwrap();

    directory.delete(channel.id).await.unwrap();
    directory.delete(channel.id).await.unwrap();

    assert!(directory.find(channel.id).await.unwrap().is_none());
}
