//! Content store lifecycle tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use fresco_kernel::models::{ContentType, CreateElement, CreateGroup};
use fresco_kernel::store::ContentStore;
use fresco_test_utils::MemoryContentStore;

async fn seed_element(
    store: &MemoryContentStore,
    group_id: uuid::Uuid,
    name: &str,
    required: bool,
) -> uuid::Uuid {
    store
        .create_element(CreateElement {
            group_id,
            name: name.to_string(),
            content_type: ContentType::Text,
            text_content: Some("body".to_string()),
            position: None,
            required,
            image_hint: None,
            author_id: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn required_element_blocks_deletion() {
    let store = MemoryContentStore::new();
    let group = store
        .create_group(CreateGroup {
            name: "Headers".to_string(),
            description: None,
            author_id: None,
        })
        .await
        .unwrap();
    let required = seed_element(&store, group.id, "H1", true).await;
    let optional = seed_element(&store, group.id, "Subtitle", false).await;

    // Neither the required element nor its owning group can be
    // soft-deleted while the element is active.
    assert!(store.soft_delete_element(required).await.is_err());
    assert!(store.soft_delete_group(group.id).await.is_err());

    let element = store
        .find_element_by_group_and_name(group.id, "H1", true)
        .await
        .unwrap()
        .unwrap();
    assert!(element.deleted_at.is_none());
    let group_row = store
        .find_group_by_name("Headers", true)
        .await
        .unwrap()
        .unwrap();
    assert!(group_row.deleted_at.is_none());

    // A non-required sibling is still deletable.
    store.soft_delete_element(optional).await.unwrap();
}

#[tokio::test]
async fn group_deletable_once_required_element_is_gone() {
    let store = MemoryContentStore::new();
    let group = store
        .create_group(CreateGroup {
            name: "Footers".to_string(),
            description: None,
            author_id: None,
        })
        .await
        .unwrap();
    let id = seed_element(&store, group.id, "Copyright", true).await;

    assert!(store.soft_delete_group(group.id).await.is_err());

    // Once the element stops being required it, and then the group,
    // can go.
    store
        .update_element(
            id,
            fresco_kernel::models::UpdateElement {
                required: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store.soft_delete_element(id).await.unwrap();
    store.soft_delete_group(group.id).await.unwrap();

    let group_row = store
        .find_group_by_name("Footers", true)
        .await
        .unwrap()
        .unwrap();
    assert!(group_row.deleted_at.is_some());
}
