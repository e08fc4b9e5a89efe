//! Importer integration tests against the in-memory content store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use fresco_kernel::error::TransferError;
use fresco_kernel::models::ContentType;
use fresco_kernel::store::ContentStore;
use fresco_kernel::transfer::{ContentImporter, ManifestGroup};
use fresco_test_utils::{
    MemoryContentStore, image_element, manifest, manifest_group, png_bytes, text_element,
    with_focal, zip_entries, zip_manifest,
};

fn importer(store: &Arc<MemoryContentStore>) -> ContentImporter {
    ContentImporter::new(store.clone())
}

#[tokio::test]
async fn creates_groups_and_elements() {
    let store = Arc::new(MemoryContentStore::new());
    let archive = zip_manifest(
        &manifest(vec![manifest_group("Headers", vec![text_element("H1", "Hi")])]),
        &[],
    );

    let result = importer(&store).import_bytes(&archive).await.unwrap();

    assert_eq!(result.created, 2);
    assert_eq!(result.updated, 0);
    assert_eq!(result.restored, 0);
    assert!(result.errors.is_empty());
    assert_eq!(result.total_processed(), 2);

    let group = store
        .find_group_by_name("Headers", false)
        .await
        .unwrap()
        .unwrap();
    let element = store
        .find_element_by_group_and_name(group.id, "H1", false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(element.content_type, ContentType::Text);
    assert_eq!(element.text_content.as_deref(), Some("Hi"));
}

#[tokio::test]
async fn second_import_updates_and_records_one_version() {
    let store = Arc::new(MemoryContentStore::new());
    let importer = importer(&store);

    let first = zip_manifest(
        &manifest(vec![manifest_group("Headers", vec![text_element("H1", "Hi")])]),
        &[],
    );
    importer.import_bytes(&first).await.unwrap();

    let second = zip_manifest(
        &manifest(vec![manifest_group(
            "Headers",
            vec![text_element("H1", "Hello")],
        )]),
        &[],
    );
    let result = importer.import_bytes(&second).await.unwrap();

    assert_eq!(result.created, 0);
    assert_eq!(result.updated, 2);
    assert_eq!(result.restored, 0);
    assert!(result.errors.is_empty());

    let group = store
        .find_group_by_name("Headers", false)
        .await
        .unwrap()
        .unwrap();
    let element = store
        .find_element_by_group_and_name(group.id, "H1", false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(element.text_content.as_deref(), Some("Hello"));

    // Exactly one snapshot, storing the value before the change.
    let versions = store.versions_for(element.id);
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version_number, 1);
    assert_eq!(versions[0].text_content.as_deref(), Some("Hi"));
}

#[tokio::test]
async fn reimporting_identical_manifest_is_idempotent() {
    let store = Arc::new(MemoryContentStore::new());
    let importer = importer(&store);
    let archive = zip_manifest(
        &manifest(vec![manifest_group(
            "Footers",
            vec![text_element("Copyright", "© 2026"), text_element("Tagline", "Hello")],
        )]),
        &[],
    );

    importer.import_bytes(&archive).await.unwrap();
    let groups_before = store.group_count();
    let elements_before = store.element_count();

    let result = importer.import_bytes(&archive).await.unwrap();

    assert_eq!(result.created, 0);
    assert_eq!(result.updated, 3);
    assert_eq!(store.group_count(), groups_before);
    assert_eq!(store.element_count(), elements_before);

    // Unchanged text must not grow the version history.
    let group = store
        .find_group_by_name("Footers", false)
        .await
        .unwrap()
        .unwrap();
    let element = store
        .find_element_by_group_and_name(group.id, "Tagline", false)
        .await
        .unwrap()
        .unwrap();
    assert!(store.versions_for(element.id).is_empty());
}

#[tokio::test]
async fn blank_group_name_is_skipped_without_aborting() {
    let store = Arc::new(MemoryContentStore::new());
    let archive = zip_manifest(
        &manifest(vec![
            ManifestGroup {
                name: Some(String::new()),
                description: None,
                elements: vec![],
            },
            manifest_group("Valid", vec![text_element("T", "ok")]),
        ]),
        &[],
    );

    let result = importer(&store).import_bytes(&archive).await.unwrap();

    assert_eq!(result.errors, vec!["Group missing name, skipped".to_string()]);
    assert_eq!(result.created, 2);
    assert!(
        store
            .find_group_by_name("Valid", false)
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(store.group_count(), 1);
}

#[tokio::test]
async fn import_restores_soft_deleted_group() {
    let store = Arc::new(MemoryContentStore::new());
    let group = store
        .create_group(fresco_kernel::models::CreateGroup {
            name: "Footers".to_string(),
            description: Some("old".to_string()),
            author_id: None,
        })
        .await
        .unwrap();
    store.soft_delete_group(group.id).await.unwrap();

    let archive = zip_manifest(&manifest(vec![manifest_group("Footers", vec![])]), &[]);
    let result = importer(&store).import_bytes(&archive).await.unwrap();

    assert_eq!(result.restored, 1);
    assert_eq!(result.created, 0);

    let restored = store
        .find_group_by_name("Footers", true)
        .await
        .unwrap()
        .unwrap();
    assert!(restored.deleted_at.is_none());
    // No duplicate row was created alongside the restored one.
    assert_eq!(store.group_count(), 1);
}

#[tokio::test]
async fn import_restores_soft_deleted_element() {
    let store = Arc::new(MemoryContentStore::new());
    let importer = importer(&store);

    let first = zip_manifest(
        &manifest(vec![manifest_group("Headers", vec![text_element("H1", "Hi")])]),
        &[],
    );
    importer.import_bytes(&first).await.unwrap();

    let group = store
        .find_group_by_name("Headers", false)
        .await
        .unwrap()
        .unwrap();
    let element = store
        .find_element_by_group_and_name(group.id, "H1", false)
        .await
        .unwrap()
        .unwrap();
    store.soft_delete_element(element.id).await.unwrap();

    let result = importer.import_bytes(&first).await.unwrap();

    // Group matched active (updated), element matched deleted (restored).
    assert_eq!(result.updated, 1);
    assert_eq!(result.restored, 1);
    assert_eq!(store.element_count(), 1);
}

#[tokio::test]
async fn content_type_never_silently_flips() {
    let store = Arc::new(MemoryContentStore::new());
    let importer = importer(&store);

    let first = zip_manifest(
        &manifest(vec![manifest_group("Headers", vec![text_element("H1", "Hi")])]),
        &[],
    );
    importer.import_bytes(&first).await.unwrap();

    let flip = zip_manifest(
        &manifest(vec![manifest_group(
            "Headers",
            vec![image_element("H1", "images/headers/h1.png")],
        )]),
        &[("images/headers/h1.png", png_bytes().as_slice())],
    );
    let result = importer.import_bytes(&flip).await.unwrap();

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("content type cannot change"));

    let group = store
        .find_group_by_name("Headers", false)
        .await
        .unwrap()
        .unwrap();
    let element = store
        .find_element_by_group_and_name(group.id, "H1", false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(element.content_type, ContentType::Text);
    assert_eq!(element.text_content.as_deref(), Some("Hi"));
}

#[tokio::test]
async fn oversize_archive_fails_before_extraction() {
    let store = Arc::new(MemoryContentStore::new());
    let importer = ContentImporter::with_limits(store.clone(), 1024, 500);

    let archive = zip_manifest(
        &manifest(vec![manifest_group("Big", vec![])]),
        &[("images/pad.png", vec![0u8; 4096].as_slice())],
    );

    let err = importer.import_bytes(&archive).await.unwrap_err();
    assert!(matches!(err, TransferError::ArchiveTooLarge { .. }));
    // Nothing was processed.
    assert_eq!(store.group_count(), 0);
    assert_eq!(store.cache_clear_count(), 0);
}

#[tokio::test]
async fn entry_cap_stops_extraction_but_keeps_going() {
    let store = Arc::new(MemoryContentStore::new());
    let importer = ContentImporter::with_limits(store.clone(), 50 * 1024 * 1024, 2);

    // content.json is the first entry, so it survives the cap.
    let archive = zip_manifest(
        &manifest(vec![manifest_group("Headers", vec![text_element("H1", "Hi")])]),
        &[
            ("extra/a.txt", b"a".as_slice()),
            ("extra/b.txt", b"b".as_slice()),
            ("extra/c.txt", b"c".as_slice()),
        ],
    );

    let result = importer.import_bytes(&archive).await.unwrap();

    assert_eq!(result.created, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("entry limit reached"));
}

#[tokio::test]
async fn traversal_entries_are_skipped() {
    let store = Arc::new(MemoryContentStore::new());

    let manifest_json =
        serde_json::to_vec_pretty(&manifest(vec![manifest_group("Safe", vec![])])).unwrap();
    let archive = zip_entries(&[
        ("content.json", manifest_json.as_slice()),
        ("../../evil.json", b"{}".as_slice()),
        ("/etc/passwd", b"root".as_slice()),
    ]);

    let result = importer(&store).import_bytes(&archive).await.unwrap();

    assert_eq!(result.created, 1);
    let unsafe_errors: Vec<_> = result
        .errors
        .iter()
        .filter(|e| e.contains("Unsafe archive entry skipped"))
        .collect();
    assert_eq!(unsafe_errors.len(), 2);
}

#[tokio::test]
async fn missing_manifest_is_fatal() {
    let store = Arc::new(MemoryContentStore::new());
    let archive = zip_entries(&[("images/logo.png", png_bytes().as_slice())]);

    let err = importer(&store).import_bytes(&archive).await.unwrap_err();
    assert!(matches!(err, TransferError::MissingManifest));
}

#[tokio::test]
async fn invalid_manifest_is_fatal() {
    let store = Arc::new(MemoryContentStore::new());

    let not_json = zip_entries(&[("content.json", b"not json".as_slice())]);
    assert!(matches!(
        importer(&store).import_bytes(&not_json).await.unwrap_err(),
        TransferError::InvalidManifest(_)
    ));

    let no_groups = zip_entries(&[("content.json", br#"{"version": 1}"#.as_slice())]);
    assert!(matches!(
        importer(&store).import_bytes(&no_groups).await.unwrap_err(),
        TransferError::InvalidManifest(_)
    ));

    // Fatal validation persists nothing.
    assert_eq!(store.group_count(), 0);
}

#[tokio::test]
async fn corrupt_container_is_fatal() {
    let store = Arc::new(MemoryContentStore::new());
    let err = importer(&store)
        .import_bytes(b"definitely not a zip")
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::InvalidArchive(_)));
}

#[tokio::test]
async fn attaches_image_and_focal_point() {
    let store = Arc::new(MemoryContentStore::new());
    let png = png_bytes();
    let archive = zip_manifest(
        &manifest(vec![manifest_group(
            "Media",
            vec![with_focal(
                image_element("Hero", "images/media/hero.png"),
                0.25,
                0.75,
            )],
        )]),
        &[("images/media/hero.png", png.as_slice())],
    );

    let result = importer(&store).import_bytes(&archive).await.unwrap();
    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);

    let group = store.find_group_by_name("Media", false).await.unwrap().unwrap();
    let element = store
        .find_element_by_group_and_name(group.id, "Hero", false)
        .await
        .unwrap()
        .unwrap();

    let image = store.image_for(element.id).unwrap();
    assert_eq!(image.bytes, png);
    assert_eq!(image.filename, "hero.png");
    assert_eq!(image.content_type, "image/png");

    use fresco_kernel::focal::HasFocalPoint;
    let focal = store
        .get_focal_point(&element.focal_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(focal.x, 0.25);
    assert_eq!(focal.y, 0.75);
}

#[tokio::test]
async fn out_of_range_focal_point_is_clamped() {
    let store = Arc::new(MemoryContentStore::new());
    let png = png_bytes();
    let archive = zip_manifest(
        &manifest(vec![manifest_group(
            "Media",
            vec![with_focal(
                image_element("Hero", "images/media/hero.png"),
                3.0,
                -1.0,
            )],
        )]),
        &[("images/media/hero.png", png.as_slice())],
    );

    importer(&store).import_bytes(&archive).await.unwrap();

    let group = store.find_group_by_name("Media", false).await.unwrap().unwrap();
    let element = store
        .find_element_by_group_and_name(group.id, "Hero", false)
        .await
        .unwrap()
        .unwrap();

    use fresco_kernel::focal::HasFocalPoint;
    let focal = store
        .get_focal_point(&element.focal_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(focal.x, 1.0);
    assert_eq!(focal.y, 0.0);
}

#[tokio::test]
async fn missing_image_file_is_a_per_item_error() {
    let store = Arc::new(MemoryContentStore::new());
    let archive = zip_manifest(
        &manifest(vec![manifest_group(
            "Media",
            vec![image_element("Hero", "images/media/absent.png")],
        )]),
        &[],
    );

    let result = importer(&store).import_bytes(&archive).await.unwrap();

    // The element itself was still created.
    assert_eq!(result.created, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("image file missing or unsupported"));

    let group = store.find_group_by_name("Media", false).await.unwrap().unwrap();
    let element = store
        .find_element_by_group_and_name(group.id, "Hero", false)
        .await
        .unwrap()
        .unwrap();
    assert!(store.image_for(element.id).is_none());
}

#[tokio::test]
async fn unsafe_image_path_is_a_per_item_error() {
    let store = Arc::new(MemoryContentStore::new());
    let archive = zip_manifest(
        &manifest(vec![manifest_group(
            "Media",
            vec![image_element("Hero", "../outside.png")],
        )]),
        &[],
    );

    let result = importer(&store).import_bytes(&archive).await.unwrap();

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("unsafe image path"));
}

#[tokio::test]
async fn image_attachment_on_text_element_is_rejected() {
    let store = Arc::new(MemoryContentStore::new());
    let png = png_bytes();

    let mut element = text_element("T", "hello");
    element.image_path = Some("images/t.png".to_string());

    let archive = zip_manifest(
        &manifest(vec![manifest_group("Mixed", vec![element])]),
        &[("images/t.png", png.as_slice())],
    );

    let result = importer(&store).import_bytes(&archive).await.unwrap();

    assert_eq!(result.created, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("image attachment rejected"));
}

#[tokio::test]
async fn request_cache_is_cleared_after_import() {
    let store = Arc::new(MemoryContentStore::new());
    let archive = zip_manifest(&manifest(vec![manifest_group("Headers", vec![])]), &[]);

    importer(&store).import_bytes(&archive).await.unwrap();

    assert_eq!(store.cache_clear_count(), 1);
}

#[tokio::test]
async fn failing_group_does_not_stop_later_groups() {
    let store = Arc::new(MemoryContentStore::new());

    // An element with no content_type cannot be created; its group still
    // counts, and the following group processes normally.
    let mut bad_element = text_element("Broken", "x");
    bad_element.content_type = None;

    let archive = zip_manifest(
        &manifest(vec![
            manifest_group("First", vec![bad_element]),
            manifest_group("Second", vec![text_element("Ok", "fine")]),
        ]),
        &[],
    );

    let result = importer(&store).import_bytes(&archive).await.unwrap();

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("content_type is required"));
    // Both groups plus the good element.
    assert_eq!(result.created, 3);
    assert!(
        store
            .find_group_by_name("Second", false)
            .await
            .unwrap()
            .is_some()
    );
}
