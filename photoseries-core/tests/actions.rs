use std::path::Path;
use std::sync::Arc;

use image::{Rgb, RgbImage};
use photoseries_core::keys::series_prefix;
use photoseries_core::memory::BlobOp;
use photoseries_core::scan::ScanOptions;
use photoseries_core::{
    ActionError, ActionOptions, BlobStore, ManifestError, MemoryBlobStore, ScanError, SeriesActions,
};
use tempfile::TempDir;
use uuid::Uuid;

const MANIFEST_KEY: &str = "manifest.json";

fn series_dir(title: &str, images: &[(&str, u32, u32)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("title.txt"), format!("{title}\n")).unwrap();
    for (name, width, height) in images {
        RgbImage::from_pixel(*width, *height, Rgb([40, 90, 160]))
            .save(tmp.path().join(name))
            .unwrap();
    }
    tmp
}

fn bird() -> TempDir {
    series_dir("Bird", &[("A1-heron.png", 60, 40), ("A2-crow.png", 30, 30), ("B1-egg.png", 20, 40)])
}

fn car() -> TempDir {
    series_dir("Car", &[("A1-red car.png", 80, 40)])
}

fn island() -> TempDir {
    series_dir("Island", &[("A1-beach.png", 50, 50), ("A2-palm.png", 20, 50)])
}

fn hallway() -> TempDir {
    series_dir("Hallway", &[("A1-door.png", 40, 80)])
}

fn setup() -> (Arc<MemoryBlobStore>, SeriesActions) {
    let blobs = Arc::new(MemoryBlobStore::new("photos"));
    let actions = SeriesActions::new(blobs.clone(), MANIFEST_KEY);
    (blobs, actions)
}

fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

async fn titles(actions: &SeriesActions) -> Vec<String> {
    actions
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|series| series.title)
        .collect()
}

async fn add(actions: &SeriesActions, dir: &Path, after: Option<&str>) -> String {
    actions.add(dir, &new_uuid(), after).await.unwrap()
}

fn keys_under(blobs: &MemoryBlobStore, series_uuid: &str) -> Vec<String> {
    let prefix = series_prefix(series_uuid);
    blobs.keys().into_iter().filter(|k| k.starts_with(&prefix)).collect()
}

#[tokio::test]
async fn add_then_add_after() {
    let (blobs, actions) = setup();
    let (bird, car, island) = (bird(), car(), island());

    let bird_uuid = add(&actions, bird.path(), None).await;
    assert_eq!(titles(&actions).await, ["Bird"]);

    let car_uuid = add(&actions, car.path(), None).await;
    assert_eq!(titles(&actions).await, ["Car", "Bird"]);

    let island_uuid = add(&actions, island.path(), Some(&car_uuid)).await;
    assert_eq!(titles(&actions).await, ["Car", "Island", "Bird"]);

    let manifest = actions.list().await.unwrap();
    let uuids: Vec<&str> = manifest.iter().map(|s| s.uuid.as_str()).collect();
    assert_eq!(uuids, [car_uuid.as_str(), island_uuid.as_str(), bird_uuid.as_str()]);

    // Every referenced key resolves to a stored object.
    for image in manifest.iter().flat_map(|s| s.images()) {
        assert!(blobs.object(&image.key).is_some(), "missing {}", image.key);
        assert!(blobs.object(&image.thumb_key).is_some(), "missing {}", image.thumb_key);
    }
    assert!(actions.audit().await.unwrap().is_consistent());
}

#[tokio::test]
async fn manifest_entry_describes_images() {
    let (blobs, actions) = setup();
    let bird = bird();
    let uuid = add(&actions, bird.path(), None).await;

    let manifest = actions.list().await.unwrap();
    let series = &manifest[0];
    assert_eq!(series.uuid, uuid);
    assert_eq!(series.title, "Bird");
    assert_eq!(series.rows.len(), 2);

    let heron = &series.rows[0][0];
    assert_eq!(heron.alt, "heron");
    assert_eq!((heron.width, heron.height), (60, 40));
    assert_eq!(heron.key, format!("{uuid}_Bird/A1-heron.png"));
    assert_eq!(heron.thumb_key, format!("{uuid}_Bird/A1-heron-thumb.jpg"));
    assert_eq!(series.rows[1][0].alt, "egg");

    assert_eq!(blobs.object(&heron.key).unwrap().content_type, "image/png");
    assert_eq!(blobs.object(&heron.thumb_key).unwrap().content_type, "image/jpeg");
    assert_eq!(keys_under(&blobs, &uuid).len(), 6);
}

#[tokio::test]
async fn update_preserves_position_and_uuid() {
    let (blobs, actions) = setup();
    let (bird, car, island, hallway) = (bird(), car(), island(), hallway());

    add(&actions, bird.path(), None).await;
    let car_uuid = add(&actions, car.path(), None).await;
    let island_uuid = add(&actions, island.path(), Some(&car_uuid)).await;

    actions.update(hallway.path(), &island_uuid).await.unwrap();

    assert_eq!(titles(&actions).await, ["Car", "Hallway", "Bird"]);
    let manifest = actions.list().await.unwrap();
    assert_eq!(manifest[1].uuid, island_uuid);

    let keys = keys_under(&blobs, &island_uuid);
    assert_eq!(
        keys,
        [
            format!("{island_uuid}_Hallway/A1-door-thumb.jpg"),
            format!("{island_uuid}_Hallway/A1-door.png"),
        ]
    );
    assert!(actions.audit().await.unwrap().is_consistent());
}

#[tokio::test]
async fn update_of_first_series_keeps_it_first() {
    let (_, actions) = setup();
    let (bird, car, hallway) = (bird(), car(), hallway());

    add(&actions, bird.path(), None).await;
    let car_uuid = add(&actions, car.path(), None).await;

    actions.update(hallway.path(), &car_uuid).await.unwrap();
    assert_eq!(titles(&actions).await, ["Hallway", "Bird"]);
}

#[tokio::test]
async fn update_with_broken_directory_keeps_old_series() {
    let (blobs, actions) = setup();
    let bird = bird();
    let uuid = add(&actions, bird.path(), None).await;
    let before = blobs.keys();

    let broken = series_dir("Broken", &[("A1-fine.png", 10, 10)]);
    std::fs::write(broken.path().join("not-a-row.png"), "x").unwrap();

    let err = actions.update(broken.path(), &uuid).await.unwrap_err();
    assert!(matches!(err, ActionError::Scan(_)));
    assert!(!err.is_out_of_sync());
    assert_eq!(titles(&actions).await, ["Bird"]);
    assert_eq!(blobs.keys(), before);
}

#[tokio::test]
async fn delete_removes_entry_and_objects() {
    let (blobs, actions) = setup();
    let (bird, car) = (bird(), car());
    let bird_uuid = add(&actions, bird.path(), None).await;
    let car_uuid = add(&actions, car.path(), None).await;

    let deleted = actions.delete(&bird_uuid).await.unwrap();
    assert_eq!(deleted.title, "Bird");
    assert_eq!(deleted.previous.as_deref(), Some(car_uuid.as_str()));

    assert_eq!(titles(&actions).await, ["Car"]);
    assert!(keys_under(&blobs, &bird_uuid).is_empty());
    assert_eq!(keys_under(&blobs, &car_uuid).len(), 2);

    let deleted = actions.delete(&car_uuid).await.unwrap();
    assert_eq!(deleted.previous, None);
}

#[tokio::test]
async fn delete_unknown_series() {
    let (blobs, actions) = setup();
    let bird = bird();
    add(&actions, bird.path(), None).await;
    let before = blobs.keys();

    let ghost = new_uuid();
    let err = actions.delete(&ghost).await.unwrap_err();
    assert!(matches!(err, ActionError::NotFound(ref uuid) if *uuid == ghost));
    assert_eq!(blobs.keys(), before);
}

#[tokio::test]
async fn delete_all_leaves_empty_manifest() {
    let (blobs, actions) = setup();
    let (bird, car, island) = (bird(), car(), island());
    add(&actions, bird.path(), None).await;
    add(&actions, car.path(), None).await;
    add(&actions, island.path(), None).await;

    assert_eq!(actions.delete_all().await.unwrap(), 3);

    assert_eq!(actions.manifests().get().await.unwrap(), Some(Vec::new()));
    assert_eq!(blobs.keys(), [MANIFEST_KEY]);
}

#[tokio::test]
async fn deleting_every_series_one_by_one_leaves_empty_manifest() {
    let (_, actions) = setup();
    let (bird, car) = (bird(), car());
    let bird_uuid = add(&actions, bird.path(), None).await;
    let car_uuid = add(&actions, car.path(), None).await;

    actions.delete(&car_uuid).await.unwrap();
    actions.delete(&bird_uuid).await.unwrap();

    assert_eq!(actions.manifests().get().await.unwrap(), Some(Vec::new()));
}

#[tokio::test]
async fn missing_bucket_aborts() {
    let blobs = Arc::new(MemoryBlobStore::without_bucket("gone"));
    let actions = SeriesActions::new(blobs.clone(), MANIFEST_KEY);
    let bird = bird();

    let err = actions.add(bird.path(), &new_uuid(), None).await.unwrap_err();
    assert!(matches!(err, ActionError::BucketMissing { .. }));
    assert!(blobs.keys().is_empty());
}

#[tokio::test]
async fn add_after_unknown_series_changes_nothing() {
    let (blobs, actions) = setup();
    let (bird, car) = (bird(), car());
    add(&actions, bird.path(), None).await;
    let before = blobs.keys();

    let err = actions
        .add(car.path(), &new_uuid(), Some(&new_uuid()))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::NotFound(_)));
    assert_eq!(blobs.keys(), before);
    assert!(!car.path().join("A1-red car-thumb.jpg").exists());
}

#[tokio::test]
async fn adding_an_existing_uuid_is_rejected() {
    let (_, actions) = setup();
    let (bird, car) = (bird(), car());
    let uuid = add(&actions, bird.path(), None).await;

    let err = actions.add(car.path(), &uuid, None).await.unwrap_err();
    assert!(matches!(err, ActionError::Duplicate(_)));
    assert_eq!(titles(&actions).await, ["Bird"]);
}

#[tokio::test]
async fn undecodable_image_uploads_nothing() {
    let (blobs, actions) = setup();
    let broken = series_dir("Broken", &[("A1-fine.png", 10, 10)]);
    std::fs::write(broken.path().join("A2-corrupt.png"), "not a png").unwrap();

    let err = actions.add(broken.path(), &new_uuid(), None).await.unwrap_err();
    assert!(matches!(err, ActionError::Thumbnail(_)));
    assert!(blobs.keys().is_empty());
}

#[tokio::test]
async fn unreadable_manifest_is_never_clobbered() {
    let (blobs, actions) = setup();
    blobs
        .put(MANIFEST_KEY, b"definitely not json".to_vec(), "application/json")
        .await
        .unwrap();
    let bird = bird();

    let err = actions.add(bird.path(), &new_uuid(), None).await.unwrap_err();
    assert!(matches!(err, ActionError::Manifest(ManifestError::Parse { .. })));
    assert_eq!(blobs.keys(), [MANIFEST_KEY]);
    assert_eq!(blobs.object(MANIFEST_KEY).unwrap().data, b"definitely not json");
}

#[tokio::test]
async fn failed_upload_leaves_manifest_untouched() {
    let (blobs, actions) = setup();
    let (bird, car) = (bird(), car());
    add(&actions, bird.path(), None).await;

    blobs.fail_on(BlobOp::Put, "red-car-thumb");
    let car_uuid = new_uuid();
    let err = actions.add(car.path(), &car_uuid, None).await.unwrap_err();

    assert!(err.is_out_of_sync());
    assert_eq!(titles(&actions).await, ["Bird"]);

    // The full image made it up and is now an orphan.
    let audit = actions.audit().await.unwrap();
    assert_eq!(audit.orphaned, [format!("{car_uuid}_Car/A1-red-car.png")]);
    assert!(audit.missing.is_empty());

    blobs.clear_faults();
    let purged = actions.purge_orphans().await.unwrap();
    assert_eq!(purged.succeeded, 1);
    assert!(actions.audit().await.unwrap().is_consistent());
}

#[tokio::test]
async fn failed_manifest_write_is_out_of_sync() {
    let (blobs, actions) = setup();
    let bird = bird();
    blobs.fail_on(BlobOp::Put, MANIFEST_KEY);

    let uuid = new_uuid();
    let err = actions.add(bird.path(), &uuid, None).await.unwrap_err();

    match err {
        ActionError::OutOfSync { series_uuid, .. } => assert_eq!(series_uuid, uuid),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(keys_under(&blobs, &uuid).len(), 6);
    assert!(!actions.manifests().exists().await.unwrap());
}

#[tokio::test]
async fn failed_object_delete_never_leaves_dangling_references() {
    let (blobs, actions) = setup();
    let bird = bird();
    let uuid = add(&actions, bird.path(), None).await;

    blobs.fail_on(BlobOp::Delete, "A2-crow.png");
    let err = actions.delete(&uuid).await.unwrap_err();

    assert!(err.is_out_of_sync());
    assert!(titles(&actions).await.is_empty());
    let audit = actions.audit().await.unwrap();
    assert!(audit.missing.is_empty());
    assert_eq!(audit.orphaned, [format!("{uuid}_Bird/A2-crow.png")]);
}

#[tokio::test]
async fn audit_reports_missing_objects() {
    let (blobs, actions) = setup();
    let car = car();
    let uuid = add(&actions, car.path(), None).await;

    let lost = format!("{uuid}_Car/A1-red-car.png");
    blobs.delete(&lost).await.unwrap();
    blobs.put("robots.txt", Vec::new(), "text/plain").await.unwrap();

    let audit = actions.audit().await.unwrap();
    assert!(!audit.is_consistent());
    assert_eq!(audit.missing, [lost]);
    assert_eq!(audit.unrecognized, ["robots.txt"]);
    assert_eq!(audit.series, 1);
}

#[tokio::test]
async fn re_adding_a_directory_reuses_thumbnails() {
    let (_, actions) = setup();
    let bird = bird();
    let first = add(&actions, bird.path(), None).await;
    let thumb = bird.path().join("A1-heron-thumb.jpg");
    let modified = std::fs::metadata(&thumb).unwrap().modified().unwrap();

    actions.delete(&first).await.unwrap();
    add(&actions, bird.path(), None).await;

    assert_eq!(std::fs::metadata(&thumb).unwrap().modified().unwrap(), modified);
    assert_eq!(titles(&actions).await, ["Bird"]);
}

#[tokio::test]
async fn colliding_file_names_upload_nothing() {
    let blobs = Arc::new(MemoryBlobStore::new("photos"));
    let actions = SeriesActions::new(blobs.clone(), MANIFEST_KEY).with_options(ActionOptions {
        scan: ScanOptions::with_extensions(["png", "jpg"]),
        ..ActionOptions::default()
    });
    let dir = series_dir(
        "Twins",
        &[("A1-x.png", 20, 10), ("A1-x.jpg", 10, 20), ("A2-x.jpg", 10, 10), ("A3-y.jpg", 10, 10)],
    );

    let err = actions.add(dir.path(), &new_uuid(), None).await.unwrap_err();

    assert!(matches!(err, ActionError::Scan(ScanError::KeyCollision { .. })));
    assert!(blobs.keys().is_empty());
}
