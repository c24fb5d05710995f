mod common;

use common::{launcher_context, quiet_context, RecordingLauncher};
use jarvis::error::ErrorKind;
use jarvis::platform::Platform;
use jarvis::tools::default_registry;
use jarvis::utils::preview::TRUNCATION_MARKER;
use serde_json::json;
use std::fs;

#[tokio::test]
async fn test_create_folder_default_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = quiet_context(dir.path(), Platform::Linux);
    let registry = default_registry();

    let first = registry.dispatch(&ctx, "create_folder", json!({})).await;
    let second = registry.dispatch(&ctx, "create_folder", json!({})).await;

    assert!(first.is_ok() && second.is_ok());
    assert_eq!(first.get("path"), second.get("path"));
    assert!(dir.path().join("NewFolder_Jarvis").is_dir());
}

#[tokio::test]
async fn test_create_folder_over_a_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("taken");
    fs::write(&file, "x").unwrap();
    let ctx = quiet_context(dir.path(), Platform::Linux);

    let result = default_registry()
        .dispatch(&ctx, "create_folder", json!({ "path": file.to_string_lossy() }))
        .await;
    assert_eq!(result.kind(), Some(ErrorKind::InvalidInput));
}

#[tokio::test]
async fn test_list_folder_items_sorted() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.txt", "a.txt", "c"] {
        fs::write(dir.path().join(name), "").unwrap();
    }
    let ctx = quiet_context(dir.path(), Platform::Linux);
    let registry = default_registry();

    let result = registry
        .dispatch(&ctx, "list_folder_items", json!({ "path": dir.path().to_string_lossy() }))
        .await;
    assert_eq!(result.get("count"), Some(&json!(3)));
    assert_eq!(result.get("items"), Some(&json!(["a.txt", "b.txt", "c"])));

    let missing = registry
        .dispatch(
            &ctx,
            "list_folder_items",
            json!({ "path": dir.path().join("nope").to_string_lossy() }),
        )
        .await;
    assert_eq!(missing.kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_open_file_uses_the_default_handler() {
    let dir = tempfile::tempdir().unwrap();
    let note = dir.path().join("note.txt");
    fs::write(&note, "hi").unwrap();
    let launcher = RecordingLauncher::new();
    let ctx = launcher_context(dir.path(), Platform::Linux, launcher.clone());
    let registry = default_registry();

    let file = registry
        .dispatch(&ctx, "open_file", json!({ "path": note.to_string_lossy() }))
        .await;
    assert_eq!(file.get("kind"), Some(&json!("file")));

    let docs = registry.dispatch(&ctx, "open_file", json!({})).await;
    assert_eq!(docs.get("kind"), Some(&json!("directory")));
    assert!(dir.path().join("Documents").is_dir());

    let missing = registry
        .dispatch(
            &ctx,
            "open_file",
            json!({ "path": dir.path().join("gone.txt").to_string_lossy() }),
        )
        .await;
    assert_eq!(missing.kind(), Some(ErrorKind::NotFound));

    let opened = launcher.opened();
    assert_eq!(opened.len(), 2);
    assert!(opened[0].ends_with("note.txt"));
    assert!(opened[1].ends_with("Documents"));
}

#[tokio::test]
async fn test_open_pdf_searches_subfolders() {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("Documents");
    fs::create_dir_all(docs.join("reports/2024")).unwrap();
    fs::write(docs.join("reports/2024/Summary.PDF"), "%PDF").unwrap();
    fs::write(docs.join("readme.txt"), "").unwrap();
    let launcher = RecordingLauncher::new();
    let ctx = launcher_context(dir.path(), Platform::Linux, launcher.clone());
    let registry = default_registry();

    let result = registry.dispatch(&ctx, "open_pdf_in_folder", json!({})).await;
    assert!(result.is_ok(), "{:?}", result);
    assert!(launcher.opened()[0].ends_with("Summary.PDF"));

    let empty = dir.path().join("empty");
    fs::create_dir_all(&empty).unwrap();
    let none = registry
        .dispatch(&ctx, "open_pdf_in_folder", json!({ "folder": empty.to_string_lossy() }))
        .await;
    assert_eq!(none.kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_read_file_text_truncates_long_text() {
    let dir = tempfile::tempdir().unwrap();
    let long = dir.path().join("long.txt");
    fs::write(&long, "é".repeat(2000)).unwrap();
    let short = dir.path().join("short.md");
    fs::write(&short, "  just a line \n").unwrap();
    let ctx = quiet_context(dir.path(), Platform::Linux);
    let registry = default_registry();

    let result = registry
        .dispatch(&ctx, "read_file_text", json!({ "path": long.to_string_lossy() }))
        .await;
    let text = result.get("text").and_then(|v| v.as_str()).unwrap();
    assert!(text.ends_with(TRUNCATION_MARKER));
    assert_eq!(text.chars().count(), 1500 + TRUNCATION_MARKER.chars().count());
    assert_eq!(result.get("truncated"), Some(&json!(true)));
    assert_eq!(result.get("total_chars"), Some(&json!(2000)));
    assert_eq!(result.get("method"), Some(&json!("plain")));

    let result = registry
        .dispatch(&ctx, "read_file_text", json!({ "path": short.to_string_lossy() }))
        .await;
    assert_eq!(result.get("text"), Some(&json!("just a line")));
    assert_eq!(result.get("truncated"), Some(&json!(false)));
}

#[tokio::test]
async fn test_read_file_text_failures() {
    let dir = tempfile::tempdir().unwrap();
    let blank = dir.path().join("blank.txt");
    fs::write(&blank, "   \n\n").unwrap();
    let binary = dir.path().join("blob.bin");
    fs::write(&binary, [0u8, 159, 146, 150]).unwrap();
    let image = dir.path().join("scan.png");
    fs::write(&image, [137u8, 80, 78, 71]).unwrap();
    let ctx = quiet_context(dir.path(), Platform::Linux);
    let registry = default_registry();
    let read = |path: &std::path::Path| json!({ "path": path.to_string_lossy() });

    let empty = registry.dispatch(&ctx, "read_file_text", read(&blank)).await;
    assert_eq!(empty.kind(), Some(ErrorKind::NotFound));
    assert!(empty.error().unwrap().starts_with("No text found"));

    let bin = registry.dispatch(&ctx, "read_file_text", read(&binary)).await;
    assert_eq!(bin.kind(), Some(ErrorKind::InvalidInput));

    let ocr = registry.dispatch(&ctx, "read_file_text", read(&image)).await;
    assert_eq!(ocr.kind(), Some(ErrorKind::DependencyUnavailable));
    assert!(ocr.error().unwrap().contains("tesseract"));

    let missing = registry
        .dispatch(&ctx, "read_file_text", read(&dir.path().join("missing.txt")))
        .await;
    assert_eq!(missing.kind(), Some(ErrorKind::NotFound));
}
