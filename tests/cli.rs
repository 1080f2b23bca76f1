use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn mact_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("mact");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // No [llm] endpoint: every model call fails and is skipped per chunk.
    let config_content = format!(
        r#"[db]
path = "{}/data/mact.sqlite"

[storage]
root = "{}/documents"

[chunking]
max_chars = 1000

[logging]
level = "warn"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("mact.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_mact(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = mact_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run mact binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn add_meeting(config_path: &Path, title: &str) -> String {
    let (stdout, stderr, success) = run_mact(
        config_path,
        &["meeting", "add", title, "--date", "2024-05-02"],
    );
    assert!(success, "meeting add failed: {}", stderr);
    stdout.trim().to_string()
}

fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_mact(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_mact(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = run_mact(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_meeting_add_and_list() {
    let (_tmp, config_path) = setup_test_env();
    run_mact(&config_path, &["init"]);

    let id = add_meeting(&config_path, "Sprint planning");
    assert!(!id.is_empty());

    let (stdout, _, success) = run_mact(&config_path, &["meeting", "list"]);
    assert!(success);
    assert!(stdout.contains(&id));
    assert!(stdout.contains("Sprint planning"));
    assert!(stdout.contains("upcoming"));

    let (stdout, _, success) = run_mact(&config_path, &["meeting", "show", &id]);
    assert!(success);
    assert!(stdout.contains("2024-05-02"));
}

#[test]
fn test_meeting_show_missing_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_mact(&config_path, &["init"]);

    let (_, stderr, success) = run_mact(&config_path, &["meeting", "show", "nope"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_items_add_edit_and_sort() {
    let (_tmp, config_path) = setup_test_env();
    run_mact(&config_path, &["init"]);
    let meeting = add_meeting(&config_path, "Ops review");

    let (low, _, ok1) = run_mact(
        &config_path,
        &["items", "add", &meeting, "Rotate keys", "--priority", "low"],
    );
    let (_, _, ok2) = run_mact(
        &config_path,
        &["items", "add", &meeting, "Fix alerting", "--priority", "critical"],
    );
    assert!(ok1 && ok2);

    let (stdout, _, success) = run_mact(
        &config_path,
        &["items", "list", &meeting, "--sort", "priority", "--desc"],
    );
    assert!(success);
    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.contains("Fix alerting"), "unexpected order: {}", stdout);

    let (stdout, stderr, success) = run_mact(
        &config_path,
        &["items", "edit", low.trim(), "--status", "completed", "--assignee", "Sam"],
    );
    assert!(success, "edit failed: {}", stderr);
    assert!(stdout.contains("[Completed]"));
    assert!(stdout.contains("@Sam"));
}

#[test]
fn test_items_list_rejects_unknown_sort() {
    let (_tmp, config_path) = setup_test_env();
    run_mact(&config_path, &["init"]);
    let meeting = add_meeting(&config_path, "Ops review");

    let (_, _, success) = run_mact(&config_path, &["items", "list", &meeting, "--sort", "rowid"]);
    assert!(!success);
}

#[test]
fn test_upload_without_model_keeps_chunks() {
    let (tmp, config_path) = setup_test_env();
    run_mact(&config_path, &["init"]);
    let meeting = add_meeting(&config_path, "Design review");

    let docx = tmp.path().join("minutes.docx");
    fs::write(&docx, minimal_docx(&["Priya will update the schema.", "Next review on Monday."])).unwrap();

    let (stdout, stderr, success) = run_mact(
        &config_path,
        &["upload", &meeting, docx.to_str().unwrap(), "--user", "priya"],
    );
    assert!(success, "upload failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("chunks:            1"));
    assert!(stdout.contains("action items:      0"));

    let (stdout, _, success) = run_mact(&config_path, &["chunks", &meeting]);
    assert!(success);
    assert!(stdout.contains("Priya will update the schema."));

    let stored = tmp.path().join("documents").join("priya").join(&meeting);
    assert_eq!(fs::read_dir(stored).unwrap().count(), 1);
}

#[test]
fn test_upload_rejects_unsupported_file() {
    let (tmp, config_path) = setup_test_env();
    run_mact(&config_path, &["init"]);
    let meeting = add_meeting(&config_path, "Design review");

    let notes = tmp.path().join("notes.txt");
    fs::write(&notes, "plain text").unwrap();

    let (_, stderr, success) = run_mact(&config_path, &["upload", &meeting, notes.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("unsupported file format"));
}

#[test]
fn test_summarize_without_items() {
    let (_tmp, config_path) = setup_test_env();
    run_mact(&config_path, &["init"]);
    let meeting = add_meeting(&config_path, "Kickoff");

    let (stdout, _, success) = run_mact(&config_path, &["summarize", &meeting]);
    assert!(success);
    assert!(stdout.contains("No action items found"));
}

#[test]
fn test_brd_template_save_and_history() {
    let (tmp, config_path) = setup_test_env();
    run_mact(&config_path, &["init"]);
    let meeting = add_meeting(&config_path, "Discovery");

    let (stdout, stderr, success) = run_mact(&config_path, &["brd", "show", &meeting]);
    assert!(success);
    assert!(stderr.contains("template"));
    assert!(stdout.contains("Business Requirements Document"));

    let draft = tmp.path().join("brd.md");
    fs::write(&draft, "# BRD\n\nfirst draft").unwrap();
    let (stdout, _, success) = run_mact(&config_path, &["brd", "save", &meeting, draft.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("saved version 1"));

    fs::write(&draft, "# BRD\n\nsecond draft").unwrap();
    run_mact(&config_path, &["brd", "save", &meeting, draft.to_str().unwrap()]);

    let (stdout, _, _) = run_mact(&config_path, &["brd", "history", &meeting]);
    let versions: Vec<&str> = stdout.lines().collect();
    assert_eq!(versions.len(), 2);
    assert!(versions[0].starts_with("v2"));

    let (stdout, _, _) = run_mact(&config_path, &["brd", "show", &meeting, "--version", "1"]);
    assert!(stdout.contains("first draft"));
}

#[test]
fn test_brd_regenerate_without_items_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_mact(&config_path, &["init"]);
    let meeting = add_meeting(&config_path, "Discovery");

    let (_, stderr, success) = run_mact(&config_path, &["brd", "regenerate", &meeting]);
    assert!(!success);
    assert!(stderr.contains("No action items found"));
}
