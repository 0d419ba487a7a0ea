use std::process::Command;

use ultra_vector::{StoreOptions, VectorChunk, VectorStore};

fn ultra_index() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ultra-index"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn seed_store(root: &std::path::Path) {
    let store = VectorStore::open_project(root, StoreOptions::default()).unwrap();
    store
        .upsert(&VectorChunk {
            id: "src/lib.rs#0".into(),
            relative_path: "src/lib.rs".into(),
            text: "pub fn answer() -> u32 { 42 }".into(),
            content_hash: "hash".into(),
            mtime_ms: 1,
            embedding: vec![0.0, 1.0, 0.0],
            created_at: 1,
        })
        .unwrap();
}

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = ultra_index()
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "ultra-index init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".ultra-mcp.toml");
    assert!(config_path.exists(), ".ultra-mcp.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[embedding]"));
    assert!(content.contains("[index]"));

    let config: ultra_core::UltraConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.index.chunk_size, 1500);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".ultra-mcp.toml"), "# existing").unwrap();

    let output = ultra_index()
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".ultra-mcp.toml")).unwrap(),
        "# existing"
    );
}

#[test]
fn stats_without_index_fails_without_creating_one() {
    let dir = tempfile::tempdir().unwrap();

    let output = ultra_index()
        .args(["stats", "--path"])
        .arg(dir.path())
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(!dir.path().join(".ultra-mcp").exists());
}

#[test]
fn stats_and_clear_work_without_api_key() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());

    let output = ultra_index()
        .args(["--format", "json", "stats", "--path"])
        .arg(dir.path())
        .current_dir(dir.path())
        .env_remove("OPENAI_API_KEY")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stats failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["totalChunks"], 1);
    assert_eq!(stats["totalFiles"], 1);
    assert_eq!(stats["dimensions"], 3);

    let output = ultra_index()
        .args(["clear", "--path"])
        .arg(dir.path())
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let store = VectorStore::open_project(dir.path(), StoreOptions::default()).unwrap();
    assert_eq!(store.count(), 0);
}

#[test]
fn search_without_api_key_reports_env_var() {
    let dir = tempfile::tempdir().unwrap();
    seed_store(dir.path());

    let output = ultra_index()
        .args(["search", "answer", "--path"])
        .arg(dir.path())
        .current_dir(dir.path())
        .env_remove("OPENAI_API_KEY")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "{stderr}");
}
