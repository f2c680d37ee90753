use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use photodesk::inject::png_chunk;

const MISSING_KEY_ENV: &str = "PDESK_TEST_MISSING_OPENAI_KEY";

fn pdesk_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pdesk"))
}

fn setup_test_env(caption_mode: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    fs::create_dir_all(root.join("Downloads")).unwrap();

    fs::write(
        root.join("candidates.json"),
        r#"[
  {
    "provider": "getty",
    "title": "Wildfire smoke covers downtown",
    "page_url": "https://www.gettyimages.com/detail/news-photo/2261576047",
    "image_url": "https://media.gettyimages.com/id/2261576047/photo.jpg",
    "caption": "Smoke from a wildfire drifts over the city skyline at dusk as crews work nearby",
    "captured_at": "2026-02-18T14:05:00Z"
  },
  {
    "provider": "ap",
    "title": "Harbor cranes unload containers",
    "page_url": "https://apnews.com/photo/harbor-cranes",
    "caption": "Cranes unload containers at the port"
  },
  {
    "provider": "ap",
    "title": "Firefighters battle wildfire near homes",
    "page_url": "https://apnews.com/photo/firefighters",
    "caption": "Firefighters work a fire line",
    "captured_at": "2026-02-10"
  }
]"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[caption]
mode = "{mode}"
max_words = 6

[llm]
api_key_env = "{key_env}"

[watcher]
downloads_dir = "{root}/Downloads"
pending_path = "{root}/pending_downloads.json"
state_path = "{root}/captioner_state.json"
"#,
        mode = caption_mode,
        key_env = MISSING_KEY_ENV,
        root = root.display()
    );
    let config_path = root.join("photodesk.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pdesk(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pdesk_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove(MISSING_KEY_ENV)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pdesk binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn tiny_png() -> Vec<u8> {
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&[8, 0, 0, 0, 0]);
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.extend(png_chunk(b"IHDR", &ihdr));
    png.extend(png_chunk(b"IDAT", &[0x78, 0x9c, 0x63, 0x60, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01]));
    png.extend(png_chunk(b"IEND", &[]));
    png
}

fn candidates_arg(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .join("candidates.json")
        .to_string_lossy()
        .to_string()
}

#[test]
fn test_search_template_output() {
    let (_tmp, config) = setup_test_env("template");
    let candidates = candidates_arg(&config);
    let (stdout, stderr, success) = run_pdesk(
        &config,
        &["search", "wildfire smoke downtown", "--candidates", &candidates],
    );
    assert!(success, "search failed: {}", stderr);

    assert!(stdout.contains("[1] GETTY  score="), "stdout: {}", stdout);
    assert!(stdout.contains("Title: Wildfire smoke covers downtown"));
    assert!(stdout.contains("Edited Caption: Smoke from a wildfire drifts over..."));
    assert!(stdout.contains("Caption Engine: template"));
    assert!(stdout.contains("Date: 2026-02-18 14:05 UTC"));
    assert!(!stdout.contains("Harbor cranes"));
    assert!(!stderr.contains("AI caption rules"));
}

#[test]
fn test_search_json_with_explain() {
    let (_tmp, config) = setup_test_env("template");
    let candidates = candidates_arg(&config);
    let (stdout, stderr, success) = run_pdesk(
        &config,
        &[
            "search",
            "wildfire",
            "--candidates",
            &candidates,
            "--json",
            "--explain",
            "--top",
            "1",
        ],
    );
    assert!(success, "search failed: {}", stderr);

    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["caption_engine"], "template");
    assert_eq!(results[0]["features"]["overlap_terms"], 1);
}

#[test]
fn test_search_llm_mode_without_key_warns() {
    let (_tmp, config) = setup_test_env("llm");
    let candidates = candidates_arg(&config);
    let (stdout, stderr, success) = run_pdesk(
        &config,
        &["search", "wildfire smoke", "--candidates", &candidates],
    );
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("Caption Engine: template"));
    assert!(stdout.contains(&format!("Caption Note: {} is not set", MISSING_KEY_ENV)));
    assert!(stderr.contains(&format!(
        "AI caption rules were not applied to all results. Reason: {} is not set",
        MISSING_KEY_ENV
    )));
}

#[test]
fn test_search_missing_candidates_is_empty() {
    let (_tmp, config) = setup_test_env("template");
    let (stdout, _stderr, success) = run_pdesk(
        &config,
        &["search", "wildfire", "--candidates", "/nonexistent/candidates.json"],
    );
    assert!(success);
    assert!(stdout.contains("No results found."));
}

#[test]
fn test_explicit_missing_config_fails() {
    let (stdout, stderr, success) = run_pdesk(
        Path::new("/nonexistent/photodesk.toml"),
        &["pending", "list"],
    );
    assert!(!success, "stdout: {}", stdout);
    assert!(stderr.contains("/nonexistent/photodesk.toml"));
}

#[test]
fn test_pending_add_and_list() {
    let (tmp, config) = setup_test_env("template");
    let (stdout, stderr, success) = run_pdesk(
        &config,
        &[
            "pending",
            "add",
            "--page-url",
            "https://www.gettyimages.com/detail/news-photo/2261576047",
            "--title",
            "Wildfire smoke covers downtown",
            "--caption",
            "Smoke drifts over the skyline.",
        ],
    );
    assert!(success, "pending add failed: {}", stderr);
    assert!(stdout.starts_with("Queued "));

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("pending_downloads.json")).unwrap())
            .unwrap();
    assert_eq!(saved[0]["asset_id"], "2261576047");
    assert_eq!(saved[0]["matched"], false);

    let (stdout, _stderr, success) = run_pdesk(&config, &["pending", "list"]);
    assert!(success);
    assert!(stdout.contains("[waiting]  Wildfire smoke covers downtown"));
    assert!(stdout.contains("asset: 2261576047"));
}

#[test]
fn test_watch_once_injects_matching_download() {
    let (tmp, config) = setup_test_env("template");
    let (_stdout, stderr, success) = run_pdesk(
        &config,
        &[
            "pending",
            "add",
            "--page-url",
            "https://www.gettyimages.com/detail/news-photo/2261576047",
            "--title",
            "Wildfire smoke covers downtown",
            "--caption",
            "Smoke drifts over the skyline.",
        ],
    );
    assert!(success, "pending add failed: {}", stderr);

    let download = tmp.path().join("Downloads").join("GettyImages-2261576047.png");
    fs::write(&download, tiny_png()).unwrap();
    fs::write(tmp.path().join("Downloads").join("notes.txt"), "unrelated").unwrap();

    let (stdout, stderr, success) = run_pdesk(&config, &["watch", "--once"]);
    assert!(success, "watch failed: {}", stderr);
    assert!(stdout.contains("Caption injected: GettyImages-2261576047.png"), "stdout: {}", stdout);

    let bytes = fs::read(&download).unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("Description\0Smoke drifts over the skyline."));
    assert!(text.contains("Credit\0Getty Images"));

    let pending: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("pending_downloads.json")).unwrap())
            .unwrap();
    assert_eq!(pending[0]["matched"], true);
    let canonical = fs::canonicalize(&download).unwrap();
    assert_eq!(pending[0]["matched_file"], &*canonical.to_string_lossy());

    let state: Vec<String> =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("captioner_state.json")).unwrap())
            .unwrap();
    assert_eq!(state, vec![canonical.to_string_lossy().to_string()]);

    // Second pass: the file is processed and the record matched.
    let (stdout, _stderr, success) = run_pdesk(&config, &["watch", "--once"]);
    assert!(success);
    assert!(!stdout.contains("Caption injected"));
    assert_eq!(fs::read(&download).unwrap(), bytes);
}

#[test]
fn test_watch_once_idle_writes_nothing() {
    let (tmp, config) = setup_test_env("template");
    fs::write(tmp.path().join("Downloads").join("holiday.png"), tiny_png()).unwrap();

    let (stdout, stderr, success) = run_pdesk(&config, &["watch", "--once"]);
    assert!(success, "watch failed: {}", stderr);
    assert!(stdout.is_empty());
    assert!(!tmp.path().join("captioner_state.json").exists());
    assert!(!tmp.path().join("pending_downloads.json").exists());
}
