//! CLI integration tests
use std::path::Path;

use predicates::prelude::*;
use tempfile::TempDir;

const LOCATORS: &str = "\
version: 2
post_container: article.post
post_text: .message
post_author: a.author
permalink: a.permalink
reaction_count: .reactions
";

const FEED: &str = r#"
<html><body>
<div role="feed">
    <article class="post">
        <a class="author" href="https://example.com/ann">Ann</a>
        <div class="message">Rust 2024 edition is out</div>
        <span class="reactions">12</span>
        <a class="permalink" href="https://example.com/posts/1">link</a>
    </article>
    <article class="post">
        <a class="author" href="https://example.com/bob">Bob</a>
        <div class="message">Weekend cooking, "with quotes", and commas</div>
        <span class="reactions">3</span>
        <a class="permalink" href="https://example.com/posts/2">link</a>
    </article>
</div>
</body></html>
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("locators.txt"), LOCATORS).unwrap();
        std::fs::write(dir.path().join("feed.html"), FEED).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> String {
        self.dir.path().join(name).display().to_string()
    }

    fn data_dir(&self) -> String {
        self.path("data")
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("feedharvest");
        cmd.env("HOME", self.dir.path()).env_remove("RUST_LOG");
        cmd.args(["--data-dir", &self.data_dir()]);
        cmd
    }

    fn harvest(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args(["harvest", &self.path("feed.html")])
            .args(["--locator-file", &self.path("locators.txt")])
            .args(["--scroll-delay", "0", "--no-settle"])
            .assert()
    }
}

fn stats_json(workspace: &Workspace) -> serde_json::Value {
    let output = workspace.cmd().args(["stats", "--json"]).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_cli_help_lists_subcommands() {
    assert_cmd::cargo::cargo_bin_cmd!("feedharvest")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("harvest"))
        .stdout(predicate::str::contains("stats"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("clear"));
}

#[test]
fn test_cli_harvest_then_stats() {
    let workspace = Workspace::new();

    workspace.harvest().success().stderr(predicate::str::contains("2 new posts"));
    assert!(Path::new(&workspace.data_dir()).join("dataset.json").exists());

    let stats = stats_json(&workspace);
    assert_eq!(stats["totalPosts"], 2);
    assert_eq!(stats["totalProfiles"], 2);
    assert_eq!(stats["totalEngagement"], 15);
}

#[test]
fn test_cli_harvest_twice_adds_nothing() {
    let workspace = Workspace::new();

    workspace.harvest().success();
    workspace.harvest().success().stderr(predicate::str::contains("0 new posts"));

    assert_eq!(stats_json(&workspace)["totalPosts"], 2);
}

#[test]
fn test_cli_stats_text_summary() {
    let workspace = Workspace::new();
    workspace.harvest().success();

    workspace
        .cmd()
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Top authors"));
}

#[test]
fn test_cli_export_csv() {
    let workspace = Workspace::new();
    workspace.harvest().success();

    workspace
        .cmd()
        .args(["export", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "ID,Text,Author Name,Author Profile,Timestamp,Reactions,CommentsCount,SharesCount,URL,ScrapedAt",
        ))
        .stdout(predicate::str::contains("\"Weekend cooking, \"\"with quotes\"\", and commas\""));
}

#[test]
fn test_cli_export_profiles_csv() {
    let workspace = Workspace::new();
    workspace.harvest().success();

    workspace
        .cmd()
        .args(["export", "-f", "csv", "--kind", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://example.com/ann"));
}

#[test]
fn test_cli_export_json_to_file() {
    let workspace = Workspace::new();
    workspace.harvest().success();
    let output = workspace.path("export.json");

    workspace.cmd().args(["export", "-o", &output]).assert().success();

    let export: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(export["metadata"]["version"], "1.0.0");
    assert_eq!(export["metadata"]["totalPosts"], 2);
    assert_eq!(export["data"]["posts"].as_array().unwrap().len(), 2);
}

#[test]
fn test_cli_search() {
    let workspace = Workspace::new();
    workspace.harvest().success();

    let output = workspace.cmd().args(["search", "rust", "--json"]).output().unwrap();
    assert!(output.status.success());

    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(results["posts"].as_array().unwrap().len(), 1);
    assert_eq!(results["posts"][0]["id"], "1");
    assert!(results["comments"].as_array().unwrap().is_empty());
}

#[test]
fn test_cli_search_min_reactions() {
    let workspace = Workspace::new();
    workspace.harvest().success();

    let output = workspace
        .cmd()
        .args(["search", "--kind", "posts", "--min-reactions", "10", "--json"])
        .output()
        .unwrap();

    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(results["posts"].as_array().unwrap().len(), 1);
    assert_eq!(results["posts"][0]["author"]["displayName"], "Ann");
}

#[test]
fn test_cli_clear() {
    let workspace = Workspace::new();
    workspace.harvest().success();

    workspace
        .cmd()
        .arg("clear")
        .assert()
        .success()
        .stderr(predicate::str::contains("Dataset cleared"));

    assert_eq!(stats_json(&workspace)["totalPosts"], 0);
}

#[test]
fn test_cli_save_settings() {
    let workspace = Workspace::new();

    workspace
        .cmd()
        .args(["harvest", &workspace.path("feed.html")])
        .args(["--locator-file", &workspace.path("locators.txt")])
        .args(["--scroll-delay", "0", "--no-settle", "--no-profiles", "--save-settings"])
        .assert()
        .success();

    let settings = std::fs::read_to_string(Path::new(&workspace.data_dir()).join("settings.json")).unwrap();
    assert!(settings.contains("\"scrollDelayMs\": 0"));
    assert_eq!(stats_json(&workspace)["totalProfiles"], 0);
}

#[test]
fn test_cli_max_posts_zero_rejected() {
    let workspace = Workspace::new();

    workspace
        .cmd()
        .args(["harvest", &workspace.path("feed.html"), "--max-posts", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid settings"));
}

#[test]
fn test_cli_missing_page() {
    let workspace = Workspace::new();

    workspace
        .cmd()
        .args(["harvest", &workspace.path("missing.html")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load page"));
}

#[test]
fn test_cli_invalid_kind() {
    let workspace = Workspace::new();

    workspace.cmd().args(["export", "-f", "csv", "--kind", "videos"]).assert().failure();
}

#[test]
fn test_cli_invalid_detail_argument() {
    let workspace = Workspace::new();

    workspace
        .cmd()
        .args(["harvest", &workspace.path("feed.html"), "--detail", "detail.html"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=PAGE"));
}
