//! Library API integration tests
use feedharvest_core::*;
use tempfile::TempDir;

fn author(name: &str) -> Author {
    Author { display_name: name.to_string(), profile_url: format!("https://example.com/{}", name.to_lowercase()) }
}

fn post(id: &str, name: &str, text: &str) -> Post {
    Post {
        id: id.to_string(),
        author: author(name),
        text: text.to_string(),
        created_at: Some("2024-05-01T10:00:00Z".to_string()),
        reaction_count: Some(10),
        comment_count: Some(1),
        ..Default::default()
    }
}

fn batch(posts: Vec<Post>) -> Dataset {
    let mut posts = posts;
    assign_ids(&mut posts);
    Dataset::from_posts(posts, &Collect::default())
}

#[test]
fn test_merge_is_idempotent() {
    let incoming = batch(vec![post("1", "Ann", "Hello"), post("2", "Bob", "World")]);
    let once = merge(&Dataset::new(), &incoming);
    let twice = merge(&once, &incoming);
    assert_eq!(once, twice);
}

#[test]
fn test_merge_first_seen_wins() {
    let current = batch(vec![post("1", "Ann", "Original")]);
    let incoming = batch(vec![post("1", "Ann", "Edited"), post("2", "Bob", "New")]);

    let merged = merge(&current, &incoming);

    let texts: Vec<&str> = merged.posts.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["Original", "New"]);
}

#[test]
fn test_fingerprint_dedup_of_idless_posts() {
    let mut first = post("", "Ann", "Same words");
    first.scraped_at = Some("2024-05-01T10:00:00Z".to_string());
    let mut second = post("", "Ann", "Same words");
    second.scraped_at = Some("2024-06-01T10:00:00Z".to_string());

    let merged = merge(&batch(vec![first]), &batch(vec![second]));

    assert_eq!(merged.posts.len(), 1);
    assert!(merged.posts[0].id.starts_with("fp-"));
}

#[test]
fn test_json_store_persists_across_opens() {
    let dir = TempDir::new().unwrap();

    let mut store = Store::open(JsonFileBackend::new(dir.path())).unwrap();
    let outcome = store.merge(&batch(vec![post("1", "Ann", "Hello")])).unwrap();
    assert_eq!(outcome.added_posts, 1);
    assert_eq!(outcome.added_profiles, 1);
    assert!(dir.path().join("dataset.json").exists());

    let reopened = Store::open(JsonFileBackend::new(dir.path())).unwrap();
    assert_eq!(reopened.dataset().posts.len(), 1);
    assert!(reopened.last_updated().is_some());

    let stats = reopened.stats().unwrap();
    assert_eq!(stats.total_items, 2);
    assert!(stats.estimated_size_bytes > 0);
    assert!(stats.estimated_size().ends_with(" KB"));
}

#[test]
fn test_store_clear_removes_files() {
    let dir = TempDir::new().unwrap();
    let mut store = Store::open(JsonFileBackend::new(dir.path())).unwrap();
    store.merge(&batch(vec![post("1", "Ann", "Hello")])).unwrap();
    store.analytics(&AnalyticsOptions::default()).unwrap();
    assert!(dir.path().join("analytics.json").exists());

    store.clear().unwrap();

    assert!(store.dataset().is_empty());
    assert!(!dir.path().join("dataset.json").exists());
    assert!(store.stored_analytics().unwrap().is_none());
}

#[test]
fn test_failed_save_keeps_previous_dataset() {
    let mut store = Store::open(MemoryBackend::new()).unwrap();
    store.merge(&batch(vec![post("1", "Ann", "Hello")])).unwrap();

    store.backend_mut().set_fail_writes(true);
    let result = store.merge(&batch(vec![post("2", "Bob", "World")]));

    assert!(matches!(result, Err(HarvestError::Storage(_))));
    assert_eq!(store.dataset().posts.len(), 1);
}

#[test]
fn test_analytics_totals_track_dataset() {
    let dataset = batch(vec![post("1", "Ann", "Hello"), post("2", "Ann", "Again"), post("3", "Bob", "Hi")]);
    let snapshot = compute(&dataset);

    assert_eq!(snapshot.total_posts, dataset.posts.len());
    assert_eq!(snapshot.total_profiles, 2);
    assert_eq!(snapshot.total_engagement, 33);
    assert_eq!(snapshot.author_stats.top_authors[0].name, "Ann");
    assert_eq!(snapshot.author_stats.top_authors[0].posts, 2);
    assert_eq!(snapshot.daily.len(), 30);
}

#[test]
fn test_exports() {
    let dataset = batch(vec![post("1", "Ann", "Hello, \"world\"")]);
    let snapshot = compute(&dataset);

    let json: serde_json::Value = serde_json::from_str(&export_json(&dataset, &snapshot).unwrap()).unwrap();
    assert_eq!(json["metadata"]["totalPosts"], 1);
    assert_eq!(json["data"]["posts"][0]["author"]["displayName"], "Ann");

    let csv = to_csv(&dataset, "posts".parse().unwrap());
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("ID,Text,Author Name,Author Profile,Timestamp,Reactions,CommentsCount,SharesCount,URL,ScrapedAt")
    );
    assert!(lines.next().unwrap().starts_with("1,\"Hello, \"\"world\"\"\",Ann,"));
}

#[test]
fn test_search_over_dataset() {
    let dataset = batch(vec![post("1", "Ann", "Rust news"), post("2", "Bob", "Cooking")]);

    let results = search(&dataset, &SearchQuery::new().text("RUST").kind(EntityKind::Posts));

    assert_eq!(results.len(), 1);
    assert_eq!(results.posts[0].id, "1");
}

#[test]
fn test_locator_loader_overlays_builtin() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("forum.txt"), "version: 3\npost_container: li.thread\n").unwrap();

    let mut loader = LocatorLoaderBuilder::new().custom_dir(dir.path()).build();
    let set = loader.load("forum").unwrap();

    assert_eq!(set.version, 3);
    assert_eq!(set.selectors(Role::PostContainer)[0], "li.thread");
    assert!(set.selectors(Role::PostContainer).len() > 1);
    assert_eq!(loader.load("missing").unwrap(), LocatorSet::builtin());
}

#[test]
fn test_settings_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");

    assert_eq!(HarvestSettings::load(&path).unwrap(), HarvestSettings::default());

    let settings = HarvestSettings::builder().scroll_delay_ms(500).max_posts(25).collect_profiles(false).build();
    settings.save(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"scrollDelayMs\": 500"));
    assert_eq!(HarvestSettings::load(&path).unwrap(), settings);
}
