//! End-to-end harvesting sessions over saved pages
use feedharvest_core::*;
use tokio::sync::mpsc;

const LOCATORS: &str = r#"
# Locators for the test feed layout
version: 2
post_container: article.post
post_text: .message
post_author: a.author
timestamp: time
reaction_count: .reactions
comment_count: .comments-count
permalink: a.permalink
detail_affordance: a.open
detail_view: div.dialog
close_detail: button.close
comment: div.comment
comment_text: .body
comment_author: a.commenter
reply: div.reply
see_more: span.see-more
expand_comments: button.more-comments
expand_replies: button.more-replies
"#;

fn locators() -> LocatorSet {
    LocatorParser::parse_string(LOCATORS).unwrap()
}

fn feed_item(id: usize) -> String {
    format!(
        r#"<article class="post">
            <a class="author" href="https://example.com/user{id}?ref=feed">User {id}</a>
            <div class="message">Post number {id}</div>
            <a class="permalink" href="https://example.com/posts/{id}">link</a>
        </article>"#
    )
}

fn feed(ids: impl IntoIterator<Item = usize>) -> String {
    format!(r#"<div role="feed">{}</div>"#, ids.into_iter().map(feed_item).collect::<String>())
}

fn settings() -> HarvestSettingsBuilder {
    HarvestSettings::builder().scroll_delay_ms(0)
}

fn harvester(source: SnapshotSource) -> Harvester<SnapshotSource, MemoryBackend> {
    let store = Store::open(MemoryBackend::new()).unwrap();
    Harvester::new(source, locators(), store).with_timing(Timing::immediate())
}

fn texts(dataset: &Dataset) -> Vec<&str> {
    dataset.posts.iter().map(|post| post.text.as_str()).collect()
}

#[tokio::test]
async fn test_max_posts_bounds_the_batch() {
    let source = SnapshotSource::new(vec![feed(1..=5)]).unwrap();
    let mut harvester = harvester(source);

    let outcome = harvester.harvest(settings().max_posts(2).build()).await.unwrap();

    assert_eq!(outcome.reason, TerminationReason::MaxPosts);
    assert_eq!(texts(&outcome.batch), vec!["Post number 1", "Post number 2"]);
    assert_eq!(harvester.store().dataset().posts.len(), 2);
    assert_eq!(harvester.status().progress.scroll_attempts, 0);
}

#[tokio::test]
async fn test_exhausted_when_scroll_brings_nothing_new() {
    let source = SnapshotSource::new(vec![feed(1..=2), feed(1..=4), feed(1..=4)]).unwrap();
    let mut harvester = harvester(source);

    let outcome = harvester.harvest(settings().build()).await.unwrap();

    assert_eq!(outcome.reason, TerminationReason::Exhausted);
    assert_eq!(outcome.batch.posts.len(), 4);
    assert_eq!(harvester.status().progress, Progress { posts_found: 4, scroll_attempts: 2 });
}

#[tokio::test]
async fn test_scroll_limit_on_endless_feed() {
    let pages: Vec<String> = (1..=60).map(|n| feed(1..=n)).collect();
    let mut harvester = harvester(SnapshotSource::new(pages).unwrap());

    let outcome = harvester.harvest(settings().build()).await.unwrap();

    assert_eq!(outcome.reason, TerminationReason::ScrollLimit);
    let status = harvester.status();
    assert_eq!(status.progress.scroll_attempts, MAX_SCROLL_ATTEMPTS);
    assert_eq!(status.progress.posts_found, 51);
    assert_eq!(status.state, HarvestState::Terminated(TerminationReason::ScrollLimit));
}

#[tokio::test]
async fn test_empty_feed_is_exhausted() {
    let mut harvester = harvester(SnapshotSource::new(vec![feed(0..0)]).unwrap());

    let outcome = harvester.harvest(settings().build()).await.unwrap();

    assert_eq!(outcome.reason, TerminationReason::Exhausted);
    assert!(outcome.batch.is_empty());
    assert_eq!(outcome.merged, Some(MergeOutcome::default()));
}

#[tokio::test]
async fn test_normalized_before_merge() {
    let mut harvester = harvester(SnapshotSource::new(vec![feed(1..=1)]).unwrap());

    let outcome = harvester.harvest(settings().build()).await.unwrap();

    let post = &outcome.batch.posts[0];
    assert_eq!(post.id, "1");
    assert_eq!(post.author.display_name, "User 1");
    assert_eq!(post.author.profile_url, "https://example.com/user1");
    assert!(post.scraped_at.is_some());
    assert_eq!(outcome.batch.profiles[0].id, "https://example.com/user1");
}

#[tokio::test]
async fn test_second_harvest_adds_nothing() {
    let source = SnapshotSource::new(vec![feed(1..=3)]).unwrap();
    let mut harvester = harvester(source);

    let first = harvester.harvest(settings().build()).await.unwrap();
    assert_eq!(first.merged.unwrap().added_posts, 3);

    let pages = vec![feed(1..=3)];
    let store = harvester.into_store();
    let mut harvester = Harvester::new(SnapshotSource::new(pages).unwrap(), locators(), store)
        .with_timing(Timing::immediate());

    let second = harvester.harvest(settings().build()).await.unwrap();
    assert_eq!(second.merged.unwrap().total(), 0);
    assert_eq!(harvester.store().dataset().posts.len(), 3);
}

#[tokio::test]
async fn test_collect_flags_limit_collections() {
    let mut harvester = harvester(SnapshotSource::new(vec![feed(1..=2)]).unwrap());

    let outcome = harvester.harvest(settings().collect_profiles(false).build()).await.unwrap();

    assert_eq!(outcome.batch.posts.len(), 2);
    assert!(outcome.batch.profiles.is_empty());
}

const DETAIL_FEED: &str = r#"
<div role="feed">
    <article class="post">
        <div class="message">Feed preview of the first post</div>
        <a class="permalink" href="https://example.com/posts/100">link</a>
        <a class="open" href="/detail/100">12 comments</a>
    </article>
    <article class="post">
        <div class="message">A post whose detail view is gone</div>
        <a class="permalink" href="https://example.com/posts/200">link</a>
        <a class="open" href="/detail/missing">3 comments</a>
    </article>
</div>
"#;

const DETAIL_VIEW: &str = r#"
<div class="dialog">
    <a class="author" href="https://example.com/ann?fref=nf">Ann</a>
    <time datetime="2024-05-01T10:00:00Z">May 1</time>
    <div class="message">Full text <span id="rest" hidden>with the hidden tail</span></div>
    <span class="see-more" aria-controls="rest">See more</span>
    <span class="reactions">1.2K</span>
    <span class="comments-count">3 comments</span>
    <div class="comments">
        <div class="comment" data-comment-id="c1">
            <a class="commenter" href="https://example.com/bob">Bob</a>
            <div class="body">First comment</div>
            <button class="more-replies" aria-controls="replies-c1">View 1 reply</button>
            <div id="replies-c1" hidden>
                <div class="reply" data-comment-id="r1">
                    <a class="commenter" href="https://example.com/cid">Cid</a>
                    <div class="body">A reply</div>
                </div>
            </div>
        </div>
        <button class="more-comments" aria-controls="more">View more comments</button>
        <div id="more" hidden>
            <div class="comment" data-comment-id="c2">
                <a class="commenter" href="https://example.com/dee">Dee</a>
                <div class="body">Second comment</div>
            </div>
        </div>
    </div>
    <button class="close">Close</button>
</div>
"#;

fn detail_source() -> SnapshotSource {
    SnapshotSource::new(vec![DETAIL_FEED.to_string()])
        .unwrap()
        .with_detail("/detail/100", DETAIL_VIEW)
        .with_dismiss_selector("button.close")
        .unwrap()
}

#[tokio::test]
async fn test_detail_view_flow() {
    let mut harvester = harvester(detail_source());

    let outcome = harvester.harvest(settings().build()).await.unwrap();

    assert_eq!(outcome.reason, TerminationReason::Exhausted);
    assert_eq!(outcome.batch.posts.len(), 1, "the item without a detail view is skipped");
    assert_eq!(harvester.source().open_detail(), None);

    let post = &outcome.batch.posts[0];
    assert_eq!(post.id, "100");
    assert_eq!(post.url, "https://example.com/posts/100");
    assert_eq!(post.text, "Full text with the hidden tail");
    assert_eq!(post.author.display_name, "Ann");
    assert_eq!(post.author.profile_url, "https://example.com/ann");
    assert_eq!(post.created_at.as_deref(), Some("2024-05-01T10:00:00Z"));
    assert_eq!(post.reaction_count, Some(1200));
    assert_eq!(post.comment_count, Some(3));

    assert_eq!(post.comments.len(), 2);
    assert_eq!(post.comments[0].text, "First comment");
    assert_eq!(post.comments[0].replies[0].text, "A reply");
    assert_eq!(post.comments[1].author.display_name, "Dee");
}

#[tokio::test]
async fn test_detail_comments_flattened_into_dataset() {
    let mut harvester = harvester(detail_source());
    harvester.harvest(settings().build()).await.unwrap();

    let dataset = harvester.store().dataset();
    let ids: Vec<&str> = dataset.comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "r1", "c2"]);
    assert!(dataset.comments.iter().all(|c| c.post_id == "100"));
    assert_eq!(dataset.comments[1].parent_id.as_deref(), Some("c1"));
    assert_eq!(dataset.profiles.len(), 4);

    let snapshot = compute(dataset);
    assert_eq!(snapshot.total_posts, dataset.posts.len());
    assert_eq!(snapshot.total_comments, 3);
}

#[tokio::test]
async fn test_comments_skipped_when_not_collected() {
    let mut harvester = harvester(detail_source());

    let outcome = harvester.harvest(settings().collect_comments(false).build()).await.unwrap();

    assert!(outcome.batch.posts[0].comments.is_empty());
    assert!(outcome.batch.comments.is_empty());
}

#[tokio::test]
async fn test_controller_stop_reaches_running_session() {
    let pages: Vec<String> = (1..=60).map(|n| feed(1..=n)).collect();
    let harvester = harvester(SnapshotSource::new(pages).unwrap());

    let (client, commands) = control_channel(8);
    let (events, mut events_rx) = mpsc::unbounded_channel();

    let client_side = async {
        client.start(settings().scroll_delay_ms(5).build()).await.unwrap();
        assert!(matches!(client.start(settings().build()).await, Err(HarvestError::AlreadyActive)));

        let mut reason = None;
        while let Some(event) = events_rx.recv().await {
            match event {
                HarvestEvent::Progress(progress) if progress.scroll_attempts == 3 => {
                    let _ = client.stop().await;
                }
                HarvestEvent::Completed { reason: finished, .. } => {
                    reason = Some(finished);
                    break;
                }
                _ => {}
            }
        }

        assert!(matches!(client.stop().await, Err(HarvestError::NotActive)));
        client.shutdown().await.unwrap();
        reason
    };

    let (harvester, reason) = tokio::join!(Controller::new(harvester).serve(commands, events), client_side);

    assert_eq!(reason, Some(TerminationReason::Stopped));
    let found = harvester.store().dataset().posts.len();
    assert!(found >= 3 && found < 60, "stopped early with {found} posts");
}
