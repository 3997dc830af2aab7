use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use digest_social::SocialError;
use digest_social::twitter::{
    Account, BATCH_SIZE, DigestPipeline, MAX_PAGES_PER_BATCH, Pacing, Post, SearchPage,
    TimelineBackend, from_clause,
};

/// Backend double that records every call and replays scripted pages.
#[derive(Default)]
struct ScriptedBackend {
    accounts: Vec<String>,
    newest_first: bool,
    /// Consumed front to back across all `search_page` calls; when empty an
    /// empty final page is served.
    pages: Mutex<VecDeque<Result<SearchPage, String>>>,
    /// Every page serves a fresh cursor, forever.
    endless: bool,
    calls: Mutex<Vec<(String, DateTime<Utc>, Option<String>)>>,
}

impl ScriptedBackend {
    fn with_accounts(n: usize) -> Self {
        Self {
            accounts: (0..n).map(|i| format!("user{i:02}")).collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<(String, DateTime<Utc>, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimelineBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn resolve_accounts(&self) -> Result<Vec<String>, SocialError> {
        Ok(self.accounts.clone())
    }

    fn batch_query(&self, handles: &[String], since: DateTime<Utc>) -> String {
        format!("{} since:{}", from_clause(handles), since.timestamp())
    }

    async fn search_page(
        &self,
        query: &str,
        since: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<SearchPage, SocialError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((query.to_string(), since, cursor.map(str::to_string)));
            calls.len()
        };
        if self.endless {
            return Ok(SearchPage {
                posts: vec![post(&format!("p{n}"), "user00", since + Duration::minutes(n as i64))],
                raw_count: 1,
                has_next_page: true,
                next_cursor: Some(format!("c{n}")),
                newest_first: self.newest_first,
            });
        }
        match self.pages.lock().unwrap().pop_front() {
            Some(Ok(page)) => Ok(SearchPage {
                newest_first: self.newest_first,
                ..page
            }),
            Some(Err(msg)) => Err(SocialError::Upstream(msg)),
            None => Ok(SearchPage::default()),
        }
    }
}

fn since() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
}

fn post(id: &str, handle: &str, at: DateTime<Utc>) -> Post {
    Post {
        id: id.into(),
        text: format!("text {id}"),
        created_at: at,
        author: Account {
            id: handle.into(),
            handle: handle.into(),
            display_name: handle.into(),
            avatar_url: String::new(),
        },
        media: vec![],
        url: Post::permalink(handle, id),
        entities: vec![],
    }
}

fn page(posts: Vec<Post>, cursor: Option<&str>) -> SearchPage {
    SearchPage {
        raw_count: posts.len(),
        posts,
        has_next_page: cursor.is_some(),
        next_cursor: cursor.map(str::to_string),
        newest_first: false,
    }
}

fn pipeline(backend: &Arc<ScriptedBackend>, max_accounts: usize) -> DigestPipeline {
    DigestPipeline::new(backend.clone(), max_accounts).with_pacing(Pacing::none())
}

#[tokio::test]
async fn forty_five_handles_make_three_batches() {
    let backend = Arc::new(ScriptedBackend::with_accounts(45));
    let pipeline = pipeline(&backend, 49);

    let accounts = pipeline.resolve_accounts().await.unwrap();
    pipeline.fetch(&accounts, since()).await.unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    let expected = [&accounts[0..20], &accounts[20..40], &accounts[40..45]];
    for ((query, call_since, cursor), handles) in calls.iter().zip(expected) {
        assert_eq!(
            query,
            &format!("{} since:{}", from_clause(handles), since().timestamp())
        );
        assert_eq!(*call_since, since());
        assert_eq!(*cursor, None);
    }
    assert_eq!(calls[2].0.matches("from:").count(), 5);
}

#[tokio::test]
async fn batch_count_is_ceil_of_handles_over_batch_size() {
    for n in [1usize, 19, 20, 21, 40, 41, 49] {
        let backend = Arc::new(ScriptedBackend::with_accounts(n));
        let pipeline = pipeline(&backend, 100);
        let accounts = pipeline.resolve_accounts().await.unwrap();
        pipeline.fetch(&accounts, since()).await.unwrap();
        assert_eq!(backend.calls().len(), n.div_ceil(BATCH_SIZE), "n = {n}");
    }
}

#[tokio::test]
async fn accounts_are_capped_before_batching() {
    let backend = Arc::new(ScriptedBackend::with_accounts(80));
    let accounts = pipeline(&backend, 49).resolve_accounts().await.unwrap();
    assert_eq!(accounts.len(), 49);
    assert_eq!(accounts[48], "user48");
}

#[tokio::test]
async fn zero_resolved_accounts_is_fatal() {
    let backend = Arc::new(ScriptedBackend::default());
    let err = pipeline(&backend, 49).run(since()).await.unwrap_err();
    assert!(matches!(err, SocialError::NoAccounts { .. }), "{err:?}");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn cursor_is_followed_until_no_next_page() {
    let backend = Arc::new(ScriptedBackend::with_accounts(3));
    backend.pages.lock().unwrap().extend([
        Ok(page(vec![post("1", "user00", since() + Duration::hours(3))], Some("c1"))),
        Ok(page(vec![post("2", "user01", since() + Duration::hours(2))], Some("c2"))),
        Ok(page(vec![post("3", "user00", since() + Duration::hours(1))], None)),
    ]);

    let posts = pipeline(&backend, 49)
        .fetch(&backend.accounts, since())
        .await
        .unwrap();
    assert_eq!(posts.len(), 3);

    let cursors: Vec<Option<String>> = backend.calls().into_iter().map(|c| c.2).collect();
    assert_eq!(cursors, vec![None, Some("c1".into()), Some("c2".into())]);
}

#[tokio::test]
async fn empty_page_and_missing_cursor_stop_pagination() {
    let backend = Arc::new(ScriptedBackend::with_accounts(2));
    backend.pages.lock().unwrap().extend([
        Ok(page(vec![], Some("ignored"))),
        // second batch would consume this if the first did not stop
    ]);
    pipeline(&backend, 49)
        .fetch(&backend.accounts, since())
        .await
        .unwrap();
    assert_eq!(backend.calls().len(), 1);

    let backend = Arc::new(ScriptedBackend::with_accounts(2));
    let mut no_cursor = page(vec![post("1", "user00", since())], None);
    no_cursor.has_next_page = true;
    backend.pages.lock().unwrap().push_back(Ok(no_cursor));
    pipeline(&backend, 49)
        .fetch(&backend.accounts, since())
        .await
        .unwrap();
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn page_cap_bounds_a_misbehaving_upstream() {
    let backend = Arc::new(ScriptedBackend {
        endless: true,
        ..ScriptedBackend::with_accounts(25)
    });
    let posts = pipeline(&backend, 49)
        .fetch(&backend.accounts, since())
        .await
        .unwrap();
    assert_eq!(backend.calls().len(), 2 * MAX_PAGES_PER_BATCH);
    assert_eq!(posts.len(), 2 * MAX_PAGES_PER_BATCH);
}

#[tokio::test]
async fn early_stop_only_for_newest_first_endpoints() {
    let script = || {
        vec![
            Ok(page(
                vec![
                    post("new", "user00", since() + Duration::hours(1)),
                    post("old", "user00", since() - Duration::hours(1)),
                ],
                Some("c1"),
            )),
            Ok(page(vec![post("more", "user00", since() + Duration::minutes(5))], None)),
        ]
    };

    let ordered = Arc::new(ScriptedBackend {
        newest_first: true,
        ..ScriptedBackend::with_accounts(1)
    });
    ordered.pages.lock().unwrap().extend(script());
    let posts = pipeline(&ordered, 49)
        .fetch(&ordered.accounts, since())
        .await
        .unwrap();
    assert_eq!(ordered.calls().len(), 1);
    assert_eq!(posts.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["new"]);

    let unordered = Arc::new(ScriptedBackend::with_accounts(1));
    unordered.pages.lock().unwrap().extend(script());
    let posts = pipeline(&unordered, 49)
        .fetch(&unordered.accounts, since())
        .await
        .unwrap();
    assert_eq!(unordered.calls().len(), 2);
    assert_eq!(posts.len(), 3);
}

#[tokio::test]
async fn failed_batch_is_skipped_but_all_failed_is_an_error() {
    let backend = Arc::new(ScriptedBackend::with_accounts(30));
    backend.pages.lock().unwrap().extend([
        Err("boom".to_string()),
        Ok(page(vec![post("1", "user25", since() + Duration::hours(1))], None)),
    ]);
    let digest_posts = pipeline(&backend, 49)
        .fetch(&backend.accounts, since())
        .await
        .unwrap();
    assert_eq!(digest_posts.len(), 1);

    let backend = Arc::new(ScriptedBackend::with_accounts(30));
    backend
        .pages
        .lock()
        .unwrap()
        .extend([Err("boom".to_string()), Err("boom again".to_string())]);
    let err = pipeline(&backend, 49)
        .fetch(&backend.accounts, since())
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::AllBatchesFailed { batches: 2 }));
}

#[tokio::test]
async fn later_page_failure_keeps_earlier_pages() {
    let backend = Arc::new(ScriptedBackend::with_accounts(1));
    backend.pages.lock().unwrap().extend([
        Ok(page(vec![post("1", "user00", since() + Duration::hours(1))], Some("c1"))),
        Err("rate limited".to_string()),
    ]);
    let posts = pipeline(&backend, 49)
        .fetch(&backend.accounts, since())
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
}

#[tokio::test]
async fn run_groups_by_author() {
    let backend = Arc::new(ScriptedBackend::with_accounts(2));
    backend.pages.lock().unwrap().push_back(Ok(page(
        vec![
            post("1", "user00", since() + Duration::hours(1)),
            post("2", "USER01", since() + Duration::hours(4)),
            post("3", "user00", since() + Duration::hours(2)),
        ],
        None,
    )));
    let digest = pipeline(&backend, 49).run(since()).await.unwrap();
    let handles: Vec<&str> = digest
        .groups()
        .iter()
        .map(|g| g.account.handle.as_str())
        .collect();
    assert_eq!(handles, vec!["USER01", "user00"]);
    assert_eq!(digest.groups()[1].posts[0].id, "3");
}
