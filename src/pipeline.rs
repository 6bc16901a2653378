//! One fetch → format → send → checkpoint cycle.
//!
//! The checkpoint only moves after the mailer has accepted the digest, so a
//! failure anywhere before that leaves the next run to retry the same window.
//! A crash between the send and the checkpoint write can deliver the same
//! posts twice; it can never drop them.

use crate::app::{AppContext, ChirpError, Result};
use crate::fetcher::FetchMode;
use crate::mailer::Email;
use crate::render::{ascii_safe, format, format_plain};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Render the digest but neither send it nor move the checkpoint.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    NothingNew {
        skipped: usize,
    },
    Sent {
        posts: usize,
        skipped: usize,
        checkpoint: Option<u64>,
    },
    DryRun {
        posts: usize,
        skipped: usize,
        html: String,
        text: String,
    },
}

pub async fn run_once(ctx: &AppContext, options: RunOptions) -> Result<RunOutcome> {
    let _lock = if options.dry_run {
        None
    } else {
        ctx.store.lock()?
    };

    let mode = match ctx.store.load() {
        Some(last_id) => FetchMode::Since(last_id),
        None => FetchMode::Recent(ctx.config.initial_count),
    };
    tracing::info!(?mode, "Fetching timeline");

    let response = ctx.fetcher.fetch(mode).await?;
    if !response.is_success() {
        if ctx.config.strict_fetch_status {
            return Err(ChirpError::Fetch(format!(
                "timeline request returned HTTP {}",
                response.status
            )));
        }
        tracing::warn!(status = response.status, "Timeline request unsuccessful, nothing to send");
        return Ok(RunOutcome::NothingNew { skipped: 0 });
    }

    if response.items.is_empty() {
        tracing::info!("No new posts");
        return Ok(RunOutcome::NothingNew { skipped: 0 });
    }

    let batch = ctx.normalizer.normalize_batch(&response.items);
    if batch.posts.is_empty() {
        tracing::warn!(skipped = batch.skipped, "Every fetched record was malformed");
        return Ok(RunOutcome::NothingNew {
            skipped: batch.skipped,
        });
    }

    let html = format(&batch.posts)?;
    let text = format_plain(&batch.posts);

    if options.dry_run {
        return Ok(RunOutcome::DryRun {
            posts: batch.posts.len(),
            skipped: batch.skipped,
            html,
            text,
        });
    }

    let email = Email {
        subject: ctx.config.email.subject.clone(),
        from: ctx.config.email.from.clone(),
        to: ctx.config.email.to.clone(),
        text: ascii_safe(&text),
        html: ascii_safe(&html),
    };
    ctx.mailer.send(&email).await?;

    let checkpoint = ctx.store.save(&batch.posts)?;
    tracing::info!(
        posts = batch.posts.len(),
        skipped = batch.skipped,
        ?checkpoint,
        "Digest delivered"
    );

    Ok(RunOutcome::Sent {
        posts: batch.posts.len(),
        skipped: batch.skipped,
        checkpoint,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use super::*;
    use crate::config::{Config, Settings, ENV_PREFIX};
    use crate::fetcher::{FetchResponse, Fetcher};
    use crate::mailer::Mailer;
    use crate::store::{CheckpointStore, JsonCheckpointStore};

    enum Reply {
        Status(u16, Vec<Value>),
        TransportError,
    }

    struct FakeFetcher {
        reply: Reply,
        modes: Mutex<Vec<FetchMode>>,
    }

    impl FakeFetcher {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                modes: Mutex::new(Vec::new()),
            })
        }

        fn modes(&self) -> Vec<FetchMode> {
            self.modes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, mode: FetchMode) -> Result<FetchResponse> {
            self.modes.lock().unwrap().push(mode);
            match &self.reply {
                Reply::Status(status, items) => Ok(FetchResponse {
                    status: *status,
                    items: items.clone(),
                }),
                Reply::TransportError => Err(ChirpError::Fetch("connection refused".into())),
            }
        }
    }

    #[derive(Default)]
    struct FakeMailer {
        fail: bool,
        sent: Mutex<Vec<Email>>,
    }

    impl FakeMailer {
        fn sent(&self) -> Vec<Email> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for FakeMailer {
        async fn send(&self, email: &Email) -> Result<()> {
            if self.fail {
                return Err(ChirpError::Send("relay refused".into()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn config(record_path: &Path, strict: bool) -> Config {
        let record = record_path.to_string_lossy().into_owned();
        let strict = strict.to_string();
        let lookup = move |key: &str| -> Option<String> {
            let name = key.strip_prefix(ENV_PREFIX)?;
            let value = match name {
                "CONSUMER_KEY" | "CONSUMER_SECRET" | "ACCESS_TOKEN" | "ACCESS_TOKEN_SECRET" => "x",
                "RECORD_PATH" => record.as_str(),
                "EMAIL_ADDRESS" => "me@example.com",
                "TIMEZONE" => "Europe/Dublin",
                "STRICT_FETCH_STATUS" => strict.as_str(),
                _ => return None,
            };
            Some(value.to_string())
        };
        Settings::default().with_env(lookup).unwrap().validate().unwrap()
    }

    fn raw(id: u64, year: i32, text: &str) -> Value {
        let created_at = Utc.with_ymd_and_hms(year, 6, 1, 12, 0, 0).unwrap();
        json!({
            "id": id,
            "text": text,
            "created_at": created_at.format("%a %b %d %H:%M:%S %z %Y").to_string(),
            "user": { "screen_name": "someone" },
            "entities": {}
        })
    }

    struct Harness {
        _dir: TempDir,
        record: std::path::PathBuf,
        fetcher: Arc<FakeFetcher>,
        mailer: Arc<FakeMailer>,
        ctx: AppContext,
    }

    fn harness(reply: Reply, mailer: FakeMailer, strict: bool) -> Harness {
        let dir = TempDir::new().unwrap();
        let record = dir.path().join("record.json");
        let fetcher = FakeFetcher::new(reply);
        let mailer = Arc::new(mailer);
        let store = Arc::new(JsonCheckpointStore::new(&record));
        let ctx = AppContext::with_parts(
            config(&record, strict),
            store,
            fetcher.clone(),
            mailer.clone(),
        );
        Harness {
            _dir: dir,
            record,
            fetcher,
            mailer,
            ctx,
        }
    }

    fn recorded(record: &Path) -> Option<u64> {
        JsonCheckpointStore::new(record).load()
    }

    #[tokio::test]
    async fn test_first_run_fetches_recent_and_checkpoints() {
        let h = harness(
            Reply::Status(200, vec![raw(10, 2013, "older"), raw(11, 2014, "newer")]),
            FakeMailer::default(),
            false,
        );

        let outcome = run_once(&h.ctx, RunOptions::default()).await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Sent {
                posts: 2,
                skipped: 0,
                checkpoint: Some(11)
            }
        );
        assert_eq!(h.fetcher.modes(), vec![FetchMode::Recent(5)]);
        assert_eq!(h.mailer.sent().len(), 1);
        assert_eq!(recorded(&h.record), Some(11));
    }

    #[tokio::test]
    async fn test_existing_checkpoint_fetches_since() {
        let h = harness(Reply::Status(200, Vec::new()), FakeMailer::default(), false);
        fs::write(&h.record, r#"{"version":1,"last_post_id":100}"#).unwrap();

        run_once(&h.ctx, RunOptions::default()).await.unwrap();

        assert_eq!(h.fetcher.modes(), vec![FetchMode::Since(100)]);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_checkpoint() {
        let h = harness(
            Reply::Status(200, vec![raw(200, 2014, "hi")]),
            FakeMailer {
                fail: true,
                ..Default::default()
            },
            false,
        );
        let before = r#"{"version":1,"last_post_id":100}"#;
        fs::write(&h.record, before).unwrap();

        let err = run_once(&h.ctx, RunOptions::default()).await.unwrap_err();

        assert!(matches!(err, ChirpError::Send(_)));
        assert_eq!(fs::read_to_string(&h.record).unwrap(), before);
    }

    #[tokio::test]
    async fn test_fetch_error_aborts_without_mutation() {
        let h = harness(Reply::TransportError, FakeMailer::default(), false);

        let err = run_once(&h.ctx, RunOptions::default()).await.unwrap_err();

        assert!(matches!(err, ChirpError::Fetch(_)));
        assert!(h.mailer.sent().is_empty());
        assert!(!h.record.exists());
    }

    #[tokio::test]
    async fn test_no_items_sends_nothing() {
        let h = harness(Reply::Status(200, Vec::new()), FakeMailer::default(), false);

        let outcome = run_once(&h.ctx, RunOptions::default()).await.unwrap();

        assert_eq!(outcome, RunOutcome::NothingNew { skipped: 0 });
        assert!(h.mailer.sent().is_empty());
        assert!(!h.record.exists());
    }

    #[tokio::test]
    async fn test_non_success_status_is_lenient_by_default() {
        let h = harness(Reply::Status(429, Vec::new()), FakeMailer::default(), false);

        let outcome = run_once(&h.ctx, RunOptions::default()).await.unwrap();

        assert_eq!(outcome, RunOutcome::NothingNew { skipped: 0 });
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_fails_when_strict() {
        let h = harness(Reply::Status(503, Vec::new()), FakeMailer::default(), true);

        let err = run_once(&h.ctx, RunOptions::default()).await.unwrap_err();

        assert!(matches!(err, ChirpError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_malformed_record_skipped() {
        let mut broken = raw(12, 2014, "no author");
        broken["user"] = json!({});
        let h = harness(
            Reply::Status(200, vec![raw(10, 2013, "good one"), broken, raw(11, 2013, "good two")]),
            FakeMailer::default(),
            false,
        );

        let outcome = run_once(&h.ctx, RunOptions::default()).await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Sent {
                posts: 2,
                skipped: 1,
                checkpoint: Some(11)
            }
        );
        let sent = h.mailer.sent();
        assert!(sent[0].html.contains("good one"));
        assert!(!sent[0].html.contains("no author"));
    }

    #[tokio::test]
    async fn test_all_malformed_sends_nothing() {
        let mut a = raw(1, 2014, "a");
        a["created_at"] = json!("not a date");
        let mut b = raw(2, 2014, "b");
        b["user"] = json!({});
        let h = harness(Reply::Status(200, vec![a, b]), FakeMailer::default(), false);

        let outcome = run_once(&h.ctx, RunOptions::default()).await.unwrap();

        assert_eq!(outcome, RunOutcome::NothingNew { skipped: 2 });
        assert!(h.mailer.sent().is_empty());
        assert!(!h.record.exists());
    }

    #[tokio::test]
    async fn test_dry_run_neither_sends_nor_checkpoints() {
        let h = harness(
            Reply::Status(200, vec![raw(10, 2014, "hi")]),
            FakeMailer::default(),
            false,
        );

        let outcome = run_once(&h.ctx, RunOptions { dry_run: true }).await.unwrap();

        match outcome {
            RunOutcome::DryRun { posts, html, .. } => {
                assert_eq!(posts, 1);
                assert!(html.contains("/status/10"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(h.mailer.sent().is_empty());
        assert!(!h.record.exists());
    }

    #[tokio::test]
    async fn test_email_is_ascii_safe_and_addressed() {
        let h = harness(
            Reply::Status(200, vec![raw(10, 2014, "caf\u{e9}")]),
            FakeMailer::default(),
            false,
        );

        run_once(&h.ctx, RunOptions::default()).await.unwrap();

        let email = &h.mailer.sent()[0];
        assert_eq!(email.to, "me@example.com");
        assert_eq!(email.from, crate::config::DEFAULT_FROM_ADDRESS);
        assert_eq!(email.subject, crate::config::DEFAULT_SUBJECT);
        assert!(email.html.is_ascii());
        assert!(email.html.contains("caf&#233;"));
        assert!(email.text.contains("someone: caf&#233;"));
    }

    #[tokio::test]
    async fn test_checkpoint_follows_latest_datetime() {
        let h = harness(
            Reply::Status(
                200,
                vec![raw(42, 2013, "a"), raw(43, 2014, "b"), raw(44, 2012, "c")],
            ),
            FakeMailer::default(),
            false,
        );

        run_once(&h.ctx, RunOptions::default()).await.unwrap();

        assert_eq!(recorded(&h.record), Some(43));
    }

    #[tokio::test]
    async fn test_concurrent_run_is_refused() {
        let h = harness(Reply::Status(200, Vec::new()), FakeMailer::default(), false);
        let _held = h.ctx.store.lock().unwrap();

        let err = run_once(&h.ctx, RunOptions::default()).await.unwrap_err();

        assert!(matches!(err, ChirpError::Locked(_)));
        assert!(h.fetcher.modes().is_empty());
    }
}
