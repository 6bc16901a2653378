//! # chirpmail
//!
//! Emails the posts that appeared on a home timeline since the last run.
//!
//! ## Architecture
//!
//! One invocation runs one cycle:
//!
//! ```text
//! Checkpoint → Fetcher → Normalizer → Render → Mailer → Checkpoint
//! ```
//!
//! - [`store`]: last delivered post id, kept as a JSON file
//! - [`fetcher`]: OAuth-signed home timeline client
//! - [`normalizer`]: raw API records to [`Post`](domain::Post)s
//! - [`render`]: link splicing and the HTML/plaintext digest
//! - [`mailer`]: SMTP delivery
//! - [`pipeline`]: ties the above together
//!
//! The checkpoint is written only after the mailer accepts the digest.
//!
//! ## Quick Start
//!
//! ```bash
//! export CHIRPMAIL_CONSUMER_KEY=... CHIRPMAIL_CONSUMER_SECRET=...
//! export CHIRPMAIL_ACCESS_TOKEN=... CHIRPMAIL_ACCESS_TOKEN_SECRET=...
//! export CHIRPMAIL_RECORD_PATH=~/.local/share/chirpmail/record.json
//! export CHIRPMAIL_EMAIL_ADDRESS=me@example.com
//! export CHIRPMAIL_TIMEZONE=Europe/Dublin
//!
//! # Preview without sending
//! chirpmail --dry-run
//!
//! # Run from cron
//! chirpmail
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// config, checkpoint store, fetcher, mailer, normalizer.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration from a TOML file and `CHIRPMAIL_*` environment variables.
pub mod config;

/// Core domain models.
///
/// - [`Post`](domain::Post): A normalized timeline post
/// - [`LinkSpan`](domain::LinkSpan): A hyperlinked range of post text
/// - [`Checkpoint`](domain::Checkpoint): The persisted high-water mark
pub mod domain;

/// Timeline fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for timeline requests
/// - [`TimelineClient`](fetcher::http_fetcher::TimelineClient): reqwest-based implementation
pub mod fetcher;

/// Email delivery.
pub mod mailer;

/// Raw timeline records to [`Post`](domain::Post)s.
pub mod normalizer;

/// The single run cycle.
pub mod pipeline;

/// Digest rendering.
pub mod render;

/// Checkpoint persistence.
///
/// - [`CheckpointStore`](store::CheckpointStore): Trait for checkpoint storage
/// - [`JsonCheckpointStore`](store::JsonCheckpointStore): JSON file implementation
pub mod store;
