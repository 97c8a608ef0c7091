//! Manual cloud backup of the whole store.
//!
//! The store is serialized to a single JSON file inside one gist per
//! account. Push and pull are blind full overwrites (last write wins); the
//! caller is expected to confirm a pull using the counts in
//! [`PullPreview`] before applying it.
//!
//! # Example
//!
//! ```ignore
//! let config = SyncConfig::default();
//! let client = SyncClient::new(HttpGistApi::new(&config)?, config);
//!
//! client.connect(&mut store, &token)?;
//! client.push(&mut store)?;
//!
//! let preview = client.fetch_remote(&mut store)?;
//! if confirm(&preview.local, &preview.remote) {
//!     client.apply_pull(&mut store, preview)?;
//! }
//! ```

mod client;
mod gist;

pub use client::{PullPreview, PushOutcome, SyncClient};
pub use gist::{FileContent, Gist, GistApi, GistFile, GistWrite, HttpGistApi, RemoteUser};

use std::time::Duration;

/// Sync configuration.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Base URL of the REST API.
    pub api_base: String,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Description identifying the backup gist among the account's gists.
    pub description: String,

    /// Name of the data file inside the gist.
    pub filename: String,

    /// Visibility of newly created gists.
    pub public: bool,

    pub user_agent: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            timeout: Duration::from_secs(30),
            description: "Trading Goal Tracker Data".to_string(),
            filename: "trading-tracker-data.json".to_string(),
            public: false,
            user_agent: concat!("trading-goal-tracker/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
