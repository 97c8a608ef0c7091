//! Push/pull of the whole store to one remote document.

use super::gist::{Gist, GistApi, GistWrite, RemoteUser};
use super::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::snapshot::{Snapshot, SnapshotSummary};
use crate::store::Store;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Result of a successful push.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushOutcome {
    pub remote_id: String,
    /// A new remote document was created rather than updated.
    pub created: bool,
    pub summary: SnapshotSummary,
}

/// A fetched remote backup, not yet applied.
///
/// Carries both sides' counts and timestamps for the confirmation step.
#[derive(Clone, Debug)]
pub struct PullPreview {
    pub remote_id: String,
    pub remote_updated_at: DateTime<Utc>,
    pub remote: SnapshotSummary,
    pub local: SnapshotSummary,
    pub snapshot: Snapshot,
}

/// Releases the in-flight flag on drop.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Blind last-write-wins backup of a [`Store`] to a gist.
///
/// At most one network operation runs at a time; a second call while one
/// is in flight fails with [`SyncError::Busy`]. Failures never touch the
/// local collections.
pub struct SyncClient<A: GistApi> {
    api: A,
    config: SyncConfig,
    in_flight: AtomicBool,
}

impl<A: GistApi> SyncClient<A> {
    pub fn new(api: A, config: SyncConfig) -> Self {
        Self {
            api,
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether a push, pull or connect is in progress.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin(&self) -> SyncResult<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::Busy)?;
        Ok(FlightGuard(&self.in_flight))
    }

    fn token(store: &Store) -> SyncResult<String> {
        store
            .sync_token()?
            .filter(|t| !t.is_empty())
            .ok_or(SyncError::NotConfigured)
    }

    /// Validate `token` against the service and store it.
    ///
    /// A rejected token is not stored.
    pub fn connect(&self, store: &mut Store, token: &str) -> SyncResult<RemoteUser> {
        let _guard = self.begin()?;

        let token = token.trim();
        if token.is_empty() {
            return Err(SyncError::InvalidCredential);
        }

        let user = self.api.authenticated_user(token)?;
        store.set_sync_token(token)?;
        info!(login = %user.login, "sync connected");
        Ok(user)
    }

    /// Forget the stored token and remote document id.
    pub fn disconnect(&self, store: &mut Store) -> SyncResult<()> {
        store.clear_sync_token()?;
        store.clear_remote_id()?;
        info!("sync disconnected");
        Ok(())
    }

    /// Overwrite the remote backup with the local store.
    ///
    /// Updates the known remote document; when the service no longer has
    /// it, the id is dropped and a new document is created, once.
    pub fn push(&self, store: &mut Store) -> SyncResult<PushOutcome> {
        let _guard = self.begin()?;
        let token = Self::token(store)?;

        let document = Snapshot {
            sync_date: Some(Utc::now()),
            ..store.snapshot()
        };
        let summary = document.summary();
        let content = document
            .to_json_pretty()
            .map_err(|e| SyncError::InvalidPayload(e.to_string()))?;

        if let Some(remote_id) = store.remote_id()? {
            match self
                .api
                .update_gist(&token, &remote_id, &GistWrite::update(&self.config, content.clone()))
            {
                Ok(gist) => {
                    info!(remote_id = %gist.id, "backup updated");
                    return Ok(PushOutcome {
                        remote_id: gist.id,
                        created: false,
                        summary,
                    });
                }
                Err(SyncError::NotFound) => {
                    warn!(%remote_id, "remote backup missing, creating a new one");
                    store.clear_remote_id()?;
                }
                Err(e) => return Err(e),
            }
        }

        let gist = self
            .api
            .create_gist(&token, &GistWrite::create(&self.config, content))?;
        store.set_remote_id(&gist.id)?;
        info!(remote_id = %gist.id, "backup created");

        Ok(PushOutcome {
            remote_id: gist.id,
            created: true,
            summary,
        })
    }

    /// Fetch and validate the remote backup without applying it.
    ///
    /// Without a known id the account's gists are searched for the backup;
    /// if several match, the most recently updated one wins. A 404 on the
    /// known id clears it and fails with [`SyncError::NotFound`]. A
    /// discovered id is remembered only once its backup has parsed.
    pub fn fetch_remote(&self, store: &mut Store) -> SyncResult<PullPreview> {
        let _guard = self.begin()?;
        let token = Self::token(store)?;

        let (remote_id, discovered) = match store.remote_id()? {
            Some(id) => (id, false),
            None => (self.discover(&token)?, true),
        };

        let gist = match self.api.get_gist(&token, &remote_id) {
            Ok(gist) => gist,
            Err(SyncError::NotFound) => {
                warn!(%remote_id, "remote backup not found");
                store.clear_remote_id()?;
                return Err(SyncError::NotFound);
            }
            Err(e) => return Err(e),
        };

        let content = self.file_content(&token, &gist)?;
        let snapshot =
            Snapshot::from_json(&content).map_err(|e| SyncError::InvalidPayload(e.to_string()))?;
        if discovered {
            store.set_remote_id(&remote_id)?;
        }
        debug!(%remote_id, bytes = content.len(), "backup fetched");

        Ok(PullPreview {
            remote_id,
            remote_updated_at: gist.updated_at,
            remote: snapshot.summary(),
            local: store.summary(),
            snapshot,
        })
    }

    /// Replace the local store with a fetched backup.
    pub fn apply_pull(&self, store: &mut Store, preview: PullPreview) -> SyncResult<SnapshotSummary> {
        let summary = preview.remote.clone();
        store.import(preview.snapshot)?;
        info!(remote_id = %preview.remote_id, "backup applied");
        Ok(summary)
    }

    /// Fetch and apply in one step, for callers that confirm elsewhere.
    pub fn pull(&self, store: &mut Store) -> SyncResult<SnapshotSummary> {
        let preview = self.fetch_remote(store)?;
        self.apply_pull(store, preview)
    }

    fn discover(&self, token: &str) -> SyncResult<String> {
        let matching: Vec<Gist> = self
            .api
            .list_gists(token)?
            .into_iter()
            .filter(|g| {
                g.description.as_deref() == Some(self.config.description.as_str())
                    && g.files.contains_key(&self.config.filename)
            })
            .collect();

        if matching.len() > 1 {
            warn!(
                count = matching.len(),
                "duplicate backups found, using the most recently updated"
            );
        }

        matching
            .into_iter()
            .max_by_key(|g| g.updated_at)
            .map(|g| g.id)
            .ok_or(SyncError::NoRemoteData)
    }

    fn file_content(&self, token: &str, gist: &Gist) -> SyncResult<String> {
        let file = gist.files.get(&self.config.filename).ok_or_else(|| {
            SyncError::InvalidPayload(format!("backup file {} missing", self.config.filename))
        })?;

        match (&file.content, file.truncated) {
            (Some(content), false) => Ok(content.clone()),
            _ => {
                let url = file.raw_url.as_deref().ok_or_else(|| {
                    SyncError::InvalidPayload("backup content unavailable".to_string())
                })?;
                debug!(%url, "backup truncated, fetching raw content");
                self.api.fetch_raw(token, url)
            }
        }
    }
}
