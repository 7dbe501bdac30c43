//! Local playback references for uploaded audio.
//!
//! A [`PlaybackHandle`] stands in for the browser's object URL: it names the
//! original file bytes held by a [`PlaybackRegistry`] and revokes that entry
//! once the last clone of the handle is dropped. Handles travel inside
//! [`AnalysisResult`](crate::emotion::AnalysisResult), so evicting a result
//! from history (or clearing it) releases the bytes.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use uuid::Uuid;

const LOG_TARGET: &str = "playback";
pub const PLAYBACK_URL_PREFIX: &str = "blob:emotion-analysis/";

type Entries = Mutex<HashMap<Uuid, Bytes>>;

#[derive(Clone, Default)]
pub struct PlaybackRegistry {
    entries: Arc<Entries>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, bytes: Bytes) -> PlaybackHandle {
        let id = Uuid::now_v7();
        lock(&self.entries).insert(id, bytes);
        let url = format!("{PLAYBACK_URL_PREFIX}{id}");
        tracing::debug!(target: LOG_TARGET, %url, "playback handle created");
        PlaybackHandle {
            inner: Arc::new(HandleInner {
                id,
                url,
                entries: Arc::downgrade(&self.entries),
            }),
        }
    }

    /// Bytes behind `url`, or `None` once the handle has been revoked.
    pub fn resolve(&self, url: &str) -> Option<Bytes> {
        let id = url.strip_prefix(PLAYBACK_URL_PREFIX)?.parse::<Uuid>().ok()?;
        lock(&self.entries).get(&id).cloned()
    }

    pub fn live_handles(&self) -> usize {
        lock(&self.entries).len()
    }
}

impl fmt::Debug for PlaybackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackRegistry")
            .field("live_handles", &self.live_handles())
            .finish()
    }
}

#[derive(Clone)]
pub struct PlaybackHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: Uuid,
    url: String,
    entries: Weak<Entries>,
}

impl PlaybackHandle {
    pub fn url(&self) -> &str {
        &self.inner.url
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        let Some(entries) = self.entries.upgrade() else {
            return;
        };
        let released = lock(&entries).remove(&self.id).is_some();
        tracing::debug!(target: LOG_TARGET, url = %self.url, released, "playback handle revoked");
    }
}

impl PartialEq for PlaybackHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for PlaybackHandle {}

impl fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PlaybackHandle").field(&self.inner.url).finish()
    }
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<Uuid, Bytes>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}
