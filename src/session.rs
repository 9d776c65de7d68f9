use crate::config::DefaultsConfig;
use crate::types::{RegionSet, RenderRequest, SavedEntry, ValueMap};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// One user's interactive state: the request currently on the form and the
/// append-only log of saved maps.
#[derive(Debug, Clone)]
pub struct Session {
    current: RenderRequest,
    saved: Vec<SavedEntry>,
}

impl Session {
    pub fn new(regions: &RegionSet, defaults: &DefaultsConfig) -> Self {
        Self {
            current: RenderRequest {
                title: defaults.title.clone(),
                unit: defaults.unit.clone(),
                color_scale: defaults.color_scale,
                values: ValueMap::seeded(regions),
            },
            saved: Vec::new(),
        }
    }

    pub fn current(&self) -> &RenderRequest {
        &self.current
    }

    pub fn update(&mut self, request: RenderRequest) {
        self.current = request;
    }

    /// Snapshots the current request onto the end of the log.
    pub fn save(&mut self) -> &SavedEntry {
        let entry = SavedEntry::snapshot(self.saved.len() + 1, &self.current);
        self.saved.push(entry);
        &self.saved[self.saved.len() - 1]
    }

    /// Saved maps, oldest first.
    pub fn saved(&self) -> &[SavedEntry] {
        &self.saved
    }
}

struct Slot {
    session: Session,
    last_seen: Instant,
}

/// Live sessions keyed by id. Sessions idle for longer than the TTL are
/// dropped, along with their saved maps.
pub struct SessionStore {
    slots: Mutex<HashMap<Uuid, Slot>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Runs `f` against the session for `id`, starting a fresh one when the id
    /// is missing or expired. Returns the id actually used.
    pub fn with_session<R>(
        &self,
        id: Option<Uuid>,
        start: impl FnOnce() -> Session,
        f: impl FnOnce(&mut Session) -> R,
    ) -> (Uuid, R) {
        let (id, result) = self.try_with_session_at(Instant::now(), id, start, |s| {
            Ok::<R, std::convert::Infallible>(f(s))
        });
        match result {
            Ok(value) => (id, value),
            Err(never) => match never {},
        }
    }

    /// Like [`with_session`](Self::with_session), but a fresh session is only
    /// kept when `f` succeeds.
    pub fn try_with_session<R, E>(
        &self,
        id: Option<Uuid>,
        start: impl FnOnce() -> Session,
        f: impl FnOnce(&mut Session) -> Result<R, E>,
    ) -> (Uuid, Result<R, E>) {
        self.try_with_session_at(Instant::now(), id, start, f)
    }

    fn try_with_session_at<R, E>(
        &self,
        now: Instant,
        id: Option<Uuid>,
        start: impl FnOnce() -> Session,
        f: impl FnOnce(&mut Session) -> Result<R, E>,
    ) -> (Uuid, Result<R, E>) {
        let mut slots = self.slots.lock();

        let before = slots.len();
        slots.retain(|_, slot| now.saturating_duration_since(slot.last_seen) < self.ttl);
        if slots.len() < before {
            debug!(expired = before - slots.len(), "Dropped idle sessions");
        }

        if let Some((id, slot)) = id.and_then(|id| slots.get_mut(&id).map(|slot| (id, slot))) {
            slot.last_seen = now;
            return (id, f(&mut slot.session));
        }

        let id = Uuid::new_v4();
        let mut session = start();
        let result = f(&mut session);
        if result.is_ok() {
            info!(session = %id, "Starting session");
            slots.insert(
                id,
                Slot {
                    session,
                    last_seen: now,
                },
            );
        }
        (id, result)
    }

    /// Ends a session. Returns whether it existed.
    pub fn end(&self, id: Uuid) -> bool {
        let removed = self.slots.lock().remove(&id).is_some();
        if removed {
            info!(session = %id, "Session ended");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
