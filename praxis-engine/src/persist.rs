//! Persistence layer: an opaque key-value backend, three-tier snapshot
//! loading, and a debounced write-behind queue.
//!
//! The engine's correctness never depends on a write completing; a crash
//! inside the debounce window loses the most recent mutation and nothing
//! else. Loads degrade tier by tier (main, auto-backup, initial state)
//! instead of rejecting a whole snapshot for one bad field.
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;

use crate::constants::FLUSH_DELAY_MS;

/// Snapshot keys, one per independently-persisted sub-collection.
pub mod keys {
    pub const PROFILE: &str = "praxis.profile";
    pub const TASKS: &str = "praxis.tasks";
    pub const HABITS: &str = "praxis.habits";
    pub const RAIDS: &str = "praxis.raids";
    pub const SKILLS: &str = "praxis.skills";
    pub const SHOP: &str = "praxis.shop";
}

/// Opaque last-write-wins string store. Platform crates implement this for
/// local files, browser storage, or a sync service.
pub trait StorageBackend {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the raw value for a key, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend itself fails (not on absence).
    fn load(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Store a raw value.
    ///
    /// # Errors
    ///
    /// Returns an error when the write cannot be issued.
    fn save(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Remove a key.
    ///
    /// # Errors
    ///
    /// Returns an error when the delete cannot be issued.
    fn delete(&self, key: &str) -> Result<(), Self::Error>;
}

#[derive(Debug, Error)]
pub enum PersistError<E: std::error::Error + Send + Sync + 'static> {
    #[error("snapshot encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage backend failed: {0}")]
    Backend(E),
}

fn backup_key(key: &str) -> String {
    format!("{key}.backup")
}

/// Load a snapshot with tiered fallback: the main key (stashing its raw
/// form as the auto-backup before any parse attempt), then the backup,
/// then the type's initial state. Missing fields inside a parsable
/// snapshot backfill through serde defaults.
pub fn load_snapshot<T, B>(backend: &B, key: &str) -> T
where
    T: DeserializeOwned + Default,
    B: StorageBackend,
{
    match backend.load(key) {
        Ok(Some(raw)) => {
            // Stash the raw string first so a parse failure on the next
            // run still has something to recover from.
            if let Err(err) = backend.save(&backup_key(key), &raw) {
                log::warn!("auto-backup write failed for {key}: {err}");
            }
            match serde_json::from_str(&raw) {
                Ok(value) => return value,
                Err(err) => log::warn!("snapshot {key} unreadable, trying backup: {err}"),
            }
        }
        Ok(None) => return T::default(),
        Err(err) => log::warn!("backend load failed for {key}, trying backup: {err}"),
    }

    match backend.load(&backup_key(key)) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => {
                log::warn!("recovered {key} from auto-backup");
                value
            }
            Err(err) => {
                log::warn!("backup for {key} also unreadable, using initial state: {err}");
                T::default()
            }
        },
        _ => T::default(),
    }
}

/// Serialize and store a snapshot immediately, bypassing the debounce.
///
/// # Errors
///
/// Returns an error when encoding or the backend write fails.
pub fn save_snapshot<T, B>(backend: &B, key: &str, value: &T) -> Result<(), PersistError<B::Error>>
where
    T: Serialize,
    B: StorageBackend,
{
    let raw = serde_json::to_string(value)?;
    backend.save(key, &raw).map_err(PersistError::Backend)
}

/// Write-behind queue with a fixed flush delay. Scheduling the same key
/// again within the window replaces the pending value and pushes the
/// deadline out, collapsing bursts into one write.
#[derive(Debug, Default)]
pub struct DebouncedWriter {
    pending: HashMap<String, (String, DateTime<Utc>)>,
}

impl DebouncedWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a snapshot for writing after the flush delay.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be encoded.
    pub fn schedule<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
        now: DateTime<Utc>,
    ) -> Result<(), serde_json::Error> {
        let raw = serde_json::to_string(value)?;
        let deadline = now + Duration::milliseconds(FLUSH_DELAY_MS);
        self.pending.insert(key.to_string(), (raw, deadline));
        Ok(())
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Flush every entry whose deadline has passed. Failed writes stay
    /// queued for the next tick; persistence is best-effort by contract.
    pub fn flush_due<B: StorageBackend>(&mut self, backend: &B, now: DateTime<Utc>) -> usize {
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        let mut written = 0;
        for key in due {
            let Some((raw, deadline)) = self.pending.remove(&key) else {
                continue;
            };
            match backend.save(&key, &raw) {
                Ok(()) => written += 1,
                Err(err) => {
                    log::warn!("flush failed for {key}, re-queueing: {err}");
                    self.pending.insert(key, (raw, deadline));
                }
            }
        }
        written
    }

    /// Flush everything regardless of deadline (shutdown path).
    pub fn flush_all<B: StorageBackend>(&mut self, backend: &B) -> usize {
        let far_future = Utc::now() + Duration::days(36_500);
        self.flush_due(backend, far_future)
    }
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    values: std::rc::Rc<std::cell::RefCell<HashMap<String, String>>>,
}

impl StorageBackend for MemoryBackend {
    type Error = std::convert::Infallible;

    fn load(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), Self::Error> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Profile;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn roundtrip_through_backend() {
        let backend = MemoryBackend::default();
        let mut profile = Profile::default();
        profile.name = String::from("Tester");
        profile.add_gold(250);

        save_snapshot(&backend, keys::PROFILE, &profile).expect("save");
        let loaded: Profile = load_snapshot(&backend, keys::PROFILE);
        assert_eq!(loaded, profile);
    }

    #[test]
    fn absent_key_yields_initial_state() {
        let backend = MemoryBackend::default();
        let loaded: Profile = load_snapshot(&backend, keys::PROFILE);
        assert_eq!(loaded, Profile { last_online: loaded.last_online, ..Profile::default() });
    }

    #[test]
    fn corrupt_main_falls_back_to_backup() {
        let backend = MemoryBackend::default();
        let mut profile = Profile::default();
        profile.add_gold(999);

        // A good load stashes the backup; then the main copy rots.
        save_snapshot(&backend, keys::PROFILE, &profile).expect("save");
        let _: Profile = load_snapshot(&backend, keys::PROFILE);
        backend.save(keys::PROFILE, "{not json").expect("save");

        let recovered: Profile = load_snapshot(&backend, keys::PROFILE);
        assert_eq!(recovered.gold, 999);
    }

    #[test]
    fn corrupt_main_and_backup_yield_initial_state() {
        let backend = MemoryBackend::default();
        backend.save(keys::PROFILE, "{not json").expect("save");
        backend
            .save(&backup_key(keys::PROFILE), "also bad")
            .expect("save");

        let recovered: Profile = load_snapshot(&backend, keys::PROFILE);
        assert_eq!(recovered.gold, 0);
    }

    #[test]
    fn partial_snapshot_backfills_missing_fields() {
        let backend = MemoryBackend::default();
        backend
            .save(keys::PROFILE, r#"{"name":"Old Save","gold":77}"#)
            .expect("save");

        let loaded: Profile = load_snapshot(&backend, keys::PROFILE);
        assert_eq!(loaded.name, "Old Save");
        assert_eq!(loaded.gold, 77);
        assert_eq!(loaded.target_xp, 1_000);
        assert!((loaded.honor - 100.0).abs() <= f32::EPSILON);
    }

    #[test]
    fn debounce_holds_until_deadline_and_collapses_bursts() {
        let backend = MemoryBackend::default();
        let mut writer = DebouncedWriter::new();
        let start = fixed_now();

        let mut profile = Profile::default();
        profile.add_gold(1);
        writer.schedule(keys::PROFILE, &profile, start).expect("encode");
        profile.add_gold(1);
        writer.schedule(keys::PROFILE, &profile, start).expect("encode");

        assert_eq!(writer.flush_due(&backend, start), 0);
        let after = start + Duration::milliseconds(FLUSH_DELAY_MS);
        assert_eq!(writer.flush_due(&backend, after), 1);

        let loaded: Profile = load_snapshot(&backend, keys::PROFILE);
        assert_eq!(loaded.gold, 2);
        assert!(!writer.has_pending());
    }
}
