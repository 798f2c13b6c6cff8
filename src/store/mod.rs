//! JSON-backed user state store.
//!
//! All audit records and the blacklist live in memory behind a lock. Mutations
//! mark the store dirty; a background task flushes dirty state to a single
//! JSON file and flips approved users whose passcode ran out to `Expired`.

pub mod entities;

pub use entities::{AuditStatus, DenialStep, UserData, UserInfo};

use crate::error::{TreePassError, Result};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const TEMP_FILE_SUFFIX: &str = ".tmp";
const CORRUPT_FILE_SUFFIX: &str = ".corrupt";

/// How often the maintenance task runs each of its jobs.
#[derive(Debug, Clone, Copy)]
pub struct MaintenanceIntervals {
    pub expire: Duration,
    pub save: Duration,
}

impl Default for MaintenanceIntervals {
    fn default() -> Self {
        Self {
            expire: Duration::from_secs(10),
            save: Duration::from_secs(5),
        }
    }
}

#[derive(Default)]
struct StoreState {
    users: HashMap<u64, UserInfo>,
    black_list: HashSet<u64>,
}

/// In-memory user store persisted to a JSON snapshot.
pub struct JsonDataStore {
    path: PathBuf,
    state: RwLock<StoreState>,
    dirty: AtomicBool,
    save_lock: Mutex<()>,
}

impl JsonDataStore {
    /// Open the store at `path`, loading the existing snapshot if there is one.
    ///
    /// A missing or blank file gives an empty store. A file that cannot be parsed
    /// is set aside as `<file>.corrupt` and the store starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let state = load_snapshot(&path).await;
        info!(
            users = state.users.len(),
            blacklisted = state.black_list.len(),
            file = %path.display(),
            "loaded user data"
        );

        Ok(Self {
            path,
            state: RwLock::new(state),
            dirty: AtomicBool::new(false),
            save_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub async fn get_user(&self, qq_id: u64) -> Option<UserInfo> {
        self.state.read().await.users.get(&qq_id).cloned()
    }

    pub async fn user_exists(&self, qq_id: u64) -> bool {
        self.state.read().await.users.contains_key(&qq_id)
    }

    /// Whether any record holds `passcode` (ASCII case-insensitive).
    pub async fn passcode_exists(&self, passcode: &str) -> bool {
        let passcode = passcode.trim();
        if passcode.is_empty() {
            return false;
        }

        self.state
            .read()
            .await
            .users
            .values()
            .any(|u| u.passcode.eq_ignore_ascii_case(passcode))
    }

    /// Insert a new record. Returns `false` if the QQ id is already present.
    pub async fn add_user(&self, mut user: UserInfo) -> bool {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.qq_id) {
            return false;
        }

        user.updated_at = Utc::now();
        state.users.insert(user.qq_id, user);
        self.mark_dirty();
        true
    }

    /// Insert or overwrite a record. An existing record keeps its creation time.
    pub async fn update_user(&self, user: UserInfo) {
        let mut state = self.state.write().await;
        let now = Utc::now();

        match state.users.get_mut(&user.qq_id) {
            Some(existing) => {
                existing.status = user.status;
                existing.passcode = user.passcode;
                existing.expires_at = user.expires_at;
                existing.updated_at = now;
            }
            None => {
                let mut user = user;
                user.updated_at = now;
                state.users.insert(user.qq_id, user);
            }
        }
        self.mark_dirty();
    }

    /// Remove a record. Returns `false` if there was nothing to remove.
    pub async fn delete_user(&self, qq_id: u64) -> bool {
        let removed = self.state.write().await.users.remove(&qq_id).is_some();
        if removed {
            self.mark_dirty();
        }
        removed
    }

    pub async fn all_users(&self) -> Vec<UserInfo> {
        self.state.read().await.users.values().cloned().collect()
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    /// Returns `false` if the id was already blacklisted.
    pub async fn add_to_blacklist(&self, qq_id: u64) -> bool {
        let added = self.state.write().await.black_list.insert(qq_id);
        if added {
            self.mark_dirty();
        }
        added
    }

    /// Returns `false` if the id was not blacklisted.
    pub async fn remove_from_blacklist(&self, qq_id: u64) -> bool {
        let removed = self.state.write().await.black_list.remove(&qq_id);
        if removed {
            self.mark_dirty();
        }
        removed
    }

    pub async fn is_blacklisted(&self, qq_id: u64) -> bool {
        self.state.read().await.black_list.contains(&qq_id)
    }

    pub async fn blacklist(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.state.read().await.black_list.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Expire every approved record whose deadline is before `now`.
    ///
    /// Expired records lose their passcode. Returns the affected QQ ids.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Vec<u64> {
        // Cheap read-only pass first; most scans find nothing.
        let due: Vec<u64> = {
            let state = self.state.read().await;
            state
                .users
                .values()
                .filter(|u| u.is_due_for_expiry(now))
                .map(|u| u.qq_id)
                .collect()
        };
        if due.is_empty() {
            return due;
        }

        let mut state = self.state.write().await;
        let mut expired = Vec::with_capacity(due.len());
        for qq_id in due {
            // Re-check: the record may have changed between the two locks.
            if let Some(user) = state.users.get_mut(&qq_id) {
                if user.is_due_for_expiry(now) {
                    user.status = AuditStatus::Expired;
                    user.passcode.clear();
                    user.updated_at = now;
                    info!(qq_id, "passcode expired");
                    expired.push(qq_id);
                }
            }
        }

        if !expired.is_empty() {
            self.mark_dirty();
        }
        expired
    }

    /// Write the snapshot now, whether or not anything changed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the atomic file write fails. The
    /// store stays dirty in that case so the next flush retries.
    pub async fn save_now(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;

        // Clear before snapshotting so writes racing with the save re-mark it.
        self.dirty.store(false, Ordering::SeqCst);

        let bytes = {
            let state = self.state.read().await;
            let mut users: Vec<UserInfo> = state.users.values().cloned().collect();
            users.sort_by_key(|u| u.qq_id);
            let mut black_list: Vec<u64> = state.black_list.iter().copied().collect();
            black_list.sort_unstable();

            serde_json::to_vec_pretty(&UserData { users, black_list })
        };

        let result = match bytes {
            Ok(bytes) => {
                let path = self.path.clone();
                tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
                    .await
                    .map_err(TreePassError::from)
                    .and_then(|r| r)
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                debug!(file = %self.path.display(), "user data saved");
                Ok(())
            }
            Err(e) => {
                self.mark_dirty();
                Err(e)
            }
        }
    }

    /// Flush to disk only when something changed since the last save.
    pub async fn save_if_dirty(&self) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        self.save_now().await
    }

    /// Start the background expiry scan and periodic flush.
    ///
    /// The task stops when `shutdown` fires (or its sender is dropped), after a
    /// final flush.
    pub fn spawn_maintenance(
        self: &Arc<Self>,
        intervals: MaintenanceIntervals,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut expire_tick = tokio::time::interval(intervals.expire);
            let mut save_tick = tokio::time::interval(intervals.save);
            expire_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            save_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = expire_tick.tick() => {
                        let expired = store.expire_due(Utc::now()).await;
                        if !expired.is_empty() {
                            info!(count = expired.len(), "expired stale passcodes");
                        }
                    }
                    _ = save_tick.tick() => {
                        if let Err(e) = store.save_if_dirty().await {
                            warn!(file = %store.path.display(), "failed to save user data: {}", e);
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }

            if let Err(e) = store.save_if_dirty().await {
                warn!(file = %store.path.display(), "final save failed: {}", e);
            } else {
                info!("user data flushed on shutdown");
            }
        })
    }
}

async fn load_snapshot(path: &Path) -> StoreState {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoreState::default(),
        Err(e) => {
            warn!(file = %path.display(), "error reading data file: {}", e);
            return StoreState::default();
        }
    };

    if text.trim().is_empty() {
        return StoreState::default();
    }

    match serde_json::from_str::<UserData>(&text) {
        Ok(data) => StoreState {
            users: data.users.into_iter().map(|u| (u.qq_id, u)).collect(),
            black_list: data.black_list.into_iter().collect(),
        },
        Err(e) => {
            warn!(file = %path.display(), "error parsing data file: {}", e);
            let backup = PathBuf::from(format!("{}{}", path.display(), CORRUPT_FILE_SUFFIX));
            if let Err(e) = tokio::fs::copy(path, &backup).await {
                warn!(file = %backup.display(), "could not keep corrupt data file: {}", e);
            }
            StoreState::default()
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = PathBuf::from(format!("{}{}", path.display(), TEMP_FILE_SUFFIX));
    let written = std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(TreePassError::Storage(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}
