//! Advisory per-file locks shared by cooperating processes
//!
//! Each locked path owns one file in the lock directory, named by the BLAKE3
//! digest of the canonical path and holding a JSON [`LockRecord`]. Creation
//! uses `create_new`, so only one acquirer can win. A lock is stale once it is
//! older than the timeout and its owner is no longer running.

pub mod probe;
mod signals;

pub use probe::{ProcessProbe, SystemProcessProbe};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LockError;
use crate::types::{now_ms, system_time_ms};

pub const LOCK_EXTENSION: &str = "lock";
const RECLAIM_EXTENSION: &str = "reclaim";

/// Body of a lock file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
	pub path: String,
	pub pid: u32,
	pub host: String,
	pub operation: String,
	pub acquired_at: i64,
	pub lock_id: String,
}

#[derive(Debug, Clone)]
pub struct LockOptions {
	pub lock_dir: PathBuf,
	pub timeout: Duration,
	pub retry_interval: Duration,
	pub max_wait: Duration,
}

impl From<&Config> for LockOptions {
	fn from(config: &Config) -> Self {
		LockOptions {
			lock_dir: config.lock_dir(),
			timeout: config.lock_timeout(),
			retry_interval: config.lock_retry_interval(),
			max_wait: config.lock_max_wait(),
		}
	}
}

/// What was found in an existing lock file
#[derive(Debug)]
struct ExistingLock {
	record: Option<LockRecord>,
	body: Vec<u8>,
	age: Duration,
}

impl ExistingLock {
	/// Whether `body` is the same lock file that was inspected
	fn same_lock(&self, body: &[u8]) -> bool {
		match &self.record {
			Some(seen) => serde_json::from_slice::<LockRecord>(body)
				.map(|r| r.lock_id == seen.lock_id)
				.unwrap_or(false),
			None => body == self.body.as_slice(),
		}
	}
}

struct Inner {
	options: LockOptions,
	probe: Arc<dyn ProcessProbe>,
	host: String,
	held: Mutex<HashMap<String, PathBuf>>,
}

/// Lock manager; clones share the set of held locks
#[derive(Clone)]
pub struct FileLockManager {
	inner: Arc<Inner>,
}

fn host_name() -> String {
	sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string())
}

/// Resolve a path through its deepest existing ancestor
///
/// Targets that do not exist yet (a file about to be copied) still map to a
/// stable key.
pub fn canonical_key(path: &Path) -> Result<PathBuf, LockError> {
	let absolute = if path.is_absolute() {
		path.to_path_buf()
	} else {
		std::env::current_dir()
			.map_err(|e| LockError::Io { path: path.to_path_buf(), source: e })?
			.join(path)
	};

	let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
	let mut cursor = absolute.as_path();
	loop {
		if let Ok(canonical) = fs::canonicalize(cursor) {
			let mut key = canonical;
			for part in tail.iter().rev() {
				key.push(part);
			}
			return Ok(key);
		}
		match (cursor.file_name(), cursor.parent()) {
			(Some(name), Some(parent)) => {
				tail.push(name);
				cursor = parent;
			}
			_ => break,
		}
	}

	// Nothing resolvable; fall back to a lexically cleaned absolute path
	if absolute.components().any(|c| matches!(c, Component::ParentDir)) {
		return Err(LockError::InvalidPath { path: path.to_path_buf() });
	}
	Ok(absolute)
}

impl FileLockManager {
	pub fn new(config: &Config) -> Self {
		Self::with_probe(LockOptions::from(config), Arc::new(SystemProcessProbe))
	}

	pub fn with_probe(options: LockOptions, probe: Arc<dyn ProcessProbe>) -> Self {
		FileLockManager {
			inner: Arc::new(Inner {
				options,
				probe,
				host: host_name(),
				held: Mutex::new(HashMap::new()),
			}),
		}
	}

	pub fn lock_dir(&self) -> &Path {
		&self.inner.options.lock_dir
	}

	/// Lock file that guards `path`
	pub fn lock_file_for(&self, path: &Path) -> Result<PathBuf, LockError> {
		let key = canonical_key(path)?;
		let digest = blake3::hash(key.to_string_lossy().as_bytes());
		Ok(self
			.lock_dir()
			.join(format!("{}.{}", hex::encode(digest.as_bytes()), LOCK_EXTENSION)))
	}

	/// Number of locks this manager currently holds
	pub fn held_count(&self) -> usize {
		self.inner.held.lock().unwrap_or_else(|e| e.into_inner()).len()
	}

	fn create_lock_file(&self, lock_file: &Path, record: &LockRecord) -> io::Result<()> {
		let mut file = OpenOptions::new().write(true).create_new(true).open(lock_file)?;
		let body = serde_json::to_vec_pretty(record)
			.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
		if let Err(e) = file.write_all(&body).and_then(|_| file.sync_all()) {
			let _ = fs::remove_file(lock_file);
			return Err(e);
		}
		Ok(())
	}

	/// Read an existing lock file; `None` when it vanished meanwhile
	fn inspect(&self, lock_file: &Path) -> Result<Option<ExistingLock>, LockError> {
		let io_err = |e| LockError::Io { path: lock_file.to_path_buf(), source: e };
		let meta = match fs::metadata(lock_file) {
			Ok(m) => m,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(io_err(e)),
		};
		let body = match fs::read(lock_file) {
			Ok(b) => b,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(io_err(e)),
		};

		let record: Option<LockRecord> = serde_json::from_slice(&body).ok();
		let acquired_at = match &record {
			Some(r) => r.acquired_at,
			None => meta.modified().map(system_time_ms).unwrap_or_else(|_| now_ms()),
		};
		let age = Duration::from_millis(now_ms().saturating_sub(acquired_at).max(0) as u64);
		Ok(Some(ExistingLock { record, body, age }))
	}

	fn is_stale(&self, existing: &ExistingLock) -> bool {
		if existing.age <= self.inner.options.timeout {
			return false;
		}
		match &existing.record {
			// Corrupt or half-written: no owner to probe, age alone decides
			None => true,
			// Owners on other hosts cannot be probed from here
			Some(r) if r.host != self.inner.host => false,
			Some(r) => !self.inner.probe.is_process_alive(r.pid),
		}
	}

	/// Remove a lock judged stale, unless it was replaced after inspection
	///
	/// The file is first renamed to a private tombstone, so only one reclaimer
	/// can take it. A tombstone holding a different lock is linked back in place.
	fn reclaim(&self, lock_file: &Path, existing: &ExistingLock) -> Result<bool, LockError> {
		let io_err = |path: &Path, e| LockError::Io { path: path.to_path_buf(), source: e };
		let mut name = lock_file.as_os_str().to_owned();
		name.push(format!(".{}.{}", uuid::Uuid::new_v4(), RECLAIM_EXTENSION));
		let tombstone = PathBuf::from(name);

		match fs::rename(lock_file, &tombstone) {
			Ok(()) => {}
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
			Err(e) => return Err(io_err(lock_file, e)),
		}
		let body = fs::read(&tombstone).map_err(|e| io_err(&tombstone, e))?;

		if existing.same_lock(&body) {
			fs::remove_file(&tombstone).map_err(|e| io_err(&tombstone, e))?;
			return Ok(true);
		}

		debug!("Lock {} changed owner before reclaim, restoring it", lock_file.display());
		match fs::hard_link(&tombstone, lock_file) {
			Ok(()) => {}
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
				warn!("Lock {} was taken again while restoring it", lock_file.display());
			}
			Err(e) => {
				// Leave the tombstone for inspection rather than lose the record
				return Err(io_err(lock_file, e));
			}
		}
		let _ = fs::remove_file(&tombstone);
		Ok(false)
	}

	/// Acquire the lock for `path`, waiting up to the configured ceiling
	pub async fn acquire(&self, path: &Path, operation: &str) -> Result<String, LockError> {
		let lock_file = self.lock_file_for(path)?;
		fs::create_dir_all(self.lock_dir())
			.map_err(|e| LockError::Io { path: self.lock_dir().to_path_buf(), source: e })?;

		let lock_id = uuid::Uuid::new_v4().to_string();
		let start = Instant::now();

		loop {
			let record = LockRecord {
				path: path.to_string_lossy().into_owned(),
				pid: std::process::id(),
				host: self.inner.host.clone(),
				operation: operation.to_string(),
				acquired_at: now_ms(),
				lock_id: lock_id.clone(),
			};

			match self.create_lock_file(&lock_file, &record) {
				Ok(()) => {
					self.inner
						.held
						.lock()
						.unwrap_or_else(|e| e.into_inner())
						.insert(lock_id.clone(), lock_file.clone());
					debug!("Locked {} for {} ({})", path.display(), operation, lock_id);
					return Ok(lock_id);
				}
				Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
				Err(e) => return Err(LockError::Io { path: lock_file, source: e }),
			}

			let Some(existing) = self.inspect(&lock_file)? else {
				continue;
			};

			if self.is_stale(&existing) {
				warn!(
					"Reclaiming stale lock on {} (owner pid {:?}, age {}ms)",
					path.display(),
					existing.record.as_ref().map(|r| r.pid),
					existing.age.as_millis()
				);
				self.reclaim(&lock_file, &existing)?;
				continue;
			}

			let waited = start.elapsed();
			if waited >= self.inner.options.max_wait {
				return Err(LockError::Timeout {
					path: path.to_path_buf(),
					owner_pid: existing.record.as_ref().map(|r| r.pid),
					owner_operation: existing.record.map(|r| r.operation),
					age: existing.age,
					waited,
				});
			}
			tokio::time::sleep(self.inner.options.retry_interval).await;
		}
	}

	/// Release a lock by id; `false` when it is unknown, already released or reclaimed
	pub fn release(&self, lock_id: &str) -> bool {
		let lock_file = {
			let mut held = self.inner.held.lock().unwrap_or_else(|e| e.into_inner());
			match held.remove(lock_id) {
				Some(f) => f,
				None => return false,
			}
		};

		let body = match fs::read(&lock_file) {
			Ok(b) => b,
			Err(e) => {
				if e.kind() != io::ErrorKind::NotFound {
					warn!("Cannot read lock file {}: {}", lock_file.display(), e);
				}
				return false;
			}
		};
		match serde_json::from_slice::<LockRecord>(&body) {
			Ok(record) if record.lock_id == lock_id => match fs::remove_file(&lock_file) {
				Ok(()) => true,
				Err(e) => {
					warn!("Cannot remove lock file {}: {}", lock_file.display(), e);
					false
				}
			},
			_ => {
				warn!("Lock {} was reclaimed by another owner, leaving it alone", lock_id);
				false
			}
		}
	}

	/// Acquire a lock released when the returned guard drops
	pub async fn acquire_guard(&self, path: &Path, operation: &str) -> Result<LockGuard, LockError> {
		let lock_id = self.acquire(path, operation).await?;
		Ok(LockGuard { manager: self.clone(), lock_id: Some(lock_id) })
	}

	/// Run `fut` while holding the lock for `path`
	pub async fn with_lock<F, T>(&self, path: &Path, operation: &str, fut: F) -> Result<T, LockError>
	where
		F: Future<Output = T>,
	{
		let guard = self.acquire_guard(path, operation).await?;
		let out = fut.await;
		drop(guard);
		Ok(out)
	}

	/// Whether another live owner currently holds the lock for `path`
	pub fn is_locked(&self, path: &Path) -> bool {
		let Ok(lock_file) = self.lock_file_for(path) else {
			return false;
		};
		let Ok(Some(existing)) = self.inspect(&lock_file) else {
			return false;
		};
		if self.is_stale(&existing) {
			return false;
		}
		match &existing.record {
			Some(r) => !self
				.inner
				.held
				.lock()
				.unwrap_or_else(|e| e.into_inner())
				.contains_key(&r.lock_id),
			None => true,
		}
	}

	/// Remove every stale lock in the lock directory
	pub fn sweep(&self) -> Result<usize, LockError> {
		let dir = self.lock_dir();
		let entries = match fs::read_dir(dir) {
			Ok(e) => e,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(LockError::Io { path: dir.to_path_buf(), source: e }),
		};

		let mut reclaimed = 0;
		for entry in entries.flatten() {
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some(LOCK_EXTENSION) {
				continue;
			}
			let Some(existing) = self.inspect(&path)? else {
				continue;
			};
			if self.is_stale(&existing) && self.reclaim(&path, &existing)? {
				debug!("Swept stale lock {}", path.display());
				reclaimed += 1;
			}
		}
		Ok(reclaimed)
	}

	/// Release every lock this manager still holds
	pub fn release_all(&self) -> usize {
		let ids: Vec<String> = self
			.inner
			.held
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.keys()
			.cloned()
			.collect();
		ids.iter().filter(|id| self.release(id)).count()
	}

	/// Release held locks when the process receives SIGINT or SIGTERM
	pub fn install_shutdown_hook(&self) {
		signals::setup_signal_handlers(self.clone());
	}
}

/// RAII guard for one held lock
pub struct LockGuard {
	manager: FileLockManager,
	lock_id: Option<String>,
}

impl LockGuard {
	pub fn lock_id(&self) -> &str {
		self.lock_id.as_deref().unwrap_or("")
	}

	/// Release now instead of on drop
	pub fn release(mut self) -> bool {
		match self.lock_id.take() {
			Some(id) => self.manager.release(&id),
			None => false,
		}
	}
}

impl Drop for LockGuard {
	fn drop(&mut self) {
		if let Some(id) = self.lock_id.take() {
			self.manager.release(&id);
		}
	}
}

/// Write a lock record directly, bypassing acquisition
pub fn write_lock_record(lock_file: &Path, record: &LockRecord) -> io::Result<()> {
	if let Some(parent) = lock_file.parent() {
		fs::create_dir_all(parent)?;
	}
	let body =
		serde_json::to_vec(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
	fs::write(lock_file, body)
}


// vim: ts=4
