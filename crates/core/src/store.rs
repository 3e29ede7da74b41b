//! Durable game-identity to external-identity table.
//!
//! The file is line oriented UTF-8: `#` comments, blank lines, and
//! `game_id:external_id` data lines. It is rewritten in full on every
//! mutation; there is no cross-process locking.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::error::StoreError;

/// File name of the store inside the data directory.
pub const STORE_FILE_NAME: &str = "linked_accounts.txt";

/// Confirmed links, kept in insertion order.
pub type LinkMap = IndexMap<String, String>;

/// In-memory link table backed by a flat file.
#[derive(Debug)]
pub struct LinkStore {
	path: PathBuf,
	links: RwLock<LinkMap>,
	/// Serialises whole-file rewrites so the last save reflects the latest table.
	save_lock: Mutex<()>,
}

impl LinkStore {
	/// Creates an empty store bound to `path` without touching disk.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			links: RwLock::new(LinkMap::new()),
			save_lock: Mutex::new(()),
		}
	}

	/// Creates a store and loads it, logging (not failing) on I/O errors.
	pub fn open(path: impl Into<PathBuf>) -> Self {
		let store = Self::new(path);
		if let Err(err) = store.load() {
			tracing::warn!(error = %err, "failed to load linked accounts, starting empty");
		}
		store
	}

	/// Path of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Replaces the in-memory table with the file contents.
	///
	/// A missing file leaves the table untouched. Returns the number of links
	/// held afterwards.
	pub fn load(&self) -> Result<usize, StoreError> {
		let text = match std::fs::read_to_string(&self.path) {
			Ok(text) => text,
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
				tracing::debug!(path = %self.path.display(), "no linked accounts file yet");
				return Ok(self.len());
			}
			Err(error) => {
				return Err(StoreError::Io {
					path: self.path.clone(),
					error,
				});
			}
		};

		let parsed = parse_links(&text);
		let count = parsed.len();
		*self.links.write() = parsed;
		tracing::info!(count, path = %self.path.display(), "loaded linked accounts");
		Ok(count)
	}

	/// Rewrites the whole file from the current table.
	pub fn save(&self) -> Result<(), StoreError> {
		let _guard = self.save_lock.lock();
		let (text, count) = {
			let links = self.links.read();
			(render_links(&links, Utc::now()), links.len())
		};

		let io_err = |error| StoreError::Io {
			path: self.path.clone(),
			error,
		};
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent).map_err(io_err)?;
		}
		let tmp = self.path.with_extension("txt.tmp");
		std::fs::write(&tmp, text).map_err(io_err)?;
		std::fs::rename(&tmp, &self.path).map_err(io_err)?;

		tracing::debug!(count, path = %self.path.display(), "saved linked accounts");
		Ok(())
	}

	/// Inserts or overwrites a link and persists. Returns the previous external id.
	pub fn insert(&self, game_id: &str, external_id: &str) -> Option<String> {
		let previous = self.links.write().insert(game_id.to_string(), external_id.to_string());
		self.persist();
		previous
	}

	/// Removes a link and persists if one existed.
	pub fn remove(&self, game_id: &str) -> Option<String> {
		let removed = self.links.write().shift_remove(game_id);
		if removed.is_some() {
			self.persist();
		}
		removed
	}

	fn persist(&self) {
		if let Err(err) = self.save() {
			tracing::warn!(error = %err, "failed to save linked accounts, memory is ahead of disk");
		}
	}

	/// Returns true if `game_id` has a confirmed link.
	pub fn contains(&self, game_id: &str) -> bool {
		self.links.read().contains_key(game_id)
	}

	/// External id linked to `game_id`.
	pub fn get(&self, game_id: &str) -> Option<String> {
		self.links.read().get(game_id).cloned()
	}

	/// First game id (in insertion order) linked to `external_id`.
	pub fn find_by_external(&self, external_id: &str) -> Option<String> {
		self.links
			.read()
			.iter()
			.find(|(_, ext)| ext.as_str() == external_id)
			.map(|(game_id, _)| game_id.clone())
	}

	/// Number of confirmed links.
	pub fn len(&self) -> usize {
		self.links.read().len()
	}

	/// Returns true if no links are held.
	pub fn is_empty(&self) -> bool {
		self.links.read().is_empty()
	}

	/// Copy of the whole table.
	pub fn snapshot(&self) -> LinkMap {
		self.links.read().clone()
	}
}

/// Parses store text. Comments, blank lines, and lines that are not exactly
/// two non-empty colon-separated fields are skipped.
pub fn parse_links(text: &str) -> LinkMap {
	let mut links = LinkMap::new();
	for line in text.lines().map(str::trim) {
		if line.is_empty() || line.starts_with('#') {
			continue;
		}
		let mut fields = line.split(':');
		match (fields.next(), fields.next(), fields.next()) {
			(Some(game_id), Some(external_id), None) if !game_id.is_empty() && !external_id.is_empty() => {
				links.insert(game_id.to_string(), external_id.to_string());
			}
			_ => tracing::debug!(line, "skipping malformed linked accounts line"),
		}
	}
	links
}

/// Renders the header block and one `game_id:external_id` line per link.
pub fn render_links(links: &LinkMap, generated: DateTime<Utc>) -> String {
	let mut out = String::new();
	out.push_str("# Linked Accounts\n");
	out.push_str("# Format: minecraft_username:discord_id\n");
	out.push_str(&format!("# Generated: {}\n\n", generated.to_rfc3339()));
	for (game_id, external_id) in links {
		out.push_str(game_id);
		out.push(':');
		out.push_str(external_id);
		out.push('\n');
	}
	out
}
