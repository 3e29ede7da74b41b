//! Issued, not yet confirmed link requests.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;
use tokio::time::Instant;

use crate::error::{LinkError, LinkResult};

/// Six-digit, zero-padded verification code.
///
/// Not cryptographically strong; a code only has to be unguessable within
/// the short window of a single pending request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerificationCode(String);

impl VerificationCode {
	/// Draws a uniformly random code in `000000..=999999`.
	pub fn generate() -> Self {
		Self::from_number(rand::thread_rng().gen_range(0..=999_999))
	}

	/// Builds the code for `n`, keeping only its last six digits.
	pub fn from_number(n: u32) -> Self {
		Self(format!("{:06}", n % 1_000_000))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Exact string comparison; no trimming or normalisation.
	pub fn matches(&self, candidate: &str) -> bool {
		self.0 == candidate
	}
}

impl fmt::Display for VerificationCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// One outstanding link request.
#[derive(Debug, Clone)]
pub struct PendingLink {
	pub code: VerificationCode,
	/// Handle the player claimed when requesting the link.
	pub external_handle: String,
	issued_at: Instant,
}

impl PendingLink {
	fn is_expired(&self, expiry: Option<Duration>) -> bool {
		expiry.is_some_and(|ttl| self.issued_at.elapsed() >= ttl)
	}
}

/// Pending links keyed by game identity.
///
/// Expiry is checked lazily: an expired entry behaves as absent and is
/// dropped the next time it is looked at.
#[derive(Debug)]
pub struct PendingLinks {
	entries: RwLock<HashMap<String, PendingLink>>,
	expiry: Option<Duration>,
}

impl PendingLinks {
	pub fn new(expiry: Option<Duration>) -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
			expiry,
		}
	}

	/// Issues a fresh code for `game_id`, silently replacing any earlier one.
	pub fn issue(&self, game_id: &str, external_handle: &str) -> VerificationCode {
		self.issue_code(game_id, external_handle, VerificationCode::generate())
	}

	/// Stores a caller-chosen code for `game_id`.
	pub fn issue_code(&self, game_id: &str, external_handle: &str, code: VerificationCode) -> VerificationCode {
		let entry = PendingLink {
			code: code.clone(),
			external_handle: external_handle.to_string(),
			issued_at: Instant::now(),
		};
		if self.entries.write().insert(game_id.to_string(), entry).is_some() {
			tracing::debug!(game_id, "replaced earlier pending link");
		}
		code
	}

	/// Removes and returns the entry for `game_id` if `code` matches it.
	///
	/// A mismatch leaves the entry in place.
	pub fn consume(&self, game_id: &str, code: &str) -> LinkResult<PendingLink> {
		let mut entries = self.entries.write();
		let Some(entry) = entries.get(game_id) else {
			return Err(LinkError::NoPendingLink);
		};
		if entry.is_expired(self.expiry) {
			entries.remove(game_id);
			tracing::debug!(game_id, "pending link expired");
			return Err(LinkError::NoPendingLink);
		}
		if !entry.code.matches(code) {
			return Err(LinkError::CodeMismatch);
		}
		entries.remove(game_id).ok_or(LinkError::NoPendingLink)
	}

	/// Returns true if a live entry exists for `game_id`.
	pub fn contains(&self, game_id: &str) -> bool {
		self.get(game_id).is_some()
	}

	/// Live entry for `game_id`, dropping it if it has expired.
	pub fn get(&self, game_id: &str) -> Option<PendingLink> {
		{
			let entries = self.entries.read();
			let entry = entries.get(game_id)?;
			if !entry.is_expired(self.expiry) {
				return Some(entry.clone());
			}
		}

		self.evict_if_expired(game_id)
	}

	/// Removes the entry for `game_id` only if the one present now is
	/// expired; an entry reissued since the caller looked survives.
	fn evict_if_expired(&self, game_id: &str) -> Option<PendingLink> {
		let mut entries = self.entries.write();
		if entries.get(game_id).is_some_and(|entry| entry.is_expired(self.expiry)) {
			entries.remove(game_id);
			tracing::debug!(game_id, "pending link expired");
			return None;
		}
		entries.get(game_id).cloned()
	}

	/// Drops the entry for `game_id` regardless of state.
	pub fn remove(&self, game_id: &str) -> Option<PendingLink> {
		self.entries.write().remove(game_id)
	}

	/// Drops every expired entry and returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		let mut entries = self.entries.write();
		let before = entries.len();
		entries.retain(|_, entry| !entry.is_expired(self.expiry));
		before - entries.len()
	}

	/// Number of stored entries, expired or not.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}
