//! Fixed-capacity, sequence-numbered log of recent vote lines.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

/// Number of entries retained.
pub const RING_CAPACITY: usize = 512;

/// Largest page a poller may request.
pub const MAX_QUERY_LIMIT: usize = 200;

/// Page size used when the poller does not ask for one.
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// One captured line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RingEntry {
	/// Sequence number, strictly increasing and never reused.
	pub seq: u64,
	/// Capture time in milliseconds since the Unix epoch.
	pub time: i64,
	/// Raw captured text.
	pub line: String,
}

#[derive(Debug)]
struct RingState {
	entries: VecDeque<RingEntry>,
	last_seq: u64,
}

/// Ring buffer guarded by a single lock so sequence assignment and eviction
/// are atomic with respect to readers.
#[derive(Debug)]
pub struct EventRingBuffer {
	capacity: usize,
	state: Mutex<RingState>,
}

impl Default for EventRingBuffer {
	fn default() -> Self {
		Self::new()
	}
}

impl EventRingBuffer {
	/// Creates a buffer holding [`RING_CAPACITY`] entries.
	pub fn new() -> Self {
		Self::with_capacity(RING_CAPACITY)
	}

	/// Creates a buffer holding at most `capacity` entries.
	///
	/// # Panics
	///
	/// Panics if `capacity` is zero.
	pub fn with_capacity(capacity: usize) -> Self {
		assert!(capacity > 0, "ring capacity must be > 0");
		Self {
			capacity,
			state: Mutex::new(RingState {
				entries: VecDeque::with_capacity(capacity),
				last_seq: 0,
			}),
		}
	}

	/// Appends a line stamped with the current time; returns its sequence number.
	pub fn append(&self, line: impl Into<String>) -> u64 {
		self.append_at(line, chrono::Utc::now().timestamp_millis())
	}

	/// Appends a line with an explicit capture time.
	pub fn append_at(&self, line: impl Into<String>, time: i64) -> u64 {
		let mut state = self.state.lock();
		state.last_seq += 1;
		let seq = state.last_seq;
		state.entries.push_back(RingEntry { seq, time, line: line.into() });
		while state.entries.len() > self.capacity {
			state.entries.pop_front();
		}
		seq
	}

	/// Entries with `seq > after_seq`, ascending, at most `limit` of them.
	pub fn query(&self, after_seq: u64, limit: usize) -> Vec<RingEntry> {
		self.state
			.lock()
			.entries
			.iter()
			.filter(|entry| entry.seq > after_seq)
			.take(limit)
			.cloned()
			.collect()
	}

	/// Sequence number of the newest entry, or 0 when empty.
	pub fn latest_seq(&self) -> u64 {
		self.state.lock().entries.back().map_or(0, |entry| entry.seq)
	}

	pub fn len(&self) -> usize {
		self.state.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.lock().entries.is_empty()
	}
}

/// Clamps a poller-supplied page size into `1..=MAX_QUERY_LIMIT`.
pub fn clamp_limit(limit: i64) -> usize {
	limit.clamp(1, MAX_QUERY_LIMIT as i64) as usize
}

/// Renders entries as `[{"seq":..,"time":..,"line":".."}, ...]`.
pub fn entries_to_json(entries: &[RingEntry]) -> String {
	serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string())
}
