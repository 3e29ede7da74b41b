//! Recording test doubles for the host and the notification sink.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use linkguard_core::{Access, LinkConfig, LinkLifecycle, LinkStore, Notice, NotificationSink, SessionHost};
use parking_lot::Mutex;
use tempfile::TempDir;

// Dependencies of the library that these test binaries do not name.
use chrono as _;
use indexmap as _;
use linkguard_worker as _;
use rand as _;
use serde as _;
use serde_json as _;
use thiserror as _;
use toml as _;
use tracing as _;
use tracing_subscriber as _;
use ureq as _;

/// One effect the core asked of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
	Message(String, Vec<String>),
	ActionBar(String, String),
	Access(String, Access),
	Kick(String, String),
}

#[derive(Default)]
pub struct RecordingHost {
	calls: Mutex<Vec<HostCall>>,
}

impl RecordingHost {
	pub fn calls(&self) -> Vec<HostCall> {
		self.calls.lock().clone()
	}

	pub fn kicks(&self) -> Vec<String> {
		self.calls
			.lock()
			.iter()
			.filter_map(|c| match c {
				HostCall::Kick(id, _) => Some(id.clone()),
				_ => None,
			})
			.collect()
	}

	pub fn messages_to(&self, game_id: &str) -> Vec<String> {
		self.calls
			.lock()
			.iter()
			.filter_map(|c| match c {
				HostCall::Message(id, lines) if id == game_id => Some(lines.join("\n")),
				_ => None,
			})
			.collect()
	}

	pub fn access_of(&self, game_id: &str) -> Option<Access> {
		self.calls.lock().iter().rev().find_map(|c| match c {
			HostCall::Access(id, access) if id == game_id => Some(*access),
			_ => None,
		})
	}

	pub fn action_bars_to(&self, game_id: &str) -> usize {
		self.calls
			.lock()
			.iter()
			.filter(|c| matches!(c, HostCall::ActionBar(id, _) if id == game_id))
			.count()
	}
}

impl SessionHost for RecordingHost {
	fn send_message(&self, game_id: &str, lines: &[String]) {
		self.calls.lock().push(HostCall::Message(game_id.to_string(), lines.to_vec()));
	}

	fn send_action_bar(&self, game_id: &str, text: &str) {
		self.calls.lock().push(HostCall::ActionBar(game_id.to_string(), text.to_string()));
	}

	fn set_access(&self, game_id: &str, access: Access) {
		self.calls.lock().push(HostCall::Access(game_id.to_string(), access));
	}

	fn kick(&self, game_id: &str, message: &str) {
		self.calls.lock().push(HostCall::Kick(game_id.to_string(), message.to_string()));
	}
}

#[derive(Default)]
pub struct RecordingSink {
	notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
	pub fn titles(&self) -> Vec<String> {
		self.notices.lock().iter().map(|n| n.title.clone()).collect()
	}

	pub fn notices(&self) -> Vec<Notice> {
		self.notices.lock().clone()
	}
}

impl NotificationSink for RecordingSink {
	fn send(&self, notice: Notice) {
		self.notices.lock().push(notice);
	}
}

/// A lifecycle over a store in a fresh temporary directory.
pub struct Harness {
	pub lifecycle: LinkLifecycle,
	pub host: Arc<RecordingHost>,
	pub sink: Arc<RecordingSink>,
	pub store: Arc<LinkStore>,
	pub dir: TempDir,
}

impl Harness {
	pub fn new() -> Self {
		Self::with_config(LinkConfig::default())
	}

	pub fn with_config(mut config: LinkConfig) -> Self {
		let dir = tempfile::tempdir().expect("tempdir");
		config.data_dir = dir.path().to_path_buf();
		let store = Arc::new(LinkStore::new(config.store_path()));
		let host = Arc::new(RecordingHost::default());
		let sink = Arc::new(RecordingSink::default());
		let lifecycle = LinkLifecycle::with_store(config, Arc::clone(&store), host.clone(), sink.clone());
		Self {
			lifecycle,
			host,
			sink,
			store,
			dir,
		}
	}
}

pub const fn minutes(n: u64) -> Duration {
	Duration::from_secs(n * 60)
}

/// Advances paused time and lets woken tasks run.
pub async fn advance(by: Duration) {
	tokio::time::sleep(by).await;
	for _ in 0..4 {
		tokio::task::yield_now().await;
	}
}
