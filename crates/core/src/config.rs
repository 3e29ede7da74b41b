//! Runtime configuration.
//!
//! Read from a TOML file with kebab-case keys. Every key is optional:
//!
//! ```toml
//! require-linking = true
//! link-timeout-minutes = 10
//! link-reminder-minutes = 5
//! pending-expiry-minutes = 5
//! webhook-url = "https://discord.com/api/webhooks/..."
//! bot-api-url = "http://localhost:8080"
//! vote-channel-id = "1417983368057978961"
//! data-dir = "plugins/linkguard"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::store::STORE_FILE_NAME;

/// Parsed linking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LinkConfig {
	/// Arm the warning/reminder/kick timers for unlinked sessions.
	pub require_linking: bool,
	/// Minutes an unlinked session may stay before being kicked.
	pub link_timeout_minutes: u32,
	/// Minutes after join at which the reminder is sent. Ignored unless it
	/// lies strictly between zero and the timeout.
	pub link_reminder_minutes: u32,
	/// Minutes a verification code stays valid. Zero keeps codes until they
	/// are consumed or the session ends.
	pub pending_expiry_minutes: u32,
	/// Discord webhook receiving embeds. Empty disables delivery.
	pub webhook_url: String,
	/// Bot endpoint used for channel-targeted notices.
	pub bot_api_url: String,
	/// Channel receiving vote announcements.
	pub vote_channel_id: String,
	/// Directory holding `linked_accounts.txt`.
	pub data_dir: PathBuf,
}

impl Default for LinkConfig {
	fn default() -> Self {
		Self {
			require_linking: true,
			link_timeout_minutes: 10,
			link_reminder_minutes: 5,
			pending_expiry_minutes: 5,
			webhook_url: String::new(),
			bot_api_url: "http://localhost:8080".to_string(),
			vote_channel_id: String::new(),
			data_dir: PathBuf::from("."),
		}
	}
}

impl LinkConfig {
	/// Parse a TOML string into a validated [`LinkConfig`].
	pub fn parse(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Load configuration from a file. A missing file yields the defaults.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		match std::fs::read_to_string(path) {
			Ok(content) => Self::parse(&content),
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
				tracing::info!(path = %path.display(), "no config file, using defaults");
				Ok(Self::default())
			}
			Err(error) => Err(ConfigError::Io {
				path: path.to_path_buf(),
				error,
			}),
		}
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.link_timeout_minutes == 0 {
			return Err(ConfigError::Invalid("link-timeout-minutes must be greater than zero".to_string()));
		}
		Ok(())
	}

	/// Path of the linked-accounts store.
	pub fn store_path(&self) -> PathBuf {
		self.data_dir.join(STORE_FILE_NAME)
	}

	/// Delay before an unlinked session is kicked.
	pub fn link_timeout(&self) -> Duration {
		minutes(self.link_timeout_minutes)
	}

	/// Delay before the reminder, when one applies.
	pub fn link_reminder(&self) -> Option<Duration> {
		(self.link_reminder_minutes > 0 && self.link_reminder_minutes < self.link_timeout_minutes).then(|| minutes(self.link_reminder_minutes))
	}

	/// Lifetime of an issued verification code, when codes expire at all.
	pub fn pending_expiry(&self) -> Option<Duration> {
		(self.pending_expiry_minutes > 0).then(|| minutes(self.pending_expiry_minutes))
	}
}

fn minutes(n: u32) -> Duration {
	Duration::from_secs(u64::from(n) * 60)
}
