//! Error types for linking, persistence, delivery, configuration, and commands.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single link-lifecycle operation.
///
/// Every variant is recoverable and reported back to whoever asked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
	/// The game identity already has a confirmed link.
	#[error("account is already linked")]
	AlreadyLinked,
	/// The game identity has no confirmed link.
	#[error("account is not linked")]
	NotLinked,
	/// No live pending link exists for the game identity.
	#[error("no pending link request")]
	NoPendingLink,
	/// The supplied code differs from the issued one.
	#[error("verification code does not match")]
	CodeMismatch,
	/// An identity breaks the length or character rules, or cannot be stored.
	#[error("invalid external identity: {0}")]
	InvalidIdentityFormat(String),
}

/// Result type for link-lifecycle operations.
pub type LinkResult<T> = std::result::Result<T, LinkError>;

/// Errors reading or writing the linked-accounts file.
#[derive(Debug, Error)]
pub enum StoreError {
	/// Error reading or writing the store file.
	#[error("I/O error on {path}: {error}")]
	Io {
		/// Path to the store file.
		path: PathBuf,
		/// The underlying I/O error.
		#[source]
		error: std::io::Error,
	},
}

/// Notification delivery failures. Only ever logged.
#[derive(Debug, Error)]
pub enum TransportError {
	/// No endpoint is configured for this notice.
	#[error("no webhook URL configured")]
	NotConfigured,
	/// The endpoint answered 429.
	#[error("rate limited")]
	RateLimited,
	/// The endpoint answered with an unexpected status.
	#[error("unexpected response status {0}")]
	Status(u16),
	/// The request never produced a response.
	#[error("request failed: {0}")]
	Request(String),
}

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading the configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or field types.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A value parsed but is out of range.
	#[error("invalid configuration: {0}")]
	Invalid(String),
}

/// Errors surfaced by the command surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
	/// Caller lacks the administrative capability.
	#[error("you don't have permission to use this command")]
	PermissionDenied,
	/// Command may only be run from the console.
	#[error("this command is console-only")]
	ConsoleOnly,
	/// Command may only be run by a connected player.
	#[error("this command can only be used by players")]
	PlayerOnly,
	/// Missing or malformed arguments.
	#[error("usage: {0}")]
	Usage(&'static str),
	/// A link request is already waiting for verification.
	#[error("you already have a pending link request; check Discord for your verification code")]
	PendingLinkExists,
	/// Command name not recognised.
	#[error("unknown command: {0}")]
	UnknownCommand(String),
	/// The underlying lifecycle operation failed.
	#[error(transparent)]
	Link(#[from] LinkError),
}
