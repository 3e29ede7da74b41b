//! Player and console commands.
//!
//! Parsing is separate from dispatch so hosts with their own command
//! framework can build a [`Command`] directly.

use std::sync::Arc;

use crate::error::{CommandError, LinkError};
use crate::lifecycle::LinkLifecycle;
use crate::ring::{DEFAULT_QUERY_LIMIT, EventRingBuffer, clamp_limit, entries_to_json};

/// Who issued a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
	Console,
	Player { name: String, admin: bool },
}

impl Caller {
	/// Console, or a player holding the admin capability.
	pub fn is_privileged(&self) -> bool {
		match self {
			Self::Console => true,
			Self::Player { admin, .. } => *admin,
		}
	}
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	/// `/link <handle...>`
	Link { handle: String },
	/// `/unlink`
	Unlink,
	/// `/linked`
	Linked,
	/// `dilinkverify <game_id> <external_id> <code>`
	Verify { game_id: String, external_id: String, code: String },
	/// `dilinkreload`
	Reload,
	/// `dilinkunlink <game_id>`
	UnlinkOther { game_id: String },
	/// `divotelog [after] [limit]`
	VoteLog { after: u64, limit: usize },
}

impl Command {
	/// Parses a command name and its whitespace-split arguments.
	pub fn parse(name: &str, args: &[&str]) -> Result<Self, CommandError> {
		match name.to_lowercase().as_str() {
			"link" => {
				let handle = args.join(" ").trim().to_string();
				if handle.is_empty() {
					return Err(CommandError::Usage("/link <discord_username>"));
				}
				Ok(Self::Link { handle })
			}
			"unlink" => Ok(Self::Unlink),
			"linked" => Ok(Self::Linked),
			"dilinkverify" => match args {
				[game_id, external_id, code, ..] => Ok(Self::Verify {
					game_id: game_id.to_string(),
					external_id: external_id.to_string(),
					code: code.to_string(),
				}),
				_ => Err(CommandError::Usage("dilinkverify <minecraft_username> <discord_id> <code>")),
			},
			"dilinkreload" => Ok(Self::Reload),
			"dilinkunlink" => match args {
				[game_id, ..] => Ok(Self::UnlinkOther {
					game_id: game_id.to_string(),
				}),
				_ => Err(CommandError::Usage("dilinkunlink <minecraft_username>")),
			},
			"divotelog" => {
				let after = args.first().and_then(|a| a.parse::<u64>().ok()).unwrap_or(0);
				let limit = args
					.get(1)
					.and_then(|a| a.parse::<i64>().ok())
					.map_or(DEFAULT_QUERY_LIMIT, clamp_limit);
				Ok(Self::VoteLog { after, limit })
			}
			other => Err(CommandError::UnknownCommand(other.to_string())),
		}
	}
}

/// Executes commands against the lifecycle and the vote log.
#[derive(Clone)]
pub struct CommandSurface {
	lifecycle: Arc<LinkLifecycle>,
	votes: Arc<EventRingBuffer>,
}

impl CommandSurface {
	pub fn new(lifecycle: Arc<LinkLifecycle>, votes: Arc<EventRingBuffer>) -> Self {
		Self { lifecycle, votes }
	}

	/// Runs `command` for `caller`, returning the reply lines.
	pub fn dispatch(&self, caller: &Caller, command: Command) -> Result<Vec<String>, CommandError> {
		match command {
			Command::Link { handle } => self.link(player_name(caller)?, &handle),
			Command::Unlink => self.unlink_self(player_name(caller)?),
			Command::Linked => Ok(self.status(player_name(caller)?)),
			Command::Verify {
				game_id,
				external_id,
				code,
			} => {
				require_privileged(caller)?;
				self.lifecycle.verify(&game_id, &code, &external_id)?;
				Ok(vec![format!("Linked successfully: {game_id} -> {external_id}")])
			}
			Command::Reload => {
				require_privileged(caller)?;
				match self.lifecycle.reload() {
					Ok(count) => Ok(vec![format!("Reloaded linked accounts. Total linked: {count}")]),
					Err(err) => {
						tracing::warn!(error = %err, "reload failed");
						Ok(vec![format!("Reload failed: {err}")])
					}
				}
			}
			Command::UnlinkOther { game_id } => {
				require_privileged(caller)?;
				let previous = self.lifecycle.unlink(&game_id)?;
				Ok(vec![format!("Unlinked {game_id} (was {previous})")])
			}
			Command::VoteLog { after, limit } => {
				if *caller != Caller::Console {
					return Err(CommandError::ConsoleOnly);
				}
				Ok(vec![entries_to_json(&self.votes.query(after, limit))])
			}
		}
	}

	/// Parses and runs one line such as `dilinkverify Alice 991122 042917`.
	pub fn dispatch_line(&self, caller: &Caller, line: &str) -> Result<Vec<String>, CommandError> {
		let mut parts = line.split_whitespace();
		let Some(name) = parts.next() else {
			return Ok(Vec::new());
		};
		let args: Vec<&str> = parts.collect();
		let command = Command::parse(name.trim_start_matches('/'), &args)?;
		self.dispatch(caller, command)
	}

	fn link(&self, game_id: &str, handle: &str) -> Result<Vec<String>, CommandError> {
		if self.lifecycle.is_linked(game_id) {
			return Err(LinkError::AlreadyLinked.into());
		}
		if self.lifecycle.has_pending_link(game_id) {
			return Err(CommandError::PendingLinkExists);
		}

		let code = self.lifecycle.request_link(game_id, handle)?;
		let mut lines = vec![
			"Link request sent!".to_string(),
			"Check Discord for your verification code.".to_string(),
			format!("Verification Code: {code}"),
			format!("Type this in Discord: !verify {code}"),
		];
		if let Some(expiry) = self.lifecycle.config().pending_expiry() {
			lines.push(format!("Code expires in {} minutes.", expiry.as_secs() / 60));
		}
		lines.push("After linking, you'll be switched to Survival mode!".to_string());
		Ok(lines)
	}

	fn unlink_self(&self, game_id: &str) -> Result<Vec<String>, CommandError> {
		let previous = self.lifecycle.unlink(game_id)?;
		Ok(vec![
			"Your Discord account has been unlinked successfully!".to_string(),
			format!("Previous Discord ID: {previous}"),
			"You can link a new account with /link <discord_username>".to_string(),
		])
	}

	fn status(&self, game_id: &str) -> Vec<String> {
		if let Some(external_id) = self.lifecycle.external_handle_of(game_id) {
			vec![
				"Your account is linked to Discord!".to_string(),
				format!("Discord ID: {external_id}"),
				format!("Minecraft: {game_id}"),
			]
		} else if self.lifecycle.has_pending_link(game_id) {
			vec!["Your account has a pending link request.".to_string(), "Check Discord for your verification code and use !verify <code>".to_string()]
		} else {
			vec!["Your account is not linked to Discord.".to_string(), "Use /link <discord_username> to link your account.".to_string()]
		}
	}
}

fn player_name(caller: &Caller) -> Result<&str, CommandError> {
	match caller {
		Caller::Player { name, .. } => Ok(name),
		Caller::Console => Err(CommandError::PlayerOnly),
	}
}

fn require_privileged(caller: &Caller) -> Result<(), CommandError> {
	if caller.is_privileged() { Ok(()) } else { Err(CommandError::PermissionDenied) }
}
