//! Orchestrates pending codes, confirmed links, enforcement, and notices.

use std::ops::ControlFlow;
use std::sync::Arc;

use linkguard_worker::{Deferred, ScopeIssuer};
use parking_lot::Mutex;

use crate::config::LinkConfig;
use crate::enforcement::{EnforcementPolicy, EnforcementScheduler, EnforcementState};
use crate::error::{LinkError, LinkResult, StoreError};
use crate::host::{Access, SessionHost};
use crate::notify::{LinkEvent, NotificationSink};
use crate::pending::{PendingLinks, VerificationCode};
use crate::store::{LinkMap, LinkStore};

/// Shortest accepted external handle, in characters.
pub const MIN_HANDLE_LEN: usize = 2;
/// Longest accepted external handle (`name#1234` style included).
pub const MAX_HANDLE_LEN: usize = 37;

/// Normalises a handle typed by a player: trims it, drops one leading `@`,
/// and enforces the length and character rules.
pub fn normalize_external_handle(raw: &str) -> LinkResult<String> {
	let trimmed = raw.trim();
	let handle = trimmed.strip_prefix('@').unwrap_or(trimmed);
	let len = handle.chars().count();
	if !(MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&len) {
		return Err(LinkError::InvalidIdentityFormat(format!(
			"handles must be {MIN_HANDLE_LEN}-{MAX_HANDLE_LEN} characters long"
		)));
	}
	if handle.chars().any(char::is_whitespace) {
		return Err(LinkError::InvalidIdentityFormat("handles cannot contain spaces".to_string()));
	}
	if handle.contains(':') {
		return Err(LinkError::InvalidIdentityFormat("handles cannot contain ':'".to_string()));
	}
	Ok(handle.to_string())
}

/// Shown when an unlinked player tries to leave the restricted mode.
pub const MODE_LOCKED_TEXT: &str = "You must verify your Discord account first! Use /link <discord_name>";
/// Shown when an unlinked player clicks a block.
pub const INTERACT_TEXT: &str = "Verify your Discord account to interact! Use /link <discord_name>";

/// Rejects identities the store format cannot represent.
fn check_storable(id: &str) -> LinkResult<()> {
	if id.is_empty() || id.contains(':') || id.chars().any(char::is_whitespace) {
		return Err(LinkError::InvalidIdentityFormat(format!("{id:?} cannot be stored")));
	}
	Ok(())
}

const MESSAGE_COMMANDS: [&str; 3] = ["/msg", "/tell", "/w"];
const LINK_COMMANDS: [&str; 3] = ["/link", "/unlink", "/linked"];

/// The notice a player command line should produce, if any.
///
/// Private messages with a recipient and a body are always logged; any other
/// command is logged when an admin runs it, except the linking commands.
pub fn command_event(game_id: &str, admin: bool, line: &str) -> Option<LinkEvent> {
	let name = line.split_whitespace().next()?.to_lowercase();
	if MESSAGE_COMMANDS.contains(&name.as_str()) {
		let mut parts = line.splitn(3, ' ');
		let (_, Some(recipient), Some(message)) = (parts.next(), parts.next(), parts.next()) else {
			return None;
		};
		return Some(LinkEvent::PrivateMessage {
			sender: game_id.to_string(),
			recipient: recipient.to_string(),
			message: message.to_string(),
		});
	}
	(admin && !LINK_COMMANDS.contains(&name.as_str())).then(|| LinkEvent::AdminCommand {
		game_id: game_id.to_string(),
		command: line.to_string(),
	})
}

/// The linking state machine.
///
/// All entry points are synchronous and non-blocking apart from the store
/// rewrite; notices are handed to the sink and forgotten.
pub struct LinkLifecycle {
	config: LinkConfig,
	links: Arc<LinkStore>,
	pending: Arc<PendingLinks>,
	sweep: Mutex<Option<Deferred>>,
	enforcement: EnforcementScheduler,
	host: Arc<dyn SessionHost>,
	sink: Arc<dyn NotificationSink>,
}

impl LinkLifecycle {
	/// Opens the store named by `config` and wires the collaborators.
	pub fn new(config: LinkConfig, host: Arc<dyn SessionHost>, sink: Arc<dyn NotificationSink>) -> Self {
		let links = Arc::new(LinkStore::open(config.store_path()));
		Self::with_store(config, links, host, sink)
	}

	/// Wires the collaborators around an existing store.
	pub fn with_store(config: LinkConfig, links: Arc<LinkStore>, host: Arc<dyn SessionHost>, sink: Arc<dyn NotificationSink>) -> Self {
		let enforcement = EnforcementScheduler::new(EnforcementPolicy::from(&config), Arc::clone(&links), Arc::clone(&host), Arc::clone(&sink));
		tracing::info!(
			require_linking = config.require_linking,
			linked = links.len(),
			"link lifecycle ready"
		);
		Self {
			pending: Arc::new(PendingLinks::new(config.pending_expiry())),
			sweep: Mutex::new(None),
			config,
			links,
			enforcement,
			host,
			sink,
		}
	}

	pub fn config(&self) -> &LinkConfig {
		&self.config
	}

	fn notify(&self, event: LinkEvent) {
		tracing::debug!(?event, "notify");
		self.sink.send(event.notice());
	}

	/// Issues a verification code for `game_id`.
	///
	/// Any earlier pending code for the same identity is replaced.
	pub fn request_link(&self, game_id: &str, external_handle: &str) -> LinkResult<VerificationCode> {
		check_storable(game_id)?;
		let handle = normalize_external_handle(external_handle)?;
		if self.links.contains(game_id) {
			return Err(LinkError::AlreadyLinked);
		}

		let code = self.pending.issue(game_id, &handle);
		tracing::info!(game_id, external_handle = %handle, "link requested");
		tracing::debug!(game_id, %code, "verification code issued");
		self.notify(LinkEvent::LinkRequested {
			game_id: game_id.to_string(),
			external_handle: handle,
			code: code.to_string(),
		});
		Ok(code)
	}

	/// Confirms a link when `code` matches the pending code for `game_id`.
	pub fn verify(&self, game_id: &str, code: &str, external_id: &str) -> LinkResult<()> {
		check_storable(game_id)?;
		check_storable(external_id)?;
		if let Err(err) = self.pending.consume(game_id, code) {
			tracing::warn!(game_id, error = %err, "verification failed");
			return Err(err);
		}

		self.links.insert(game_id, external_id);
		self.enforcement.disarm(game_id);
		tracing::info!(game_id, external_id, "account linked");
		self.notify(LinkEvent::Linked {
			game_id: game_id.to_string(),
			external_id: external_id.to_string(),
		});

		if self.enforcement.is_active(game_id) && !self.enforcement.is_exempt(game_id) {
			self.host.set_access(game_id, Access::Full);
			self.host.send_message(
				game_id,
				&[
					"Your Discord account has been successfully linked!".to_string(),
					"You can now play without restrictions!".to_string(),
					"Game mode changed to Survival!".to_string(),
					"Use /linked to check your link status anytime.".to_string(),
				],
			);
			self.host.send_action_bar(game_id, "Account verified! Welcome to the server!");
		}
		Ok(())
	}

	/// Removes the confirmed link for `game_id`; returns the external id it had.
	pub fn unlink(&self, game_id: &str) -> LinkResult<String> {
		let external_id = self.links.remove(game_id).ok_or(LinkError::NotLinked)?;
		tracing::info!(game_id, external_id = %external_id, "account unlinked");
		self.notify(LinkEvent::Unlinked {
			game_id: game_id.to_string(),
			external_id: external_id.clone(),
		});

		if self.enforcement.is_active(game_id) && !self.enforcement.is_exempt(game_id) {
			self.host.set_access(game_id, Access::Restricted);
			self.host.send_message(
				game_id,
				&[
					"Your account has been unlinked!".to_string(),
					"Game mode changed to Adventure - Link your account to play normally!".to_string(),
				],
			);
			self.host
				.send_action_bar(game_id, "Account unlinked! Use /link <discord_name> to re-verify");
			self.enforcement.arm(game_id);
		}

		Ok(external_id)
	}

	/// A session started. Returns the access the host should apply.
	pub fn on_session_start(&self, game_id: &str, exempt: bool) -> Access {
		self.enforcement.begin_session(game_id, exempt);
		if exempt {
			return Access::Exempt;
		}

		if let Some(external_id) = self.links.get(game_id) {
			self.enforcement.welcome(game_id);
			self.notify(LinkEvent::LinkedPlayerJoined {
				game_id: game_id.to_string(),
				external_id,
			});
			return Access::Full;
		}

		let state = self.enforcement.arm(game_id);
		tracing::debug!(game_id, ?state, "unlinked session restricted");
		Access::Restricted
	}

	/// A session ended: cancel its timers and drop its pending code.
	pub fn on_session_end(&self, game_id: &str) {
		self.enforcement.end_session(game_id);
		if self.pending.remove(game_id).is_some() {
			tracing::debug!(game_id, "dropped pending link on disconnect");
		}
		if let Some(external_id) = self.links.get(game_id) {
			self.notify(LinkEvent::LinkedPlayerLeft {
				game_id: game_id.to_string(),
				external_id,
			});
		}
	}

	/// Replaces the confirmed-link table from disk; returns the new count.
	pub fn reload(&self) -> Result<usize, StoreError> {
		let count = self.links.load()?;
		tracing::info!(count, "reloaded linked accounts");
		Ok(count)
	}

	/// Announces a vote in the configured vote channel.
	pub fn announce_vote(&self, username: &str, service: &str) {
		tracing::info!(username, service, "processing vote");
		self.notify(LinkEvent::VoteReceived {
			username: username.to_string(),
			service: service.to_string(),
			channel: self.config.vote_channel_id.clone(),
		});
	}

	/// Announces that the server came online.
	pub fn announce_startup(&self) {
		self.notify(LinkEvent::ServerStarted);
	}

	/// Starts sweeping expired codes once per expiry window, so codes of
	/// players who never come back do not pile up. Returns false when codes
	/// never expire. Calling it again restarts the sweep.
	pub fn start_expiry_sweep(&self) -> bool {
		let Some(window) = self.config.pending_expiry() else {
			return false;
		};
		let pending = Arc::clone(&self.pending);
		let scope = ScopeIssuer::new().open();
		let sweep = Deferred::every(&scope, window, window, move || {
			let purged = pending.purge_expired();
			if purged > 0 {
				tracing::debug!(purged, "purged expired pending links");
			}
			ControlFlow::Continue(())
		});
		if let Some(previous) = self.sweep.lock().replace(sweep) {
			previous.cancel();
		}
		true
	}

	/// Whether `game_id` may switch to `requested`. Unlinked, non-exempt
	/// sessions may not leave the restricted mode and are told why.
	pub fn allow_access_change(&self, game_id: &str, requested: Access) -> bool {
		if requested == Access::Restricted || self.enforcement.is_exempt(game_id) || self.links.contains(game_id) {
			return true;
		}
		tracing::debug!(game_id, ?requested, "refused access change for unlinked session");
		self.host.send_action_bar(game_id, MODE_LOCKED_TEXT);
		false
	}

	/// A player clicked a block. Unlinked, non-exempt sessions get a nudge.
	pub fn on_interact(&self, game_id: &str) {
		if !self.enforcement.is_exempt(game_id) && !self.links.contains(game_id) {
			self.host.send_action_bar(game_id, INTERACT_TEXT);
		}
	}

	/// Logs a command line a player ran, see [`command_event`].
	pub fn on_player_command(&self, game_id: &str, admin: bool, line: &str) {
		if let Some(event) = command_event(game_id, admin, line) {
			tracing::info!(game_id, "player command logged");
			self.notify(event);
		}
	}

	/// Codes currently held, including expired ones not yet swept.
	pub fn pending_count(&self) -> usize {
		self.pending.len()
	}

	/// Cancels all timers and saves the store.
	pub fn shutdown(&self) {
		if let Some(sweep) = self.sweep.lock().take() {
			sweep.cancel();
		}
		self.enforcement.shutdown();
		if let Err(err) = self.links.save() {
			tracing::warn!(error = %err, "failed to save linked accounts on shutdown");
		}
	}

	pub fn is_linked(&self, game_id: &str) -> bool {
		self.links.contains(game_id)
	}

	pub fn external_handle_of(&self, game_id: &str) -> Option<String> {
		self.links.get(game_id)
	}

	/// First game id linked to `external_id`, in link order.
	pub fn game_id_of(&self, external_id: &str) -> Option<String> {
		self.links.find_by_external(external_id)
	}

	pub fn has_pending_link(&self, game_id: &str) -> bool {
		self.pending.contains(game_id)
	}

	pub fn linked_accounts(&self) -> LinkMap {
		self.links.snapshot()
	}

	pub fn enforcement_state(&self, game_id: &str) -> Option<EnforcementState> {
		self.enforcement.state_of(game_id)
	}

	pub fn enforcement(&self) -> &EnforcementScheduler {
		&self.enforcement
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn handles_are_normalised() {
		assert_eq!(normalize_external_handle("  @JohnDoe ").as_deref(), Ok("JohnDoe"));
		assert_eq!(normalize_external_handle("JohnDoe#1234").as_deref(), Ok("JohnDoe#1234"));
	}

	#[test]
	fn bad_handles_are_rejected() {
		let long = "x".repeat(38);
		for raw in ["", "@", "a", "john doe", "a:b", long.as_str()] {
			assert!(
				matches!(normalize_external_handle(raw), Err(LinkError::InvalidIdentityFormat(_))),
				"{raw:?} should be rejected"
			);
		}
		assert!(normalize_external_handle(&"x".repeat(37)).is_ok());
	}

	#[test]
	fn private_messages_and_admin_commands_are_logged() {
		assert_eq!(
			command_event("Alice", false, "/msg Bob meet at spawn"),
			Some(LinkEvent::PrivateMessage {
				sender: "Alice".into(),
				recipient: "Bob".into(),
				message: "meet at spawn".into(),
			})
		);
		assert_eq!(command_event("Alice", false, "/tell Bob"), None, "no message body");
		assert_eq!(command_event("Alice", false, "/gamemode creative"), None);
		assert_eq!(
			command_event("Op", true, "/gamemode creative Bob"),
			Some(LinkEvent::AdminCommand {
				game_id: "Op".into(),
				command: "/gamemode creative Bob".into(),
			})
		);
		assert_eq!(command_event("Op", true, "/weather clear").map(|e| matches!(e, LinkEvent::AdminCommand { .. })), Some(true));
		assert_eq!(command_event("Op", true, "/linked"), None);
		assert_eq!(command_event("Op", true, "   "), None);
	}

	#[test]
	fn storable_ids_are_colon_free() {
		assert!(check_storable("991122").is_ok());
		assert!(check_storable("").is_err());
		assert!(check_storable("1:2").is_err());
	}
}
