//! Per-session enforcement timers for unlinked players.
//!
//! Each active session owns one [`Scope`]. Arming a session opens a fresh
//! scope and schedules its actions under it, so disarming, disconnecting, or
//! re-arming closes the scope and cancels all of them at once. Every
//! action re-checks "same generation, still restricted, still unlinked"
//! before it touches the host, which makes a late cancellation harmless.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use linkguard_worker::{Deferred, Scope, ScopeIssuer};
use parking_lot::RwLock;

use crate::config::LinkConfig;
use crate::host::SessionHost;
use crate::notify::{LinkEvent, NotificationSink};
use crate::store::LinkStore;

/// Delay before the first "you are not linked" warning.
pub const WARNING_DELAY: Duration = Duration::from_secs(3);
/// Delay before the one-off hint when linking is optional.
pub const HINT_DELAY: Duration = Duration::from_secs(5);
/// Delay before greeting a linked player.
pub const WELCOME_DELAY: Duration = Duration::from_secs(2);
/// First action-bar nudge after join.
pub const NUDGE_DELAY: Duration = Duration::from_secs(1);
/// Action-bar nudge period.
pub const NUDGE_PERIOD: Duration = Duration::from_secs(5);

/// Shown to a player kicked for not linking in time.
pub const KICK_MESSAGE: &str = "Account Linking Required\n\nYou must link your Discord account to play.\nJoin our Discord and use /link to get started.\n\nReconnect after linking to play!";

const NUDGE_TEXT: &str = "You must verify your Discord account to play! Use /link <discord_name>";

/// Enforcement state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementState {
	/// Linked or exempt.
	Unrestricted,
	/// Unlinked, but linking is optional so nothing is scheduled.
	RestrictedNoTasks,
	/// Unlinked with warning, reminder, and kick scheduled.
	RestrictedPending,
	/// Kicked; terminal until the session ends.
	Kicked,
}

impl EnforcementState {
	fn is_restricted(self) -> bool {
		matches!(self, Self::RestrictedNoTasks | Self::RestrictedPending)
	}
}

/// Timer settings derived from [`LinkConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementPolicy {
	pub require_linking: bool,
	pub timeout: Duration,
	/// Reminder delay; only set when it falls strictly inside the timeout.
	pub reminder: Option<Duration>,
}

impl From<&LinkConfig> for EnforcementPolicy {
	fn from(config: &LinkConfig) -> Self {
		Self {
			require_linking: config.require_linking,
			timeout: config.link_timeout(),
			reminder: config.link_reminder(),
		}
	}
}

struct Session {
	exempt: bool,
	state: EnforcementState,
	scope: Scope,
	kick: Option<Deferred>,
	tasks: Vec<Deferred>,
}

impl Session {
	fn cancel_tasks(&mut self) {
		self.scope.close();
		self.kick = None;
		self.tasks.clear();
	}
}

/// Schedules and cancels enforcement actions per game identity.
#[derive(Clone)]
pub struct EnforcementScheduler {
	inner: Arc<Inner>,
}

struct Inner {
	policy: EnforcementPolicy,
	scopes: ScopeIssuer,
	sessions: RwLock<HashMap<String, Session>>,
	links: Arc<LinkStore>,
	host: Arc<dyn SessionHost>,
	sink: Arc<dyn NotificationSink>,
}

impl EnforcementScheduler {
	pub fn new(policy: EnforcementPolicy, links: Arc<LinkStore>, host: Arc<dyn SessionHost>, sink: Arc<dyn NotificationSink>) -> Self {
		Self {
			inner: Arc::new(Inner {
				policy,
				scopes: ScopeIssuer::new(),
				sessions: RwLock::new(HashMap::new()),
				links,
				host,
				sink,
			}),
		}
	}

	pub fn policy(&self) -> &EnforcementPolicy {
		&self.inner.policy
	}

	/// Records a new session, cancelling whatever a previous session for the
	/// same identity had scheduled. Starts out unrestricted.
	pub fn begin_session(&self, game_id: &str, exempt: bool) {
		let session = Session {
			exempt,
			state: EnforcementState::Unrestricted,
			scope: self.inner.scopes.open(),
			kick: None,
			tasks: Vec::new(),
		};
		if let Some(mut previous) = self.inner.sessions.write().insert(game_id.to_string(), session) {
			previous.cancel_tasks();
			tracing::debug!(game_id, "replaced stale session");
		}
	}

	/// Forgets the session and cancels everything scheduled for it.
	pub fn end_session(&self, game_id: &str) -> bool {
		let Some(mut session) = self.inner.sessions.write().remove(game_id) else {
			return false;
		};
		session.cancel_tasks();
		tracing::debug!(game_id, state = ?session.state, "enforcement.end_session");
		true
	}

	/// Restricts an active, non-exempt session and schedules its actions from
	/// scratch. Returns the resulting state, or `None` if no session is active.
	pub fn arm(&self, game_id: &str) -> Option<EnforcementState> {
		let inner = &self.inner;
		let mut sessions = inner.sessions.write();
		let session = sessions.get_mut(game_id)?;
		if session.exempt {
			return Some(session.state);
		}

		session.cancel_tasks();
		session.scope = inner.scopes.open();
		let generation = session.scope.generation();

		let nudge = {
			let inner = Arc::clone(inner);
			let id = game_id.to_string();
			Deferred::every(&session.scope, NUDGE_DELAY, NUDGE_PERIOD, move || inner.nudge(&id, generation))
		};
		session.tasks.push(nudge);

		if inner.policy.require_linking {
			session.tasks.push(self.after(game_id, &session.scope, WARNING_DELAY, Inner::send_warning));
			if let Some(reminder) = inner.policy.reminder {
				session.tasks.push(self.after(game_id, &session.scope, reminder, Inner::send_reminder));
			}
			session.kick = Some(self.after(game_id, &session.scope, inner.policy.timeout, Inner::kick));
			session.state = EnforcementState::RestrictedPending;
		} else {
			session.tasks.push(self.after(game_id, &session.scope, HINT_DELAY, Inner::send_hint));
			session.state = EnforcementState::RestrictedNoTasks;
		}

		tracing::debug!(game_id, generation, state = ?session.state, "enforcement.arm");
		Some(session.state)
	}

	/// Cancels every scheduled action and lifts the restriction. Returns true
	/// if a session was active.
	pub fn disarm(&self, game_id: &str) -> bool {
		let mut sessions = self.inner.sessions.write();
		let Some(session) = sessions.get_mut(game_id) else {
			return false;
		};
		session.cancel_tasks();
		session.scope = self.inner.scopes.open();
		session.state = EnforcementState::Unrestricted;
		tracing::debug!(game_id, "enforcement.disarm");
		true
	}

	/// Schedules the welcome-back message for a linked session.
	pub fn welcome(&self, game_id: &str) {
		let mut sessions = self.inner.sessions.write();
		if let Some(session) = sessions.get_mut(game_id) {
			let task = self.after(game_id, &session.scope, WELCOME_DELAY, Inner::send_welcome);
			session.tasks.push(task);
		}
	}

	fn after(&self, game_id: &str, scope: &Scope, delay: Duration, action: fn(&Inner, &str, u64)) -> Deferred {
		let inner = Arc::clone(&self.inner);
		let id = game_id.to_string();
		let generation = scope.generation();
		Deferred::after(scope, delay, move || action(&inner, &id, generation))
	}

	pub fn state_of(&self, game_id: &str) -> Option<EnforcementState> {
		self.inner.sessions.read().get(game_id).map(|s| s.state)
	}

	pub fn is_active(&self, game_id: &str) -> bool {
		self.inner.sessions.read().contains_key(game_id)
	}

	pub fn is_exempt(&self, game_id: &str) -> bool {
		self.inner.sessions.read().get(game_id).is_some_and(|s| s.exempt)
	}

	/// Returns true while a kick is scheduled for `game_id`.
	pub fn kick_scheduled(&self, game_id: &str) -> bool {
		self.inner.sessions.read().get(game_id).is_some_and(|s| s.kick.is_some())
	}

	pub fn active_sessions(&self) -> usize {
		self.inner.sessions.read().len()
	}

	/// Cancels every scheduled action and forgets all sessions.
	pub fn shutdown(&self) {
		let mut sessions = self.inner.sessions.write();
		for session in sessions.values_mut() {
			session.cancel_tasks();
		}
		let count = sessions.len();
		sessions.clear();
		tracing::debug!(count, "enforcement.shutdown");
	}
}

impl Inner {
	/// Stale-action guard shared by every restriction action.
	fn still_restricted(&self, game_id: &str, generation: u64) -> bool {
		let armed = self
			.sessions
			.read()
			.get(game_id)
			.is_some_and(|s| s.scope.generation() == generation && s.state.is_restricted());
		armed && !self.links.contains(game_id)
	}

	fn send_warning(&self, game_id: &str, generation: u64) {
		if !self.still_restricted(game_id, generation) {
			tracing::trace!(game_id, "stale warning skipped");
			return;
		}
		let minutes = self.policy.timeout.as_secs() / 60;
		self.host.send_message(
			game_id,
			&[
				"Your account is not linked to Discord!".to_string(),
				"You are in Adventure mode until you verify!".to_string(),
				"Use /link <your_discord_username> to link your account.".to_string(),
				"Example: /link JohnDoe or /link JohnDoe#1234".to_string(),
				format!("You have {minutes} minutes to link or you'll be kicked!"),
				"After linking, you'll be switched to Survival mode!".to_string(),
			],
		);
	}

	fn send_reminder(&self, game_id: &str, generation: u64) {
		if !self.still_restricted(game_id, generation) {
			tracing::trace!(game_id, "stale reminder skipped");
			return;
		}
		let reminder = self.policy.reminder.unwrap_or_default();
		let remaining = self.policy.timeout.saturating_sub(reminder).as_secs() / 60;
		self.host.send_message(
			game_id,
			&[
				format!("You have {remaining} minutes left to link your account!"),
				"Use /link <discord_username> to avoid being kicked.".to_string(),
			],
		);
	}

	fn send_hint(&self, game_id: &str, generation: u64) {
		if self.still_restricted(game_id, generation) {
			self.host
				.send_message(game_id, &["Link your Discord account with /link YourDiscordName".to_string()]);
		}
	}

	fn send_welcome(&self, game_id: &str, generation: u64) {
		let active = self
			.sessions
			.read()
			.get(game_id)
			.is_some_and(|s| s.scope.generation() == generation && s.state == EnforcementState::Unrestricted);
		if active && self.links.contains(game_id) {
			self.host
				.send_message(game_id, &["Welcome back! Your Discord account is linked.".to_string()]);
		}
	}

	fn nudge(&self, game_id: &str, generation: u64) -> ControlFlow<()> {
		if !self.still_restricted(game_id, generation) {
			return ControlFlow::Break(());
		}
		self.host.send_action_bar(game_id, NUDGE_TEXT);
		ControlFlow::Continue(())
	}

	fn kick(&self, game_id: &str, generation: u64) {
		{
			let mut sessions = self.sessions.write();
			let Some(session) = sessions.get_mut(game_id) else {
				return;
			};
			if session.scope.generation() != generation || session.state != EnforcementState::RestrictedPending {
				return;
			}
			if self.links.contains(game_id) {
				session.cancel_tasks();
				session.scope = self.scopes.open();
				session.state = EnforcementState::Unrestricted;
				tracing::debug!(game_id, "linked before the kick fired");
				return;
			}
			session.cancel_tasks();
			session.state = EnforcementState::Kicked;
		}

		tracing::warn!(game_id, "kicking session that did not link in time");
		self.host.kick(game_id, KICK_MESSAGE);
		self.sink.send(
			LinkEvent::Kicked {
				game_id: game_id.to_string(),
			}
			.notice(),
		);
	}
}
