//! Boundary to the game server hosting the sessions.

/// Access level the host should apply to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
	/// Privileged session; leave its mode as it is.
	Exempt,
	/// Linked session; lift every restriction (survival).
	Full,
	/// Unlinked session; interaction is restricted (adventure).
	Restricted,
}

/// Effects the core asks of the host.
///
/// Called from worker tasks as well as from the caller's thread; the host is
/// responsible for hopping onto its main thread if it needs one. The core
/// never holds a lock while calling into the host.
pub trait SessionHost: Send + Sync {
	/// Sends chat lines to a connected session.
	fn send_message(&self, game_id: &str, lines: &[String]);

	/// Shows a transient action-bar text.
	fn send_action_bar(&self, game_id: &str, text: &str);

	/// Applies an access level.
	fn set_access(&self, game_id: &str, access: Access);

	/// Evicts the session. The host reports the disconnect back through
	/// [`LinkLifecycle::on_session_end`](crate::LinkLifecycle::on_session_end).
	fn kick(&self, game_id: &str, reason: &str);
}
