//! A [`SessionHost`] that prints effects to stdout.

use linkguard_core::{Access, SessionHost};
use tokio::sync::mpsc::UnboundedSender;

/// Prints every effect and forwards kicks to the console loop, which then
/// ends the session the way a real server would on disconnect.
pub struct ConsoleHost {
	kicks: UnboundedSender<String>,
}

impl ConsoleHost {
	pub fn new(kicks: UnboundedSender<String>) -> Self {
		Self { kicks }
	}
}

impl SessionHost for ConsoleHost {
	fn send_message(&self, game_id: &str, lines: &[String]) {
		for line in lines {
			println!("[to {game_id}] {line}");
		}
	}

	fn send_action_bar(&self, game_id: &str, text: &str) {
		println!("[bar {game_id}] {text}");
	}

	fn set_access(&self, game_id: &str, access: Access) {
		let mode = match access {
			Access::Exempt => "unchanged",
			Access::Full => "survival",
			Access::Restricted => "adventure",
		};
		println!("[mode {game_id}] {mode}");
	}

	fn kick(&self, game_id: &str, message: &str) {
		println!("[kick {game_id}] {}", message.replace('\n', " / "));
		if self.kicks.send(game_id.to_string()).is_err() {
			tracing::debug!(game_id, "console loop gone, kick not forwarded");
		}
	}
}
