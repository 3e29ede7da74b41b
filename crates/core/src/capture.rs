//! Tracing layer that copies vote-related log lines into the ring buffer.

use std::fmt;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;

use crate::ring::EventRingBuffer;

/// Returns true for console lines emitted by the vote plugins.
pub fn is_vote_line(message: &str) -> bool {
	let lower = message.to_lowercase();
	lower.contains("[votifier]")
		|| lower.contains("[votingplugin]")
		|| (lower.contains("received a vote") && lower.contains("player"))
		|| (lower.contains("protocol v1 vote record") && lower.contains("vote (from:"))
}

/// A [`tracing_subscriber::Layer`] appending vote lines to an [`EventRingBuffer`].
pub struct VoteCaptureLayer {
	ring: Arc<EventRingBuffer>,
}

impl VoteCaptureLayer {
	pub fn new(ring: Arc<EventRingBuffer>) -> Self {
		Self { ring }
	}
}

/// Visitor for extracting the message field from events.
#[derive(Default)]
struct MessageVisitor {
	message: String,
}

impl Visit for MessageVisitor {
	fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
		if field.name() == "message" {
			self.message = format!("{value:?}");
		}
	}

	fn record_str(&mut self, field: &Field, value: &str) {
		if field.name() == "message" {
			self.message = value.to_string();
		}
	}
}

impl<S> tracing_subscriber::Layer<S> for VoteCaptureLayer
where
	S: Subscriber,
{
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		let mut visitor = MessageVisitor::default();
		event.record(&mut visitor);
		if !visitor.message.is_empty() && is_vote_line(&visitor.message) {
			self.ring.append(visitor.message);
		}
	}
}
