//! Discord webhook delivery for [`Notice`]s.
//!
//! Delivery runs on the worker blocking pool. The outcome is logged and never
//! reported back. Channel-targeted notices go through the bot API first and
//! fall back once to the plain webhook when that fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use linkguard_worker::offload;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::config::LinkConfig;
use crate::error::TransportError;
use crate::notify::{Notice, NotificationSink};

const USER_AGENT: &str = "linkguard/0.1";
const WEBHOOK_FOOTER: &str = "Minecraft Server";
const CHANNEL_FOOTER: &str = "Vote System • Minecraft Server";
const FALLBACK_NOTE: &str = "\n\n*Note: This should appear in the vote channel*";

/// Posts notices to a Discord webhook and the companion bot API.
#[derive(Clone)]
pub struct WebhookSink {
	inner: Arc<WebhookInner>,
}

struct WebhookInner {
	webhook_url: String,
	bot_api_url: String,
	agent: ureq::Agent,
}

impl WebhookSink {
	pub fn new(webhook_url: impl Into<String>, bot_api_url: impl Into<String>) -> Self {
		let agent = ureq::AgentBuilder::new()
			.timeout_connect(Duration::from_secs(5))
			.timeout(Duration::from_secs(15))
			.user_agent(USER_AGENT)
			.build();
		Self {
			inner: Arc::new(WebhookInner {
				webhook_url: webhook_url.into(),
				bot_api_url: bot_api_url.into(),
				agent,
			}),
		}
	}

	pub fn from_config(config: &LinkConfig) -> Self {
		if config.webhook_url.is_empty() {
			tracing::warn!("no webhook-url configured, notices will be dropped");
		}
		Self::new(config.webhook_url.clone(), config.bot_api_url.clone())
	}
}

impl WebhookSink {
	/// Queues delivery of `notice`, or returns `None` when no webhook is
	/// configured and the notice was dropped.
	pub fn schedule(&self, notice: Notice) -> Option<JoinHandle<()>> {
		if self.inner.webhook_url.is_empty() {
			tracing::warn!(title = %notice.title, "cannot send notice: {}", TransportError::NotConfigured);
			return None;
		}
		let inner = Arc::clone(&self.inner);
		Some(offload("webhook", move || inner.deliver(notice)))
	}
}

impl NotificationSink for WebhookSink {
	fn send(&self, notice: Notice) {
		drop(self.schedule(notice));
	}
}

impl WebhookInner {
	fn deliver(&self, notice: Notice) {
		let Some(channel) = notice.channel.as_deref() else {
			self.deliver_plain(&notice);
			return;
		};

		let url = format!("{}/vote-notification", self.bot_api_url.trim_end_matches('/'));
		match self.post(&url, &channel_payload(&notice, channel, &now())) {
			Ok(()) => tracing::info!(channel, title = %notice.title, "channel notice sent"),
			Err(err) => {
				tracing::warn!(channel, error = %err, "channel notice failed, falling back to webhook");
				let fallback = Notice {
					body: format!("{}{FALLBACK_NOTE}", notice.body),
					channel: None,
					..notice
				};
				self.deliver_plain(&fallback);
			}
		}
	}

	fn deliver_plain(&self, notice: &Notice) {
		match self.post(&self.webhook_url, &webhook_payload(notice, &now())) {
			Ok(()) => tracing::debug!(title = %notice.title, "webhook notice sent"),
			Err(TransportError::RateLimited) => tracing::warn!(title = %notice.title, "discord webhook rate limited"),
			Err(err) => tracing::warn!(title = %notice.title, error = %err, "discord webhook failed"),
		}
	}

	fn post(&self, url: &str, payload: &Value) -> Result<(), TransportError> {
		match self.agent.post(url).send_json(payload) {
			Ok(resp) => status_outcome(resp.status()),
			Err(ureq::Error::Status(code, _)) => status_outcome(code),
			Err(ureq::Error::Transport(transport)) => Err(TransportError::Request(transport.to_string())),
		}
	}
}

fn now() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Maps an HTTP status to a delivery outcome.
pub fn status_outcome(status: u16) -> Result<(), TransportError> {
	match status {
		200..=299 => Ok(()),
		429 => Err(TransportError::RateLimited),
		other => Err(TransportError::Status(other)),
	}
}

fn embed(notice: &Notice, footer: &str, timestamp: &str) -> Value {
	json!({
		"title": notice.title,
		"description": notice.body,
		"color": notice.color.rgb(),
		"timestamp": timestamp,
		"footer": { "text": footer },
	})
}

/// Body posted to the plain webhook.
pub fn webhook_payload(notice: &Notice, timestamp: &str) -> Value {
	json!({ "embeds": [embed(notice, WEBHOOK_FOOTER, timestamp)] })
}

/// Body posted to the bot API for a channel-targeted notice.
pub fn channel_payload(notice: &Notice, channel: &str, timestamp: &str) -> Value {
	json!({
		"channel_id": channel,
		"embed": embed(notice, CHANNEL_FOOTER, timestamp),
	})
}
