//! Outbound, best-effort event notices.

/// Embed accent colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
	Success,
	Danger,
	Request,
	Vote,
	Chat,
	Admin,
}

impl Color {
	/// RGB value as Discord expects it.
	pub const fn rgb(self) -> u32 {
		match self {
			Self::Success => 0x00FF00,
			Self::Danger => 0xFF4444,
			Self::Request => 0x5865F2,
			Self::Vote => 0x00D4AA,
			Self::Chat => 0x3498DB,
			Self::Admin => 0xE74C3C,
		}
	}
}

/// Rendered notice handed to a [`NotificationSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
	pub title: String,
	pub body: String,
	pub color: Color,
	/// Channel the notice should land in, when the plain webhook is not enough.
	pub channel: Option<String>,
}

/// Something worth telling the external platform about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
	ServerStarted,
	LinkRequested { game_id: String, external_handle: String, code: String },
	Linked { game_id: String, external_id: String },
	Unlinked { game_id: String, external_id: String },
	Kicked { game_id: String },
	LinkedPlayerJoined { game_id: String, external_id: String },
	LinkedPlayerLeft { game_id: String, external_id: String },
	VoteReceived { username: String, service: String, channel: String },
	/// A `/msg`, `/tell`, or `/w` between two players.
	PrivateMessage { sender: String, recipient: String, message: String },
	/// Any other command run by an admin.
	AdminCommand { game_id: String, command: String },
}

impl LinkEvent {
	/// Renders the event into a notice.
	pub fn notice(&self) -> Notice {
		let plain = |title: &str, body: String, color| Notice {
			title: title.to_string(),
			body,
			color,
			channel: None,
		};

		match self {
			Self::ServerStarted => plain("🟢 **Server Started**", "The Minecraft server is now online!".to_string(), Color::Success),
			Self::LinkRequested {
				game_id,
				external_handle,
				code,
			} => plain(
				"🔗 New Link Request",
				format!(
					"**🔗 Minecraft Account Link Request**\n\n🎮 **Minecraft:** `{game_id}`\n💬 **Discord:** `{external_handle}`\n🔢 **Verification Code:** `{code}`\n\n**{external_handle}** should type `!verify {code}` in Discord to complete the link."
				),
				Color::Request,
			),
			Self::Linked { game_id, external_id } => plain(
				"🎉 Link Successful",
				format!(
					"✅ **Account Successfully Linked!**\n\n🎮 **Minecraft:** `{game_id}`\n💬 **Discord:** <@{external_id}>\n\nPlayer can now access the server without restrictions!"
				),
				Color::Success,
			),
			Self::Unlinked { game_id, external_id } => plain(
				"🔓 Account Unlinked",
				format!("🔓 **Account Unlinked**\n\n🎮 **Minecraft:** `{game_id}`\n💬 **Discord:** <@{external_id}>\n\nAccount linking has been removed."),
				Color::Danger,
			),
			Self::Kicked { game_id } => plain(
				"⚠️ Player Kicked",
				format!("**{game_id}** was kicked for not linking their Discord account."),
				Color::Danger,
			),
			Self::LinkedPlayerJoined { game_id, external_id } => plain(
				"📥 Linked Player Joined",
				format!("**{game_id}** (linked to <@{external_id}>) joined the server"),
				Color::Success,
			),
			Self::LinkedPlayerLeft { game_id, external_id } => plain(
				"📤 Linked Player Left",
				format!("**{game_id}** (linked to <@{external_id}>) left the server"),
				Color::Danger,
			),
			Self::VoteReceived { username, service, channel } => {
				let lower = service.to_lowercase();
				let body = if lower.contains("planetminecraft") || lower.contains("pmc") {
					format!(
						"**🗳️ Thank you {username} for voting for us on PMC!**\n\n🌟 **Your vote helps our server grow!**\n🎮 **Player:** `{username}`\n📊 **Vote Site:** PlanetMinecraft.com\n\n💰 *Vote rewards have been automatically given!*"
					)
				} else {
					format!(
						"**🗳️ Thank you {username} for voting!**\n\n🎮 **Player:** `{username}`\n📊 **Vote Site:** {service}\n\n💰 *Vote rewards have been automatically given!*"
					)
				};
				Notice {
					title: "🗳️ New Vote Received!".to_string(),
					body,
					color: Color::Vote,
					channel: Some(channel.clone()).filter(|c| !c.is_empty()),
				}
			}
			Self::PrivateMessage {
				sender,
				recipient,
				message,
			} => plain(
				"📨 /msg Command",
				format!("**💬 Private Message**\n\n**From:** `{sender}`\n**To:** `{recipient}`\n**Message:** {message}"),
				Color::Chat,
			),
			Self::AdminCommand { game_id, command } => plain(
				"🔧 Admin Command",
				format!("**⚡ Admin Command Executed**\n\n**User:** `{game_id}`\n**Command:** `{command}`"),
				Color::Admin,
			),
		}
	}
}

/// Fire-and-forget notice delivery.
///
/// Implementations must not block the caller; failures are theirs to log.
pub trait NotificationSink: Send + Sync {
	fn send(&self, notice: Notice);
}

/// Sink that only logs, for hosts without a webhook.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
	fn send(&self, notice: Notice) {
		tracing::info!(title = %notice.title, channel = ?notice.channel, "notice");
	}
}
