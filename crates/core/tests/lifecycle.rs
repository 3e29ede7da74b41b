//! End-to-end link, verify, and unlink flows through [`LinkLifecycle`].

mod common;

use std::time::Duration;

use common::{Harness, advance, minutes};
use linkguard_core::lifecycle::{INTERACT_TEXT, MODE_LOCKED_TEXT};
use linkguard_core::{Access, EnforcementState, LinkConfig, LinkError};

#[tokio::test(start_paused = true)]
async fn request_then_verify_links_the_account() {
	let h = Harness::new();
	assert_eq!(h.lifecycle.on_session_start("Alice", false), Access::Restricted);

	let code = h.lifecycle.request_link("Alice", "@alice_d").expect("request");
	assert_eq!(code.as_str().len(), 6);
	assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
	assert!(h.lifecycle.has_pending_link("Alice"));

	let request = h.sink.notices().into_iter().find(|n| n.title == "🔗 New Link Request").expect("request notice");
	assert!(request.body.contains("`alice_d`"));
	assert!(request.body.contains(code.as_str()));

	h.lifecycle.verify("Alice", code.as_str(), "991122").expect("verify");
	assert_eq!(h.lifecycle.external_handle_of("Alice").as_deref(), Some("991122"));
	assert_eq!(h.lifecycle.game_id_of("991122").as_deref(), Some("Alice"));
	assert!(!h.lifecycle.has_pending_link("Alice"));
	assert_eq!(h.lifecycle.enforcement_state("Alice"), Some(EnforcementState::Unrestricted));
	assert!(!h.lifecycle.enforcement().kick_scheduled("Alice"));
	assert_eq!(h.host.access_of("Alice"), Some(Access::Full));
	assert!(h.sink.titles().contains(&"🎉 Link Successful".to_string()));

	let on_disk = std::fs::read_to_string(h.store.path()).expect("store written");
	assert!(on_disk.starts_with("# Linked Accounts"));
	assert!(on_disk.lines().any(|l| l == "Alice:991122"));

	assert_eq!(h.lifecycle.verify("Alice", code.as_str(), "991122"), Err(LinkError::NoPendingLink));
}

#[tokio::test(start_paused = true)]
async fn wrong_code_keeps_the_request_open() {
	let h = Harness::new();
	let code = h.lifecycle.request_link("Erin", "erin").expect("request");
	let wrong = if code.as_str() == "000000" { "000001" } else { "000000" };

	assert_eq!(h.lifecycle.verify("Erin", wrong, "77"), Err(LinkError::CodeMismatch));
	assert!(h.lifecycle.has_pending_link("Erin"));
	assert!(!h.lifecycle.is_linked("Erin"));

	h.lifecycle.verify("Erin", code.as_str(), "77").expect("verify");
	assert!(h.lifecycle.is_linked("Erin"));
}

#[tokio::test(start_paused = true)]
async fn a_new_request_replaces_the_old_code() {
	let h = Harness::new();
	let first = h.lifecycle.request_link("Finn", "finn_one").expect("first");
	let second = h.lifecycle.request_link("Finn", "finn_two").expect("second");

	if first != second {
		assert_eq!(h.lifecycle.verify("Finn", first.as_str(), "1"), Err(LinkError::CodeMismatch));
	}
	h.lifecycle.verify("Finn", second.as_str(), "1").expect("latest code wins");
}

#[tokio::test(start_paused = true)]
async fn unlinking_an_unlinked_identity_fails() {
	let h = Harness::new();
	h.store.insert("Alice", "991122");

	assert_eq!(h.lifecycle.unlink("Bob"), Err(LinkError::NotLinked));
	assert_eq!(h.lifecycle.linked_accounts().len(), 1);
	assert!(h.sink.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn linked_identities_cannot_request_again() {
	let h = Harness::new();
	h.store.insert("Alice", "991122");

	assert_eq!(h.lifecycle.request_link("Alice", "alice_d"), Err(LinkError::AlreadyLinked));
	assert!(!h.lifecycle.has_pending_link("Alice"));
}

#[tokio::test(start_paused = true)]
async fn malformed_handles_and_ids_are_rejected() {
	let h = Harness::new();
	assert!(matches!(h.lifecycle.request_link("Gus", "has space"), Err(LinkError::InvalidIdentityFormat(_))));
	assert!(!h.lifecycle.has_pending_link("Gus"));

	let code = h.lifecycle.request_link("Gus", "gus").expect("request");
	assert!(matches!(h.lifecycle.verify("Gus", code.as_str(), "12:34"), Err(LinkError::InvalidIdentityFormat(_))));
	assert!(h.lifecycle.has_pending_link("Gus"), "a rejected id does not consume the code");
}

#[tokio::test(start_paused = true)]
async fn verifying_an_offline_identity_skips_the_host() {
	let h = Harness::new();
	let code = h.lifecycle.request_link("Hana", "hana").expect("request");
	h.lifecycle.verify("Hana", code.as_str(), "5").expect("verify");

	assert!(h.lifecycle.is_linked("Hana"));
	assert!(h.host.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disconnect_discards_the_pending_code() {
	let h = Harness::new();
	h.lifecycle.on_session_start("Ivy", false);
	let code = h.lifecycle.request_link("Ivy", "ivy").expect("request");

	h.lifecycle.on_session_end("Ivy");
	assert!(!h.lifecycle.has_pending_link("Ivy"));
	assert_eq!(h.lifecycle.verify("Ivy", code.as_str(), "9"), Err(LinkError::NoPendingLink));
	assert_eq!(h.lifecycle.enforcement_state("Ivy"), None);
}

#[tokio::test(start_paused = true)]
async fn codes_expire_after_the_configured_window() {
	let h = Harness::new();
	let code = h.lifecycle.request_link("Jay", "jay").expect("request");

	advance(minutes(5) + Duration::from_secs(1)).await;
	assert!(!h.lifecycle.has_pending_link("Jay"));
	assert_eq!(h.lifecycle.verify("Jay", code.as_str(), "3"), Err(LinkError::NoPendingLink));
}

#[tokio::test(start_paused = true)]
async fn zero_expiry_keeps_codes_indefinitely() {
	let h = Harness::with_config(LinkConfig {
		pending_expiry_minutes: 0,
		..LinkConfig::default()
	});
	let code = h.lifecycle.request_link("Kim", "kim").expect("request");

	advance(minutes(60)).await;
	h.lifecycle.verify("Kim", code.as_str(), "3").expect("still valid");
}

#[tokio::test(start_paused = true)]
async fn linked_sessions_are_welcomed_and_announced() {
	let h = Harness::new();
	h.store.insert("Lea", "42");

	assert_eq!(h.lifecycle.on_session_start("Lea", false), Access::Full);
	assert_eq!(h.lifecycle.enforcement_state("Lea"), Some(EnforcementState::Unrestricted));
	assert!(h.sink.titles().contains(&"📥 Linked Player Joined".to_string()));

	advance(Duration::from_secs(3)).await;
	assert!(h.host.messages_to("Lea").iter().any(|m| m.contains("Welcome back")));
	assert!(h.host.kicks().is_empty());

	h.lifecycle.on_session_end("Lea");
	assert!(h.sink.titles().contains(&"📤 Linked Player Left".to_string()));
}

#[tokio::test(start_paused = true)]
async fn unlinking_an_online_player_restricts_again() {
	let h = Harness::new();
	h.store.insert("Dana", "55");
	h.lifecycle.on_session_start("Dana", false);

	assert_eq!(h.lifecycle.unlink("Dana").as_deref(), Ok("55"));
	assert_eq!(h.host.access_of("Dana"), Some(Access::Restricted));
	assert_eq!(h.lifecycle.enforcement_state("Dana"), Some(EnforcementState::RestrictedPending));
	assert!(h.lifecycle.enforcement().kick_scheduled("Dana"));

	let titles = h.sink.titles();
	assert_eq!(titles.last().map(String::as_str), Some("🔓 Account Unlinked"));
}

#[tokio::test(start_paused = true)]
async fn reload_replaces_the_table_from_disk() {
	let h = Harness::new();
	h.store.insert("Alice", "1");
	std::fs::write(h.store.path(), "# edited by hand\nBob:2\nCarl:3\nbroken line\n").expect("write");

	let count = h.lifecycle.reload().expect("reload");
	assert_eq!(count, 2);
	assert!(!h.lifecycle.is_linked("Alice"));
	assert_eq!(h.lifecycle.external_handle_of("Carl").as_deref(), Some("3"));
}

#[tokio::test(start_paused = true)]
async fn votes_are_routed_to_the_vote_channel() {
	let h = Harness::with_config(LinkConfig {
		vote_channel_id: "1417983368057978961".to_string(),
		..LinkConfig::default()
	});
	h.lifecycle.announce_vote("Steve", "PlanetMinecraft");

	let notice = h.sink.notices().pop().expect("vote notice");
	assert_eq!(notice.title, "🗳️ New Vote Received!");
	assert_eq!(notice.channel.as_deref(), Some("1417983368057978961"));
}

#[tokio::test(start_paused = true)]
async fn game_ids_the_store_cannot_hold_are_rejected() {
	let h = Harness::new();
	for game_id in ["a:b", " Alice", "Alice ", ""] {
		assert!(
			matches!(h.lifecycle.request_link(game_id, "alice_d"), Err(LinkError::InvalidIdentityFormat(_))),
			"{game_id:?} should be rejected"
		);
		assert!(!h.lifecycle.has_pending_link(game_id));
		assert!(matches!(h.lifecycle.verify(game_id, "000000", "991122"), Err(LinkError::InvalidIdentityFormat(_))));
	}
	assert!(h.lifecycle.linked_accounts().is_empty());
	assert!(h.sink.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn links_survive_a_reload() {
	let h = Harness::new();
	let code = h.lifecycle.request_link("Nell", "nell").expect("request");
	h.lifecycle.verify("Nell", code.as_str(), "991122").expect("verify");

	assert_eq!(h.lifecycle.reload().expect("reload"), 1);
	assert_eq!(h.lifecycle.external_handle_of("Nell").as_deref(), Some("991122"));
}

#[tokio::test(start_paused = true)]
async fn unlinked_sessions_cannot_leave_the_restricted_mode() {
	let h = Harness::new();
	h.lifecycle.on_session_start("Otto", false);

	assert!(!h.lifecycle.allow_access_change("Otto", Access::Full));
	assert!(h.lifecycle.allow_access_change("Otto", Access::Restricted));
	assert!(h.host.calls().contains(&common::HostCall::ActionBar("Otto".into(), MODE_LOCKED_TEXT.into())));

	let code = h.lifecycle.request_link("Otto", "otto").expect("request");
	h.lifecycle.verify("Otto", code.as_str(), "8").expect("verify");
	assert!(h.lifecycle.allow_access_change("Otto", Access::Full));

	h.lifecycle.on_session_start("Admin", true);
	assert!(h.lifecycle.allow_access_change("Admin", Access::Full));
}

#[tokio::test(start_paused = true)]
async fn interacting_while_unlinked_nudges() {
	let h = Harness::new();
	h.store.insert("Lea", "42");
	h.lifecycle.on_session_start("Lea", false);
	h.lifecycle.on_session_start("Pia", false);
	h.lifecycle.on_session_start("Admin", true);

	for id in ["Lea", "Pia", "Admin"] {
		h.lifecycle.on_interact(id);
	}
	let nudged: Vec<_> = h
		.host
		.calls()
		.into_iter()
		.filter_map(|c| match c {
			common::HostCall::ActionBar(id, text) if text == INTERACT_TEXT => Some(id),
			_ => None,
		})
		.collect();
	assert_eq!(nudged, vec!["Pia".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn player_commands_are_logged_as_notices() {
	let h = Harness::new();
	h.lifecycle.on_player_command("Alice", false, "/msg Bob see you at spawn");
	h.lifecycle.on_player_command("Alice", false, "/spawn");
	h.lifecycle.on_player_command("Op", true, "/ban Griefer");

	assert_eq!(h.sink.titles(), vec!["📨 /msg Command".to_string(), "🔧 Admin Command".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn sweep_drops_codes_of_players_who_never_return() {
	let h = Harness::new();
	assert!(h.lifecycle.start_expiry_sweep());
	h.lifecycle.request_link("Quinn", "quinn").expect("request");
	assert_eq!(h.lifecycle.pending_count(), 1);

	advance(minutes(11)).await;
	assert_eq!(h.lifecycle.pending_count(), 0);
	h.lifecycle.shutdown();
}

#[tokio::test(start_paused = true)]
async fn without_the_sweep_expired_codes_linger_until_looked_up() {
	let h = Harness::new();
	h.lifecycle.request_link("Rex", "rex").expect("request");

	advance(minutes(11)).await;
	assert_eq!(h.lifecycle.pending_count(), 1);
	assert!(!h.lifecycle.has_pending_link("Rex"));
	assert_eq!(h.lifecycle.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn no_sweep_when_codes_never_expire() {
	let h = Harness::with_config(LinkConfig {
		pending_expiry_minutes: 0,
		..LinkConfig::default()
	});
	assert!(!h.lifecycle.start_expiry_sweep());
}
