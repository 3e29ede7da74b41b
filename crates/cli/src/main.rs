//! Linkguard console host.
//!
//! Simulates a game server on stdin so the linking flow can be exercised
//! without one. Lines are either simulation directives or console commands:
//!
//! ```text
//! join <name> [admin]        start a session
//! quit <name>                end a session
//! as <name> <command...>     run a command as that player
//! mode <name> <survival|adventure>
//!                            ask for a game mode change
//! click <name>               the player clicks a block
//! vote <user> <service>      announce a vote
//! log <text>                 emit a log line (vote lines land in divotelog)
//! stop                       shut down
//! <command...>               run a console command, e.g. dilinkverify
//! ```

mod host;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use linkguard_core::{Access, Caller, CommandSurface, EventRingBuffer, LinkConfig, LinkLifecycle, VoteCaptureLayer, WebhookSink};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::host::ConsoleHost;

/// Console command line arguments.
#[derive(Parser, Debug)]
#[command(name = "linkguard")]
#[command(about = "Discord account linking for game servers")]
struct Args {
	/// Configuration file
	#[arg(short, long, value_name = "PATH", default_value = "linkguard.toml")]
	config: PathBuf,

	/// Overrides the configured data directory
	#[arg(short, long, value_name = "DIR")]
	data_dir: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let votes = Arc::new(EventRingBuffer::new());
	let level = if args.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
	tracing_subscriber::registry()
		.with(tracing_subscriber::fmt::layer().with_filter(level))
		.with(VoteCaptureLayer::new(Arc::clone(&votes)))
		.try_init()
		.context("failed to install tracing subscriber")?;

	let mut config = LinkConfig::load(&args.config).with_context(|| format!("loading {}", args.config.display()))?;
	if let Some(dir) = args.data_dir {
		config.data_dir = dir;
	}
	info!(store = %config.store_path().display(), "starting linkguard");

	let (kick_tx, mut kick_rx) = mpsc::unbounded_channel();
	let sink = Arc::new(WebhookSink::from_config(&config));
	let host = Arc::new(ConsoleHost::new(kick_tx));
	let lifecycle = Arc::new(LinkLifecycle::new(config, host, sink));
	let commands = CommandSurface::new(Arc::clone(&lifecycle), votes);
	lifecycle.start_expiry_sweep();
	lifecycle.announce_startup();

	let mut online: HashMap<String, bool> = HashMap::new();
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	loop {
		tokio::select! {
			line = lines.next_line() => {
				let Some(line) = line.context("reading stdin")? else {
					break;
				};
				if !handle_line(&lifecycle, &commands, &mut online, line.trim()) {
					break;
				}
			}
			Some(game_id) = kick_rx.recv() => {
				online.remove(&game_id);
				lifecycle.on_session_end(&game_id);
			}
			_ = tokio::signal::ctrl_c() => break,
		}
	}

	lifecycle.shutdown();
	info!("linkguard stopped");
	Ok(())
}

/// Runs one console line. Returns false when the loop should stop.
fn handle_line(lifecycle: &LinkLifecycle, commands: &CommandSurface, online: &mut HashMap<String, bool>, line: &str) -> bool {
	let mut words = line.split_whitespace();
	match words.next() {
		None => {}
		Some("stop") => return false,
		Some("join") => match words.next() {
			Some(name) => {
				let admin = words.next() == Some("admin");
				online.insert(name.to_string(), admin);
				let access = lifecycle.on_session_start(name, admin);
				println!("{name} joined ({access:?})");
			}
			None => println!("usage: join <name> [admin]"),
		},
		Some("quit") => match words.next() {
			Some(name) if online.remove(name).is_some() => {
				lifecycle.on_session_end(name);
				println!("{name} left");
			}
			Some(name) => println!("{name} is not online"),
			None => println!("usage: quit <name>"),
		},
		Some("as") => match words.next() {
			Some(name) => match online.get(name) {
				Some(&admin) => {
					let caller = Caller::Player {
						name: name.to_string(),
						admin,
					};
					let command = words.collect::<Vec<_>>().join(" ");
					if !command.is_empty() {
						lifecycle.on_player_command(name, admin, &format!("/{}", command.trim_start_matches('/')));
					}
					run(commands, &caller, &command);
				}
				None => println!("{name} is not online"),
			},
			None => println!("usage: as <name> <command...>"),
		},
		Some("mode") => match (words.next(), words.next()) {
			(Some(name), Some(mode)) if online.contains_key(name) => {
				let requested = match mode {
					"survival" => Access::Full,
					"adventure" => Access::Restricted,
					other => {
						println!("unknown mode {other}");
						return true;
					}
				};
				if lifecycle.allow_access_change(name, requested) {
					println!("{name} switched to {mode}");
				}
			}
			(Some(name), Some(_)) => println!("{name} is not online"),
			_ => println!("usage: mode <name> <survival|adventure>"),
		},
		Some("click") => match words.next() {
			Some(name) if online.contains_key(name) => lifecycle.on_interact(name),
			Some(name) => println!("{name} is not online"),
			None => println!("usage: click <name>"),
		},
		Some("vote") => match (words.next(), words.next()) {
			(Some(user), Some(service)) => lifecycle.announce_vote(user, service),
			_ => println!("usage: vote <user> <service>"),
		},
		Some("log") => {
			let text = words.collect::<Vec<_>>().join(" ");
			info!(target: "console", "{text}");
		}
		Some(_) => run(commands, &Caller::Console, line),
	}
	true
}

fn run(commands: &CommandSurface, caller: &Caller, line: &str) {
	match commands.dispatch_line(caller, line) {
		Ok(reply) => {
			for line in reply {
				println!("{line}");
			}
		}
		Err(err) => println!("{err}"),
	}
}
