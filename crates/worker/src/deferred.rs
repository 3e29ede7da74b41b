use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::runtime::handle;
use crate::scope::Scope;

/// An action scheduled on the worker runtime under a [`Scope`].
///
/// The action is raced against its token: once the scope is closed, or the
/// action itself cancelled, it never starts. Cancelling after the action
/// already ran is a no-op, so actions must re-check their own preconditions
/// when they fire.
#[derive(Debug)]
pub struct Deferred {
	generation: u64,
	token: CancellationToken,
	task: JoinHandle<()>,
}

impl Deferred {
	/// Runs `action` once after `delay` unless cancelled first.
	pub fn after<F>(scope: &Scope, delay: Duration, action: F) -> Self
	where
		F: FnOnce() + Send + 'static,
	{
		let token = scope.action_token();
		let cancelled = token.clone();
		let generation = scope.generation();
		let task = handle().spawn(async move {
			tokio::select! {
				biased;
				_ = cancelled.cancelled() => tracing::trace!(generation, "deferred.cancelled"),
				_ = tokio::time::sleep(delay) => action(),
			}
		});
		Self { generation, token, task }
	}

	/// Runs `tick` first after `initial`, then every `period`, until it
	/// breaks or is cancelled. Late ticks are delayed, never bunched.
	pub fn every<F>(scope: &Scope, initial: Duration, period: Duration, mut tick: F) -> Self
	where
		F: FnMut() -> ControlFlow<()> + Send + 'static,
	{
		let token = scope.action_token();
		let cancelled = token.clone();
		let generation = scope.generation();
		let task = handle().spawn(async move {
			let mut interval = tokio::time::interval_at(Instant::now() + initial, period);
			interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				tokio::select! {
					biased;
					_ = cancelled.cancelled() => break,
					_ = interval.tick() => {
						if tick().is_break() {
							break;
						}
					}
				}
			}
			tracing::trace!(generation, "deferred.every.stopped");
		});
		Self { generation, token, task }
	}

	/// Generation of the scope this action was scheduled under.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Cancels this action only.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Returns true once the underlying task has exited.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}
}
