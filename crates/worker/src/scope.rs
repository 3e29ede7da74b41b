use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Hands out [`Scope`]s with strictly increasing generations.
///
/// One issuer is shared by everything that re-arms the same kind of work, so
/// an action scheduled under an older scope can tell that it is stale by
/// comparing generations.
#[derive(Debug, Default)]
pub struct ScopeIssuer {
	last: AtomicU64,
}

impl ScopeIssuer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Opens a fresh scope. The first one has generation 1.
	pub fn open(&self) -> Scope {
		let generation = self.last.fetch_add(1, Ordering::Relaxed) + 1;
		Scope {
			generation,
			cancel: CancellationToken::new(),
		}
	}
}

/// A cancellation boundary for one arming of a set of deferred actions.
///
/// Closing the scope cancels every action scheduled under it.
#[derive(Debug, Clone)]
pub struct Scope {
	generation: u64,
	cancel: CancellationToken,
}

impl Scope {
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Cancels everything scheduled under this scope. Idempotent.
	pub fn close(&self) {
		self.cancel.cancel();
	}

	pub fn is_closed(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Token for one action: closed with the scope, or on its own.
	pub(crate) fn action_token(&self) -> CancellationToken {
		self.cancel.child_token()
	}
}
