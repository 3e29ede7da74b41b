//! Timer and offload primitives for the account-linking runtime.
//!
//! Session timers are [`Deferred`] actions grouped under a [`Scope`]; closing
//! the scope cancels the whole group, and the scope's generation lets a late
//! action recognise that it was superseded. Blocking work goes through
//! [`offload`]. Both run on the caller's Tokio runtime, or on a small shared
//! runtime when the host calls in from a foreign thread.

mod deferred;
mod runtime;
mod scope;

pub use deferred::Deferred;
pub use runtime::offload;
pub use scope::{Scope, ScopeIssuer};
