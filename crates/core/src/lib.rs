//! Links game identities to Discord accounts.
//!
//! A player asks for a link with `/link <handle>`, which issues a six-digit
//! [`VerificationCode`] and announces it through a [`NotificationSink`]. An
//! external bot confirms the code with `dilinkverify`, at which point the
//! link is persisted in the [`LinkStore`] and the session's enforcement
//! timers are cancelled. Unlinked sessions are restricted, nagged, and
//! eventually kicked by the [`EnforcementScheduler`].
//!
//! [`LinkLifecycle`] is the entry point; hosts implement [`SessionHost`] and
//! drive it from their join, quit, and command events.

pub mod capture;
pub mod command;
pub mod config;
pub mod enforcement;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod notify;
pub mod pending;
pub mod ring;
pub mod store;
pub mod webhook;

pub use capture::{VoteCaptureLayer, is_vote_line};
pub use command::{Caller, Command, CommandSurface};
pub use config::LinkConfig;
pub use enforcement::{EnforcementPolicy, EnforcementScheduler, EnforcementState};
pub use error::{CommandError, ConfigError, LinkError, LinkResult, StoreError, TransportError};
pub use host::{Access, SessionHost};
pub use lifecycle::{LinkLifecycle, command_event, normalize_external_handle};
pub use notify::{Color, LinkEvent, Notice, NotificationSink, TracingSink};
pub use pending::{PendingLink, PendingLinks, VerificationCode};
pub use ring::{EventRingBuffer, RingEntry};
pub use store::{LinkMap, LinkStore};
pub use webhook::WebhookSink;
