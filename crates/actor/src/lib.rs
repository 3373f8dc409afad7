//! In-process actor runtime.
//!
//! A minimal supervision-tree actor system in the Erlang/Akka style:
//!
//! - [`Pid`]: location-transparent address, resolved through the system's
//!   process registry on every send
//! - Mailboxes: per-actor system/user queue pair with strictly sequential
//!   processing
//! - [`Dispatcher`]: where mailbox-processing tasks run — a rayon pool in
//!   production, inline for deterministic tests
//! - Supervision: [`OneForOneStrategy`], [`AllForOneStrategy`], and
//!   [`ExponentialBackoffStrategy`] decide Resume/Restart/Stop/Escalate on
//!   child panics, caught at the mailbox boundary
//! - [`ActorFuture`]: a one-shot reply process bridging the asynchronous
//!   mailbox world back to a blocking caller
//! - [`EventStream`]: process-wide pub/sub; undeliverable messages are
//!   published as [`DeadLetterEvent`]s, never silently dropped
//!
//! Actor-internal semantics are single-threaded; different actors run in
//! parallel across the dispatcher pool.

#![warn(missing_docs)]

mod actor;
mod cell;
mod dispatcher;
mod error;
mod event_stream;
mod future;
mod mailbox;
mod message;
mod pid;
mod process;
mod supervision;
mod system;

pub use actor::{Actor, Context, Props};
pub use dispatcher::{Dispatcher, PooledDispatcher, SyncDispatcher, DEFAULT_THROUGHPUT};
pub use error::ActorError;
pub use event_stream::{EventStream, SubscriptionId};
pub use future::ActorFuture;
pub use message::{message, Envelope, Failure, Message, SystemMessage};
pub use pid::Pid;
pub use process::{DeadLetterEvent, Process};
pub use supervision::{
    default_decider, AllForOneStrategy, Decider, Directive, ExponentialBackoffStrategy,
    OneForOneStrategy, RestartStatistics, Supervisor, SupervisorStrategy,
};
pub use system::ActorSystem;
