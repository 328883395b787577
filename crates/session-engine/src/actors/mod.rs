//! Session actor.
//!
//! ```text
//! SessionHandle (cloneable, caller tasks)
//! └── SessionActor (one per session, owns the Orchestrator)
//!     └── outbound dispatcher (ordered signaling emissions)
//! ```
//!
//! - [`session`] - `SessionActor` and `SessionHandle`
//! - [`messages`] - commands and the diagnostic snapshot
//! - [`metrics`] - mailbox monitoring

pub mod messages;
pub mod metrics;
pub mod session;

pub use messages::{SessionCommand, SessionSnapshot};
pub use metrics::MailboxMonitor;
pub use session::{SessionActor, SessionDeps, SessionHandle};
