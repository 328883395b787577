//! Conference Session Engine
//!
//! Client-side stream and transport orchestration for a WebRTC conferencing
//! session: which remote streams are shown, in what order and on which page,
//! how the grid is sized, and how local audio, video and screen media are
//! sent.
//!
//! # Architecture
//!
//! ```text
//! SessionHandle ──commands──▶ SessionActor
//!                              └── Orchestrator (sync core)
//!                                  ├── SessionState (single writer)
//!                                  ├── reorder / layout / pagination
//!                                  ├── compare (updateScreenClient)
//!                                  ├── lifecycle / screenshare
//!                                  └── Outbox ──▶ dispatcher ──▶ Signaling
//! ```
//!
//! Network round-trips (transport creation, produce, consumer resume,
//! display capture) run in the caller's task under deadlines; their results
//! are committed by the actor. Rendering and alerts leave the engine through
//! [`render::RenderSink`] and [`render::AlertSink`].
//!
//! # Modules
//!
//! - [`actors`] - `SessionActor`, `SessionHandle` and mailbox monitoring
//! - [`config`] - tuning knobs from `SE_*` environment variables
//! - [`errors`] - [`EngineError`] and its alert mapping
//! - [`layout`] - grid estimate, area split and card sizing
//! - [`model`] - participants, streams and session identity
//! - [`platform`] - WebRTC device, transport, producer and consumer traits
//! - [`signaling`] - socket boundary and the ordered outbound queue
//! - [`observability`] - tracing setup and metrics

pub mod actors;
pub mod compare;
pub mod config;
pub mod errors;
pub mod layout;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod orchestrator;
pub mod pagination;
pub mod platform;
pub mod render;
pub mod reorder;
pub mod screenshare;
pub mod signaling;
pub mod state;

pub use actors::{SessionActor, SessionDeps, SessionHandle, SessionSnapshot};
pub use config::EngineConfig;
pub use errors::EngineError;
pub use orchestrator::{Orchestrator, Sinks};
