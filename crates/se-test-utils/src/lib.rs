//! # Session Engine Test Utilities
//!
//! Mocks and fixtures for driving a `SessionActor` without a real socket,
//! WebRTC stack or UI.
//!
//! ## Modules
//!
//! - `mock_signaling` - scriptable socket that records every request
//! - `mock_platform` - device, transports, producers, consumers and streams
//! - `mock_render` - recording render and alert sinks
//! - `fixtures` - identities, participants and a spawned test session
//!
//! ## Usage
//!
//! ```rust,ignore
//! use se_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let session = TestSession::spawn(TestIdentity::host().build());
//!     session
//!         .handle
//!         .participant_joined(TestParticipant::attendee("bob").with_video().build())
//!         .await
//!         .unwrap();
//!
//!     let snapshot = session.handle.snapshot().await.unwrap();
//!     assert_eq!(snapshot.participants, 1);
//! }
//! ```

pub mod fixtures;
pub mod mock_platform;
pub mod mock_render;
pub mod mock_signaling;

pub use fixtures::*;
pub use mock_platform::*;
pub use mock_render::*;
pub use mock_signaling::*;
