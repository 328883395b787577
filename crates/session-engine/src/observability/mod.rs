//! Observability for the session engine.
//!
//! Tracing targets are `se.*` (see the list below) and metrics are recorded
//! through the `metrics` facade. The embedding application installs the
//! exporter; without one every metric call is a no-op.
//!
//! # Privacy by Default
//!
//! Actor and lifecycle spans use `#[instrument(skip_all)]` with explicit
//! fields. Participant names are never metric labels.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `se_reorder_passes_total` | Counter | `outcome` | Ranking passes run or gated |
//! | `se_producer_closed_total` | Counter | `outcome` | Remote producer closures |
//! | `se_consumer_transports_active` | Gauge | none | Receive-side entries held |
//! | `se_card_build_failures_total` | Counter | none | Skipped cards |
//! | `se_signaling_requests_total` | Counter | `event`, `status` | Outbound request results |
//! | `se_signaling_latency_seconds` | Histogram | `event` | Request round trip |
//! | `se_screen_share_transitions_total` | Counter | `state` | Local share state machine |
//! | `se_breakout_navigation_total` | Counter | `outcome` | Page navigation results |
//! | `se_actor_mailbox_depth` | Gauge | none | Session actor backlog |

pub mod metrics;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the log format (`json` or plain text).
pub const LOG_FORMAT_ENV: &str = "SE_LOG_FORMAT";

/// Install a global tracing subscriber for hosts without their own.
///
/// `RUST_LOG` wins over `default_directive`. Returns `false` when a global
/// subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.is_ok()
}
