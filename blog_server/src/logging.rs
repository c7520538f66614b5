//! Tracing subscriber setup and structured security/request events.
//!
//! `blog_core` only speaks the `log` facade. `init` installs a
//! `tracing-subscriber` registry whose `init()` also registers the
//! `log` -> tracing bridge, so core records land in the same output.

use std::fmt;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or unparsable
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Install the global subscriber.
///
/// ```no_run
/// blog_server::logging::init();
/// tracing::info!("ready");
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    tracing::debug!(filter = DEFAULT_FILTER, "logging initialised");
}

/// Security-relevant outcomes worth an audit line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    FailedLogin,
    FailedPasswordChange,
    GateRejected,
}

impl SecurityEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FailedLogin => "failed_login",
            Self::FailedPasswordChange => "failed_password_change",
            Self::GateRejected => "auth_rejected",
        }
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emit a `SECURITY:` warning tagged with the event type and user, if known.
///
/// ```
/// use blog_server::logging::{SecurityEvent, log_security_event};
///
/// log_security_event(SecurityEvent::FailedLogin, None, "Invalid credentials for alice");
/// ```
pub fn log_security_event(event: SecurityEvent, user_id: Option<i64>, message: &str) {
    tracing::warn!(
        event_type = event.as_str(),
        user_id = user_id,
        "SECURITY: {}",
        message
    );
}

/// One line per completed request, emitted by the request-id layer
pub fn log_api_request(method: &str, path: &str, status_code: u16, duration_ms: u64) {
    if status_code >= 500 {
        tracing::error!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "API request failed"
        );
    } else {
        tracing::info!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "API request completed"
        );
    }
}
