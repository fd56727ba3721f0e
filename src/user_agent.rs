//! User-Agent string sent with every probe and download request.

/// Default User-Agent for update traffic (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("updater/{version}")
}
