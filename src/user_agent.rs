//! Default User-Agent for outgoing requests.

/// Default User-Agent: crate name and version.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("httpdispatch/{version}")
}
