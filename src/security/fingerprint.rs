//! Device fingerprints and user-agent parsing.

use sha2::{Digest, Sha256};

/// Derive a stable device identifier from user-agent and IP.
///
/// Deterministic so "is this a known device" comparisons work. Not
/// reversible. Two clients behind the same NAT with identical user-agent
/// strings collide; this is an accepted limitation.
#[must_use]
pub fn device_fingerprint(user_agent: &str, ip_address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    hasher.update(b":");
    hasher.update(ip_address.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Coarse client classification from the user-agent string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub browser: &'static str,
    pub os: &'static str,
    pub device: &'static str,
    pub is_mobile: bool,
}

/// Best-effort user-agent parsing; unknown agents degrade to "Unknown".
#[must_use]
pub fn parse_user_agent(user_agent: &str) -> ClientInfo {
    let ua = user_agent.to_lowercase();

    let browser = if ua.contains("chrome") {
        "Chrome"
    } else if ua.contains("firefox") {
        "Firefox"
    } else if ua.contains("safari") {
        "Safari"
    } else if ua.contains("edge") {
        "Edge"
    } else {
        "Unknown"
    };

    let mut is_mobile = false;
    let os = if ua.contains("windows") {
        "Windows"
    } else if ua.contains("mac") {
        "macOS"
    } else if ua.contains("linux") {
        "Linux"
    } else if ua.contains("android") {
        is_mobile = true;
        "Android"
    } else if ua.contains("iphone") || ua.contains("ipad") {
        is_mobile = true;
        "iOS"
    } else {
        "Unknown"
    };

    let device = if is_mobile {
        "Mobile"
    } else if ua.contains("tablet") {
        "Tablet"
    } else {
        "Desktop"
    };

    ClientInfo {
        browser,
        os,
        device,
        is_mobile,
    }
}

/// Human-readable device name shown in session listings.
#[must_use]
pub fn device_name(user_agent: &str) -> String {
    let parsed = parse_user_agent(user_agent);
    format!("{} on {}", parsed.browser, parsed.os)
}
