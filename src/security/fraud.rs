//! Fraud scoring for authentication attempts.
//!
//! An additive weighted model over per-attempt signals. The scorer itself is
//! a pure function; geolocation, VPN detection, and device reputation are
//! injected as already-resolved inputs through the capability traits below,
//! and callers absorb provider failures into conservative defaults.

use chrono::{DateTime, Utc};

use super::SecurityError;

pub const WEIGHT_NEW_DEVICE: u32 = 20;
pub const WEIGHT_NEW_LOCATION: u32 = 25;
pub const WEIGHT_SUSPICIOUS_IP: u32 = 30;
pub const WEIGHT_FAILED_ATTEMPTS_CAP: u32 = 15;
pub const WEIGHT_UNUSUAL_TIME: u32 = 10;
pub const WEIGHT_VPN_TOR: u32 = 35;
pub const WEIGHT_KNOWN_MALICIOUS: u32 = 100;
/// Bump applied when unresolved critical violations exist in recent history.
pub const WEIGHT_CRITICAL_VIOLATIONS: u32 = 40;

/// Additional verification is required from this score upward.
pub const VERIFICATION_THRESHOLD: u32 = 30;

/// Fastest plausible travel between two logins, in km/h.
const MAX_TRAVEL_SPEED_KMH: f64 = 900.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Signals computed for one authentication attempt; transient, never stored.
#[derive(Debug, Clone, Default)]
pub struct FraudSignals {
    pub new_device: bool,
    pub new_location: bool,
    pub poor_reputation: bool,
    pub known_malicious: bool,
    pub vpn_or_tor: bool,
    pub failed_attempts: u32,
    pub unresolved_critical_violation: bool,
    /// Local hour of day, 0..=23.
    pub hour_of_day: u32,
}

#[derive(Debug, Clone)]
pub struct FraudCheck {
    /// Clamped to 0..=100.
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub flags: Vec<String>,
    pub recommendations: Vec<String>,
    pub requires_additional_verification: bool,
}

/// Score an attempt against the weight table.
///
/// A known-malicious indicator short-circuits to critical regardless of the
/// other signals.
#[must_use]
pub fn score(signals: &FraudSignals) -> FraudCheck {
    let mut risk_score: u32 = 0;
    let mut flags = Vec::new();
    let mut recommendations = Vec::new();

    if signals.known_malicious {
        risk_score += WEIGHT_KNOWN_MALICIOUS;
        flags.push("Known malicious indicator".to_string());
        recommendations.push("Block and force password reset".to_string());
    }

    if signals.new_device {
        risk_score += WEIGHT_NEW_DEVICE;
        flags.push("New device detected".to_string());
        recommendations.push("Send device verification email".to_string());
    }

    if signals.new_location {
        risk_score += WEIGHT_NEW_LOCATION;
        flags.push("New location detected".to_string());
        recommendations.push("Require additional verification".to_string());
    }

    if signals.failed_attempts > 0 {
        risk_score += (signals.failed_attempts * 5).min(WEIGHT_FAILED_ATTEMPTS_CAP);
        flags.push(format!(
            "{} recent failed login attempts",
            signals.failed_attempts
        ));
    }

    if signals.unresolved_critical_violation {
        risk_score += WEIGHT_CRITICAL_VIOLATIONS;
        flags.push("Recent critical security violations".to_string());
        recommendations.push("Force password reset".to_string());
    }

    if signals.poor_reputation {
        risk_score += WEIGHT_SUSPICIOUS_IP;
        flags.push("Device has poor reputation".to_string());
    }

    if signals.vpn_or_tor {
        risk_score += WEIGHT_VPN_TOR;
        flags.push("VPN/Tor network detected".to_string());
        recommendations.push("Block or require additional verification".to_string());
    }

    if signals.hour_of_day < 5 || signals.hour_of_day > 23 {
        risk_score += WEIGHT_UNUSUAL_TIME;
        flags.push("Unusual login time".to_string());
    }

    let risk_score = risk_score.min(100);
    let risk_level = if risk_score >= 75 {
        RiskLevel::Critical
    } else if risk_score >= 50 {
        RiskLevel::High
    } else if risk_score >= 25 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    FraudCheck {
        risk_score,
        risk_level,
        flags,
        recommendations,
        requires_additional_verification: risk_score >= VERIFICATION_THRESHOLD,
    }
}

/// Resolved geolocation for an IP address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            city: "Unknown".to_string(),
            country: "Unknown".to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    /// Label shown in sessions and audit events, e.g. "Dubai, AE".
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reputation {
    pub risky: bool,
    pub known_malicious: bool,
}

/// Device/IP reputation lookup; resolved by an external service in
/// production. Callers must treat failures as advisory.
pub trait DeviceReputation: Send + Sync {
    /// # Errors
    /// Returns [`SecurityError::DependencyUnavailable`] when the lookup fails.
    fn assess(&self, device_id: &str, ip: &str) -> Result<Reputation, SecurityError>;
}

/// VPN / Tor egress detection.
pub trait VpnDetector: Send + Sync {
    /// # Errors
    /// Returns [`SecurityError::DependencyUnavailable`] when the lookup fails.
    fn is_vpn_or_tor(&self, ip: &str) -> Result<bool, SecurityError>;
}

/// IP geolocation.
pub trait GeoLocator: Send + Sync {
    /// # Errors
    /// Returns [`SecurityError::DependencyUnavailable`] when the lookup fails.
    fn locate(&self, ip: &str) -> Result<GeoLocation, SecurityError>;
}

/// Fail-open default: every device is reputable.
#[derive(Debug, Clone, Copy)]
pub struct NoopReputation;

impl DeviceReputation for NoopReputation {
    fn assess(&self, _device_id: &str, _ip: &str) -> Result<Reputation, SecurityError> {
        Ok(Reputation::default())
    }
}

/// Fail-open default: no egress is treated as VPN/Tor.
#[derive(Debug, Clone, Copy)]
pub struct NoopVpnDetector;

impl VpnDetector for NoopVpnDetector {
    fn is_vpn_or_tor(&self, _ip: &str) -> Result<bool, SecurityError> {
        Ok(false)
    }
}

/// Fail-open default: every IP resolves to an unknown location.
#[derive(Debug, Clone, Copy)]
pub struct NoopGeoLocator;

impl GeoLocator for NoopGeoLocator {
    fn locate(&self, _ip: &str) -> Result<GeoLocation, SecurityError> {
        Ok(GeoLocation::unknown())
    }
}

/// A located login observation, used for impossible-travel checks.
#[derive(Debug, Clone, Copy)]
pub struct TravelPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub at: DateTime<Utc>,
}

/// Great-circle distance in kilometers.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// True when the jump between two logins is faster than plane speed.
#[must_use]
pub fn is_impossible_travel(previous: &TravelPoint, next: &TravelPoint) -> bool {
    let distance_km = haversine_km(
        previous.latitude,
        previous.longitude,
        next.latitude,
        next.longitude,
    );
    let elapsed_hours = (next.at - previous.at).num_seconds().max(0) as f64 / 3600.0;
    distance_km > elapsed_hours * MAX_TRAVEL_SPEED_KMH
}
