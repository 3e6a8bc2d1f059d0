//! # Core Utilities
//!
//! Shared building blocks used across the protocol pipeline: injected
//! capabilities for time and randomness, opaque key generation, query-string
//! encoding, and HTML escaping.

pub mod generate;
pub mod html;
pub mod urlencode;

use chrono::{DateTime, Utc};
use rand::RngCore;

/// A source of wall-clock time.
///
/// The middleware never reads system time directly. All expiry calculations
/// go through the clock configured on
/// [`Options`](crate::oidc::options::Options), which lets tests pin time and
/// hosts substitute a synchronized clock.
pub trait Clock: Send + Sync {
    /// The current moment, in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The default clock, backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A source of cryptographic randomness.
///
/// Used for authorization code cache keys, continuation identifiers, and
/// AES-GCM nonces. The middleware never reads global randomness directly.
pub trait RandomSource: Send + Sync {
    /// Fill `buf` with random bytes.
    fn fill_bytes(&self, buf: &mut [u8]);
}

/// The default randomness source, backed by the operating system CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, buf: &mut [u8]) {
        rand::rng().fill_bytes(buf);
    }
}
