//! Logical resource versions.
//!
//! A version is rendered as `"<seconds>:<nanoseconds>"` and ordered by
//! seconds first, then nanoseconds. Versions only need to be monotonic per
//! resource; [`Version::now`] additionally never goes backwards within the
//! process so that a freshly stamped version always beats the previous one.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering as AtomicOrdering;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::utils::time::now_since_epoch;
use crate::Result;
use crate::StoreError;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Last issued version, as total nanoseconds since the epoch.
static LAST_ISSUED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Version {
    pub seconds: u64,
    pub nanos: u32,
}

impl Version {
    pub const fn new(
        seconds: u64,
        nanos: u32,
    ) -> Self {
        Self { seconds, nanos }
    }

    /// Current wall clock, bumped past the last version issued in-process.
    pub fn now() -> Self {
        let wall = now_since_epoch();
        let wall = wall.as_secs() * NANOS_PER_SEC + u64::from(wall.subsec_nanos());

        let mut last = LAST_ISSUED.load(AtomicOrdering::Relaxed);
        loop {
            let next = wall.max(last + 1);
            match LAST_ISSUED.compare_exchange_weak(last, next, AtomicOrdering::AcqRel, AtomicOrdering::Relaxed) {
                Ok(_) => return Self::from_total_nanos(next),
                Err(observed) => last = observed,
            }
        }
    }

    /// The smallest version strictly greater than this one.
    pub fn succ(&self) -> Self {
        if u64::from(self.nanos) + 1 >= NANOS_PER_SEC {
            Self::new(self.seconds + 1, 0)
        } else {
            Self::new(self.seconds, self.nanos + 1)
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || StoreError::Validation(format!("version {s:?} is not of the form <seconds>:<nanoseconds>"));

        let (secs, nanos) = s.split_once(':').ok_or_else(invalid)?;
        if secs.is_empty() || nanos.is_empty() {
            return Err(invalid().into());
        }
        if !secs.bytes().all(|b| b.is_ascii_digit()) || !nanos.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid().into());
        }
        let seconds = secs.parse::<u64>().map_err(|_| invalid())?;
        let nanos = nanos.parse::<u32>().map_err(|_| invalid())?;
        if u64::from(nanos) >= NANOS_PER_SEC {
            return Err(invalid().into());
        }
        Ok(Self { seconds, nanos })
    }

    fn from_total_nanos(total: u64) -> Self {
        Self {
            seconds: total / NANOS_PER_SEC,
            nanos: (total % NANOS_PER_SEC) as u32,
        }
    }
}

impl Ord for Version {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.seconds.cmp(&other.seconds).then(self.nanos.cmp(&other.nanos))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.seconds, self.nanos)
    }
}

impl FromStr for Version {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}
