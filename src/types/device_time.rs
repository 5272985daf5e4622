//! Device-side timestamps
//!
//! Firmware stamps each record with a duration since boot, written as a unit-annotated
//! literal such as `1500ms` or as an exact ratio of seconds such as `2[1/3]s` (two ticks
//! of a 3 Hz clock). [`DeviceTime`] keeps that value exact as a reduced fraction of
//! seconds so records from different clocks order correctly.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::RttError;

/// Unit suffixes accepted after an integer, as `(suffix, numerator, denominator)` seconds.
const UNITS: [(&str, u64, u64); 21] = [
    ("as", 1, 1_000_000_000_000_000_000),
    ("fs", 1, 1_000_000_000_000_000),
    ("ps", 1, 1_000_000_000_000),
    ("ns", 1, 1_000_000_000),
    ("us", 1, 1_000_000),
    ("µs", 1, 1_000_000),
    ("ms", 1, 1_000),
    ("cs", 1, 100),
    ("ds", 1, 10),
    ("s", 1, 1),
    ("das", 10, 1),
    ("hs", 100, 1),
    ("ks", 1_000, 1),
    ("Ms", 1_000_000, 1),
    ("Gs", 1_000_000_000, 1),
    ("Ts", 1_000_000_000_000, 1),
    ("Ps", 1_000_000_000_000_000, 1),
    ("Es", 1_000_000_000_000_000_000, 1),
    ("min", 60, 1),
    ("h", 3_600, 1),
    ("d", 86_400, 1),
];

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Exact time since device boot, in seconds, as a reduced fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceTime {
    numer: u128,
    denom: u64,
}

impl DeviceTime {
    /// Device boot.
    pub const ZERO: DeviceTime = DeviceTime { numer: 0, denom: 1 };

    /// `value * numer / denom` seconds. Returns `None` when `denom` is zero.
    pub fn from_ratio(value: u64, numer: u64, denom: u64) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        let numer = u128::from(value) * u128::from(numer);
        Some(Self::reduced(numer, u128::from(denom)))
    }

    /// Whole seconds since boot.
    pub fn from_secs(secs: u64) -> Self {
        Self { numer: u128::from(secs), denom: 1 }
    }

    /// Nanoseconds since boot.
    pub fn from_nanos(nanos: u64) -> Self {
        Self::reduced(u128::from(nanos), NANOS_PER_SEC)
    }

    fn reduced(numer: u128, denom: u128) -> Self {
        if numer == 0 {
            return Self::ZERO;
        }
        let divisor = gcd(numer, denom);
        // denom started as a u64 and only shrinks
        Self { numer: numer / divisor, denom: (denom / divisor) as u64 }
    }

    /// Numerator of the reduced fraction of seconds.
    pub fn numer(&self) -> u128 {
        self.numer
    }

    /// Denominator of the reduced fraction of seconds.
    pub fn denom(&self) -> u64 {
        self.denom
    }

    pub fn is_zero(&self) -> bool {
        self.numer == 0
    }

    /// Whole seconds, saturating at `u64::MAX`.
    pub fn whole_secs(&self) -> u64 {
        u64::try_from(self.numer / u128::from(self.denom)).unwrap_or(u64::MAX)
    }

    /// Nanoseconds within the current second, truncated.
    pub fn subsec_nanos(&self) -> u32 {
        let rem = self.numer % u128::from(self.denom);
        (rem * NANOS_PER_SEC / u128::from(self.denom)) as u32
    }

    /// Approximate value in seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.numer as f64 / self.denom as f64
    }

    /// Value as a [`Duration`], truncated to nanoseconds and saturating.
    pub fn as_duration(&self) -> Duration {
        Duration::new(self.whole_secs(), self.subsec_nanos())
    }

    /// Parse a device-time literal, returning `None` for anything outside the grammar.
    ///
    /// Accepted forms are `<integer><unit>` for the units in the table above, and
    /// `<integer>[<num>]s` or `<integer>[<num>/<den>]s`.
    pub fn parse_literal(literal: &str) -> Option<Self> {
        match literal.strip_suffix("]s") {
            Some(ratio) => Self::parse_ratio(ratio),
            None => Self::parse_with_unit(literal),
        }
    }

    fn parse_with_unit(literal: &str) -> Option<Self> {
        let (value, unit) = split_integer(literal)?;
        if unit.is_empty() {
            return None;
        }
        let &(_, numer, denom) = UNITS.iter().find(|(suffix, _, _)| *suffix == unit)?;
        Self::from_ratio(value, numer, denom)
    }

    fn parse_ratio(literal: &str) -> Option<Self> {
        let (value, rest) = split_integer(literal)?;
        let rest = rest.strip_prefix('[')?;
        let (numer, rest) = split_integer(rest)?;
        if rest.is_empty() {
            return Self::from_ratio(value, numer, 1);
        }
        let (denom, rest) = split_integer(rest.strip_prefix('/')?)?;
        if !rest.is_empty() {
            return None;
        }
        Self::from_ratio(value, numer, denom)
    }

    /// Render as a literal accepted by [`DeviceTime::parse_literal`].
    ///
    /// Exact whenever the numerator fits in 64 bits; larger values are truncated to
    /// whole seconds.
    pub fn to_literal(&self) -> String {
        match u64::try_from(self.numer) {
            Ok(numer) if self.denom == 1 => format!("{numer}s"),
            Ok(numer) => format!("1[{numer}/{}]s", self.denom),
            Err(_) => format!("{}s", self.whole_secs()),
        }
    }
}

impl Default for DeviceTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Ord for DeviceTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let (lhs_den, rhs_den) = (u128::from(self.denom), u128::from(other.denom));
        (self.numer / lhs_den).cmp(&(other.numer / rhs_den)).then_with(|| {
            // both remainders are below their u64 denominators, so the products fit
            let lhs = (self.numer % lhs_den) * rhs_den;
            let rhs = (other.numer % rhs_den) * lhs_den;
            lhs.cmp(&rhs)
        })
    }
}

impl PartialOrd for DeviceTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for DeviceTime {
    type Err = RttError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_literal(s)
            .ok_or_else(|| RttError::parse("device time", format!("invalid literal '{s}'")))
    }
}

/// `[D ]HH:MM:SS.mmm.uuu.nnn`
impl fmt::Display for DeviceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.whole_secs();
        let nanos = self.subsec_nanos();
        let days = secs / 86_400;
        if days != 0 {
            write!(f, "{days} ")?;
        }
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}.{:03}.{:03}",
            (secs / 3_600) % 24,
            (secs / 60) % 60,
            secs % 60,
            nanos / 1_000_000,
            (nanos / 1_000) % 1_000,
            nanos % 1_000
        )
    }
}

/// Split a leading run of ASCII digits off `s` and parse it.
fn split_integer(s: &str) -> Option<(u64, &str)> {
    let end = s.bytes().position(|b| !b.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
