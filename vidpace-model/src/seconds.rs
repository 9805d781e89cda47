use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ModelError, Result};

/// Whole seconds used as a rewind/forward increment, bounded to 1..=300.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(transparent)]
pub struct Seconds(u16);

impl Seconds {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 300;

    /// Builds a value, rejecting anything outside 1..=300.
    pub fn new(value: i64) -> Result<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Seconds(value as u16))
        } else {
            Err(ModelError::SecondsOutOfRange(value))
        }
    }

    /// Compile-time constructor for in-range literals.
    pub(crate) const fn literal(value: u16) -> Self {
        assert!(value >= Self::MIN && value <= Self::MAX);
        Seconds(value)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }

    /// Parses user input, falling back to `fallback` when the text is not an
    /// integer in range.
    pub fn parse_or(input: &str, fallback: Seconds) -> Seconds {
        input.parse().unwrap_or(fallback)
    }

    /// Reads a stored JSON value. Anything other than an in-range integer
    /// yields `None`.
    pub fn from_value(value: &Value) -> Option<Seconds> {
        value.as_i64().and_then(|v| Seconds::new(v).ok())
    }
}

impl FromStr for Seconds {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let parsed = s
            .trim()
            .parse::<i64>()
            .map_err(|_| ModelError::InvalidSeconds(s.to_string()))?;
        Seconds::new(parsed)
    }
}

impl TryFrom<i64> for Seconds {
    type Error = ModelError;

    fn try_from(value: i64) -> Result<Self> {
        Seconds::new(value)
    }
}

impl From<Seconds> for Value {
    fn from(value: Seconds) -> Self {
        Value::from(value.0)
    }
}

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Seconds {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Seconds::new(raw).map_err(serde::de::Error::custom)
    }
}
