//! Fridge state messages and their wire codec.
//!
//! The wire form is compact JSON with single-letter field names in fixed
//! order, e.g. `{"T":4,"D":4,"O":false}`. Temperatures are serialized as
//! whole degrees with no decimal point; the device side formats them the
//! same way, so integer-valued states round-trip exactly. Unknown fields
//! are ignored on decode for forward compatibility.

use std::fmt;

use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A temperature in degrees Celsius.
///
/// On the wire this is a whole number: encoding rounds to the nearest
/// degree, ties away from zero (`f64::round`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Degrees(pub f64);

impl Degrees {
    /// The raw value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// The value as it appears on the wire.
    pub fn rounded(self) -> i64 {
        self.0.round() as i64
    }
}

impl From<f64> for Degrees {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Degrees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rounded())
    }
}

impl Serialize for Degrees {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.rounded())
    }
}

impl<'de> Deserialize<'de> for Degrees {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)
            .map_err(|e| D::Error::custom(format!("temperature is not numeric: {e}")))?;
        Ok(Self(value))
    }
}

/// State reported by a fridge on its topic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FridgeState {
    /// Measured temperature.
    #[serde(rename = "T")]
    pub temperature: Degrees,
    /// Temperature the device is trying to reach.
    #[serde(rename = "D")]
    pub desired_temperature: Degrees,
    /// Whether the door is currently open.
    #[serde(rename = "O")]
    pub door_open: bool,
}

impl FridgeState {
    /// Create a new state.
    pub fn new(temperature: f64, desired_temperature: f64, door_open: bool) -> Self {
        Self {
            temperature: Degrees(temperature),
            desired_temperature: Degrees(desired_temperature),
            door_open,
        }
    }
}

impl fmt::Display for FridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let door = if self.door_open { "open" } else { "closed" };
        write!(
            f,
            "fridge temperature is {}°C and door is {door}",
            self.temperature
        )
    }
}

/// Encode a state message to its wire form.
pub fn encode(state: &FridgeState) -> Result<String> {
    serde_json::to_string(state).map_err(|e| Error::codec(e.to_string()))
}

/// Decode a state message from its wire form.
///
/// Fails if a required field is absent, a temperature field is not
/// numeric, or the door field is not a JSON boolean.
pub fn decode(payload: &[u8]) -> Result<FridgeState> {
    serde_json::from_slice(payload).map_err(|e| Error::codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_fixed_wire_form() {
        let state = FridgeState::new(4.0, 4.0, false);
        assert_eq!(encode(&state).ok(), Some(r#"{"T":4,"D":4,"O":false}"#.to_string()));
    }

    #[test]
    fn test_encode_rounds_to_nearest_degree() {
        let state = FridgeState::new(3.6, -2.4, true);
        assert_eq!(encode(&state).ok(), Some(r#"{"T":4,"D":-2,"O":true}"#.to_string()));
    }

    #[test]
    fn test_round_trip_integer_temperatures() {
        for temp in [-40.0, -1.0, 0.0, 4.0, 25.0] {
            let state = FridgeState::new(temp, 4.0, temp > 0.0);
            let encoded = encode(&state).ok();
            let decoded = encoded.and_then(|s| decode(s.as_bytes()).ok());
            assert_eq!(decoded, Some(state));
        }
    }

    #[test]
    fn test_decode_accepts_unknown_fields() {
        let decoded = decode(br#"{"T":6,"D":4,"O":true,"version":2}"#);
        assert_eq!(decoded.ok(), Some(FridgeState::new(6.0, 4.0, true)));
    }

    #[test]
    fn test_decode_rejects_non_numeric_temperature() {
        assert!(decode(br#"{"T":"warm","D":4,"O":false}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(decode(br#"{"T":4,"D":4}"#).is_err());
        assert!(decode(br#"{}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_non_boolean_door() {
        assert!(decode(br#"{"T":4,"D":4,"O":"yes"}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"not json at all").is_err());
    }
}
