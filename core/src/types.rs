//! Identifiers and value objects shared by every part of the booking flow.

use crate::error::{BookingError, RequestField};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a train in the remote catalog
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainId(u64);

impl TrainId {
    /// Wraps a catalog train number
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw train number
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Booking identifier assigned by the remote service.
///
/// Opaque to the coordinator, but always numeric on the wire. Parsing from
/// user input rejects anything that is not a plain decimal number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(u64);

impl BookingId {
    /// Wraps a service-issued booking number
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw booking number
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BookingId {
    type Err = BookingError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(BookingError::invalid(
                RequestField::BookingId,
                "booking id is required",
            ));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BookingError::invalid(
                RequestField::BookingId,
                format!("'{trimmed}' is not a numeric booking id"),
            ));
        }
        trimmed.parse::<u64>().map(Self).map_err(|_| {
            BookingError::invalid(RequestField::BookingId, "booking id is out of range")
        })
    }
}

/// Client-generated identifier correlating every call made for one purchase.
///
/// Sent with the reservation so that an unknown outcome (timeout) can be
/// resolved by looking the reservation up instead of resubmitting it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new correlation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Catalog Value Objects
// ============================================================================

/// Fare class on a train (`AC_Chair`, `Shovon`, ...) with its own seat pool and price.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoachType(String);

impl CoachType {
    /// Wraps a coach type code as reported by the catalog
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The raw code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Name shown to shoppers (`AC_Chair` becomes `AC Chair`)
    #[must_use]
    pub fn display_name(&self) -> String {
        self.0.replace('_', " ")
    }
}

impl fmt::Display for CoachType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Station name as used by the catalog
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationName(String);

impl StationName {
    /// Wraps a station name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The station name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether two names refer to the same station, ignoring case and padding
    #[must_use]
    pub fn same_station(&self, other: &Self) -> bool {
        self.0.trim().eq_ignore_ascii_case(other.0.trim())
    }
}

impl fmt::Display for StationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Money Value Object (paisa-based to avoid floating point errors)
// ============================================================================

/// Amount of Bangladeshi taka, stored as paisa (1/100 taka).
///
/// On the wire amounts are decimal numbers of taka; whole amounts are written
/// as integers so `3600` round-trips unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from paisa
    #[must_use]
    pub const fn from_paisa(paisa: u64) -> Self {
        Self(paisa)
    }

    /// Creates a `Money` value from whole taka, `None` on overflow
    #[must_use]
    pub const fn from_taka(taka: u64) -> Option<Self> {
        match taka.checked_mul(100) {
            Some(paisa) => Some(Self(paisa)),
            None => None,
        }
    }

    /// Converts a decimal taka amount, rounding to the nearest paisa.
    ///
    /// Returns `None` for negative, non-finite or out-of-range values.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn from_decimal_taka(taka: f64) -> Option<Self> {
        if !taka.is_finite() || taka < 0.0 {
            return None;
        }
        let paisa = (taka * 100.0).round();
        if paisa >= u64::MAX as f64 {
            return None;
        }
        Some(Self(paisa as u64))
    }

    /// Returns the amount in paisa
    #[must_use]
    pub const fn paisa(&self) -> u64 {
        self.0
    }

    /// Returns the whole-taka part of the amount
    #[must_use]
    pub const fn taka(&self) -> u64 {
        self.0 / 100
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies by a ticket count, `None` on overflow
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Divides evenly across `parts`, `None` if `parts` is zero
    #[must_use]
    pub const fn checked_split(self, parts: u32) -> Option<Self> {
        if parts == 0 {
            return None;
        }
        Some(Self(self.0 / parts as u64))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "৳{}", self.taka())
        } else {
            write!(f, "৳{}.{:02}", self.taka(), self.0 % 100)
        }
    }
}

impl Serialize for Money {
    #[allow(clippy::cast_precision_loss)]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % 100 == 0 {
            serializer.serialize_u64(self.taka())
        } else {
            serializer.serialize_f64(self.0 as f64 / 100.0)
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let taka = f64::deserialize(deserializer)?;
        Self::from_decimal_taka(taka)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {taka}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_id_parses_digits_only() {
        assert_eq!("999999".parse::<BookingId>().unwrap(), BookingId::new(999_999));
        assert_eq!(" 42 ".parse::<BookingId>().unwrap(), BookingId::new(42));

        for bad in ["", "   ", "12a", "-5", "1.0", "abc", "99999999999999999999999"] {
            let err = bad.parse::<BookingId>().unwrap_err();
            assert!(
                matches!(
                    err,
                    BookingError::InvalidRequest {
                        field: RequestField::BookingId,
                        ..
                    }
                ),
                "{bad:?} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_money_display_uses_taka_sign() {
        assert_eq!(Money::from_taka(3600).unwrap().to_string(), "৳3600");
        assert_eq!(Money::from_paisa(360_050).to_string(), "৳3600.50");
        assert_eq!(Money::from_paisa(5).to_string(), "৳0.05");
    }

    #[test]
    fn test_money_wire_format() {
        let whole = Money::from_taka(1200).unwrap();
        assert_eq!(serde_json::to_string(&whole).unwrap(), "1200");

        let parsed: Money = serde_json::from_str("1200.5").unwrap();
        assert_eq!(parsed, Money::from_paisa(120_050));

        let parsed: Money = serde_json::from_str("3600").unwrap();
        assert_eq!(parsed, Money::from_taka(3600).unwrap());

        assert!(serde_json::from_str::<Money>("-1").is_err());
    }

    #[test]
    fn test_money_arithmetic() {
        let price = Money::from_taka(1200).unwrap();
        assert_eq!(price.checked_multiply(3), Money::from_taka(3600));
        assert_eq!(Money::from_taka(3600).unwrap().checked_split(3), Some(price));
        assert_eq!(price.checked_split(0), None);
        assert_eq!(Money::from_paisa(u64::MAX).checked_multiply(2), None);
    }

    #[test]
    fn test_coach_type_display_name() {
        assert_eq!(CoachType::new("AC_Chair").display_name(), "AC Chair");
        assert_eq!(CoachType::new("Shovon").display_name(), "Shovon");
    }

    #[test]
    fn test_station_comparison_ignores_case() {
        assert!(StationName::new("Dhaka").same_station(&StationName::new(" dhaka ")));
        assert!(!StationName::new("Dhaka").same_station(&StationName::new("Sylhet")));
    }
}
