//! Key strategies and client-side key generation.

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use sea_query::Value;
use uuid::Uuid;

use crate::entity::ValueKind;

/// How a property participates in the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    /// Generated by the database; omitted from inserts and read back afterwards.
    Identity,
    /// Generated client-side as a sequential GUID before insert.
    Guid,
    /// Supplied by the caller.
    Assigned,
    /// Not part of the key.
    #[default]
    NotAKey,
}

impl KeyType {
    /// Key strategy implied by a property's value kind when the key is found by convention.
    #[must_use]
    pub const fn for_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Integer => Self::Identity,
            ValueKind::Uuid => Self::Guid,
            _ => Self::Assigned,
        }
    }

    /// Whether the property is part of the key.
    #[must_use]
    pub const fn is_key(self) -> bool {
        !matches!(self, Self::NotAKey)
    }
}

/// Produces a key value for a strategy.
///
/// `Identity` and `Assigned` keys are never generated client-side, so only `Guid` yields a
/// value.
#[must_use]
pub fn generate(key_type: KeyType) -> Option<Value> {
    match key_type {
        KeyType::Guid => Some(Value::Uuid(Some(Box::new(next_sequential_guid())))),
        KeyType::Identity | KeyType::Assigned | KeyType::NotAKey => None,
    }
}

/// Scale applied to milliseconds since midnight, matching the 1/300 s resolution of
/// `datetime` columns.
const MILLIS_SCALE: f64 = 3.333_333;

/// Returns a random GUID whose trailing six bytes encode the current local date and time.
///
/// The last six bytes are the most significant when SQL Server compares `uniqueidentifier`
/// values, so consecutive values sort close to insertion order.
#[must_use]
pub fn next_sequential_guid() -> Uuid {
    sequential_guid_at(Local::now().naive_local())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sequential_guid_at(now: NaiveDateTime) -> Uuid {
    let mut bytes = *Uuid::new_v4().as_bytes();

    let days = (now.date() - epoch()).num_days() as u32;
    let millis_of_day = f64::from(now.num_seconds_from_midnight()) * 1000.0
        + f64::from(now.nanosecond() % 1_000_000_000 / 1_000_000);
    let ticks = (millis_of_day / MILLIS_SCALE) as u32;

    bytes[10..12].copy_from_slice(&days.to_be_bytes()[2..]);
    bytes[12..16].copy_from_slice(&ticks.to_be_bytes());

    Uuid::from_bytes(bytes)
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn key_type_by_kind() {
        assert_eq!(KeyType::for_kind(ValueKind::Integer), KeyType::Identity);
        assert_eq!(KeyType::for_kind(ValueKind::Uuid), KeyType::Guid);
        assert_eq!(KeyType::for_kind(ValueKind::Text), KeyType::Assigned);
        assert!(!KeyType::NotAKey.is_key());
        assert!(KeyType::Assigned.is_key());
    }

    #[test]
    fn only_guid_keys_are_generated() {
        assert!(matches!(generate(KeyType::Guid), Some(Value::Uuid(Some(_)))));
        assert!(generate(KeyType::Identity).is_none());
        assert!(generate(KeyType::Assigned).is_none());
        assert!(generate(KeyType::NotAKey).is_none());
    }

    #[test]
    fn thousand_guids_are_distinct() {
        let ids: HashSet<Uuid> = (0..1000).map(|_| next_sequential_guid()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn trailing_bytes_encode_date_and_time() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_milli_opt(10, 30, 45, 500)
            .unwrap();
        let id = sequential_guid_at(now);
        let bytes = id.as_bytes();

        let days = u16::from_be_bytes([bytes[10], bytes[11]]);
        assert_eq!(i64::from(days), (now.date() - epoch()).num_days());

        let ticks = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let millis = ((10 * 3600 + 30 * 60 + 45) * 1000 + 500) as f64;
        assert_eq!(ticks, (millis / MILLIS_SCALE) as u32);
    }

    #[test]
    fn later_times_sort_after_earlier_ones() {
        let morning = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let evening = morning + chrono::Duration::hours(10);
        let next_day = morning + chrono::Duration::days(1);

        let a = sequential_guid_at(morning);
        let b = sequential_guid_at(evening);
        let c = sequential_guid_at(next_day);

        assert!(a.as_bytes()[10..] < b.as_bytes()[10..]);
        assert!(b.as_bytes()[10..] < c.as_bytes()[10..]);
    }
}
