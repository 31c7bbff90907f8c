//! Record identity types for queued work.

/// A type-safe identifier for queued records.
///
/// [`RecordId`] is a new-type wrapper around `i64`. The backing store is the
/// authority on record identity, so construction from a raw `i64` is
/// infallible; the worker only ever round-trips ids it received from the
/// store.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Creates a new [`RecordId`] from a raw `i64`.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Convert the [`RecordId`] to an `i64`
    #[must_use]
    pub const fn into_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<RecordId> for i64 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl AsRef<i64> for RecordId {
    fn as_ref(&self) -> &i64 {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of queued work returned by a [`Store`].
///
/// The worker treats records as opaque values; the only capability it
/// requires is exposing the id under which the store tracks the record.
///
/// [`Store`]: crate::store::Store
pub trait Record: Send + Sync + 'static {
    /// Returns the id under which the store tracks this record.
    fn record_id(&self) -> RecordId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_round_trips_through_i64() {
        let id = RecordId::new(42);
        assert_eq!(id.into_i64(), 42);
        assert_eq!(RecordId::from(42i64), id);
        assert_eq!(i64::from(id), 42);
    }

    #[test]
    fn record_id_display() {
        assert_eq!(RecordId::new(7).to_string(), "7");
    }

    #[test]
    fn record_id_serde_is_transparent() {
        let id = RecordId::new(13);
        let json = serde_json::to_string(&id).expect("Failed to serialize record id");
        assert_eq!(json, "13");

        let parsed: RecordId = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(parsed, id);
    }
}
