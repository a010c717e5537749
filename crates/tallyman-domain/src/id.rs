//! UUIDv7-backed identifiers
//!
//! UUIDv7 gives chronological sortability, which the store relies on to
//! return the most recent analysis first without a separate sequence column.

use std::fmt;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u128);

        impl $name {
            /// Generate a new UUIDv7-based identifier
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7().as_u128())
            }

            /// Create an identifier from a raw u128 value
            ///
            /// This is primarily for storage layer deserialization.
            pub fn from_value(value: u128) -> Self {
                Self(value)
            }

            /// Parse an identifier from its hyphenated UUID string form
            pub fn from_string(s: &str) -> Result<Self, String> {
                uuid::Uuid::parse_str(s)
                    .map(|u| Self(u.as_u128()))
                    .map_err(|e| format!("Invalid UUID string '{}': {}", s, e))
            }

            /// Get the raw u128 value
            pub fn value(&self) -> u128 {
                self.0
            }

            /// Millisecond timestamp embedded in the UUIDv7
            pub fn timestamp(&self) -> u64 {
                // UUIDv7: top 48 bits are Unix millisecond timestamp
                (self.0 >> 80) as u64
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", uuid::Uuid::from_u128(self.0))
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_string(s)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a Document Unit
    ///
    /// ```
    /// use tallyman_domain::DocumentId;
    ///
    /// let id = DocumentId::new();
    /// let parsed = DocumentId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    DocumentId
);

uuid_id!(
    /// Identifier of an Analysis Record
    AnalysisId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_ordering() {
        let id1 = DocumentId::from_value(1000);
        let id2 = DocumentId::from_value(2000);

        assert!(id1 < id2);
    }

    #[test]
    fn test_id_chronological() {
        let id1 = AnalysisId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = AnalysisId::new();

        assert!(id1 < id2, "Earlier UUIDv7 should sort first");
        assert!(id1.timestamp() <= id2.timestamp());
    }

    #[test]
    fn test_id_display_and_parse() {
        let id = DocumentId::new();
        let id_str = id.to_string();
        assert_eq!(id_str.len(), 36);

        let parsed: DocumentId = id_str.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_invalid_string() {
        assert!(DocumentId::from_string("not-a-valid-uuid").is_err());
        assert!(DocumentId::from_string("").is_err());
    }
}
