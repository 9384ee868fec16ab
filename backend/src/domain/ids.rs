//! Strongly typed identifiers for persisted gym records.
//!
//! Rows use `BIGINT` primary keys, so each identifier wraps an `i64`. The
//! newtypes keep a class id from being passed where a user id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_entity_id {
    ($(#[$outer:meta])* $name:ident) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw primary key value.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Raw primary key value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_entity_id!(
    /// Identifier of a gym member (user account).
    UserId
);
define_entity_id!(
    /// Identifier of a scheduled gym class.
    GymClassId
);
define_entity_id!(
    /// Identifier of a class booking.
    BookingId
);
define_entity_id!(
    /// Identifier of a purchased user package.
    PackageId
);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn ids_display_raw_value() {
        assert_eq!(UserId::new(42).to_string(), "42");
        assert_eq!(GymClassId::from(7).get(), 7);
    }

    #[rstest]
    fn ids_serialise_transparently() {
        let encoded = serde_json::to_string(&BookingId::new(9)).expect("serialise");
        assert_eq!(encoded, "9");
    }
}
