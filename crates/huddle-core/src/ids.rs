//! Branded id newtypes.
//!
//! Participant and room ids are opaque strings minted outside the hub (the
//! token issuer and the room directory). Wrapping them keeps a room id from
//! being passed where a participant id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id!(
    /// Identity of one connected participant, stable for the socket's lifetime.
    ParticipantId
);

branded_id!(
    /// Identifier of a room. Two-party rooms are named `"{a}_{b}"`.
    RoomId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn display_is_inner_string() {
        let id = RoomId::new("alice_bob");
        assert_eq!(id.to_string(), "alice_bob");
    }

    #[test]
    fn serde_is_transparent() {
        let id = ParticipantId::new("alice");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"alice\"");
        let back: ParticipantId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn borrow_allows_str_lookup() {
        let mut map = HashMap::new();
        let _ = map.insert(RoomId::new("r1"), 1);
        assert_eq!(map.get("r1"), Some(&1));
    }

    #[test]
    fn conversions_roundtrip() {
        let id: ParticipantId = "bob".into();
        let s: String = id.clone().into();
        assert_eq!(s, "bob");
        assert_eq!(id.into_inner(), "bob");
    }

    #[test]
    fn deref_exposes_str_methods() {
        let id = RoomId::new("alice_bob");
        assert!(id.contains('_'));
        assert_eq!(id.len(), 9);
    }
}
