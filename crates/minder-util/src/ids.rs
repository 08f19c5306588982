//! Strongly-typed identifiers for minder

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id! {
    /// A child identity scoping usage and limits within one deployment
    ProfileId
}

string_id! {
    /// A restricted application, website, or native program with its own limits
    ItemId
}

string_id! {
    /// A paired kiosk device as shown on the admin dashboard
    DeviceId
}

string_id! {
    /// A parent/child message thread
    ConversationId
}

string_id! {
    /// A bulletin-board post that can be pinned
    PostId
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// One in-memory usage session on one surface
    SessionId
}

uuid_id! {
    /// A connected sync-bus client (one per surface connection)
    ClientId
}

uuid_id! {
    /// A single message within a conversation
    MessageId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_equality() {
        let id1 = ItemId::new("minecraft");
        let id2 = ItemId::new("minecraft");
        let id3 = ItemId::new("roblox");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn session_id_uniqueness() {
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        assert_ne!(s1, s2);
    }

    #[test]
    fn ids_serialize_deserialize() {
        let profile = ProfileId::new("kid-a");
        let json = serde_json::to_string(&profile).unwrap();
        let parsed: ProfileId = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, parsed);

        let message = MessageId::new();
        let json = serde_json::to_string(&message).unwrap();
        let parsed: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(message, parsed);
    }
}
