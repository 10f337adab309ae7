//! Resource identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};

macro_rules! int_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            Display,
        )]
        #[serde(transparent)]
        #[display("{_0}")]
        pub struct $name(i64);

        impl $name {
            pub fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

int_id! {
    /// Identifier of one user-initiated ingestion run.
    RunId
}

int_id! {
    /// Identifier of a tracked posting row.
    JobId
}

int_id! {
    /// Identifier supplied by the external identity service.
    UserId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let id = RunId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<RunId>().unwrap(), id);
    }

    #[test]
    fn test_serde_transparent() {
        let id = JobId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        let back: JobId = serde_json::from_str("7").unwrap();
        assert_eq!(back, id);
    }
}
