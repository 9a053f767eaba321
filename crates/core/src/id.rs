//! Strongly-typed identifiers used across the orchestration protocol.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Handle of a started execution (what callers poll with).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

/// Prefix used when an execution id is rendered as an ARN-like handle.
pub const EXECUTION_ARN_PREFIX: &str = "arn:opsflow:states:execution:";

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(ExecutionId, "ExecutionId");

impl ExecutionId {
    /// ARN-style rendering returned to HTTP callers.
    pub fn to_arn(&self) -> String {
        format!("{EXECUTION_ARN_PREFIX}{}", self.0)
    }

    /// Parse either a bare UUID or the ARN-style rendering.
    pub fn parse_handle(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        s.strip_prefix(EXECUTION_ARN_PREFIX).unwrap_or(s).parse()
    }
}

/// Opaque token handed to a worker so it can resume its suspended execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackToken(String);

impl CallbackToken {
    /// Token value that tells a worker to skip orchestrator callbacks.
    pub const LOCAL_TEST: &'static str = "localtest";

    /// Fresh, unguessable token. Two v7 UUIDs give 148 random bits.
    pub fn generate() -> Self {
        Self(format!(
            "{}{}",
            Uuid::now_v7().simple(),
            Uuid::now_v7().simple()
        ))
    }

    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_id("CallbackToken: empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_local_test(&self) -> bool {
        self.0 == Self::LOCAL_TEST
    }
}

impl core::fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_id_parses_bare_and_arn_forms() {
        let id = ExecutionId::new();

        assert_eq!(ExecutionId::parse_handle(&id.to_string()).unwrap(), id);
        assert_eq!(ExecutionId::parse_handle(&id.to_arn()).unwrap(), id);
        assert!(matches!(
            ExecutionId::parse_handle("not-a-uuid"),
            Err(DomainError::InvalidId(_))
        ));
    }

    #[test]
    fn generated_tokens_are_unique() {
        let a = CallbackToken::generate();
        let b = CallbackToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(!a.is_local_test());
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(CallbackToken::new("  ").is_err());
        assert!(CallbackToken::new("localtest").unwrap().is_local_test());
    }
}
