//! Strongly-typed string identifiers.
//!
//! Identifiers arrive from the ingestion format as caller-supplied strings
//! (a node id is unique within its workflow, an execution id is minted by
//! the caller of `execute`). Each identifier type is a distinct newtype so
//! the compiler prevents mixing them, and all of them order
//! lexicographically — [`NodeId`] ordering is what makes scheduling
//! deterministic when several nodes are ready at once.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw string.
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// View the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier, returning the underlying string.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Ok(Self(raw.to_owned()))
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifies a single execution of a workflow.
    ExecutionId
}

string_id! {
    /// Identifies a workflow definition.
    WorkflowId
}

string_id! {
    /// Identifies the workspace (tenant) a workflow belongs to.
    WorkspaceId
}

string_id! {
    /// Identifies a node within a workflow. Unique per workflow.
    NodeId
}

string_id! {
    /// Identifies a stored credential.
    CredentialId
}
