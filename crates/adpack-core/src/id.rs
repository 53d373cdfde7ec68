//! Strongly-typed identifiers used across the pipeline.
//!
//! Rows are addressed by UUIDs so they stay unique across workspaces and
//! processes. Downstream crates should *not* pass raw `Uuid`s or strings around.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! new_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
            pub const fn from_uuid(v: Uuid) -> Self {
                Self(v)
            }
            pub const fn get(self) -> Uuid {
                self.0
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

        impl FromStr for $name {
            type Err = crate::error::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self).map_err(|e| {
                    crate::error::Error::Parse(format!("{} '{}': {}", stringify!($name), s, e))
                })
            }
        }
    };
}

new_id!(JobId);
new_id!(WorkspaceId);
new_id!(SiteId);
new_id!(ExperimentId);
new_id!(BlueprintId);
new_id!(AssetId);
new_id!(ApprovalId);
new_id!(ClaimDecisionId);
new_id!(UserId);
