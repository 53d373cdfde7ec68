//! Workspace directory: bearer token to user, user to workspace memberships.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use adpack_core::id::{UserId, WorkspaceId};

use crate::error::StoreError;

#[async_trait]
pub trait WorkspaceDirectory: Send + Sync {
    /// `None` for unknown or revoked tokens.
    async fn authenticate(&self, token: &str) -> Option<UserId>;

    async fn is_member(&self, user: UserId, workspace: WorkspaceId) -> bool;
}

/// One entry of the directory file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub token: String,
    pub user_id: UserId,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceId>,
}

/// Fixed directory loaded at startup, for local deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    tokens: HashMap<String, UserId>,
    memberships: HashMap<UserId, HashSet<WorkspaceId>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let mut dir = Self::new();
        for e in entries {
            dir.insert(e.token, e.user_id, e.workspaces);
        }
        dir
    }

    /// Parse a JSON array of [`DirectoryEntry`].
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let entries: Vec<DirectoryEntry> = serde_json::from_str(json)
            .map_err(|e| StoreError::Backend(format!("directory file: {e}")))?;
        Ok(Self::from_entries(entries))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Backend(format!("reading {}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Register a token; memberships accumulate when a user has several tokens.
    pub fn insert(
        &mut self,
        token: impl Into<String>,
        user: UserId,
        workspaces: impl IntoIterator<Item = WorkspaceId>,
    ) {
        self.tokens.insert(token.into(), user);
        self.memberships.entry(user).or_default().extend(workspaces);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl WorkspaceDirectory for StaticDirectory {
    async fn authenticate(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token.trim()).copied()
    }

    async fn is_member(&self, user: UserId, workspace: WorkspaceId) -> bool {
        self.memberships
            .get(&user)
            .map(|set| set.contains(&workspace))
            .unwrap_or(false)
    }
}
