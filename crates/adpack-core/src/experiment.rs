//! Experiment rows are owned by the experimentation layer; we only read them.

use serde::{Deserialize, Serialize};

use crate::blueprint::VariantTag;
use crate::id::{ExperimentId, WorkspaceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: ExperimentId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub variants: Vec<VariantTag>,
}
