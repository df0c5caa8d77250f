//! The structured payload the remote worker must return.

use serde::{Deserialize, Serialize};

/// Name of the field carrying the complete corrected file text.
///
/// Fixed for this build. Responses using any other name are rejected.
pub const UPDATED_CONTENT_FIELD: &str = "updatedContent";

/// Validated worker result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixContract {
    pub analysis: Analysis,
    #[serde(default)]
    pub fixes: Fixes,
    #[serde(rename = "updatedContent")]
    pub updated_content: String,
}

/// The worker's summary of what it found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default, alias = "total_azc_errors")]
    pub total_errors: u32,
    #[serde(default)]
    pub error_types_found: Vec<String>,
    #[serde(default, alias = "models_requiring_fixes")]
    pub items_requiring_fixes: Vec<String>,
}

/// The changes the worker reports having made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixes {
    #[serde(default, alias = "model_renames")]
    pub renames: Vec<Rename>,
    #[serde(default)]
    pub reference_updates: Vec<ReferenceUpdate>,
    #[serde(default)]
    pub structural_additions: Vec<StructuralAddition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub fixed: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceUpdate {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub fixed: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralAddition {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl FixContract {
    /// Total number of individual changes the worker reported.
    pub fn reported_change_count(&self) -> usize {
        self.fixes.renames.len()
            + self.fixes.reference_updates.len()
            + self.fixes.structural_additions.len()
    }
}
