use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::entity::{Entity, EntityKind};
use crate::ids::EntityId;
use crate::todo::Quadrant;

/// Fixed id so every device merges onto the same preference document.
pub const QUADRANT_COLORS_ID: &str = "quadrant-colors";

pub fn default_color(quadrant: Quadrant) -> &'static str {
    match quadrant {
        Quadrant::UrgentImportant => "#ef4444",
        Quadrant::NotUrgentImportant => "#3b82f6",
        Quadrant::UrgentNotImportant => "#f59e0b",
        Quadrant::NotUrgentNotImportant => "#10b981",
    }
}

/// Per-quadrant colour preferences. Quadrants absent from `colors` use the
/// built-in palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadrantColorSet {
    pub id: EntityId,
    #[serde(default)]
    pub colors: BTreeMap<Quadrant, String>,
    pub created_at: i64,
}

impl QuadrantColorSet {
    pub fn defaults(created_at: i64) -> Self {
        Self {
            id: EntityId::from(QUADRANT_COLORS_ID),
            colors: BTreeMap::new(),
            created_at,
        }
    }

    pub fn color_for(&self, quadrant: Quadrant) -> &str {
        self.colors
            .get(&quadrant)
            .map(String::as_str)
            .unwrap_or_else(|| default_color(quadrant))
    }
}

fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6 | 8) && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

impl Entity for QuadrantColorSet {
    const KIND: EntityKind = EntityKind::QuadrantColorSet;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::InvalidData("colour set with empty id".into()));
        }
        for (quadrant, color) in &self.colors {
            if !is_hex_color(color) {
                return Err(CoreError::InvalidData(format!(
                    "{quadrant}: {color:?} is not a hex colour"
                )));
            }
        }
        Ok(())
    }
}
