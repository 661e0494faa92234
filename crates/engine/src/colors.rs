use todadot_core::colors::QUADRANT_COLORS_ID;
use todadot_core::{EntityId, Quadrant, QuadrantColorSet};

use crate::error::EngineError;
use crate::router::MutationRouter;

impl MutationRouter<QuadrantColorSet> {
    /// The single preference record, or the built-in palette when none has
    /// been saved yet.
    pub fn current_colors(&self) -> QuadrantColorSet {
        self.items()
            .first()
            .cloned()
            .unwrap_or_else(|| QuadrantColorSet::defaults(0))
    }

    pub fn color_for(&self, quadrant: Quadrant) -> String {
        self.current_colors().color_for(quadrant).to_string()
    }

    pub fn set_quadrant_color(
        &mut self,
        quadrant: Quadrant,
        color: impl Into<String>,
    ) -> Result<QuadrantColorSet, EngineError> {
        let color = color.into();
        let id = EntityId::from(QUADRANT_COLORS_ID);
        if self.get(&id).is_none() {
            let (_, created_at) = self.next_identity()?;
            let mut set = QuadrantColorSet::defaults(created_at);
            set.colors.insert(quadrant, color);
            self.add(set.clone())?;
            return Ok(set);
        }
        self.update(&id, |set| {
            set.colors.insert(quadrant, color);
        })
    }

    /// Back to the built-in palette. The record is kept so other devices
    /// pick up the reset.
    pub fn reset_colors(&mut self) -> Result<QuadrantColorSet, EngineError> {
        let id = EntityId::from(QUADRANT_COLORS_ID);
        if self.get(&id).is_none() {
            return Ok(self.current_colors());
        }
        self.update(&id, |set| set.colors.clear())
    }
}
