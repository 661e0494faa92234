use todadot_core::{EntityId, EventCategory};

use crate::error::EngineError;
use crate::router::MutationRouter;

impl MutationRouter<EventCategory> {
    pub fn find_by_name(&self, name: &str) -> Option<&EventCategory> {
        let name = name.trim();
        self.items().iter().find(|category| category.name.eq_ignore_ascii_case(name))
    }

    pub fn add_category(
        &mut self,
        name: impl Into<String>,
        color: impl Into<String>,
    ) -> Result<EventCategory, EngineError> {
        let name = name.into().trim().to_string();
        if self.find_by_name(&name).is_some() {
            return Err(EngineError::EntityExists(format!("event category {name:?}")));
        }
        let (id, created_at) = self.next_identity()?;
        let category = EventCategory {
            id,
            name,
            color: color.into(),
            created_at,
        };
        self.add(category.clone())?;
        Ok(category)
    }

    pub fn rename_category(
        &mut self,
        id: &EntityId,
        name: impl Into<String>,
    ) -> Result<EventCategory, EngineError> {
        let name = name.into().trim().to_string();
        if self.find_by_name(&name).is_some_and(|other| &other.id != id) {
            return Err(EngineError::EntityExists(format!("event category {name:?}")));
        }
        self.update(id, |category| category.name = name)
    }

    pub fn recolor_category(
        &mut self,
        id: &EntityId,
        color: impl Into<String>,
    ) -> Result<EventCategory, EngineError> {
        let color = color.into();
        self.update(id, |category| category.color = color)
    }

    /// Events and todos that still point at the category read as
    /// uncategorized afterwards; nothing cascades.
    pub fn delete_category(&mut self, id: &EntityId) -> Result<EventCategory, EngineError> {
        self.delete(id)
    }
}
