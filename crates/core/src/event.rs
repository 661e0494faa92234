use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::entity::{Entity, EntityKind, validate_time};
use crate::ids::EntityId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EntityId,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Linkage id in the external calendar, if the event is mirrored there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_event_id: Option<String>,
    pub created_at: i64,
}

impl Event {
    pub fn new(id: EntityId, created_at: i64, title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id,
            title: title.into(),
            date,
            end_date: None,
            color: None,
            category_id: None,
            time: None,
            description: None,
            google_event_id: None,
            created_at,
        }
    }

    pub fn last_day(&self) -> NaiveDate {
        self.end_date.unwrap_or(self.date)
    }

    /// Multi-day events cover every day from `date` through `end_date`.
    pub fn occurs_on(&self, day: NaiveDate) -> bool {
        self.date <= day && day <= self.last_day()
    }

    pub fn is_linked(&self) -> bool {
        self.google_event_id.is_some()
    }

    /// Soft lookup: a dangling `category_id` yields `None` (uncategorized).
    pub fn category<'a>(&self, categories: &'a [EventCategory]) -> Option<&'a EventCategory> {
        let wanted = self.category_id.as_deref()?;
        categories.iter().find(|c| c.id.as_str() == wanted)
    }

    /// Colour shown for the event: its own, else its category's.
    pub fn display_color<'a>(&'a self, categories: &'a [EventCategory]) -> Option<&'a str> {
        self.color
            .as_deref()
            .or_else(|| self.category(categories).map(|c| c.color.as_str()))
    }
}

impl Entity for Event {
    const KIND: EntityKind = EntityKind::Event;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::InvalidData("event with empty id".into()));
        }
        if let Some(end) = self.end_date
            && end < self.date
        {
            return Err(CoreError::InvalidData(format!(
                "event {} ends ({end}) before it starts ({})",
                self.id, self.date
            )));
        }
        validate_time("time", self.time.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCategory {
    pub id: EntityId,
    pub name: String,
    pub color: String,
    pub created_at: i64,
}

impl Entity for EventCategory {
    const KIND: EntityKind = EntityKind::EventCategory;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::InvalidData("category with empty id".into()));
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidData(format!("category {} has no name", self.id)));
        }
        Ok(())
    }
}
