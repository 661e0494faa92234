use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CoreError;
use crate::ids::EntityId;

/// The four record kinds that are synced independently, each with its own
/// local-store key and remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Todo,
    Event,
    EventCategory,
    QuadrantColorSet,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Todo,
        EntityKind::Event,
        EntityKind::EventCategory,
        EntityKind::QuadrantColorSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Event => "event",
            Self::EventCategory => "event_category",
            Self::QuadrantColorSet => "quadrant_colors",
        }
    }

    /// Key of the JSON blob holding the whole collection in the local store.
    pub fn local_key(&self) -> &'static str {
        match self {
            Self::Todo => "todos",
            Self::Event => "events",
            Self::EventCategory => "eventCategories",
            Self::QuadrantColorSet => "quadrantColors",
        }
    }

    /// Per-user remote collection name.
    pub fn collection(&self) -> &'static str {
        self.local_key()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that takes part in local/remote reconciliation.
///
/// `id` and `created_at` are assigned once and never change; every merge keys
/// on `id`. `validate` is run at the store boundary, so records that
/// deserialize but carry malformed values never reach in-memory state.
pub trait Entity:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntityKind;

    fn id(&self) -> &EntityId;

    fn created_at(&self) -> i64;

    fn validate(&self) -> Result<(), CoreError> {
        if self.id().is_empty() {
            return Err(CoreError::InvalidData(format!("{} with empty id", Self::KIND)));
        }
        Ok(())
    }
}

/// Checks an optional `HH:MM` time-of-day string.
pub fn validate_time(field: &str, value: Option<&str>) -> Result<(), CoreError> {
    match value {
        None => Ok(()),
        Some(raw) => chrono::NaiveTime::parse_from_str(raw, "%H:%M")
            .map(|_| ())
            .map_err(|_| CoreError::InvalidData(format!("{field}: expected HH:MM, got {raw:?}"))),
    }
}
