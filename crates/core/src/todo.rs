use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::entity::{Entity, EntityKind, validate_time};
use crate::ids::EntityId;
use crate::ordering::{RankSlot, Ranked};

/// Eisenhower-matrix quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quadrant {
    UrgentImportant,
    NotUrgentImportant,
    UrgentNotImportant,
    NotUrgentNotImportant,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::UrgentImportant,
        Quadrant::NotUrgentImportant,
        Quadrant::UrgentNotImportant,
        Quadrant::NotUrgentNotImportant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrgentImportant => "urgent-important",
            Self::NotUrgentImportant => "not-urgent-important",
            Self::UrgentNotImportant => "urgent-not-important",
            Self::NotUrgentNotImportant => "not-urgent-not-important",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| CoreError::InvalidData(format!("unknown quadrant: {s}")))
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification a todo is ranked within. A category id is a soft reference:
/// it is never cascaded, and resolves to `Uncategorized` once the category no
/// longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TodoGroup {
    Quadrant(Quadrant),
    Category(String),
    Uncategorized,
}

impl TodoGroup {
    /// Resolve a category reference against the set of known category ids.
    pub fn resolve(self, is_known: impl Fn(&str) -> bool) -> TodoGroup {
        match self {
            TodoGroup::Category(id) if !is_known(&id) => TodoGroup::Uncategorized,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: EntityId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quadrant: Option<Quadrant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default)]
    pub is_today_focus: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    pub created_at: i64,
}

impl Todo {
    pub fn new(id: EntityId, created_at: i64, text: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
            date,
            quadrant: None,
            category_id: None,
            order: None,
            memo: None,
            time: None,
            is_today_focus: false,
            focus_order: None,
            completed_at: None,
            created_at,
        }
    }

    /// Category wins over quadrant when both are set.
    pub fn group(&self) -> TodoGroup {
        match (&self.category_id, self.quadrant) {
            (Some(category), _) => TodoGroup::Category(category.clone()),
            (None, Some(quadrant)) => TodoGroup::Quadrant(quadrant),
            (None, None) => TodoGroup::Uncategorized,
        }
    }

    pub fn set_group(&mut self, group: TodoGroup) {
        match group {
            TodoGroup::Quadrant(q) => {
                self.quadrant = Some(q);
                self.category_id = None;
            }
            TodoGroup::Category(id) => {
                self.category_id = Some(id);
            }
            TodoGroup::Uncategorized => {
                self.quadrant = None;
                self.category_id = None;
            }
        }
    }

    /// Sibling test used for ranking: same classification on the same day.
    pub fn is_sibling_of(&self, group: &TodoGroup, date: NaiveDate) -> bool {
        self.date == date && &self.group() == group
    }
}

impl Entity for Todo {
    const KIND: EntityKind = EntityKind::Todo;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::InvalidData("todo with empty id".into()));
        }
        validate_time("time", self.time.as_deref())?;
        if self.completed_at.is_some() && !self.completed {
            return Err(CoreError::InvalidData(format!(
                "todo {} has completedAt but is not completed",
                self.id
            )));
        }
        Ok(())
    }
}

impl Ranked for Todo {
    fn key(&self) -> &EntityId {
        &self.id
    }

    fn rank(&self, slot: RankSlot) -> Option<i64> {
        match slot {
            RankSlot::Order => self.order,
            RankSlot::Focus => self.focus_order,
        }
    }

    fn set_rank(&mut self, slot: RankSlot, rank: i64) {
        match slot {
            RankSlot::Order => self.order = Some(rank),
            RankSlot::Focus => self.focus_order = Some(rank),
        }
    }

    fn is_done(&self) -> bool {
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn json_shape_uses_camel_case_and_kebab_quadrants() {
        let mut todo = Todo::new(EntityId::from("t1"), 100, "buy milk", day("2024-03-01"));
        todo.quadrant = Some(Quadrant::NotUrgentImportant);
        todo.is_today_focus = true;
        todo.focus_order = Some(2);

        let value = serde_json::to_value(&todo).unwrap();
        assert_eq!(value["id"], "t1");
        assert_eq!(value["date"], "2024-03-01");
        assert_eq!(value["quadrant"], "not-urgent-important");
        assert_eq!(value["isTodayFocus"], true);
        assert_eq!(value["focusOrder"], 2);
        assert_eq!(value["createdAt"], 100);
        assert!(value.get("categoryId").is_none());
        assert!(value.get("memo").is_none());
    }

    #[test]
    fn missing_optional_fields_deserialize_as_none() {
        let raw = r#"{"id":"x","text":"t","date":"2024-01-02","createdAt":5}"#;
        let todo: Todo = serde_json::from_str(raw).unwrap();
        assert!(!todo.completed);
        assert_eq!(todo.order, None);
        assert_eq!(todo.group(), TodoGroup::Uncategorized);
        assert!(todo.validate().is_ok());
    }

    #[test]
    fn category_takes_precedence_over_quadrant() {
        let mut todo = Todo::new(EntityId::from("t"), 1, "x", day("2024-01-01"));
        todo.quadrant = Some(Quadrant::UrgentImportant);
        todo.category_id = Some("work".into());
        assert_eq!(todo.group(), TodoGroup::Category("work".into()));

        todo.set_group(TodoGroup::Quadrant(Quadrant::UrgentNotImportant));
        assert_eq!(todo.group(), TodoGroup::Quadrant(Quadrant::UrgentNotImportant));
        assert_eq!(todo.category_id, None);
    }

    #[test]
    fn unknown_category_resolves_to_uncategorized() {
        let group = TodoGroup::Category("gone".into());
        assert_eq!(group.clone().resolve(|id| id == "work"), TodoGroup::Uncategorized);
        assert_eq!(
            TodoGroup::Category("work".into()).resolve(|id| id == "work"),
            TodoGroup::Category("work".into())
        );
        assert_eq!(
            TodoGroup::Quadrant(Quadrant::UrgentImportant).resolve(|_| false),
            TodoGroup::Quadrant(Quadrant::UrgentImportant)
        );
    }

    #[test]
    fn malformed_time_fails_validation() {
        let mut todo = Todo::new(EntityId::from("t"), 1, "x", day("2024-01-01"));
        todo.time = Some("late".into());
        assert!(todo.validate().is_err());
    }

    #[test]
    fn quadrant_parse_roundtrip() {
        for q in Quadrant::ALL {
            assert_eq!(Quadrant::parse(q.as_str()).unwrap(), q);
        }
        assert!(Quadrant::parse("urgent").is_err());
    }
}
