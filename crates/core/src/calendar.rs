use chrono::{Days, NaiveDate};

use crate::CoreError;
use crate::event::Event;
use crate::ids::EntityId;
use crate::metadata::{
    EventMetadata, add_metadata_to_description, extract_metadata, remove_metadata_from_description,
};

/// Inclusive day range used when listing the external calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CoreError> {
        if end < start {
            return Err(CoreError::InvalidData(format!("time range ends ({end}) before it starts ({start})")));
        }
        Ok(Self { start, end })
    }

    /// Negative spans count as zero. Fails when either end falls outside the
    /// representable date range.
    pub fn around(today: NaiveDate, past_days: i64, future_days: i64) -> Result<Self, CoreError> {
        let out_of_range = || {
            CoreError::InvalidData(format!(
                "calendar window of -{past_days}/+{future_days} days around {today} is out of range"
            ))
        };
        let start = today
            .checked_sub_days(Days::new(past_days.max(0).unsigned_abs()))
            .ok_or_else(out_of_range)?;
        let end = today
            .checked_add_days(Days::new(future_days.max(0).unsigned_abs()))
            .ok_or_else(out_of_range)?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn overlaps(&self, first: NaiveDate, last: NaiveDate) -> bool {
        first <= self.end && last >= self.start
    }
}

/// An event as the external calendar sees it. `external_id` is `None` until
/// the calendar has assigned one.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEvent {
    pub external_id: Option<String>,
    pub summary: String,
    pub description: String,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub time: Option<String>,
    /// Last-modified time on the calendar side, epoch milliseconds.
    pub updated_at: i64,
}

impl Event {
    /// Calendar representation with colour/category folded into the
    /// description block.
    pub fn to_external(&self) -> Result<ExternalEvent, CoreError> {
        let metadata = EventMetadata {
            color: self.color.clone(),
            category_id: self.category_id.clone(),
        };
        let description =
            add_metadata_to_description(self.description.as_deref().unwrap_or(""), &metadata)?;
        Ok(ExternalEvent {
            external_id: self.google_event_id.clone(),
            summary: self.title.clone(),
            description,
            start: self.date,
            end: self.end_date,
            time: self.time.clone(),
            updated_at: self.created_at,
        })
    }

    /// Local view of a listed calendar event. The external id doubles as the
    /// entity id, and the calendar's modification time stands in for
    /// `createdAt` so last-write-wins compares like with like.
    pub fn from_external(external: &ExternalEvent) -> Result<Event, CoreError> {
        let link = external
            .external_id
            .clone()
            .ok_or_else(|| CoreError::InvalidData(format!("calendar event {:?} has no id", external.summary)))?;
        let metadata = extract_metadata(&external.description).unwrap_or_default();
        let visible = remove_metadata_from_description(&external.description);

        Ok(Event {
            id: EntityId::new(link.clone()),
            title: external.summary.clone(),
            date: external.start,
            end_date: external.end.filter(|end| *end != external.start),
            color: metadata.color,
            category_id: metadata.category_id,
            time: external.time.clone(),
            description: (!visible.is_empty()).then_some(visible),
            google_event_id: Some(link),
            created_at: external.updated_at,
        })
    }
}
