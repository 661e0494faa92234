use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use todadot_core::merge::merge_local_and_google_events;
use todadot_core::{Entity, EntityId, EntityKind, Event, TimeRange};
use todadot_storage::CalendarProvider;

use crate::error::EngineError;
use crate::queue::{RemoteFuture, RemoteJob, RemoteTarget};
use crate::router::MutationRouter;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventDraft {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub time: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub category_id: Option<String>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            date: Some(date),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarSyncReport {
    pub listed: usize,
    pub skipped: usize,
    pub added: usize,
    pub updated: usize,
}

impl MutationRouter<Event> {
    pub fn events_on(&self, day: NaiveDate) -> Vec<&Event> {
        self.items().iter().filter(|event| event.occurs_on(day)).collect()
    }

    pub fn find_linked(&self, external_id: &str) -> Option<&Event> {
        self.items()
            .iter()
            .find(|event| event.google_event_id.as_deref() == Some(external_id))
    }

    pub fn add_event(&mut self, draft: EventDraft) -> Result<Event, EngineError> {
        let date = draft
            .date
            .ok_or_else(|| EngineError::InvalidOperation("event needs a start date".into()))?;
        let (id, created_at) = self.next_identity()?;
        let mut event = Event::new(id, created_at, draft.title, date);
        event.end_date = draft.end_date.filter(|end| *end != date);
        event.time = draft.time;
        event.description = draft.description;
        event.color = draft.color;
        event.category_id = draft.category_id;
        self.add(event.clone())?;
        Ok(event)
    }

    pub fn update_event(&mut self, id: &EntityId, patch: impl FnOnce(&mut Event)) -> Result<Event, EngineError> {
        self.update(id, patch)
    }

    /// Delete locally, and from the external calendar too when `calendar` is
    /// given and the event is linked. The calendar delete is dispatched like
    /// any other remote write.
    pub fn delete_event(
        &mut self,
        id: &EntityId,
        calendar: Option<Arc<dyn CalendarProvider>>,
    ) -> Result<Event, EngineError> {
        let removed = self.delete(id)?;
        if let (Some(calendar), Some(link)) = (calendar, removed.google_event_id.clone()) {
            let job: RemoteJob = Arc::new(move || -> RemoteFuture {
                let calendar = Arc::clone(&calendar);
                let link = link.clone();
                Box::pin(async move { calendar.delete_event(&link).await })
            });
            self.queue().dispatch(RemoteTarget::calendar(removed.id.clone()), job);
        }
        Ok(removed)
    }

    /// Push one event to the external calendar and record the id it was
    /// given. Awaited, since the id is written back onto the event.
    pub async fn publish_to_calendar(
        &mut self,
        id: &EntityId,
        calendar: &dyn CalendarProvider,
    ) -> Result<Event, EngineError> {
        let event = self
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::EntityNotFound(format!("{} {id}", EntityKind::Event)))?;
        let external = event.to_external()?;
        let link = if event.is_linked() {
            calendar.update_event(&external).await?
        } else {
            calendar.create_event(&external).await?
        };
        if event.google_event_id.as_deref() == Some(link.as_str()) {
            return Ok(event);
        }
        self.update(id, |event| event.google_event_id = Some(link))
    }

    /// List the calendar over `range` and fold the result in with
    /// calendar precedence (newer `createdAt` wins per linked event).
    pub async fn sync_external_calendar(
        &mut self,
        calendar: &dyn CalendarProvider,
        range: &TimeRange,
    ) -> Result<CalendarSyncReport, EngineError> {
        let listed = calendar.list_events(range).await?;
        let mut skipped = 0usize;
        let external: Vec<Event> = listed
            .iter()
            .filter_map(|entry| match Event::from_external(entry).and_then(|event| {
                event.validate()?;
                Ok(event)
            }) {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!(summary = %entry.summary, error = %err, "skipping unusable calendar event");
                    skipped += 1;
                    None
                }
            })
            .collect();

        let merged = merge_local_and_google_events(self.items(), &external);
        let added = merged.len().saturating_sub(self.len());
        let updated = merged
            .iter()
            .filter(|event| self.get(&event.id).is_some_and(|current| current != *event))
            .count();
        self.mutate(|items| {
            *items = merged;
            Ok(())
        })?;

        let report = CalendarSyncReport {
            listed: listed.len(),
            skipped,
            added,
            updated,
        };
        info!(
            listed = report.listed,
            skipped = report.skipped,
            added = report.added,
            updated = report.updated,
            "calendar sync finished"
        );
        Ok(report)
    }
}
