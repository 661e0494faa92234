use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use todadot_core::{ExternalEvent, TimeRange};
use todadot_storage::{CalendarProvider, StorageError};

#[derive(Default)]
struct CalendarState {
    events: BTreeMap<String, ExternalEvent>,
    next_id: u64,
    fail_next: u32,
    listings: usize,
}

/// Calendar kept in memory. Assigns ids `gcal-1`, `gcal-2`, ...
#[derive(Default)]
pub struct FakeCalendar {
    state: Mutex<CalendarState>,
}

impl FakeCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CalendarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_next(&self, count: u32) {
        self.state().fail_next = count;
    }

    /// Add an event as if created in the calendar's own UI.
    pub fn insert(&self, mut event: ExternalEvent) -> String {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("gcal-{}", state.next_id);
        event.external_id = Some(id.clone());
        state.events.insert(id.clone(), event);
        id
    }

    /// Edit an event as if in the calendar's own UI, stamping `updated_at`.
    pub fn edit(&self, id: &str, updated_at: i64, change: impl FnOnce(&mut ExternalEvent)) -> bool {
        match self.state().events.get_mut(id) {
            Some(event) => {
                change(event);
                event.updated_at = updated_at;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<ExternalEvent> {
        self.state().events.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn listings(&self) -> usize {
        self.state().listings
    }

    fn check_available(state: &mut CalendarState) -> Result<(), StorageError> {
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(StorageError::Calendar("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    async fn list_events(&self, range: &TimeRange) -> Result<Vec<ExternalEvent>, StorageError> {
        let mut state = self.state();
        Self::check_available(&mut state)?;
        state.listings += 1;
        Ok(state
            .events
            .values()
            .filter(|event| range.overlaps(event.start, event.end.unwrap_or(event.start)))
            .cloned()
            .collect())
    }

    async fn create_event(&self, event: &ExternalEvent) -> Result<String, StorageError> {
        {
            let mut state = self.state();
            Self::check_available(&mut state)?;
        }
        Ok(self.insert(event.clone()))
    }

    async fn update_event(&self, event: &ExternalEvent) -> Result<String, StorageError> {
        let mut state = self.state();
        Self::check_available(&mut state)?;
        let id = event
            .external_id
            .clone()
            .ok_or_else(|| StorageError::Calendar("update of an unlinked event".into()))?;
        let slot = state
            .events
            .get_mut(&id)
            .ok_or_else(|| StorageError::Calendar(format!("no calendar event {id}")))?;
        *slot = event.clone();
        Ok(id)
    }

    async fn delete_event(&self, external_id: &str) -> Result<(), StorageError> {
        let mut state = self.state();
        Self::check_available(&mut state)?;
        state
            .events
            .remove(external_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::Calendar(format!("no calendar event {external_id}")))
    }
}
