//! Precedence rules for combining two copies of a collection.
//!
//! Every output is an explicit sequence sorted by `(createdAt, id)`; nothing
//! here depends on map iteration order.

use std::collections::HashMap;

use crate::entity::Entity;
use crate::event::Event;
use crate::ids::EntityId;

pub fn sort_canonical<T: Entity>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
}

/// Merge the private remote copy into the local one. Remote records seed the
/// result; local records overlay them and win on id collision, regardless of
/// timestamps.
pub fn merge_local_first<T: Entity>(local: &[T], remote: &[T]) -> Vec<T> {
    let mut by_id: HashMap<&EntityId, &T> = HashMap::with_capacity(local.len() + remote.len());
    for entity in remote {
        by_id.insert(entity.id(), entity);
    }
    for entity in local {
        by_id.insert(entity.id(), entity);
    }
    let mut merged: Vec<T> = by_id.into_values().cloned().collect();
    sort_canonical(&mut merged);
    merged
}

/// Merge events listed from the external calendar into the local events.
///
/// - local events without a calendar link are kept verbatim;
/// - linked events present on both sides: the greater `createdAt` wins, ties
///   keep the local copy. An external copy's `createdAt` is its calendar
///   `updated_at`. The local `id` and `createdAt` are kept either way, and a
///   winning external copy inherits the local colour/category when it carries
///   none;
/// - external events with no local counterpart are added;
/// - linked local events missing from the listing are kept, since a listing
///   only covers a bounded time range.
pub fn merge_local_and_google_events(local: &[Event], external: &[Event]) -> Vec<Event> {
    let mut external_by_link: HashMap<&str, &Event> = HashMap::with_capacity(external.len());
    for event in external {
        if let Some(link) = event.google_event_id.as_deref() {
            external_by_link.insert(link, event);
        }
    }

    let mut merged: Vec<Event> = Vec::with_capacity(local.len() + external.len());
    for event in local {
        let matched = event
            .google_event_id
            .as_deref()
            .and_then(|link| external_by_link.remove(link));
        match matched {
            Some(remote) if remote.created_at > event.created_at => {
                let mut winner = remote.clone();
                winner.id = event.id.clone();
                winner.created_at = event.created_at;
                if winner.color.is_none() {
                    winner.color = event.color.clone();
                }
                if winner.category_id.is_none() {
                    winner.category_id = event.category_id.clone();
                }
                merged.push(winner);
            }
            _ => merged.push(event.clone()),
        }
    }

    // Whatever is left in the map had no local counterpart.
    for event in external {
        if let Some(link) = event.google_event_id.as_deref()
            && let Some(unmatched) = external_by_link.remove(link)
        {
            merged.push(unmatched.clone());
        }
    }

    sort_canonical(&mut merged);
    merged
}

/// What changed between two versions of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDiff<T> {
    /// New records and records whose content changed, in `new` order.
    pub upserts: Vec<T>,
    /// Ids present before and gone now, in `old` order.
    pub removed: Vec<EntityId>,
}

impl<T> CollectionDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removed.is_empty()
    }
}

pub fn diff<T: Entity>(old: &[T], new: &[T]) -> CollectionDiff<T> {
    let before: HashMap<&EntityId, &T> = old.iter().map(|e| (e.id(), e)).collect();
    let after: HashMap<&EntityId, &T> = new.iter().map(|e| (e.id(), e)).collect();

    let upserts = new
        .iter()
        .filter(|e| before.get(e.id()).is_none_or(|prev| *prev != *e))
        .cloned()
        .collect();
    let removed = old
        .iter()
        .filter(|e| !after.contains_key(e.id()))
        .map(|e| e.id().clone())
        .collect();

    CollectionDiff { upserts, removed }
}
