//! Dense ranking of sibling records.
//!
//! `order`/`focusOrder` values are only meaningful inside a sibling group and
//! are rewritten to `0..n-1` after every reorder or organize. A record with no
//! rank sorts by its position among its siblings in the collection.

use crate::CoreError;
use crate::ids::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankSlot {
    /// Position within a date + classification group.
    Order,
    /// Position within the today-focus list.
    Focus,
}

pub trait Ranked {
    fn key(&self) -> &EntityId;
    fn rank(&self, slot: RankSlot) -> Option<i64>;
    fn set_rank(&mut self, slot: RankSlot, rank: i64);
    fn is_done(&self) -> bool;
}

/// Indices into `items` of the group members, in ranked order.
pub fn ranked_members<T: Ranked>(
    items: &[T],
    slot: RankSlot,
    member: impl Fn(&T) -> bool,
) -> Vec<usize> {
    let mut members: Vec<(i64, usize)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| member(item))
        .enumerate()
        .map(|(position, (index, item))| (item.rank(slot).unwrap_or(position as i64), index))
        .collect();
    // Stable: equal ranks keep collection order.
    members.sort_by_key(|(rank, _)| *rank);
    members.into_iter().map(|(_, index)| index).collect()
}

fn renumber<T: Ranked>(items: &mut [T], slot: RankSlot, sequence: &[usize]) {
    for (rank, &index) in sequence.iter().enumerate() {
        items[index].set_rank(slot, rank as i64);
    }
}

/// Rank for a record appended at the end of a group.
pub fn next_rank<T: Ranked>(items: &[T], slot: RankSlot, member: impl Fn(&T) -> bool) -> i64 {
    let mut count = 0i64;
    let mut max = -1i64;
    for (position, item) in items.iter().filter(|item| member(item)).enumerate() {
        count += 1;
        max = max.max(item.rank(slot).unwrap_or(position as i64));
    }
    (max + 1).max(count)
}

/// Move `dragged` to the slot currently held by `target` and renumber the
/// group densely. Records outside the group are untouched.
pub fn reorder<T: Ranked>(
    items: &mut [T],
    slot: RankSlot,
    member: impl Fn(&T) -> bool,
    dragged: &EntityId,
    target: &EntityId,
) -> Result<(), CoreError> {
    let mut sequence = ranked_members(items, slot, member);
    let position_of = |id: &EntityId, sequence: &[usize]| {
        sequence
            .iter()
            .position(|&index| items[index].key() == id)
            .ok_or_else(|| CoreError::NotInGroup(id.to_string()))
    };
    let from = position_of(dragged, &sequence)?;
    let to = position_of(target, &sequence)?;

    let moved = sequence.remove(from);
    sequence.insert(to, moved);
    renumber(items, slot, &sequence);
    Ok(())
}

/// Place `dragged` at `to_index` within the group (clamped to its length).
pub fn move_to_index<T: Ranked>(
    items: &mut [T],
    slot: RankSlot,
    member: impl Fn(&T) -> bool,
    dragged: &EntityId,
    to_index: usize,
) -> Result<(), CoreError> {
    let mut sequence = ranked_members(items, slot, member);
    let from = sequence
        .iter()
        .position(|&index| items[index].key() == dragged)
        .ok_or_else(|| CoreError::NotInGroup(dragged.to_string()))?;
    let moved = sequence.remove(from);
    sequence.insert(to_index.min(sequence.len()), moved);
    renumber(items, slot, &sequence);
    Ok(())
}

/// Incomplete records first, completed after, each partition keeping its
/// relative order; then renumber densely.
pub fn organize<T: Ranked>(items: &mut [T], slot: RankSlot, member: impl Fn(&T) -> bool) {
    let sequence = ranked_members(items, slot, member);
    let (mut open, done): (Vec<usize>, Vec<usize>) =
        sequence.into_iter().partition(|&index| !items[index].is_done());
    open.extend(done);
    renumber(items, slot, &open);
}

/// Renumber a group densely without changing its order.
pub fn densify<T: Ranked>(items: &mut [T], slot: RankSlot, member: impl Fn(&T) -> bool) {
    let sequence = ranked_members(items, slot, member);
    renumber(items, slot, &sequence);
}
