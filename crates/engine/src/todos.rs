use chrono::NaiveDate;

use todadot_core::clock::physical_now;
use todadot_core::ordering::{self, RankSlot};
use todadot_core::{EntityId, Quadrant, Todo, TodoGroup};

use crate::error::EngineError;
use crate::router::{MutationRouter, find_mut, position};

/// Fields a caller supplies for a new todo; the rest are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoDraft {
    pub text: String,
    pub date: NaiveDate,
    pub group: TodoGroup,
    pub time: Option<String>,
    pub is_today_focus: bool,
}

impl TodoDraft {
    pub fn new(text: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            text: text.into(),
            date,
            group: TodoGroup::Uncategorized,
            time: None,
            is_today_focus: false,
        }
    }

    pub fn in_quadrant(mut self, quadrant: Quadrant) -> Self {
        self.group = TodoGroup::Quadrant(quadrant);
        self
    }

    pub fn in_category(mut self, category_id: impl Into<String>) -> Self {
        self.group = TodoGroup::Category(category_id.into());
        self
    }
}

fn sibling(group: &TodoGroup, date: NaiveDate) -> impl Fn(&Todo) -> bool + '_ {
    move |todo| todo.is_sibling_of(group, date)
}

fn in_focus(todo: &Todo) -> bool {
    todo.is_today_focus
}

/// Move `items[index]` to the end of another group and close the gap it
/// left behind.
fn relocate(items: &mut [Todo], index: usize, group: TodoGroup, date: NaiveDate) {
    let old_group = items[index].group();
    let old_date = items[index].date;
    if old_group == group && old_date == date {
        return;
    }
    let rank = ordering::next_rank(items, RankSlot::Order, sibling(&group, date));
    let todo = &mut items[index];
    todo.set_group(group);
    todo.date = date;
    todo.order = Some(rank);
    ordering::densify(items, RankSlot::Order, sibling(&old_group, old_date));
}

impl MutationRouter<Todo> {
    pub fn todos_on(&self, date: NaiveDate) -> Vec<&Todo> {
        self.items().iter().filter(|todo| todo.date == date).collect()
    }

    /// Members of one group in display order.
    pub fn group_members(&self, group: &TodoGroup, date: NaiveDate) -> Vec<&Todo> {
        let items = self.items();
        ordering::ranked_members(items, RankSlot::Order, sibling(group, date))
            .into_iter()
            .map(|index| &items[index])
            .collect()
    }

    pub fn focus_list(&self) -> Vec<&Todo> {
        let items = self.items();
        ordering::ranked_members(items, RankSlot::Focus, in_focus)
            .into_iter()
            .map(|index| &items[index])
            .collect()
    }

    pub fn add_todo(&mut self, draft: TodoDraft) -> Result<Todo, EngineError> {
        let (id, created_at) = self.next_identity()?;
        let mut todo = Todo::new(id, created_at, draft.text, draft.date);
        todo.time = draft.time;
        todo.order = Some(ordering::next_rank(
            self.items(),
            RankSlot::Order,
            sibling(&draft.group, draft.date),
        ));
        todo.set_group(draft.group);
        if draft.is_today_focus {
            todo.is_today_focus = true;
            todo.focus_order = Some(ordering::next_rank(self.items(), RankSlot::Focus, in_focus));
        }
        self.add(todo.clone())?;
        Ok(todo)
    }

    /// Flip completion. Completing stamps `completedAt`; reopening clears it.
    pub fn toggle_completed(&mut self, id: &EntityId) -> Result<Todo, EngineError> {
        let now = physical_now()?;
        self.update(id, |todo| {
            todo.completed = !todo.completed;
            todo.completed_at = todo.completed.then_some(now);
        })
    }

    /// Add to or drop from the today-focus list, keeping focus ranks dense.
    pub fn toggle_today_focus(&mut self, id: &EntityId) -> Result<Todo, EngineError> {
        self.mutate(|items| {
            let rank = ordering::next_rank(items, RankSlot::Focus, in_focus);
            let todo = find_mut(items, id)?;
            if todo.is_today_focus {
                todo.is_today_focus = false;
                todo.focus_order = None;
            } else {
                todo.is_today_focus = true;
                todo.focus_order = Some(rank);
            }
            ordering::densify(items, RankSlot::Focus, in_focus);
            let index = position(items, id)?;
            Ok(items[index].clone())
        })
    }

    /// Short memo carried on the record itself. Empty text clears it.
    pub fn set_memo(&mut self, id: &EntityId, memo: Option<String>) -> Result<Todo, EngineError> {
        let memo = memo.filter(|text| !text.trim().is_empty());
        self.update(id, |todo| todo.memo = memo)
    }

    pub fn move_to_group(&mut self, id: &EntityId, group: TodoGroup) -> Result<Todo, EngineError> {
        self.mutate(|items| {
            let index = position(items, id)?;
            let date = items[index].date;
            relocate(items, index, group, date);
            Ok(items[index].clone())
        })
    }

    pub fn move_to_date(&mut self, id: &EntityId, date: NaiveDate) -> Result<Todo, EngineError> {
        self.mutate(|items| {
            let index = position(items, id)?;
            let group = items[index].group();
            relocate(items, index, group, date);
            Ok(items[index].clone())
        })
    }

    /// Drop `dragged` onto `target`'s slot within their shared group.
    pub fn reorder_within_group(
        &mut self,
        dragged: &EntityId,
        target: &EntityId,
    ) -> Result<(), EngineError> {
        self.mutate(|items| {
            let index = position(items, dragged)?;
            let (group, date) = (items[index].group(), items[index].date);
            ordering::reorder(items, RankSlot::Order, sibling(&group, date), dragged, target)?;
            Ok(())
        })
    }

    pub fn reorder_focus(&mut self, dragged: &EntityId, target: &EntityId) -> Result<(), EngineError> {
        self.mutate(|items| {
            ordering::reorder(items, RankSlot::Focus, in_focus, dragged, target)?;
            Ok(())
        })
    }

    /// Completed todos sink below incomplete ones; relative order is kept
    /// within each half.
    pub fn organize_group(&mut self, group: &TodoGroup, date: NaiveDate) -> Result<(), EngineError> {
        self.mutate(|items| {
            ordering::organize(items, RankSlot::Order, sibling(group, date));
            Ok(())
        })
    }

    /// Carry every incomplete todo of one group and day over to `to_date`,
    /// optionally into another group. Moved todos keep their relative order
    /// and land after the target group's existing members.
    pub fn move_incomplete_to(
        &mut self,
        group: &TodoGroup,
        date: NaiveDate,
        to_date: NaiveDate,
        to_group: Option<TodoGroup>,
    ) -> Result<usize, EngineError> {
        let destination = to_group.unwrap_or_else(|| group.clone());
        if &destination == group && date == to_date {
            return Ok(0);
        }
        self.mutate(|items| {
            let moving: Vec<usize> = ordering::ranked_members(items, RankSlot::Order, sibling(group, date))
                .into_iter()
                .filter(|&index| !items[index].completed)
                .collect();
            for &index in &moving {
                relocate(items, index, destination.clone(), to_date);
            }
            Ok(moving.len())
        })
    }

    pub fn delete_completed_on(&mut self, date: NaiveDate) -> Result<usize, EngineError> {
        self.mutate(|items| {
            let before = items.len();
            let touched: Vec<TodoGroup> = items
                .iter()
                .filter(|todo| todo.date == date && todo.completed)
                .map(Todo::group)
                .collect();
            items.retain(|todo| !(todo.date == date && todo.completed));
            for group in &touched {
                ordering::densify(items, RankSlot::Order, sibling(group, date));
            }
            ordering::densify(items, RankSlot::Focus, in_focus);
            Ok(before - items.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::router;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn texts(todos: &[&Todo]) -> Vec<String> {
        todos.iter().map(|t| t.text.clone()).collect()
    }

    #[tokio::test]
    async fn add_assigns_identity_and_appends_to_group() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        let d = day("2024-03-01");
        let first = todos.add_todo(TodoDraft::new("one", d).in_quadrant(Quadrant::UrgentImportant))?;
        let second = todos.add_todo(TodoDraft::new("two", d).in_quadrant(Quadrant::UrgentImportant))?;
        let other = todos.add_todo(TodoDraft::new("elsewhere", d))?;

        assert!(first.id.as_str().starts_with(&first.created_at.to_string()));
        assert!(second.created_at > first.created_at);
        assert_eq!((first.order, second.order, other.order), (Some(0), Some(1), Some(0)));
        assert_eq!(todos.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn toggle_completed_stamps_and_clears() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        let todo = todos.add_todo(TodoDraft::new("x", day("2024-03-01")))?;

        let done = todos.toggle_completed(&todo.id)?;
        assert!(done.completed);
        assert!(done.completed_at.is_some());

        let reopened = todos.toggle_completed(&todo.id)?;
        assert!(!reopened.completed);
        assert_eq!(reopened.completed_at, None);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_id_is_an_error_and_changes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        todos.add_todo(TodoDraft::new("x", day("2024-03-01")))?;
        let before = todos.items().to_vec();

        let err = todos.toggle_completed(&EntityId::new("missing")).unwrap_err();
        assert!(matches!(err, EngineError::EntityNotFound(_)));
        assert_eq!(todos.items(), before.as_slice());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_time_is_rejected_without_mutation() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        let todo = todos.add_todo(TodoDraft::new("x", day("2024-03-01")))?;

        let err = todos.update(&todo.id, |t| t.time = Some("25:99".into())).unwrap_err();
        assert!(matches!(err, EngineError::Core(_)));
        assert_eq!(todos.get(&todo.id).and_then(|t| t.time.clone()), None);
        Ok(())
    }

    #[tokio::test]
    async fn reorder_drag_last_onto_first() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        let d = day("2024-03-01");
        let ids: Vec<EntityId> = ["1", "2", "3"]
            .into_iter()
            .map(|text| todos.add_todo(TodoDraft::new(text, d)).map(|t| t.id))
            .collect::<Result<_, _>>()?;

        todos.reorder_within_group(&ids[2], &ids[0])?;

        let group = todos.group_members(&TodoGroup::Uncategorized, d);
        assert_eq!(texts(&group), ["3", "1", "2"]);
        let orders: Vec<Option<i64>> = group.iter().map(|t| t.order).collect();
        assert_eq!(orders, [Some(0), Some(1), Some(2)]);
        Ok(())
    }

    #[tokio::test]
    async fn reorder_across_groups_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        let d = day("2024-03-01");
        let a = todos.add_todo(TodoDraft::new("a", d))?;
        let b = todos.add_todo(TodoDraft::new("b", d).in_quadrant(Quadrant::UrgentImportant))?;

        assert!(todos.reorder_within_group(&a.id, &b.id).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn organize_sinks_completed() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        let d = day("2024-03-01");
        let a = todos.add_todo(TodoDraft::new("a", d))?;
        todos.add_todo(TodoDraft::new("b", d))?;
        let c = todos.add_todo(TodoDraft::new("c", d))?;
        todos.add_todo(TodoDraft::new("d", d))?;
        todos.toggle_completed(&a.id)?;
        todos.toggle_completed(&c.id)?;

        todos.organize_group(&TodoGroup::Uncategorized, d)?;

        let group = todos.group_members(&TodoGroup::Uncategorized, d);
        assert_eq!(texts(&group), ["b", "d", "a", "c"]);
        Ok(())
    }

    #[tokio::test]
    async fn move_to_group_closes_gap_and_appends() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        let d = day("2024-03-01");
        todos.add_todo(TodoDraft::new("a", d))?;
        let b = todos.add_todo(TodoDraft::new("b", d))?;
        todos.add_todo(TodoDraft::new("c", d))?;
        todos.add_todo(TodoDraft::new("z", d).in_category("work"))?;

        let moved = todos.move_to_group(&b.id, TodoGroup::Category("work".into()))?;
        assert_eq!(moved.order, Some(1));
        assert_eq!(moved.category_id.as_deref(), Some("work"));

        let rest = todos.group_members(&TodoGroup::Uncategorized, d);
        assert_eq!(texts(&rest), ["a", "c"]);
        assert_eq!(rest.iter().map(|t| t.order).collect::<Vec<_>>(), [Some(0), Some(1)]);
        Ok(())
    }

    #[tokio::test]
    async fn move_incomplete_carries_over_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        let (today, tomorrow) = (day("2024-03-01"), day("2024-03-02"));
        let urgent = TodoGroup::Quadrant(Quadrant::UrgentImportant);
        todos.add_todo(TodoDraft::new("existing", tomorrow).in_quadrant(Quadrant::UrgentImportant))?;
        todos.add_todo(TodoDraft::new("a", today).in_quadrant(Quadrant::UrgentImportant))?;
        let done = todos.add_todo(TodoDraft::new("done", today).in_quadrant(Quadrant::UrgentImportant))?;
        todos.add_todo(TodoDraft::new("b", today).in_quadrant(Quadrant::UrgentImportant))?;
        todos.toggle_completed(&done.id)?;

        let moved = todos.move_incomplete_to(&urgent, today, tomorrow, None)?;
        assert_eq!(moved, 2);
        assert_eq!(texts(&todos.group_members(&urgent, tomorrow)), ["existing", "a", "b"]);
        assert_eq!(texts(&todos.group_members(&urgent, today)), ["done"]);
        Ok(())
    }

    #[tokio::test]
    async fn focus_toggle_and_reorder() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        let d = day("2024-03-01");
        let a = todos.add_todo(TodoDraft::new("a", d))?;
        let b = todos.add_todo(TodoDraft::new("b", d))?;
        let c = todos.add_todo(TodoDraft::new("c", d))?;
        for id in [&a.id, &b.id, &c.id] {
            todos.toggle_today_focus(id)?;
        }
        todos.reorder_focus(&c.id, &a.id)?;
        assert_eq!(texts(&todos.focus_list()), ["c", "a", "b"]);

        todos.toggle_today_focus(&a.id)?;
        let focus = todos.focus_list();
        assert_eq!(texts(&focus), ["c", "b"]);
        assert_eq!(focus.iter().map(|t| t.focus_order).collect::<Vec<_>>(), [Some(0), Some(1)]);
        assert_eq!(todos.get(&a.id).and_then(|t| t.focus_order), None);
        Ok(())
    }

    #[tokio::test]
    async fn delete_completed_on_only_touches_that_day() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        let (d1, d2) = (day("2024-03-01"), day("2024-03-02"));
        let a = todos.add_todo(TodoDraft::new("a", d1))?;
        todos.add_todo(TodoDraft::new("b", d1))?;
        let c = todos.add_todo(TodoDraft::new("c", d2))?;
        todos.toggle_completed(&a.id)?;
        todos.toggle_completed(&c.id)?;

        assert_eq!(todos.delete_completed_on(d1)?, 1);
        assert_eq!(todos.len(), 2);
        assert!(todos.get(&c.id).is_some());
        assert_eq!(todos.group_members(&TodoGroup::Uncategorized, d1)[0].order, Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn blank_memo_clears() -> Result<(), Box<dyn std::error::Error>> {
        let mut todos = router::<Todo>()?;
        let todo = todos.add_todo(TodoDraft::new("x", day("2024-03-01")))?;
        todos.set_memo(&todo.id, Some("call first".into()))?;
        assert_eq!(todos.get(&todo.id).and_then(|t| t.memo.clone()).as_deref(), Some("call first"));
        todos.set_memo(&todo.id, Some("   ".into()))?;
        assert_eq!(todos.get(&todo.id).and_then(|t| t.memo.clone()), None);
        Ok(())
    }

    #[tokio::test]
    async fn mutations_persist_locally() -> Result<(), Box<dyn std::error::Error>> {
        let (mut todos, store) = crate::test_support::router_with_store::<Todo>()?;
        let todo = todos.add_todo(TodoDraft::new("persist me", day("2024-03-01")))?;
        let reopened = crate::test_support::reopen::<Todo>(&store)?;
        assert_eq!(reopened.get(&todo.id), Some(&todo));
        Ok(())
    }
}
