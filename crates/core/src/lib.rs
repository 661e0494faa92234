pub mod calendar;
pub mod clock;
pub mod colors;
pub mod entity;
pub mod error;
pub mod event;
pub mod ids;
pub mod merge;
pub mod metadata;
pub mod ordering;
pub mod todo;

pub use calendar::{ExternalEvent, TimeRange};
pub use clock::CreationClock;
pub use colors::QuadrantColorSet;
pub use entity::{Entity, EntityKind};
pub use error::CoreError;
pub use event::{Event, EventCategory};
pub use ids::EntityId;
pub use todo::{Quadrant, Todo, TodoGroup};
