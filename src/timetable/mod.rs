//! Weekly class timetable: per-(class, weekday) slot lists with overlap and
//! entitlement checks on write, plus weekly read views kept live from a
//! change feed.

pub mod aggregator;
pub mod conflict;
pub mod editor;
pub mod entitlement;
pub mod error;
pub mod feed;
pub mod model;
pub mod store;

pub use aggregator::{class_grid, subject_grid, GridUpdate, LiveGrid, WeeklyGrid};
pub use conflict::{conflicts_with_any, overlaps};
pub use editor::{Removal, SlotEditor, WritePolicy};
pub use entitlement::{is_entitled, SqliteStaffDirectory, StaffDirectory};
pub use error::SchedulingError;
pub use feed::{ChangeFeed, DayChange, Subscription};
pub use model::{ClockTime, DayKey, Slot, TeacherAssignment, TimetableDay, Weekday};
pub use store::TimetableStore;
