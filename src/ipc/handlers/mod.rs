pub mod core;
pub mod setup;
pub mod staff;
pub mod timetable;
