pub mod db;
pub mod ipc;
pub mod timetable;
