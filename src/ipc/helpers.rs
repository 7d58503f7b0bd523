use rusqlite::Connection;
use serde_json::{json, Value as JsonValue};

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::timetable::{SchedulingError, Weekday};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, JsonValue> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Ids are matched exactly, so the value is returned as sent. Blank values
/// count as missing.
pub fn required_str(req: &Request, key: &str) -> Result<String, JsonValue> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_weekday(req: &Request) -> Result<Weekday, JsonValue> {
    let raw = required_str(req, "weekday")?;
    Weekday::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "weekday must be one of: monday, tuesday, wednesday, thursday, friday",
            Some(json!({ "weekday": raw })),
        )
    })
}

pub fn parse_opt_i64(v: Option<&JsonValue>) -> Result<Option<i64>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or("must be integer or null"),
    }
}

pub fn parse_opt_string(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be string or null")?;
            if s.trim().is_empty() {
                Ok(None)
            } else {
                Ok(Some(s.to_string()))
            }
        }
    }
}

/// Maps a scheduler error to an IPC error reply, with the fields a UI needs to
/// explain the rejection.
pub fn scheduling_err(req: &Request, e: &SchedulingError) -> JsonValue {
    let details = match e {
        SchedulingError::NotEntitled {
            teacher_id,
            class_id,
            subject_id,
        } => Some(json!({
            "teacherId": teacher_id,
            "classId": class_id,
            "subjectId": subject_id,
        })),
        SchedulingError::SlotConflict {
            candidate,
            existing,
        } => Some(json!({ "candidate": candidate, "existing": existing })),
        SchedulingError::InvalidRange { start, end } => Some(json!({
            "startTime": start.to_string(),
            "endTime": end.to_string(),
        })),
        SchedulingError::StaleVersion {
            expected, found, ..
        } => Some(json!({ "expectedVersion": expected, "version": found })),
        SchedulingError::Persistence(_)
        | SchedulingError::Write(_)
        | SchedulingError::Corrupt(_) => None,
    };
    err(&req.id, e.code(), e.to_string(), details)
}
