use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str, scheduling_err};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{SqliteStaffDirectory, StaffDirectory};
use log::info;
use serde_json::json;

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match SqliteStaffDirectory::new(conn).assignments_for(&teacher_id) {
        Ok(rows) => {
            let assignments: Vec<_> = rows
                .iter()
                .map(|a| json!({ "subjectId": a.subject_id, "classId": a.class_id }))
                .collect();
            ok(
                &req.id,
                json!({ "teacherId": teacher_id, "assignments": assignments }),
            )
        }
        Err(e) => scheduling_err(req, &e),
    }
}

/// Syncs one teacher's rows from the staff register. Blank or duplicate rows
/// are dropped.
fn handle_assignments_replace(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw_rows) = req.params.get("assignments").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "assignments must be an array", None);
    };

    let mut rows: Vec<(String, String)> = Vec::with_capacity(raw_rows.len());
    for (i, row) in raw_rows.iter().enumerate() {
        let subject_id = row
            .get("subjectId")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_default();
        let class_id = row
            .get("classId")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_default();
        if subject_id.trim().is_empty() || class_id.trim().is_empty() {
            return err(
                &req.id,
                "bad_params",
                format!("assignments[{}] needs subjectId and classId", i),
                None,
            );
        }
        let pair = (subject_id, class_id);
        if !rows.contains(&pair) {
            rows.push(pair);
        }
    }

    match SqliteStaffDirectory::new(conn).replace_for_teacher(&teacher_id, &rows) {
        Ok(count) => {
            info!("assignments for {} replaced ({} row(s))", teacher_id, count);
            ok(&req.id, json!({ "teacherId": teacher_id, "count": count }))
        }
        Err(e) => scheduling_err(req, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "staff.assignments.list" => Some(handle_assignments_list(state, req)),
        "staff.assignments.replace" => Some(handle_assignments_replace(state, req)),
        _ => None,
    }
}
