use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, parse_opt_i64, parse_opt_string, required_str, required_weekday, scheduling_err,
};
use crate::ipc::types::{AppState, Request};
use crate::timetable::{
    class_grid, subject_grid, ClockTime, DayKey, LiveGrid, SchedulingError, Slot, SlotEditor,
    SqliteStaffDirectory, StaffDirectory, TimetableDay, TimetableStore, WeeklyGrid, WritePolicy,
};
use log::{debug, error, info};
use serde_json::{json, Map, Value as JsonValue};
use uuid::Uuid;

fn day_json(key: &DayKey, day: &TimetableDay) -> JsonValue {
    json!({
        "classId": key.class_id,
        "weekday": key.weekday.as_str(),
        "version": day.version,
        "slots": day.slots,
    })
}

fn grid_json(grid: &WeeklyGrid) -> JsonValue {
    let mut days = Map::new();
    for (weekday, slots) in grid {
        days.insert(weekday.as_str().to_string(), json!(slots));
    }
    JsonValue::Object(days)
}

fn failure(req: &Request, e: SchedulingError) -> JsonValue {
    if !e.is_rejection() {
        error!("timetable request {} ({}) failed: {}", req.id, req.method, e);
    }
    scheduling_err(req, &e)
}

fn parse_time_field(req: &Request, slot: &Map<String, JsonValue>, key: &str) -> Result<ClockTime, JsonValue> {
    let Some(raw) = slot.get(key).and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", format!("missing slot.{}", key), None));
    };
    raw.parse::<ClockTime>()
        .map_err(|e| err(&req.id, "bad_params", format!("slot.{}: {}", key, e), None))
}

/// The slot is always stamped with the acting teacher.
fn parse_candidate(req: &Request, teacher_id: &str) -> Result<Slot, JsonValue> {
    let Some(slot) = req.params.get("slot").and_then(|v| v.as_object()) else {
        return Err(err(&req.id, "bad_params", "slot must be an object", None));
    };
    let start_time = parse_time_field(req, slot, "startTime")?;
    let end_time = parse_time_field(req, slot, "endTime")?;
    let subject_id = slot
        .get("subjectId")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| err(&req.id, "bad_params", "missing slot.subjectId", None))?;
    Ok(Slot::new(start_time, end_time, subject_id, teacher_id))
}

fn handle_day_get(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let weekday = match required_weekday(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let key = DayKey::new(class_id, weekday);
    let editor = SlotEditor::new(
        TimetableStore::new(conn, &state.feed),
        WritePolicy::from_settings(conn),
    );
    match editor.read_day(&key) {
        Ok(day) => ok(&req.id, day_json(&key, &day)),
        Err(e) => failure(req, e),
    }
}

fn handle_slots_add(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let weekday = match required_weekday(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let candidate = match parse_candidate(req, &teacher_id) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let assignments = match SqliteStaffDirectory::new(conn).assignments_for(&teacher_id) {
        Ok(v) => v,
        Err(e) => return failure(req, e),
    };
    let editor = SlotEditor::new(
        TimetableStore::new(conn, &state.feed),
        WritePolicy::from_settings(conn),
    );
    match editor.add_slot(&class_id, weekday, candidate, &teacher_id, &assignments) {
        Ok(day) => ok(&req.id, day_json(&DayKey::new(class_id, weekday), &day)),
        Err(e) => failure(req, e),
    }
}

fn handle_slots_remove(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let weekday = match required_weekday(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(index) = req.params.get("index").and_then(|v| v.as_u64()) else {
        return err(&req.id, "bad_params", "index must be a non-negative integer", None);
    };
    let expected_version = match parse_opt_i64(req.params.get("expectedVersion")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("expectedVersion {}", m), None),
    };

    let editor = SlotEditor::new(
        TimetableStore::new(conn, &state.feed),
        WritePolicy::from_settings(conn),
    );
    let index = usize::try_from(index).unwrap_or(usize::MAX);
    match editor.remove_slot(&class_id, weekday, index, expected_version) {
        Ok(removal) => {
            let mut out = day_json(&DayKey::new(class_id, weekday), &removal.day);
            out["removed"] = json!(removal.removed.is_some());
            ok(&req.id, out)
        }
        Err(e) => failure(req, e),
    }
}

fn handle_grid_class(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let store = TimetableStore::new(conn, &state.feed);
    match class_grid(&store, &class_id) {
        Ok(grid) => ok(
            &req.id,
            json!({ "classId": class_id, "days": grid_json(&grid) }),
        ),
        Err(e) => failure(req, e),
    }
}

fn handle_grid_subject(state: &mut AppState, req: &Request) -> JsonValue {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let store = TimetableStore::new(conn, &state.feed);
    match subject_grid(&store, &class_id, &subject_id) {
        Ok(grid) => ok(
            &req.id,
            json!({ "classId": class_id, "subjectId": subject_id, "days": grid_json(&grid) }),
        ),
        Err(e) => failure(req, e),
    }
}

fn handle_watch(state: &mut AppState, req: &Request) -> JsonValue {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match parse_opt_string(req.params.get("subjectId")) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", format!("subjectId {}", m), None),
    };

    let live = {
        let conn = match db_conn(state, req) {
            Ok(c) => c,
            Err(e) => return e,
        };
        let store = TimetableStore::new(conn, &state.feed);
        match LiveGrid::open(&store, &state.feed, &class_id, subject_id.as_deref()) {
            Ok(v) => v,
            Err(e) => return failure(req, e),
        }
    };

    let watch_id = Uuid::new_v4().to_string();
    let mut versions = Map::new();
    for (weekday, v) in live.versions() {
        versions.insert(weekday.as_str().to_string(), json!(v));
    }
    let result = json!({
        "watchId": watch_id,
        "classId": class_id,
        "subjectId": subject_id,
        "days": grid_json(live.grid()),
        "versions": versions,
    });
    info!("watch {} opened on {}", watch_id, class_id);
    state.watches.insert(watch_id, live);
    ok(&req.id, result)
}

fn handle_unwatch(state: &mut AppState, req: &Request) -> JsonValue {
    let watch_id = match required_str(req, "watchId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let released = state.watches.remove(&watch_id).is_some();
    if released {
        info!("watch {} released", watch_id);
    }
    ok(&req.id, json!({ "watchId": watch_id, "released": released }))
}

/// Pending `timetable.changed` events for every open watch, one per changed
/// day.
pub fn drain_events(state: &mut AppState) -> Vec<JsonValue> {
    let mut events = Vec::new();
    let mut ids: Vec<String> = state.watches.keys().cloned().collect();
    ids.sort();
    for watch_id in ids {
        let Some(live) = state.watches.get_mut(&watch_id) else {
            continue;
        };
        for update in live.poll() {
            debug!(
                "watch {} sees {} at version {}",
                watch_id, update.weekday, update.version
            );
            events.push(json!({
                "event": "timetable.changed",
                "watchId": watch_id,
                "classId": live.class_id(),
                "subjectId": live.subject_id(),
                "weekday": update.weekday.as_str(),
                "version": update.version,
                "slots": update.slots,
            }));
        }
    }
    events
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<JsonValue> {
    match req.method.as_str() {
        "timetable.day.get" => Some(handle_day_get(state, req)),
        "timetable.slots.add" => Some(handle_slots_add(state, req)),
        "timetable.slots.remove" => Some(handle_slots_remove(state, req)),
        "timetable.grid.class" => Some(handle_grid_class(state, req)),
        "timetable.grid.subject" => Some(handle_grid_subject(state, req)),
        "timetable.watch" => Some(handle_watch(state, req)),
        "timetable.unwatch" => Some(handle_unwatch(state, req)),
        _ => None,
    }
}
