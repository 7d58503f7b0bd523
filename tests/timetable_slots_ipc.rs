mod test_support;

use serde_json::json;
use test_support::{
    assign, request, request_err, request_ok, select_workspace, slot_summaries, spawn_sidecar,
    temp_workspace,
};

#[test]
fn jss1_monday_scenario_over_ipc() {
    let workspace = temp_workspace("timetable-jss1");
    let mut sc = spawn_sidecar();
    select_workspace(&mut sc, &workspace);
    assign(&mut sc, "T1", json!([{ "subjectId": "Math", "classId": "JSS 1" }]));
    assign(&mut sc, "T2", json!([{ "subjectId": "English", "classId": "JSS 1" }]));

    let empty = request_ok(
        &mut sc,
        "1",
        "timetable.day.get",
        json!({ "classId": "JSS 1", "weekday": "monday" }),
    );
    assert_eq!(empty["version"], 0);
    assert_eq!(empty["slots"], json!([]));

    let added = request_ok(
        &mut sc,
        "2",
        "timetable.slots.add",
        json!({
            "classId": "JSS 1",
            "weekday": "monday",
            "teacherId": "T1",
            "slot": { "startTime": "08:00", "endTime": "09:00", "subjectId": "Math" }
        }),
    );
    assert_eq!(added["version"], 1);
    assert_eq!(slot_summaries(&added["slots"]), vec!["Math 08:00-09:00"]);
    assert_eq!(added["slots"][0]["teacherId"], "T1");

    let (code, error) = request_err(
        &mut sc,
        "3",
        "timetable.slots.add",
        json!({
            "classId": "JSS 1",
            "weekday": "monday",
            "teacherId": "T2",
            "slot": { "startTime": "08:30", "endTime": "09:30", "subjectId": "English" }
        }),
    );
    assert_eq!(code, "slot_conflict");
    assert_eq!(error["details"]["existing"]["subjectId"], "Math");
    assert_eq!(error["details"]["candidate"]["startTime"], "08:30");

    let unchanged = request_ok(
        &mut sc,
        "4",
        "timetable.day.get",
        json!({ "classId": "JSS 1", "weekday": "monday" }),
    );
    assert_eq!(unchanged["version"], 1);
    assert_eq!(slot_summaries(&unchanged["slots"]), vec!["Math 08:00-09:00"]);

    let touched = request_ok(
        &mut sc,
        "5",
        "timetable.slots.add",
        json!({
            "classId": "JSS 1",
            "weekday": "monday",
            "teacherId": "T2",
            "slot": { "startTime": "09:00", "endTime": "10:00", "subjectId": "English" }
        }),
    );
    assert_eq!(
        slot_summaries(&touched["slots"]),
        vec!["Math 08:00-09:00", "English 09:00-10:00"]
    );

    let english = request_ok(
        &mut sc,
        "6",
        "timetable.grid.subject",
        json!({ "classId": "JSS 1", "subjectId": "English" }),
    );
    assert_eq!(
        slot_summaries(&english["days"]["monday"]),
        vec!["English 09:00-10:00"]
    );
    assert_eq!(english["days"]["friday"], json!([]));

    let grid = request_ok(&mut sc, "7", "timetable.grid.class", json!({ "classId": "JSS 1" }));
    let days = grid["days"].as_object().expect("days object");
    assert_eq!(days.len(), 5);
    assert_eq!(slot_summaries(&grid["days"]["monday"]).len(), 2);
    assert_eq!(grid["days"]["tuesday"], json!([]));
}

#[test]
fn entitlement_and_range_rejections() {
    let workspace = temp_workspace("timetable-rejections");
    let mut sc = spawn_sidecar();
    select_workspace(&mut sc, &workspace);
    assign(&mut sc, "T1", json!([{ "subjectId": "Math", "classId": "JSS 1" }]));

    // Right teacher, wrong class.
    let (code, error) = request_err(
        &mut sc,
        "1",
        "timetable.slots.add",
        json!({
            "classId": "JSS 2",
            "weekday": "tuesday",
            "teacherId": "T1",
            "slot": { "startTime": "08:00", "endTime": "09:00", "subjectId": "Math" }
        }),
    );
    assert_eq!(code, "not_entitled");
    assert_eq!(error["details"]["classId"], "JSS 2");

    // Unknown teacher, even with an inverted range: entitlement is checked first.
    let (code, _) = request_err(
        &mut sc,
        "2",
        "timetable.slots.add",
        json!({
            "classId": "JSS 1",
            "weekday": "tuesday",
            "teacherId": "T9",
            "slot": { "startTime": "10:00", "endTime": "09:00", "subjectId": "Math" }
        }),
    );
    assert_eq!(code, "not_entitled");

    let (code, error) = request_err(
        &mut sc,
        "3",
        "timetable.slots.add",
        json!({
            "classId": "JSS 1",
            "weekday": "tuesday",
            "teacherId": "T1",
            "slot": { "startTime": "10:00", "endTime": "10:00", "subjectId": "Math" }
        }),
    );
    assert_eq!(code, "invalid_range");
    assert_eq!(error["details"]["startTime"], "10:00");

    let day = request_ok(
        &mut sc,
        "4",
        "timetable.day.get",
        json!({ "classId": "JSS 1", "weekday": "tuesday" }),
    );
    assert_eq!(day["version"], 0);
    assert_eq!(day["slots"], json!([]));
}

#[test]
fn remove_is_index_stable_and_tolerant() {
    let workspace = temp_workspace("timetable-remove");
    let mut sc = spawn_sidecar();
    select_workspace(&mut sc, &workspace);
    assign(
        &mut sc,
        "T1",
        json!([
            { "subjectId": "Math", "classId": "SSS 2" },
            { "subjectId": "Physics", "classId": "SSS 2" }
        ]),
    );

    for (i, (start, end, subject)) in [
        ("08:00", "09:00", "Math"),
        ("10:00", "11:00", "Physics"),
        ("09:00", "10:00", "Math"),
    ]
    .iter()
    .enumerate()
    {
        let _ = request_ok(
            &mut sc,
            &format!("add-{}", i),
            "timetable.slots.add",
            json!({
                "classId": "SSS 2",
                "weekday": "thursday",
                "teacherId": "T1",
                "slot": { "startTime": start, "endTime": end, "subjectId": subject }
            }),
        );
    }

    let noop = request_ok(
        &mut sc,
        "r1",
        "timetable.slots.remove",
        json!({ "classId": "SSS 2", "weekday": "thursday", "index": 3 }),
    );
    assert_eq!(noop["removed"], false);
    assert_eq!(noop["version"], 3);
    assert_eq!(slot_summaries(&noop["slots"]).len(), 3);

    let removed = request_ok(
        &mut sc,
        "r2",
        "timetable.slots.remove",
        json!({ "classId": "SSS 2", "weekday": "thursday", "index": 1, "expectedVersion": 3 }),
    );
    assert_eq!(removed["removed"], true);
    assert_eq!(removed["version"], 4);
    assert_eq!(
        slot_summaries(&removed["slots"]),
        vec!["Math 08:00-09:00", "Math 09:00-10:00"]
    );

    // Index 0 of version 3 is no longer what the caller saw.
    let (code, error) = request_err(
        &mut sc,
        "r3",
        "timetable.slots.remove",
        json!({ "classId": "SSS 2", "weekday": "thursday", "index": 0, "expectedVersion": 3 }),
    );
    assert_eq!(code, "stale_version");
    assert_eq!(error["details"]["version"], 4);

    let (code, _) = request_err(
        &mut sc,
        "r4",
        "timetable.slots.remove",
        json!({ "classId": "SSS 2", "weekday": "thursday", "index": -1 }),
    );
    assert_eq!(code, "bad_params");
}

#[test]
fn requests_are_validated_before_touching_the_store() {
    let workspace = temp_workspace("timetable-params");
    let mut sc = spawn_sidecar();

    let (code, _) = request_err(
        &mut sc,
        "1",
        "timetable.day.get",
        json!({ "classId": "JSS 1", "weekday": "monday" }),
    );
    assert_eq!(code, "no_workspace");

    select_workspace(&mut sc, &workspace);

    let (code, _) = request_err(
        &mut sc,
        "2",
        "timetable.day.get",
        json!({ "classId": "JSS 1", "weekday": "saturday" }),
    );
    assert_eq!(code, "bad_params");

    let (code, error) = request_err(
        &mut sc,
        "3",
        "timetable.slots.add",
        json!({
            "classId": "JSS 1",
            "weekday": "monday",
            "teacherId": "T1",
            "slot": { "startTime": "8am", "endTime": "09:00", "subjectId": "Math" }
        }),
    );
    assert_eq!(code, "bad_params");
    assert!(error["message"]
        .as_str()
        .unwrap_or("")
        .contains("startTime"));

    let (code, _) = request_err(
        &mut sc,
        "4",
        "timetable.slots.add",
        json!({ "classId": "JSS 1", "weekday": "monday", "teacherId": "T1" }),
    );
    assert_eq!(code, "bad_params");

    let (code, _) = request_err(&mut sc, "5", "timetable.grid.class", json!({}));
    assert_eq!(code, "bad_params");

    let reply = request(&mut sc, "6", "timetable.slots.move", json!({}));
    assert_eq!(reply["error"]["code"], "not_implemented");

    let health = request_ok(&mut sc, "7", "health", json!({}));
    assert!(health["workspacePath"].is_string());
}

#[test]
fn ids_are_matched_exactly_as_sent() {
    let workspace = temp_workspace("timetable-exact-ids");
    let mut sc = spawn_sidecar();
    select_workspace(&mut sc, &workspace);
    assign(&mut sc, "T1", json!([{ "subjectId": "Math", "classId": "JSS 1" }]));

    let (code, error) = request_err(
        &mut sc,
        "1",
        "timetable.slots.add",
        json!({
            "classId": "JSS 1 ",
            "weekday": "monday",
            "teacherId": "T1",
            "slot": { "startTime": "08:00", "endTime": "09:00", "subjectId": "Math" }
        }),
    );
    assert_eq!(code, "not_entitled");
    assert_eq!(error["details"]["classId"], "JSS 1 ");

    let (code, _) = request_err(
        &mut sc,
        "2",
        "timetable.slots.add",
        json!({
            "classId": "JSS 1",
            "weekday": "monday",
            "teacherId": " T1",
            "slot": { "startTime": "08:00", "endTime": "09:00", "subjectId": "Math" }
        }),
    );
    assert_eq!(code, "not_entitled");

    let _ = request_ok(
        &mut sc,
        "3",
        "timetable.slots.add",
        json!({
            "classId": "JSS 1",
            "weekday": "monday",
            "teacherId": "T1",
            "slot": { "startTime": "08:00", "endTime": "09:00", "subjectId": "Math" }
        }),
    );
    let padded = request_ok(
        &mut sc,
        "4",
        "timetable.day.get",
        json!({ "classId": "JSS 1 ", "weekday": "monday" }),
    );
    assert_eq!(padded["classId"], "JSS 1 ");
    assert_eq!(padded["slots"], json!([]));

    let (code, _) = request_err(
        &mut sc,
        "5",
        "timetable.day.get",
        json!({ "classId": "   ", "weekday": "monday" }),
    );
    assert_eq!(code, "bad_params");
}
