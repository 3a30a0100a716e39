use crate::directory::{self, StoreError};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::models::{AttendanceStats, Course, Field, ScheduleEntry, YearLabel};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug)]
struct HandlerErr {
    code: &'static str,
    message: String,
}

impl HandlerErr {
    fn bad_params(message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code: "not_found",
            message: message.into(),
        }
    }

    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, None)
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> HandlerErr {
        HandlerErr {
            code: e.code,
            message: e.message,
        }
    }
}

fn get_nonempty_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let value = params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    if value.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(value)
}

fn parse_target_years(params: &serde_json::Value) -> Result<Vec<YearLabel>, HandlerErr> {
    let Some(raw) = params.get("targetYears").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("select at least one target year"));
    };
    if raw.is_empty() {
        return Err(HandlerErr::bad_params("select at least one target year"));
    }
    let mut years = Vec::with_capacity(raw.len());
    for value in raw {
        let label = value.as_str().unwrap_or("");
        let year = YearLabel::parse(label)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown target year: {}", label)))?;
        if !years.contains(&year) {
            years.push(year);
        }
    }
    Ok(years)
}

/// Re-locates an entry inside a field's catalog by content equality.
fn locate_entry(schedule: &[ScheduleEntry], entry: &ScheduleEntry) -> Option<usize> {
    schedule.iter().position(|candidate| candidate == entry)
}

/// The course editor's gate, checked in order before anything is written:
/// name and department, a real field selection, at least one target year,
/// and a schedule slot taken from that field's current catalog. Returns the
/// catalog's own copy of the slot, not the caller's.
fn validate_course_save(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<(String, String, Field, Vec<YearLabel>, ScheduleEntry), HandlerErr> {
    let course_name = get_nonempty_str(params, "courseName")?;
    let department = get_nonempty_str(params, "department")?;
    let field_name = get_nonempty_str(params, "field")?;
    let target_years = parse_target_years(params)?;

    let entry_value = match params.get("scheduleEntry") {
        Some(v) if !v.is_null() => v.clone(),
        _ => {
            return Err(HandlerErr::bad_params(
                "select a schedule slot for the course",
            ))
        }
    };
    let entry: ScheduleEntry = serde_json::from_value(entry_value)
        .map_err(|e| HandlerErr::bad_params(format!("malformed scheduleEntry: {}", e)))?;

    let Some(field) = directory::get_field_by_name(conn, &field_name)? else {
        return Err(HandlerErr::not_found(format!(
            "field not found: {}",
            field_name
        )));
    };
    let Some(index) = locate_entry(&field.weekly_schedule, &entry) else {
        return Err(HandlerErr::bad_params(
            "schedule slot is not part of the selected field's weekly schedule",
        ));
    };
    let canonical = field.weekly_schedule[index].clone();

    Ok((course_name, department, field, target_years, canonical))
}

fn courses_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let outcome = directory::list_courses(conn)?;
    let courses = serde_json::to_value(&outcome.records).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
    })?;
    Ok(json!({ "courses": courses, "skipped": outcome.skipped }))
}

/// Editor state coupling: the candidate slots for a course are always the
/// chosen field's current schedule, and a previously chosen slot is
/// restored only if it still exists there by content.
fn courses_schedule_options(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let field_name = get_nonempty_str(params, "field")?;
    let Some(field) = directory::get_field_by_name(conn, &field_name)? else {
        return Err(HandlerErr::not_found(format!(
            "field not found: {}",
            field_name
        )));
    };

    let selected_index = match params.get("current") {
        Some(v) if !v.is_null() => {
            let current: ScheduleEntry = serde_json::from_value(v.clone())
                .map_err(|e| HandlerErr::bad_params(format!("malformed current: {}", e)))?;
            locate_entry(&field.weekly_schedule, &current)
        }
        _ => None,
    };

    let labels: Vec<String> = field
        .weekly_schedule
        .iter()
        .map(|entry| entry.display_string())
        .collect();
    let options = serde_json::to_value(&field.weekly_schedule).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
    })?;
    Ok(json!({
        "options": options,
        "labels": labels,
        "selectedIndex": selected_index
    }))
}

fn courses_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (course_name, department, field, target_years, entry) =
        validate_course_save(conn, params)?;

    let course = Course {
        course_id: Uuid::new_v4().to_string(),
        course_name,
        department,
        field: field.field_name,
        target_years,
        teacher_email: None,
        teacher_name: None,
        course_schedule_entry: Some(entry),
        is_active: true,
        created_at: directory::now_utc(),
        statistics: json!({}),
    };
    directory::insert_course(conn, &course)?;
    Ok(json!({ "courseId": course.course_id, "courseName": course.course_name }))
}

fn courses_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_nonempty_str(params, "courseId")?;
    let (course_name, department, field, target_years, entry) =
        validate_course_save(conn, params)?;

    let Some(existing) = directory::get_course(conn, &course_id)? else {
        return Err(HandlerErr::not_found("course not found"));
    };
    let is_active = params
        .get("isActive")
        .and_then(|v| v.as_bool())
        .unwrap_or(existing.is_active);

    let course = Course {
        course_id: course_id.clone(),
        course_name,
        department,
        field: field.field_name,
        target_years,
        // Assignment fields and statistics belong to other operations.
        teacher_email: existing.teacher_email,
        teacher_name: existing.teacher_name,
        course_schedule_entry: Some(entry),
        is_active,
        created_at: existing.created_at,
        statistics: existing.statistics,
    };
    directory::update_course(conn, &course)?;
    Ok(json!({ "courseId": course_id }))
}

fn courses_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_nonempty_str(params, "courseId")?;
    if !directory::delete_course(conn, &course_id)? {
        return Err(HandlerErr::not_found("course not found"));
    }
    Ok(json!({ "ok": true }))
}

fn courses_update_statistics(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_nonempty_str(params, "courseId")?;
    let total = params
        .get("totalSessions")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params("missing totalSessions"))?;
    let attended = params
        .get("attendedSessions")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params("missing attendedSessions"))?;
    if total < 0 || attended < 0 || attended > total {
        return Err(HandlerErr::bad_params(
            "attendedSessions must be between 0 and totalSessions",
        ));
    }

    let stats = AttendanceStats::new(total, attended);
    let value = serde_json::to_value(stats).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
    })?;
    if !directory::update_course_statistics(conn, &course_id, &value)? {
        return Err(HandlerErr::not_found("course not found"));
    }
    Ok(json!({ "courseId": course_id, "statistics": value }))
}

fn dispatch(
    state: &mut AppState,
    req: &Request,
    run: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match run(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(dispatch(state, req, |conn, _| courses_list(conn))),
        "courses.scheduleOptions" => Some(dispatch(state, req, courses_schedule_options)),
        "courses.create" => Some(dispatch(state, req, courses_create)),
        "courses.update" => Some(dispatch(state, req, courses_update)),
        "courses.delete" => Some(dispatch(state, req, courses_delete)),
        "courses.updateStatistics" => Some(dispatch(state, req, courses_update_statistics)),
        _ => None,
    }
}
