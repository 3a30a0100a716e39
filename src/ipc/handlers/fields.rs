use crate::directory::{self, StoreError};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::models::{DayOfWeek, Field, ScheduleEntry};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

// Unset time pickers report this value; a row still carrying it is
// incomplete.
const UNSET_TIME: &str = "00:00";

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

/// Every submitted row must have a chosen day and both times moved off the
/// unset sentinel; one incomplete row rejects the whole save. The accepted
/// rows replace the stored schedule wholesale.
fn parse_schedule_rows(params: &serde_json::Value) -> Result<Vec<ScheduleEntry>, HandlerErr> {
    let Some(rows) = params.get("weeklySchedule").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing weeklySchedule"));
    };

    let mut schedule = Vec::with_capacity(rows.len());
    for row in rows {
        let day_raw = row
            .get("dayOfWeek")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        let start = row
            .get("startTime")
            .and_then(|v| v.as_str())
            .unwrap_or(UNSET_TIME)
            .trim();
        let end = row
            .get("endTime")
            .and_then(|v| v.as_str())
            .unwrap_or(UNSET_TIME)
            .trim();
        let day = match DayOfWeek::parse(day_raw) {
            Some(day) if start != UNSET_TIME && end != UNSET_TIME => day,
            _ => {
                return Err(HandlerErr::bad_params(
                    "complete all schedule rows or remove them",
                ))
            }
        };
        let room = row
            .get("room")
            .and_then(|v| v.as_str())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        let is_recurring = row
            .get("isRecurring")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        schedule.push(ScheduleEntry {
            day_of_week: day,
            start_time: start.to_string(),
            end_time: end.to_string(),
            room,
            is_recurring,
        });
    }
    Ok(schedule)
}

fn fields_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let outcome = directory::list_fields(conn)?;
    let fields = serde_json::to_value(&outcome.records).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
    })?;
    Ok(json!({ "fields": fields, "skipped": outcome.skipped }))
}

fn fields_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let field_name = get_nonempty_str(params, "fieldName")?;
    let department = get_nonempty_str(params, "department")?;
    let description = params
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    let weekly_schedule = parse_schedule_rows(params)?;

    let now = directory::now_utc();
    let field = Field {
        field_id: Uuid::new_v4().to_string(),
        field_name,
        department,
        description,
        weekly_schedule,
        created_at: now.clone(),
        last_updated_at: now,
    };
    directory::insert_field(conn, &field)?;
    Ok(json!({ "fieldId": field.field_id, "fieldName": field.field_name }))
}

fn fields_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let field_id = get_nonempty_str(params, "fieldId")?;
    let field_name = get_nonempty_str(params, "fieldName")?;
    let department = get_nonempty_str(params, "department")?;
    let description = params
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    let weekly_schedule = parse_schedule_rows(params)?;

    let field = Field {
        field_id: field_id.clone(),
        field_name,
        department,
        description,
        weekly_schedule,
        created_at: String::new(), // not touched by updates
        last_updated_at: directory::now_utc(),
    };
    if !directory::update_field(conn, &field)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "field not found".to_string(),
        });
    }
    Ok(json!({ "fieldId": field_id }))
}

fn fields_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let field_id = get_nonempty_str(params, "fieldId")?;
    if directory::get_field(conn, &field_id)?.is_none() {
        return Err(HandlerErr {
            code: "not_found",
            message: "field not found".to_string(),
        });
    }
    directory::delete_field(conn, &field_id)?;
    Ok(json!({ "ok": true }))
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
        "fields.list" => Some(dispatch(state, req, |conn, _| fields_list(conn))),
        "fields.create" => Some(dispatch(state, req, fields_create)),
        "fields.update" => Some(dispatch(state, req, fields_update)),
        "fields.delete" => Some(dispatch(state, req, fields_delete)),
        _ => None,
    }
}
