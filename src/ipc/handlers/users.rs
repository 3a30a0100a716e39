use crate::auth;
use crate::directory::{self, StoreError, UserKind};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::models::{Admin, NotificationPreferences, Student, Teacher, UserRecord};
use log::warn;
use rusqlite::Connection;
use serde_json::json;

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

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

fn get_nonempty_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let value = get_required_str(params, key)?;
    if value.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(value)
}

fn get_user_kind(params: &serde_json::Value) -> Result<UserKind, HandlerErr> {
    let role = get_required_str(params, "role")?;
    UserKind::parse(&role)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {}", role)))
}

fn users_resolve(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let email = get_nonempty_str(params, "email")?;
    let user = directory::resolve_user(conn, &email)?;
    serde_json::to_value(&user)
        .map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
        })
}

// Students load to completion first, then teachers; the combined list is
// rebuilt from scratch on every call.
fn users_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut users: Vec<UserRecord> = Vec::new();

    let students = directory::list_students(conn)?;
    users.extend(students.into_iter().map(UserRecord::Student));

    let teachers = directory::list_teachers(conn)?;
    let skipped = teachers.skipped;
    users.extend(teachers.records.into_iter().map(UserRecord::Teacher));

    let users_json = serde_json::to_value(&users).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
    })?;
    Ok(json!({ "users": users_json, "skipped": skipped }))
}

fn student_from_profile(
    email: &str,
    profile: &serde_json::Value,
) -> Result<Student, HandlerErr> {
    let now = directory::now_utc();
    Ok(Student {
        email: email.to_string(),
        full_name: get_nonempty_str(profile, "fullName")?,
        student_id: get_nonempty_str(profile, "studentId")?,
        department: get_nonempty_str(profile, "department")?,
        field: get_nonempty_str(profile, "field")?,
        year: get_nonempty_str(profile, "year")?,
        phone_number: Some(get_nonempty_str(profile, "phoneNumber")?),
        profile_image_url: String::new(),
        is_active: true,
        created_at: now.clone(),
        last_updated_at: now,
    })
}

fn teacher_from_profile(
    email: &str,
    profile: &serde_json::Value,
) -> Result<Teacher, HandlerErr> {
    let now = directory::now_utc();
    Ok(Teacher {
        email: email.to_string(),
        full_name: get_nonempty_str(profile, "fullName")?,
        employee_id: get_nonempty_str(profile, "employeeId")?,
        department: get_nonempty_str(profile, "department")?,
        phone_number: Some(get_nonempty_str(profile, "phoneNumber")?),
        profile_image_url: String::new(),
        is_active: true,
        notification_preferences: NotificationPreferences::default(),
        assigned_course_ids: Vec::new(),
        assigned_field_ids: Vec::new(),
        created_at: now.clone(),
        last_login_at: None,
        last_updated_at: now,
    })
}

fn admin_from_profile(email: &str, profile: &serde_json::Value) -> Result<Admin, HandlerErr> {
    let now = directory::now_utc();
    Ok(Admin {
        email: email.to_string(),
        full_name: get_nonempty_str(profile, "fullName")?,
        department: get_nonempty_str(profile, "department")?,
        phone_number: profile
            .get("phoneNumber")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        profile_image_url: String::new(),
        is_active: true,
        created_at: now.clone(),
        last_updated_at: now,
    })
}

fn save_profile(
    conn: &Connection,
    kind: UserKind,
    email: &str,
    profile: &serde_json::Value,
) -> Result<(), HandlerErr> {
    match kind {
        UserKind::Student => directory::save_student(conn, &student_from_profile(email, profile)?)?,
        UserKind::Teacher => directory::save_teacher(conn, &teacher_from_profile(email, profile)?)?,
        UserKind::Admin => directory::save_admin(conn, &admin_from_profile(email, profile)?)?,
    }
    Ok(())
}

// Account first, then profile; a failed profile write deletes the account
// again so a half-created user never lingers.
fn users_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let email = get_nonempty_str(params, "email")?;
    let password = get_required_str(params, "password")?;
    let kind = get_user_kind(params)?;
    let profile = params
        .get("profile")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing profile"))?;

    // Reject a malformed profile before the account exists at all.
    let staged: Result<(), HandlerErr> = match kind {
        UserKind::Student => student_from_profile(&email, &profile).map(|_| ()),
        UserKind::Teacher => teacher_from_profile(&email, &profile).map(|_| ()),
        UserKind::Admin => admin_from_profile(&email, &profile).map(|_| ()),
    };
    staged?;

    auth::create_account(conn, &email, &password)?;

    if let Err(e) = save_profile(conn, kind, &email, &profile) {
        if let Err(rollback) = auth::delete_account(conn, &email) {
            warn!(
                "could not roll back auth account for {}: {}",
                email, rollback.message
            );
        }
        return Err(HandlerErr {
            code: e.code,
            message: format!("failed to save {} profile: {}", kind.label(), e.message),
        });
    }

    Ok(json!({ "email": email, "role": kind.label() }))
}

fn users_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let kind = get_user_kind(params)?;
    let profile = params
        .get("profile")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing profile"))?;
    let email = get_nonempty_str(&profile, "email")?;

    let exists = match kind {
        UserKind::Student => directory::get_student(conn, &email)?.is_some(),
        UserKind::Teacher => directory::get_teacher(conn, &email)?.is_some(),
        UserKind::Admin => directory::get_admin(conn, &email)?.is_some(),
    };
    if !exists {
        return Err(HandlerErr {
            code: "not_found",
            message: "user not found".to_string(),
        });
    }

    save_profile(conn, kind, &email, &profile)?;
    Ok(json!({ "email": email, "role": kind.label() }))
}

fn users_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let email = get_nonempty_str(params, "email")?;
    let kind = get_user_kind(params)?;
    if kind == UserKind::Admin {
        return Err(HandlerErr::bad_params(
            "admin accounts cannot be deleted here",
        ));
    }

    // The auth account stays behind; only the profile document goes.
    if !directory::delete_user(conn, kind, &email)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "user not found".to_string(),
        });
    }
    Ok(json!({ "ok": true }))
}

fn users_set_active(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let email = get_nonempty_str(params, "email")?;
    let kind = get_user_kind(params)?;
    if kind == UserKind::Admin {
        return Err(HandlerErr::bad_params(
            "admin active status cannot be changed here",
        ));
    }
    let active = params
        .get("active")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params("missing active"))?;

    if !directory::set_user_active(conn, kind, &email, active)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "user not found".to_string(),
        });
    }
    Ok(json!({ "email": email, "active": active }))
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
        "users.resolve" => Some(dispatch(state, req, users_resolve)),
        "users.list" => Some(dispatch(state, req, |conn, _| users_list(conn))),
        "users.create" => Some(dispatch(state, req, users_create)),
        "users.update" => Some(dispatch(state, req, users_update)),
        "users.delete" => Some(dispatch(state, req, users_delete)),
        "users.setActive" => Some(dispatch(state, req, users_set_active)),
        _ => None,
    }
}
