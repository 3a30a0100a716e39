use crate::directory;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!("missing {}", key),
            None,
        )),
    }
}

fn handle_assign_teacher(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let teacher_email = match required_str(req, "teacherEmail") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let teacher_name = match required_str(req, "teacherName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let department = match required_str(req, "department") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match directory::assign_course_to_teacher(conn, &teacher_email, &course_id, &teacher_name, &department)
    {
        Ok(()) => ok(
            &req.id,
            json!({ "courseId": course_id, "teacherEmail": teacher_email }),
        ),
        Err(e) => err(&req.id, e.code, e.message, None),
    }
}

fn handle_unassign_teacher(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let teacher_email = match required_str(req, "teacherEmail") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match directory::unassign_course_from_teacher(conn, &teacher_email, &course_id) {
        Ok(()) => ok(&req.id, json!({ "courseId": course_id })),
        Err(e) => err(&req.id, e.code, e.message, None),
    }
}

fn handle_assign_field(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let teacher_email = match required_str(req, "teacherEmail") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let field_id = match required_str(req, "fieldId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match directory::assign_field_to_teacher(conn, &teacher_email, &field_id) {
        Ok(()) => ok(
            &req.id,
            json!({ "teacherEmail": teacher_email, "fieldId": field_id }),
        ),
        Err(e) => err(&req.id, e.code, e.message, None),
    }
}

fn handle_unassign_field(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let teacher_email = match required_str(req, "teacherEmail") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let field_id = match required_str(req, "fieldId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match directory::unassign_field_from_teacher(conn, &teacher_email, &field_id) {
        Ok(()) => ok(
            &req.id,
            json!({ "teacherEmail": teacher_email, "fieldId": field_id }),
        ),
        Err(e) => err(&req.id, e.code, e.message, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.assignTeacher" => Some(handle_assign_teacher(state, req)),
        "courses.unassignTeacher" => Some(handle_unassign_teacher(state, req)),
        "teachers.assignField" => Some(handle_assign_field(state, req)),
        "teachers.unassignField" => Some(handle_unassign_field(state, req)),
        _ => None,
    }
}
