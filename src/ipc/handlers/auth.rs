use crate::auth;
use crate::directory;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use log::warn;
use serde_json::json;

fn handle_create_account(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let email = match req.params.get("email").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing email", None),
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing password", None),
    };

    match auth::create_account(conn, &email, &password) {
        Ok(()) => ok(&req.id, json!({ "email": email })),
        Err(e) => err(&req.id, e.code, e.message, None),
    }
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let email = match req.params.get("email").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing email", None),
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing password", None),
    };

    if let Err(e) = auth::verify_credentials(conn, &email, &password) {
        return err(&req.id, e.code, e.message, None);
    }

    // Best effort; a teacher record may or may not exist for this account.
    if let Err(e) = directory::touch_teacher_last_login(conn, &email) {
        warn!("could not stamp last login for {}: {}", email, e.message);
    }

    state.current_user = Some(email.clone());
    ok(&req.id, json!({ "email": email }))
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.current_user = None;
    ok(&req.id, json!({ "ok": true }))
}

fn handle_current_user(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "email": state.current_user }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.createAccount" => Some(handle_create_account(state, req)),
        "auth.signIn" => Some(handle_sign_in(state, req)),
        "auth.signOut" => Some(handle_sign_out(state, req)),
        "auth.currentUser" => Some(handle_current_user(state, req)),
        _ => None,
    }
}
