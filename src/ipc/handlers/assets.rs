use crate::directory::{self, UserKind};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use log::warn;
use serde_json::json;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const PROFILE_DIR: &str = "assets/profile";

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

fn parse_kind(req: &Request) -> Result<UserKind, serde_json::Value> {
    let role = required_str(req, "role")?;
    UserKind::parse(&role).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("unknown role: {}", role),
            None,
        )
    })
}

fn stored_image_path(workspace: &Path, source: &Path) -> PathBuf {
    let name = match source.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    };
    workspace.join(PROFILE_DIR).join(name)
}

fn handle_image_upload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(conn), Some(workspace)) = (state.db.as_ref(), state.workspace.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let kind = match parse_kind(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let source = match required_str(req, "sourcePath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    let previous = match directory::get_profile_image_url(conn, kind, &email) {
        Ok(Some(url)) => url,
        Ok(None) => return err(&req.id, "not_found", "user not found", None),
        Err(e) => return err(&req.id, e.code, e.message, None),
    };

    let dest = stored_image_path(workspace, &source);
    if let Some(parent) = dest.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return err(&req.id, "storage_failed", e.to_string(), None);
        }
    }
    if let Err(e) = std::fs::copy(&source, &dest) {
        return err(
            &req.id,
            "storage_failed",
            format!("failed to store image: {}", e),
            None,
        );
    }

    let url = dest.to_string_lossy().to_string();
    match directory::set_profile_image_url(conn, kind, &email, &url) {
        Ok(true) => {
            // Stale file from a previous upload is best-effort cleanup.
            if !previous.is_empty() {
                if let Err(e) = std::fs::remove_file(&previous) {
                    warn!("could not remove previous image {}: {}", previous, e);
                }
            }
            ok(&req.id, json!({ "email": email, "profileImageUrl": url }))
        }
        Ok(false) => err(&req.id, "not_found", "user not found", None),
        Err(e) => err(
            &req.id,
            e.code,
            format!("image stored but profile update failed: {}", e.message),
            None,
        ),
    }
}

fn handle_image_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let kind = match parse_kind(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let current = match directory::get_profile_image_url(conn, kind, &email) {
        Ok(Some(url)) => url,
        Ok(None) => return err(&req.id, "not_found", "user not found", None),
        Err(e) => return err(&req.id, e.code, e.message, None),
    };

    if !current.is_empty() {
        if let Err(e) = std::fs::remove_file(&current) {
            warn!("could not remove image {}: {}", current, e);
        }
    }
    match directory::set_profile_image_url(conn, kind, &email, "") {
        Ok(_) => ok(&req.id, json!({ "email": email })),
        Err(e) => err(&req.id, e.code, e.message, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "profile.imageUpload" => Some(handle_image_upload(state, req)),
        "profile.imageDelete" => Some(handle_image_delete(state, req)),
        _ => None,
    }
}
