//! Photo gallery and the school profile shown on the home page.

use crate::auth::{Role, Session};
use crate::db;
use crate::ipc::helpers::{
    choice, db_table_err, guarded, optional_i64, optional_str, required_str, require_exists,
    text_or_empty, HandlerErr, HandlerResult, Op, Patch,
};
use crate::ipc::rows::{self, gallery_json, query_all, GALLERY_COLS};
use crate::ipc::types::{AppState, Request};
use crate::model::GalleryCategory;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

fn list(conn: &Connection, _s: &Session, _params: &Value) -> HandlerResult {
    let images = query_all(
        conn,
        &format!(
            "SELECT {} FROM gallery_images ORDER BY display_order DESC, upload_date DESC",
            GALLERY_COLS
        ),
        [],
        gallery_json,
    )?;
    Ok(json!({ "images": images, "categories": GalleryCategory::labels() }))
}

fn add(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let (Some(title), Some(image_path)) = (
        optional_str(params, "title")?,
        optional_str(params, "imagePath")?,
    ) else {
        return Err(HandlerErr::bad_params("title and image are required"));
    };
    let category = choice(params, "category", GalleryCategory::parse, GalleryCategory::default())?;
    let description = text_or_empty(params, "description")?;
    let display_order = optional_i64(params, "displayOrder", 0)?;

    let image_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO gallery_images(id, title, image_path, category, description, upload_date,
            is_active, display_order)
         VALUES(?, ?, ?, ?, ?, ?, 1, ?)",
        rusqlite::params![
            image_id,
            title,
            image_path,
            category.as_str(),
            description,
            db::now_ts(),
            display_order,
        ],
    )
    .map_err(db_table_err("db_insert_failed", "gallery_images"))?;

    Ok(json!({ "imageId": image_id }))
}

fn delete(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    let image_id = required_str(params, "imageId")?;
    require_exists(conn, "gallery_images", &image_id, "image")?;
    conn.execute("DELETE FROM gallery_images WHERE id = ?", [&image_id])
        .map_err(db_table_err("db_delete_failed", "gallery_images"))?;
    Ok(json!({ "deleted": true }))
}

fn school_info_update(conn: &Connection, _s: &Session, params: &Value) -> HandlerResult {
    db::ensure_school_info(conn).map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;

    let mut patch = Patch::from_params(params)?;
    patch.text("schoolName", "school_name")?;
    patch.text_blank("address", "address")?;
    patch.text_blank("contactNumber", "contact_number")?;
    patch.text_blank("email", "email")?;
    patch.text_blank("principalName", "principal_name")?;
    patch.int("establishedYear", "established_year")?;
    patch.int("totalStudents", "total_students")?;
    patch.int("totalTeachers", "total_teachers")?;
    patch.text_blank("motto", "motto")?;
    patch.text_blank("description", "description")?;
    patch.nullable_text("logoPath", "logo_path")?;
    if !patch.is_empty() {
        patch.raw("updated_at", SqlValue::Text(db::now_ts()));
    }
    patch.apply(conn, "school_info", "1")?;

    Ok(json!({ "schoolInfo": rows::school_info(conn)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "gallery.list" => list,
        "gallery.add" => add,
        "gallery.delete" => delete,
        "schoolInfo.update" => school_info_update,
        _ => return None,
    };
    Some(guarded(state, req, Some(Role::Admin), op))
}
