use rocket::{
    http::Status,
    request::Form,
    response::{
        content::Json,
        status::Custom,
    },
};
use serde_json::json;

use crate::db;
use crate::util;
use crate::alert_sys;
use crate::incident_sys;
use crate::auth_sys::{AuthUser, Role, require_role};


type JsonResult = Result<Json<String>, Custom<String>>;
type StringResult = Result<String, Custom<String>>;


const TASK_STATUSES: [&'static str; 3] = ["open", "in_progress", "closed"];


fn is_valid_task_status(status: &str) -> bool {
    TASK_STATUSES.iter().any(|&s| s == status)
}

/// The incident mirrors its task's lifecycle once a volunteer starts
/// reporting progress.
fn incident_status_for(task_status: &str) -> Option<&'static str> {
    match task_status {
        "closed" => Some("closed"),
        "in_progress" => Some("in_progress"),
        "open" => Some("open"),
        _ => None,
    }
}


#[derive(FromForm)]
pub struct AssignForm {
    incident_id: i32,
    volunteer_id: i32,
}


#[derive(FromForm)]
pub struct TaskStatusForm {
    task_id: i32,
    status: String,
}


#[get("/task/open-incidents")]
pub fn get_open_incidents(user: AuthUser) -> JsonResult {
    require_role(&user, &[Role::Admin, Role::Coordinator])?;

    let incidents = db::get_active_incidents()
        .map_err(|err| Custom(Status::InternalServerError, err.to_string()))?;
    let volunteers = db::get_available_volunteers()
        .map_err(|err| Custom(Status::InternalServerError, err.to_string()))?;

    let incident_parts = incidents.iter()
        .map(|i| {
            json!({
                "id": i.id,
                "type": i.kind,
                "severity": i.severity,
                "lat": i.latitude,
                "lng": i.longitude,
                "status": i.status,
                "reported_at": i.reported_at,
            })
        })
        .collect::<Vec<_>>();

    let volunteer_parts = volunteers.iter()
        .map(|v| {
            json!({
                "id": v.id,
                "name": v.username,
                "phone": v.contact,
            })
        })
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "incidents": incident_parts,
        "volunteers": volunteer_parts,
    }).to_string()))
}

#[post("/task/assign", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_assign(form: Option<Form<AssignForm>>, user: AuthUser) -> StringResult {
    require_role(&user, &[Role::Admin, Role::Coordinator])?;

    let form = match form {
        Some(form) => form,
        None => return Err(Custom(Status::BadRequest, "Invalid form".into())),
    };

    let incident = match db::get_incident(form.incident_id) {
        Ok(incident) => incident,
        Err(_) => return Err(Custom(Status::BadRequest, "Incident not found".into())),
    };

    let volunteer = match db::get_user(form.volunteer_id) {
        Ok(ref v) if v.role != Role::Volunteer.as_str() => {
            return Err(Custom(Status::BadRequest, "User is not a volunteer".into()));
        },
        Ok(v) => v,
        Err(_) => return Err(Custom(Status::BadRequest, "Volunteer not found".into())),
    };

    let new_task = db::models::NewTask {
        incident_id: incident.id,
        volunteer_id: volunteer.id,
        status: "assigned".into(),
        created_at: util::now_stamp(),
    };

    let task = match db::insert_task(&new_task) {
        Ok(task) => task,
        Err(err) => return Err(Custom(Status::BadRequest, err.to_string())),
    };

    if let Err(err) = db::update_incident_status(incident.id, "in_progress") {
        warn!("Fail to update incident({}) status: {}", incident.id, err);
    }

    if let Err(err) = incident_sys::refresh_caches() {
        warn!("Fail to refresh incident caches: {}", err);
    }

    // Delivery failure must not fail the assignment.
    if !volunteer.contact.is_empty() {
        let alert_msg = format!(
            "New Task Assigned! Incident ID: {}. Type: {}. Location: {:.4}, {:.4}. Please check the app for details.",
            incident.id, incident.kind, incident.latitude, incident.longitude);

        match alert_sys::send_alert(&volunteer.contact, &alert_msg, true) {
            Ok(_) => info!("Assignment alert sent to volunteer {}", volunteer.id),
            Err(err) => warn!("Fail to alert volunteer {}: {}", volunteer.id, err),
        }
    }

    Ok(task.id.to_string())
}

#[get("/task/mine")]
pub fn get_my_tasks(user: AuthUser) -> JsonResult {
    require_role(&user, &[Role::Volunteer])?;

    let tasks = db::get_tasks_of_volunteer(user.id)
        .map_err(|err| Custom(Status::InternalServerError, err.to_string()))?;

    let parts = tasks.iter()
        .filter_map(|t| {
            // Orphaned tasks are skipped rather than failing the listing.
            db::get_incident(t.incident_id).ok().map(|i| {
                json!({
                    "id": t.id,
                    "status": t.status,
                    "created_at": t.created_at,
                    "incident": {
                        "id": i.id,
                        "type": i.kind,
                        "severity": i.severity,
                        "lat": i.latitude,
                        "lng": i.longitude,
                        "status": i.status,
                    },
                })
            })
        })
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "tasks": parts,
        "size": parts.len(),
    }).to_string()))
}

#[post("/task/status", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_task_status(form: Option<Form<TaskStatusForm>>, user: AuthUser) -> StringResult {
    require_role(&user, &[Role::Volunteer])?;

    let form = match form {
        Some(form) => form,
        None => return Err(Custom(Status::BadRequest, "Invalid form".into())),
    };

    if !is_valid_task_status(&form.status) {
        return Err(Custom(Status::BadRequest, "Invalid status".into()));
    }

    // The volunteer filter keeps one volunteer from touching another's task.
    let updated = db::update_task_status(form.task_id, user.id, &form.status)
        .map_err(|err| Custom(Status::BadRequest, err.to_string()))?;

    if updated == 0 {
        return Err(Custom(Status::NotFound, "Not found".into()));
    }

    if let Some(incident_status) = incident_status_for(&form.status) {
        let result = db::get_task(form.task_id)
            .and_then(|task| db::update_incident_status(task.incident_id, incident_status));

        match result {
            Ok(_) => {
                if let Err(err) = incident_sys::refresh_caches() {
                    warn!("Fail to refresh incident caches: {}", err);
                }
            },
            Err(err) => warn!("Fail to propagate status of task({}): {}", form.task_id, err),
        }
    }

    Ok(updated.to_string())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_whitelist() {
        assert!(is_valid_task_status("open"));
        assert!(is_valid_task_status("in_progress"));
        assert!(is_valid_task_status("closed"));
        assert!(!is_valid_task_status("assigned"));
        assert!(!is_valid_task_status("done"));
        assert!(!is_valid_task_status(""));
    }

    #[test]
    fn incident_follows_task_status() {
        assert_eq!(incident_status_for("closed"), Some("closed"));
        assert_eq!(incident_status_for("in_progress"), Some("in_progress"));
        assert_eq!(incident_status_for("open"), Some("open"));
        assert_eq!(incident_status_for("assigned"), None);
    }
}
