use std::{
    sync::RwLock,
    time::Duration,
};
use rocket::{
    http::Status,
    request::Form,
    response::{
        content::Json,
        status::Custom,
    },
};
use serde_json::json;

use crate::db::{self, models::Incident};
use crate::util;
use crate::auth_sys::{AuthUser, Role, require_role};
use crate::task_scheduler::{Task, TaskSchedulerBuilder};


type JsonResult = Result<Json<String>, Custom<String>>;
type StringResult = Result<String, Custom<String>>;


lazy_static! {
    static ref INCIDENT_MAP_CACHE: RwLock<String> = {
        RwLock::new(String::new())
    };
    static ref HOTSPOT_MAP_CACHE: RwLock<String> = {
        RwLock::new(String::new())
    };
}

const REFRESH_PERIOD: u64 = 30; // seconds
const RETRY_PERIOD: u64 = 2; // seconds


#[derive(FromForm)]
pub struct IncidentForm {
    kind: String,
    severity: i32,
    latitude: f64,
    longitude: f64,
}

impl IncidentForm {
    fn verify_error(&self) -> Option<&'static str> {
        if self.kind.is_empty() {
            Some("The incident type can not be empty")
        }
        else if self.kind.chars().count() > 64 {
            Some("The incident type can not be longer than 64 characters")
        }
        else if self.severity < 1 || self.severity > 5 {
            Some("Severity must be between 1 and 5")
        }
        else if self.latitude < -90.0 || self.latitude > 90.0 {
            Some("Invalid latitude")
        }
        else if self.longitude < -180.0 || self.longitude > 180.0 {
            Some("Invalid longitude")
        }
        else {
            None
        }
    }
}


pub fn init_incident_sys(scheduler: &mut TaskSchedulerBuilder) {
    seed_incidents();

    refresh_caches()
        .expect("Fail to build incident caches");

    scheduler.add_task(Task::new(incident_job, Duration::new(REFRESH_PERIOD, 0)));
}

fn seed_incidents() {
    let cnt = db::count_incidents()
        .expect("Fail to count incidents");

    if cnt == 0 {
        let samples = [
            ("Debris Removal", 4, 28.62, 77.22, "open"),
            ("Medical Aid", 5, 26.86, 80.96, "open"),
            ("Shelter Request", 3, 30.33, 78.04, "closed"),
            ("Search & Rescue", 5, 28.53, 77.39, "in_progress"),
            ("Resource Request", 2, 19.09, 72.89, "open"),
        ];

        for &(kind, severity, lat, lng, status) in &samples {
            db::insert_incident(&db::models::NewIncident {
                kind: kind.into(),
                severity,
                latitude: lat,
                longitude: lng,
                status: status.into(),
                reported_at: util::now_stamp(),
            }).expect("Fail to seed incidents");
        }
    }
}

fn incident_job() -> Duration {
    info!("Start job");

    match refresh_caches() {
        Ok(_) => Duration::new(REFRESH_PERIOD, 0),
        Err(err) => {
            warn!("Fail to refresh incident caches: {}", err);
            Duration::new(RETRY_PERIOD, 0)
        },
    }
}

/// Rebuilds the incident and hotspot map documents from the database.
/// Called by the scheduler job and after every incident mutation.
pub fn refresh_caches() -> Result<(), String> {
    let incidents = db::get_incidents()
        .map_err(|err| err.to_string())?;
    *INCIDENT_MAP_CACHE.write().unwrap() = build_incident_map(&incidents);

    let open = db::get_open_incidents()
        .map_err(|err| err.to_string())?;
    *HOTSPOT_MAP_CACHE.write().unwrap() = build_hotspot_map(&open);

    Ok(())
}

fn build_incident_map(incidents: &[Incident]) -> String {
    let parts = incidents.iter()
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

    json!({
        "incidents": parts,
        "size": parts.len(),
    }).to_string()
}

fn build_hotspot_map(open_incidents: &[Incident]) -> String {
    // Severity doubles as the heat-map weight.
    let parts = open_incidents.iter()
        .map(|i| {
            json!({
                "lat": i.latitude,
                "lng": i.longitude,
                "w": i.severity,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "hotspots": parts,
        "size": parts.len(),
    }).to_string()
}

#[get("/api/incidents")]
pub fn get_incident_map() -> Json<String> {
    Json(INCIDENT_MAP_CACHE.read().unwrap().clone())
}

#[get("/api/hotspots")]
pub fn get_hotspot_map() -> Json<String> {
    Json(HOTSPOT_MAP_CACHE.read().unwrap().clone())
}

#[get("/incident?<id>")]
pub fn get_incident(id: i32, _user: AuthUser) -> JsonResult {
    match db::get_incident(id) {
        Ok(i) => Ok(Json(json!({
            "id": i.id,
            "type": i.kind,
            "severity": i.severity,
            "lat": i.latitude,
            "lng": i.longitude,
            "status": i.status,
            "reported_at": i.reported_at,
        }).to_string())),
        Err(_) => Err(Custom(Status::NotFound, "Not found".into())),
    }
}

#[post("/incident", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_incident(form: Option<Form<IncidentForm>>, user: AuthUser) -> StringResult {
    require_role(&user, &[Role::Admin, Role::Reporter])?;

    let form = match form {
        Some(form) => form,
        None => return Err(Custom(Status::BadRequest, "Invalid form".into())),
    };

    if let Some(err) = form.verify_error() {
        return Err(Custom(Status::BadRequest, err.to_string()));
    }

    let new_incident = db::models::NewIncident {
        kind: form.kind.clone(),
        severity: form.severity,
        latitude: form.latitude,
        longitude: form.longitude,
        status: "open".into(),
        reported_at: util::now_stamp(),
    };

    match db::insert_incident(&new_incident) {
        Ok(incident) => {
            if let Err(err) = refresh_caches() {
                warn!("Fail to refresh incident caches: {}", err);
            }

            Ok(incident.id.to_string())
        },
        Err(err) => Err(Custom(Status::BadRequest, err.to_string())),
    }
}

#[get("/api/kpis")]
pub fn get_kpis(user: AuthUser) -> JsonResult {
    require_role(&user, &[Role::Admin, Role::Reporter, Role::Coordinator, Role::Viewer])?;

    let totals = db::count_incidents()
        .and_then(|total| db::count_open_incidents().map(|open| (total, open)))
        .and_then(|(total, open)| db::count_available_volunteers()
            .map(|vols| (total, open, vols)))
        .and_then(|(total, open, vols)| db::count_resources()
            .map(|res| (total, open, vols, res)));

    match totals {
        Ok((total, open, vols, res)) => Ok(Json(json!({
            "total_incidents": total,
            "open_incidents": open,
            "volunteers": vols,
            "resources": res,
        }).to_string())),
        Err(err) => Err(Custom(Status::InternalServerError, err.to_string())),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn incident(id: i32, severity: i32, status: &str) -> Incident {
        Incident {
            id,
            kind: "Debris Removal".into(),
            severity,
            latitude: 28.62,
            longitude: 77.22,
            status: status.into(),
            reported_at: "2026-08-24 10:00:00".into(),
        }
    }

    #[test]
    fn incident_form_bounds() {
        let mut form = IncidentForm {
            kind: "Medical Aid".into(),
            severity: 3,
            latitude: 26.86,
            longitude: 80.96,
        };
        assert!(form.verify_error().is_none());

        form.severity = 0;
        assert!(form.verify_error().is_some());
        form.severity = 6;
        assert!(form.verify_error().is_some());
        form.severity = 5;
        assert!(form.verify_error().is_none());

        form.latitude = 91.0;
        assert!(form.verify_error().is_some());
        form.latitude = -26.86;
        form.longitude = -180.5;
        assert!(form.verify_error().is_some());

        form.longitude = 80.96;
        form.kind = "".into();
        assert!(form.verify_error().is_some());
    }

    #[test]
    fn incident_kind_limit_counts_characters() {
        let mut form = IncidentForm {
            kind: "\u{5316}".repeat(64), // 3 bytes per char
            severity: 3,
            latitude: 26.86,
            longitude: 80.96,
        };
        assert!(form.verify_error().is_none());

        form.kind = "\u{5316}".repeat(65);
        assert!(form.verify_error().is_some());
    }

    #[test]
    fn incident_map_keeps_field_values() {
        let incidents = vec![incident(1, 4, "open"), incident(2, 2, "closed")];
        let doc: serde_json::Value = serde_json::from_str(&build_incident_map(&incidents)).unwrap();

        assert_eq!(doc["size"], 2);
        assert_eq!(doc["incidents"][0]["id"], 1);
        assert_eq!(doc["incidents"][0]["type"], "Debris Removal");
        assert_eq!(doc["incidents"][0]["severity"], 4);
        assert_eq!(doc["incidents"][0]["lat"], 28.62);
        assert_eq!(doc["incidents"][0]["lng"], 77.22);
        assert_eq!(doc["incidents"][0]["status"], "open");
        assert_eq!(doc["incidents"][0]["reported_at"], "2026-08-24 10:00:00");
        assert_eq!(doc["incidents"][1]["status"], "closed");
    }

    #[test]
    fn hotspot_weight_is_severity() {
        let open = vec![incident(1, 5, "open"), incident(2, 1, "open")];
        let doc: serde_json::Value = serde_json::from_str(&build_hotspot_map(&open)).unwrap();

        assert_eq!(doc["size"], 2);
        assert_eq!(doc["hotspots"][0]["w"], 5);
        assert_eq!(doc["hotspots"][1]["w"], 1);
        assert!(doc["hotspots"][0].get("status").is_none());
    }

    #[test]
    fn empty_hotspot_map_is_well_formed() {
        let doc: serde_json::Value = serde_json::from_str(&build_hotspot_map(&[])).unwrap();
        assert_eq!(doc["size"], 0);
        assert_eq!(doc["hotspots"].as_array().unwrap().len(), 0);
    }
}
