use std::{
    fs,
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
use serde_json::{json, Value as JsonValue};

use crate::db::{self, models::{Hospital, Shelter}};
use crate::auth_sys::{AuthUser, Role, require_role};
use crate::task_scheduler::{Task, TaskSchedulerBuilder};


type StringResult = Result<String, Custom<String>>;


lazy_static! {
    static ref HOSPITAL_DATA: RwLock<String> = {
        RwLock::new(String::new())
    };
    static ref SHELTER_DATA: RwLock<String> = {
        RwLock::new(String::new())
    };
}

const FACILITY_FILE: &'static str = "data/facilities.json";
const REFRESH_PERIOD: u64 = 5 * 60; // seconds
const RETRY_PERIOD: u64 = 60; // seconds


#[derive(FromForm)]
pub struct FacilityForm {
    name: String,
    latitude: f64,
    longitude: f64,
    capacity: i32,
}

impl FacilityForm {
    fn verify_error(&self) -> Option<&'static str> {
        if self.name.chars().count() < 2 {
            Some("Name must be at least 2 characters")
        }
        else if self.name.chars().count() > 64 {
            Some("Name can not be longer than 64 characters")
        }
        else if self.latitude < -90.0 || self.latitude > 90.0 {
            Some("Invalid latitude")
        }
        else if self.longitude < -180.0 || self.longitude > 180.0 {
            Some("Invalid longitude")
        }
        else if self.capacity < 0 {
            Some("Capacity can not be negative")
        }
        else {
            None
        }
    }
}


pub fn init_facility_sys(scheduler: &mut TaskSchedulerBuilder) {
    init_db_and_facilities();

    refresh_caches()
        .expect("Fail to build facility caches");

    scheduler.add_task(Task::new(facility_job, Duration::new(REFRESH_PERIOD, 0)));
}

fn facility_job() -> Duration {
    info!("Start job");

    match refresh_caches() {
        Ok(_) => Duration::new(REFRESH_PERIOD, 0),
        Err(err) => {
            warn!("Fail to refresh facility caches: {}", err);
            Duration::new(RETRY_PERIOD, 0)
        },
    }
}

/// Rebuilds the hospital and shelter map documents from the database.
/// Called by the scheduler job and after every facility mutation.
fn refresh_caches() -> Result<(), String> {
    let hospitals = db::get_hospitals()
        .map_err(|err| err.to_string())?;
    *HOSPITAL_DATA.write().unwrap() = build_hospital_data(&hospitals);

    let shelters = db::get_shelters()
        .map_err(|err| err.to_string())?;
    *SHELTER_DATA.write().unwrap() = build_shelter_data(&shelters);

    Ok(())
}

fn init_db_and_facilities() {
    let hospital_cnt = db::count_hospitals()
        .expect("Fail to count hospitals");
    let shelter_cnt = db::count_shelters()
        .expect("Fail to count shelters");

    if hospital_cnt > 0 && shelter_cnt > 0 {
        return;
    }

    let data: JsonValue = serde_json::from_str(&fs::read_to_string(FACILITY_FILE)
        .expect("Can't find facilities.json"))
        .expect("Can't parse facilities.json");

    if hospital_cnt == 0 {
        let hospitals = data.get("hospitals").expect("Can't find hospitals property")
            .as_array().unwrap();

        for val in hospitals {
            db::insert_hospital(&db::models::NewHospital {
                name: val.get("name").and_then(|v| v.as_str()).unwrap().to_owned(),
                latitude: val.get("latitude").and_then(|v| v.as_f64()).unwrap(),
                longitude: val.get("longitude").and_then(|v| v.as_f64()).unwrap(),
                capacity: val.get("capacity").and_then(|v| v.as_i64()).unwrap() as i32,
            }).expect("Fail to seed hospitals");
        }
    }

    if shelter_cnt == 0 {
        let shelters = data.get("shelters").expect("Can't find shelters property")
            .as_array().unwrap();

        for val in shelters {
            db::insert_shelter(&db::models::NewShelter {
                name: val.get("name").and_then(|v| v.as_str()).unwrap().to_owned(),
                latitude: val.get("latitude").and_then(|v| v.as_f64()).unwrap(),
                longitude: val.get("longitude").and_then(|v| v.as_f64()).unwrap(),
                capacity: val.get("capacity").and_then(|v| v.as_i64()).unwrap() as i32,
            }).expect("Fail to seed shelters");
        }
    }
}

fn build_hospital_data(hospitals: &[Hospital]) -> String {
    let parts = hospitals.iter()
        .map(|h| {
            json!({
                "id": h.id,
                "name": h.name,
                "lat": h.latitude,
                "lng": h.longitude,
                "capacity": h.capacity,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "hospitals": parts,
        "size": parts.len(),
    }).to_string()
}

fn build_shelter_data(shelters: &[Shelter]) -> String {
    let parts = shelters.iter()
        .map(|s| {
            json!({
                "id": s.id,
                "name": s.name,
                "lat": s.latitude,
                "lng": s.longitude,
                "capacity": s.capacity,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "shelters": parts,
        "size": parts.len(),
    }).to_string()
}

#[get("/api/hospitals")]
pub fn get_hospital_map() -> Json<String> {
    Json(HOSPITAL_DATA.read().unwrap().clone())
}

#[get("/api/shelters")]
pub fn get_shelter_map() -> Json<String> {
    Json(SHELTER_DATA.read().unwrap().clone())
}

#[post("/hospital", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_hospital(form: Option<Form<FacilityForm>>, user: AuthUser) -> StringResult {
    require_role(&user, &[Role::Admin])?;

    let form = match form {
        Some(form) => form,
        None => return Err(Custom(Status::BadRequest, "Invalid form".into())),
    };

    if let Some(err) = form.verify_error() {
        return Err(Custom(Status::BadRequest, err.to_string()));
    }

    let result = db::insert_hospital(&db::models::NewHospital {
        name: form.name.clone(),
        latitude: form.latitude,
        longitude: form.longitude,
        capacity: form.capacity,
    });

    match result {
        Ok(hospital) => {
            if let Err(err) = refresh_caches() {
                warn!("Fail to refresh facility caches: {}", err);
            }

            Ok(hospital.id.to_string())
        },
        Err(err) => Err(Custom(Status::BadRequest, err.to_string())),
    }
}

#[delete("/hospital?<id>")]
pub fn delete_hospital(id: i32, user: AuthUser) -> StringResult {
    require_role(&user, &[Role::Admin])?;

    match db::delete_hospital(id) {
        Ok(cnt) if cnt > 0 => {
            if let Err(err) = refresh_caches() {
                warn!("Fail to refresh facility caches: {}", err);
            }

            Ok(cnt.to_string())
        },
        Ok(_) => Err(Custom(Status::NotFound, "Not found".into())),
        Err(err) => Err(Custom(Status::BadRequest, err.to_string())),
    }
}

#[post("/shelter", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_shelter(form: Option<Form<FacilityForm>>, user: AuthUser) -> StringResult {
    require_role(&user, &[Role::Admin])?;

    let form = match form {
        Some(form) => form,
        None => return Err(Custom(Status::BadRequest, "Invalid form".into())),
    };

    if let Some(err) = form.verify_error() {
        return Err(Custom(Status::BadRequest, err.to_string()));
    }

    let result = db::insert_shelter(&db::models::NewShelter {
        name: form.name.clone(),
        latitude: form.latitude,
        longitude: form.longitude,
        capacity: form.capacity,
    });

    match result {
        Ok(shelter) => {
            if let Err(err) = refresh_caches() {
                warn!("Fail to refresh facility caches: {}", err);
            }

            Ok(shelter.id.to_string())
        },
        Err(err) => Err(Custom(Status::BadRequest, err.to_string())),
    }
}

#[delete("/shelter?<id>")]
pub fn delete_shelter(id: i32, user: AuthUser) -> StringResult {
    require_role(&user, &[Role::Admin])?;

    match db::delete_shelter(id) {
        Ok(cnt) if cnt > 0 => {
            if let Err(err) = refresh_caches() {
                warn!("Fail to refresh facility caches: {}", err);
            }

            Ok(cnt.to_string())
        },
        Ok(_) => Err(Custom(Status::NotFound, "Not found".into())),
        Err(err) => Err(Custom(Status::BadRequest, err.to_string())),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facility_form_validation() {
        let mut form = FacilityForm {
            name: "AIIMS Rishikesh".into(),
            latitude: 30.153,
            longitude: 78.292,
            capacity: 800,
        };
        assert!(form.verify_error().is_none());

        form.name = "A".into();
        assert!(form.verify_error().is_some());

        form.name = "KGMU Lucknow".into();
        form.latitude = -90.5;
        assert!(form.verify_error().is_some());

        form.latitude = 26.872;
        form.capacity = -1;
        assert!(form.verify_error().is_some());
    }

    #[test]
    fn facility_documents_carry_coordinates() {
        let hospitals = vec![Hospital {
            id: 1,
            name: "Apollo Delhi".into(),
            latitude: 28.544,
            longitude: 77.281,
            capacity: 900,
        }];
        let doc: serde_json::Value = serde_json::from_str(&build_hospital_data(&hospitals)).unwrap();
        assert_eq!(doc["size"], 1);
        assert_eq!(doc["hospitals"][0]["name"], "Apollo Delhi");
        assert_eq!(doc["hospitals"][0]["lat"], 28.544);
        assert_eq!(doc["hospitals"][0]["capacity"], 900);

        let shelters = vec![Shelter {
            id: 7,
            name: "Dehradun Stadium".into(),
            latitude: 30.316,
            longitude: 78.032,
            capacity: 2000,
        }];
        let doc: serde_json::Value = serde_json::from_str(&build_shelter_data(&shelters)).unwrap();
        assert_eq!(doc["shelters"][0]["id"], 7);
        assert_eq!(doc["shelters"][0]["lng"], 78.032);
    }
}
