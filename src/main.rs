#![feature(proc_macro_hygiene, decl_macro)]


#[macro_use] extern crate lazy_static;
#[macro_use] extern crate rocket;
#[macro_use] extern crate diesel;
#[macro_use] extern crate log;


mod db;
mod util;
mod logger;
mod task_scheduler;
mod auth_sys;
mod incident_sys;
mod task_sys;
mod resource_sys;
mod facility_sys;
mod alert_sys;
mod cap_sys;


use std::{env, env::VarError};
use std::path::{Path, PathBuf};
use std::fs::create_dir_all;
use rocket::response::NamedFile;

use task_scheduler::TaskSchedulerBuilder;


const STATIC_DIR: &'static str = "static/";
const TEST_DIR: &'static str = "test/";


#[get("/")]
fn index() -> &'static str {
    "Disaster Ops Server"
}

#[get("/<file..>")]
fn get_static_file(file: PathBuf) -> Option<NamedFile> {
    NamedFile::open(Path::new(STATIC_DIR).join(file)).ok()
}

#[get("/<file..>")]
fn get_test_file(file: PathBuf) -> Option<NamedFile> {
    NamedFile::open(Path::new(TEST_DIR).join(file)).ok()
}


fn init_logger() -> Option<sentry::ClientInitGuard> {
    let guard = match env::var("SENTRY_DSN") {
        Ok(dsn) => Some(sentry::init(dsn)),
        Err(_) => None,
    };

    let sentry_logger = sentry_log::SentryLogger::with_dest(logger::Logger);
    log::set_boxed_logger(Box::new(sentry_logger))
        .expect("Fail to set logger");
    log::set_max_level(log::LevelFilter::Info);

    guard
}

fn main() {
    let _sentry = init_logger();

    let rocket_env = env::var("ROCKET_ENV")
        .or_else(|_| -> Result<String, VarError> {
            if cfg!(debug_assertions) {
                Ok("development".into())
            }
            else {
                Ok("production".into())
            }
        }).unwrap();

    create_dir_all(Path::new(STATIC_DIR))
        .expect("Initial directory creation failed.");

    db::init_schema()
        .expect("Fail to initialize database schema");

    let mut scheduler = TaskSchedulerBuilder::new();
    auth_sys::init_auth_sys();
    resource_sys::init_resource_sys();
    incident_sys::init_incident_sys(&mut scheduler);
    facility_sys::init_facility_sys(&mut scheduler);
    cap_sys::init_cap_sys(&mut scheduler);
    let scheduler = scheduler.build();

    let dbg_envs = ["dev", "development", "staging", "stage"];
    if dbg_envs.iter().any(|&v| v == rocket_env) {
        // Debug
        rocket::ignite()
            .mount(&format!("/{}", TEST_DIR), routes![get_test_file])
    }
    else {
        // Release
        rocket::ignite()
    }
    .mount("/", routes![index])
    .mount(&format!("/{}", STATIC_DIR), routes![get_static_file])
    .mount("/", routes![
        auth_sys::post_login,
        auth_sys::post_logout,
        auth_sys::post_register,
    ])
    .mount("/", routes![
        incident_sys::get_incident,
        incident_sys::post_incident,
        incident_sys::get_incident_map,
        incident_sys::get_hotspot_map,
        incident_sys::get_kpis,
    ])
    .mount("/", routes![
        task_sys::get_open_incidents,
        task_sys::post_assign,
        task_sys::get_my_tasks,
        task_sys::post_task_status,
    ])
    .mount("/", routes![
        resource_sys::get_resources,
        resource_sys::post_resource,
        resource_sys::delete_resource,
    ])
    .mount("/", routes![
        facility_sys::get_hospital_map,
        facility_sys::get_shelter_map,
        facility_sys::post_hospital,
        facility_sys::delete_hospital,
        facility_sys::post_shelter,
        facility_sys::delete_shelter,
    ])
    .mount("/", routes![
        alert_sys::get_alert_status,
        alert_sys::post_alert,
    ])
    .mount("/", routes![
        cap_sys::get_cap_alert_map,
    ])
    .launch();

    scheduler.join();
}
