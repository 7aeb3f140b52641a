use super::schema::{users, incidents, tasks, resources, hospitals, shelters};


#[derive(Queryable, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub contact: String,
    pub available: i32,
}

#[derive(Insertable)]
#[table_name="users"]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub contact: String,
    pub available: i32,
}

#[derive(Queryable, Clone)]
pub struct Incident {
    pub id: i32,
    pub kind: String,
    pub severity: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub status: String,
    pub reported_at: String,
}

#[derive(Insertable)]
#[table_name="incidents"]
pub struct NewIncident {
    pub kind: String,
    pub severity: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub status: String,
    pub reported_at: String,
}

#[derive(Queryable, Clone)]
pub struct Task {
    pub id: i32,
    pub incident_id: i32,
    pub volunteer_id: i32,
    pub status: String,
    pub created_at: String,
}

#[derive(Insertable)]
#[table_name="tasks"]
pub struct NewTask {
    pub incident_id: i32,
    pub volunteer_id: i32,
    pub status: String,
    pub created_at: String,
}

#[derive(Queryable, Clone)]
pub struct Resource {
    pub id: i32,
    pub kind: String,
    pub quantity: i32,
    pub location: String,
}

#[derive(Insertable)]
#[table_name="resources"]
pub struct NewResource {
    pub kind: String,
    pub quantity: i32,
    pub location: String,
}

#[derive(Queryable, Clone)]
pub struct Hospital {
    pub id: i32,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: i32,
}

#[derive(Insertable)]
#[table_name="hospitals"]
pub struct NewHospital {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: i32,
}

#[derive(Queryable, Clone)]
pub struct Shelter {
    pub id: i32,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: i32,
}

#[derive(Insertable)]
#[table_name="shelters"]
pub struct NewShelter {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: i32,
}
