pub mod models;
pub mod schema;


use std::env;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel::result::QueryResult;

use self::models::*;
use self::schema::users::dsl::{self as u_dsl};
use self::schema::incidents::dsl::{self as i_dsl};
use self::schema::tasks::dsl::{self as t_dsl};
use self::schema::resources::dsl::{self as r_dsl};
use self::schema::hospitals::dsl::{self as h_dsl};
use self::schema::shelters::dsl::{self as s_dsl};


no_arg_sql_function!(last_insert_rowid, diesel::sql_types::Integer);


thread_local! {
    static DB_CONN: SqliteConnection = establish_connection();
}


fn establish_connection() -> SqliteConnection {
    let database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "disaster_ops.db".into());
    SqliteConnection::establish(&database_url)
        .expect(&format!("Error connecting to {}", database_url))
}

/// Creates the tables when they do not exist yet.
/// The schema mirrors `schema.rs`.
pub fn init_schema() -> QueryResult<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS users( \
            id INTEGER PRIMARY KEY AUTOINCREMENT, \
            username TEXT NOT NULL UNIQUE, \
            password_hash TEXT NOT NULL, \
            role TEXT NOT NULL, \
            contact TEXT NOT NULL, \
            available INTEGER NOT NULL)",
        "CREATE TABLE IF NOT EXISTS incidents( \
            id INTEGER PRIMARY KEY AUTOINCREMENT, \
            kind TEXT NOT NULL, \
            severity INTEGER NOT NULL, \
            latitude REAL NOT NULL, \
            longitude REAL NOT NULL, \
            status TEXT NOT NULL, \
            reported_at TEXT NOT NULL)",
        "CREATE TABLE IF NOT EXISTS tasks( \
            id INTEGER PRIMARY KEY AUTOINCREMENT, \
            incident_id INTEGER NOT NULL, \
            volunteer_id INTEGER NOT NULL, \
            status TEXT NOT NULL, \
            created_at TEXT NOT NULL)",
        "CREATE TABLE IF NOT EXISTS resources( \
            id INTEGER PRIMARY KEY AUTOINCREMENT, \
            kind TEXT NOT NULL, \
            quantity INTEGER NOT NULL, \
            location TEXT NOT NULL)",
        "CREATE TABLE IF NOT EXISTS hospitals( \
            id INTEGER PRIMARY KEY AUTOINCREMENT, \
            name TEXT NOT NULL, \
            latitude REAL NOT NULL, \
            longitude REAL NOT NULL, \
            capacity INTEGER NOT NULL)",
        "CREATE TABLE IF NOT EXISTS shelters( \
            id INTEGER PRIMARY KEY AUTOINCREMENT, \
            name TEXT NOT NULL, \
            latitude REAL NOT NULL, \
            longitude REAL NOT NULL, \
            capacity INTEGER NOT NULL)",
    ];

    DB_CONN.with(|conn| {
        for stmt in &statements {
            diesel::sql_query(*stmt).execute(conn)?;
        }
        Ok(())
    })
}

fn new_row_id(conn: &SqliteConnection) -> QueryResult<i32> {
    diesel::select(last_insert_rowid).get_result::<i32>(conn)
}


// ---- Users ----

pub fn insert_user(user: &NewUser) -> QueryResult<User> {
    DB_CONN.with(|conn| {
        diesel::insert_into(schema::users::table)
            .values(user)
            .execute(conn)?;
        u_dsl::users.find(new_row_id(conn)?).first(conn)
    })
}

pub fn get_user(id: i32) -> QueryResult<User> {
    DB_CONN.with(|conn| {
        u_dsl::users
            .find(id)
            .first(conn)
    })
}

pub fn get_user_by_name(username: &str) -> QueryResult<User> {
    DB_CONN.with(|conn| {
        u_dsl::users
            .filter(u_dsl::username.eq(username))
            .first(conn)
    })
}

pub fn get_available_volunteers() -> QueryResult<Vec<User>> {
    DB_CONN.with(|conn| {
        u_dsl::users
            .filter(u_dsl::role.eq("volunteer"))
            .filter(u_dsl::available.eq(1))
            .load::<User>(conn)
    })
}

pub fn count_available_volunteers() -> QueryResult<i64> {
    DB_CONN.with(|conn| {
        u_dsl::users
            .filter(u_dsl::role.eq("volunteer"))
            .filter(u_dsl::available.eq(1))
            .count()
            .get_result(conn)
    })
}

pub fn get_volunteer_contacts() -> QueryResult<Vec<String>> {
    DB_CONN.with(|conn| {
        u_dsl::users
            .filter(u_dsl::role.eq("volunteer"))
            .filter(u_dsl::contact.ne(""))
            .select(u_dsl::contact)
            .load::<String>(conn)
    })
}

pub fn get_user_contacts() -> QueryResult<Vec<String>> {
    DB_CONN.with(|conn| {
        u_dsl::users
            .filter(u_dsl::contact.ne(""))
            .select(u_dsl::contact)
            .load::<String>(conn)
    })
}

pub fn count_users() -> QueryResult<i64> {
    DB_CONN.with(|conn| u_dsl::users.count().get_result(conn))
}


// ---- Incidents ----

pub fn insert_incident(incident: &NewIncident) -> QueryResult<Incident> {
    DB_CONN.with(|conn| {
        diesel::insert_into(schema::incidents::table)
            .values(incident)
            .execute(conn)?;
        i_dsl::incidents.find(new_row_id(conn)?).first(conn)
    })
}

pub fn get_incident(id: i32) -> QueryResult<Incident> {
    DB_CONN.with(|conn| {
        i_dsl::incidents
            .find(id)
            .first(conn)
    })
}

pub fn get_incidents() -> QueryResult<Vec<Incident>> {
    DB_CONN.with(|conn| {
        i_dsl::incidents
            .order(i_dsl::reported_at.desc())
            .load::<Incident>(conn)
    })
}

pub fn get_open_incidents() -> QueryResult<Vec<Incident>> {
    DB_CONN.with(|conn| {
        i_dsl::incidents
            .filter(i_dsl::status.eq("open"))
            .order(i_dsl::severity.desc())
            .load::<Incident>(conn)
    })
}

pub fn get_active_incidents() -> QueryResult<Vec<Incident>> {
    DB_CONN.with(|conn| {
        i_dsl::incidents
            .filter(i_dsl::status.eq_any(vec!["open", "in_progress"]))
            .order(i_dsl::severity.desc())
            .load::<Incident>(conn)
    })
}

pub fn update_incident_status(id: i32, status: &str) -> QueryResult<usize> {
    DB_CONN.with(|conn| {
        diesel::update(i_dsl::incidents.find(id))
            .set(i_dsl::status.eq(status))
            .execute(conn)
    })
}

pub fn count_incidents() -> QueryResult<i64> {
    DB_CONN.with(|conn| i_dsl::incidents.count().get_result(conn))
}

pub fn count_open_incidents() -> QueryResult<i64> {
    DB_CONN.with(|conn| {
        i_dsl::incidents
            .filter(i_dsl::status.eq("open"))
            .count()
            .get_result(conn)
    })
}


// ---- Tasks ----

pub fn insert_task(task: &NewTask) -> QueryResult<Task> {
    DB_CONN.with(|conn| {
        diesel::insert_into(schema::tasks::table)
            .values(task)
            .execute(conn)?;
        t_dsl::tasks.find(new_row_id(conn)?).first(conn)
    })
}

pub fn get_task(id: i32) -> QueryResult<Task> {
    DB_CONN.with(|conn| {
        t_dsl::tasks
            .find(id)
            .first(conn)
    })
}

pub fn get_tasks_of_volunteer(volunteer_id: i32) -> QueryResult<Vec<Task>> {
    DB_CONN.with(|conn| {
        t_dsl::tasks
            .filter(t_dsl::volunteer_id.eq(volunteer_id))
            .order(t_dsl::created_at.desc())
            .load::<Task>(conn)
    })
}

pub fn update_task_status(id: i32, volunteer_id: i32, status: &str) -> QueryResult<usize> {
    DB_CONN.with(|conn| {
        diesel::update(t_dsl::tasks
                .filter(t_dsl::id.eq(id))
                .filter(t_dsl::volunteer_id.eq(volunteer_id)))
            .set(t_dsl::status.eq(status))
            .execute(conn)
    })
}


// ---- Resources ----

pub fn insert_resource(resource: &NewResource) -> QueryResult<Resource> {
    DB_CONN.with(|conn| {
        diesel::insert_into(schema::resources::table)
            .values(resource)
            .execute(conn)?;
        r_dsl::resources.find(new_row_id(conn)?).first(conn)
    })
}

pub fn get_resources() -> QueryResult<Vec<Resource>> {
    DB_CONN.with(|conn| {
        r_dsl::resources
            .order(r_dsl::kind.asc())
            .load::<Resource>(conn)
    })
}

pub fn delete_resource(id: i32) -> QueryResult<usize> {
    DB_CONN.with(|conn| {
        diesel::delete(r_dsl::resources.find(id))
            .execute(conn)
    })
}

pub fn count_resources() -> QueryResult<i64> {
    DB_CONN.with(|conn| r_dsl::resources.count().get_result(conn))
}


// ---- Hospitals ----

pub fn insert_hospital(hospital: &NewHospital) -> QueryResult<Hospital> {
    DB_CONN.with(|conn| {
        diesel::insert_into(schema::hospitals::table)
            .values(hospital)
            .execute(conn)?;
        h_dsl::hospitals.find(new_row_id(conn)?).first(conn)
    })
}

pub fn get_hospitals() -> QueryResult<Vec<Hospital>> {
    DB_CONN.with(|conn| h_dsl::hospitals.load::<Hospital>(conn))
}

pub fn delete_hospital(id: i32) -> QueryResult<usize> {
    DB_CONN.with(|conn| {
        diesel::delete(h_dsl::hospitals.find(id))
            .execute(conn)
    })
}

pub fn count_hospitals() -> QueryResult<i64> {
    DB_CONN.with(|conn| h_dsl::hospitals.count().get_result(conn))
}


// ---- Shelters ----

pub fn insert_shelter(shelter: &NewShelter) -> QueryResult<Shelter> {
    DB_CONN.with(|conn| {
        diesel::insert_into(schema::shelters::table)
            .values(shelter)
            .execute(conn)?;
        s_dsl::shelters.find(new_row_id(conn)?).first(conn)
    })
}

pub fn get_shelters() -> QueryResult<Vec<Shelter>> {
    DB_CONN.with(|conn| s_dsl::shelters.load::<Shelter>(conn))
}

pub fn delete_shelter(id: i32) -> QueryResult<usize> {
    DB_CONN.with(|conn| {
        diesel::delete(s_dsl::shelters.find(id))
            .execute(conn)
    })
}

pub fn count_shelters() -> QueryResult<i64> {
    DB_CONN.with(|conn| s_dsl::shelters.count().get_result(conn))
}
