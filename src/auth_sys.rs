use std::{
    sync::Mutex,
    collections::HashMap,
    time::{Instant, Duration},
};
use rocket::{
    Outcome,
    http::{Cookie, Cookies, Status},
    request::{self, Form, FromRequest, Request},
    response::status::Custom,
};

use crate::db;
use crate::util;


type StringResult = Result<String, Custom<String>>;


lazy_static! {
    static ref SESSION_MAP: Mutex<HashMap<String, Session>> = {
        Mutex::new(HashMap::new())
    };
}

const SESSION_COOKIE: &'static str = "session_id";
const MAX_MAP_SIZE: usize = 512;
const VALID_SESSION_DURATION: u64 = 12 * 60 * 60; // seconds
const PASSWORD_HASH_SALT: &'static str = "~~ disaster ops 17 2209";


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Admin,
    Coordinator,
    Reporter,
    Volunteer,
    Viewer,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "coordinator" => Some(Role::Coordinator),
            "reporter" => Some(Role::Reporter),
            "volunteer" => Some(Role::Volunteer),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Coordinator => "coordinator",
            Role::Reporter => "reporter",
            Role::Volunteer => "volunteer",
            Role::Viewer => "viewer",
        }
    }
}


#[derive(Clone)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub contact: String,
}

impl<'a, 'r> FromRequest<'a, 'r> for AuthUser {
    type Error = ();

    fn from_request(request: &'a Request<'r>) -> request::Outcome<Self, Self::Error> {
        let mut cookies = request.cookies();

        match cookies.get_private(SESSION_COOKIE) {
            Some(cookie) => match take_valid_session(cookie.value()) {
                Some(user) => Outcome::Success(user),
                None => Outcome::Failure((Status::Unauthorized, ())),
            },
            None => Outcome::Failure((Status::Unauthorized, ())),
        }
    }
}


struct Session {
    user: AuthUser,
    created_time: Instant,
}

impl Session {
    fn new(user: AuthUser) -> Self {
        Session {
            user,
            created_time: Instant::now(),
        }
    }

    fn is_valid(&self) -> bool {
        self.created_time.elapsed() <= Duration::new(VALID_SESSION_DURATION, 0)
    }
}


/// Checks that the caller's role is one of the permitted ones.
pub fn require_role(user: &AuthUser, roles: &[Role]) -> Result<(), Custom<String>> {
    if roles.contains(&user.role) {
        Ok(())
    }
    else {
        Err(Custom(Status::Forbidden, "This action is not permitted for your role".into()))
    }
}

pub fn hash_password(pwd: &str) -> String {
    let salted_pwd = pwd.to_owned() + PASSWORD_HASH_SALT;
    util::calculate_hash(&salted_pwd).to_string()
}

fn take_valid_session(token: &str) -> Option<AuthUser> {
    let mut map = SESSION_MAP.lock().unwrap();

    if let Some(session) = map.get(token) {
        if session.is_valid() {
            return Some(session.user.clone());
        }
    }

    // Expired or unknown.
    map.remove(token);
    None
}

fn create_session(user: AuthUser) -> String {
    loop {
        let token = util::generate_rand_id(32);
        let mut map = SESSION_MAP.lock().unwrap();

        if !map.contains_key(&token) {
            map.insert(token.clone(), Session::new(user));

            // Drop expired sessions once the map grows beyond its bound.
            if map.len() > MAX_MAP_SIZE {
                map.retain(|_, v| v.is_valid());
            }

            break token;
        }
    }
}

fn remove_session(token: &str) {
    SESSION_MAP.lock().unwrap().remove(token);
}


#[derive(FromForm)]
pub struct LoginForm {
    username: String,
    password: String,
}


#[derive(FromForm)]
pub struct RegisterForm {
    username: String,
    password: String,
    role: String,
    // The one optional register field.
    contact: Option<String>,
}

impl RegisterForm {
    fn verify_error(&self) -> Option<&'static str> {
        if self.username.find(char::is_whitespace).is_some() {
            Some("The username can not contain spaces")
        }
        else if self.username.len() < 2 {
            Some("Username must be at least 2 characters")
        }
        else if self.username.len() > 24 {
            Some("Username can not be longer than 24 characters")
        }
        else if self.password.len() < 4 {
            Some("Password must be at least 4 characters")
        }
        else if Role::from_str(&self.role).is_none() {
            Some("Invalid role")
        }
        else if self.contact.as_ref().map_or(false, |c| c.len() > 20) {
            Some("The maximum length of the contact is 20")
        }
        else {
            None
        }
    }
}


pub fn init_auth_sys() {
    let user_cnt = db::count_users()
        .expect("Fail to count users");

    if user_cnt == 0 {
        let defaults = [
            ("admin", "admin123", Role::Admin, "+1234567890", 0),
            ("reporter1", "reporter123", Role::Reporter, "+1234567891", 0),
            ("volunteer1", "volunteer123", Role::Volunteer, "+1234567892", 1),
            ("viewer1", "viewer123", Role::Viewer, "", 0),
            ("coordinator1", "coord123", Role::Coordinator, "+1234567893", 0),
            ("aarav", "volunteer123", Role::Volunteer, "+919000000011", 1),
            ("diya", "volunteer123", Role::Volunteer, "+919000000012", 1),
            ("kabir", "volunteer123", Role::Volunteer, "+919000000013", 1),
            ("meera", "volunteer123", Role::Volunteer, "+919000000014", 1),
        ];

        for &(name, pwd, role, contact, available) in &defaults {
            db::insert_user(&db::models::NewUser {
                username: name.into(),
                password_hash: hash_password(pwd),
                role: role.as_str().into(),
                contact: contact.into(),
                available,
            }).expect("Fail to seed users");
        }

        info!("Seeded {} default accounts", defaults.len());
    }
}

#[post("/login", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_login(form: Option<Form<LoginForm>>, mut cookies: Cookies) -> StringResult {
    let form = match form {
        Some(form) => form,
        None => return Err(Custom(Status::BadRequest, "Invalid form".into())),
    };

    let user = match db::get_user_by_name(&form.username) {
        Ok(user) => user,
        Err(_) => return Err(Custom(Status::Unauthorized, "Invalid credentials".into())),
    };

    if user.password_hash != hash_password(&form.password) {
        return Err(Custom(Status::Unauthorized, "Invalid credentials".into()));
    }

    let role = match Role::from_str(&user.role) {
        Some(role) => role,
        None => return Err(Custom(Status::InternalServerError, "Unknown role".into())),
    };

    let token = create_session(AuthUser {
        id: user.id,
        username: user.username,
        role,
        contact: user.contact,
    });
    cookies.add_private(Cookie::new(SESSION_COOKIE, token));

    Ok(role.as_str().into())
}

#[post("/logout")]
pub fn post_logout(mut cookies: Cookies) -> String {
    if let Some(cookie) = cookies.get_private(SESSION_COOKIE) {
        remove_session(cookie.value());
        cookies.remove_private(cookie);
    }

    "ok".into()
}

#[post("/register", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_register(form: Option<Form<RegisterForm>>) -> StringResult {
    let form = match form {
        Some(form) => form,
        None => return Err(Custom(Status::BadRequest, "Invalid form".into())),
    };

    if let Some(err) = form.verify_error() {
        return Err(Custom(Status::BadRequest, err.to_string()));
    }

    if db::get_user_by_name(&form.username).is_ok() {
        return Err(Custom(Status::BadRequest, "Username already exists".into()));
    }

    let role = Role::from_str(&form.role).unwrap();

    let result = db::insert_user(&db::models::NewUser {
        username: form.username.clone(),
        password_hash: hash_password(&form.password),
        role: role.as_str().into(),
        contact: form.contact.clone().unwrap_or_default(),
        available: if role == Role::Volunteer { 1 } else { 0 },
    });

    match result {
        Ok(user) => Ok(user.id.to_string()),
        Err(err) => Err(Custom(Status::BadRequest, err.to_string())),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: Role) -> AuthUser {
        AuthUser {
            id: 1,
            username: "tester".into(),
            role,
            contact: "+10000000000".into(),
        }
    }

    #[test]
    fn role_round_trips_through_strings() {
        for name in &["admin", "coordinator", "reporter", "volunteer", "viewer"] {
            let role = Role::from_str(name).unwrap();
            assert_eq!(role.as_str(), *name);
        }
        assert!(Role::from_str("root").is_none());
        assert!(Role::from_str("Admin").is_none());
    }

    #[test]
    fn role_check_rejects_other_roles() {
        let coordinator = user_with_role(Role::Coordinator);
        assert!(require_role(&coordinator, &[Role::Admin, Role::Coordinator]).is_ok());

        let viewer = user_with_role(Role::Viewer);
        assert!(require_role(&viewer, &[Role::Admin, Role::Coordinator]).is_err());

        let volunteer = user_with_role(Role::Volunteer);
        assert!(require_role(&volunteer, &[Role::Admin, Role::Reporter]).is_err());
    }

    #[test]
    fn password_hash_is_salted_and_stable() {
        assert_eq!(hash_password("admin123"), hash_password("admin123"));
        assert_ne!(hash_password("admin123"), hash_password("admin124"));
        assert_ne!(hash_password("admin123"), util::calculate_hash(&"admin123").to_string());
    }

    #[test]
    fn register_form_validation() {
        let mut form = RegisterForm {
            username: "newuser".into(),
            password: "pass1234".into(),
            role: "reporter".into(),
            contact: Some("+911234567890".into()),
        };
        assert!(form.verify_error().is_none());

        form.username = "a".into();
        assert!(form.verify_error().is_some());

        form.username = "has space".into();
        assert!(form.verify_error().is_some());

        form.username = "newuser".into();
        form.role = "superuser".into();
        assert!(form.verify_error().is_some());

        form.role = "viewer".into();
        form.password = "abc".into();
        assert!(form.verify_error().is_some());
    }

    #[test]
    fn register_contact_is_optional() {
        let mut form = RegisterForm {
            username: "newuser".into(),
            password: "pass1234".into(),
            role: "viewer".into(),
            contact: None,
        };
        assert!(form.verify_error().is_none());

        form.contact = Some("".into());
        assert!(form.verify_error().is_none());

        form.contact = Some("0".repeat(21));
        assert!(form.verify_error().is_some());
    }

    #[test]
    fn expired_sessions_are_invalid() {
        // Backdating can fail on a freshly booted machine; skip in that case.
        let backdated = Instant::now()
            .checked_sub(Duration::new(VALID_SESSION_DURATION + 1, 0));
        if let Some(created_time) = backdated {
            let session = Session {
                user: user_with_role(Role::Viewer),
                created_time,
            };
            assert!(!session.is_valid());
        }

        let fresh = Session::new(user_with_role(Role::Viewer));
        assert!(fresh.is_valid());
    }
}
