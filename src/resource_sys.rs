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
use crate::auth_sys::{AuthUser, Role, require_role};


type JsonResult = Result<Json<String>, Custom<String>>;
type StringResult = Result<String, Custom<String>>;


#[derive(FromForm)]
pub struct ResourceForm {
    kind: String,
    quantity: i32,
    location: String,
}

impl ResourceForm {
    fn verify_error(&self) -> Option<&'static str> {
        if self.kind.is_empty() {
            Some("The resource type can not be empty")
        }
        else if self.kind.chars().count() > 64 {
            Some("The resource type can not be longer than 64 characters")
        }
        else if self.quantity <= 0 {
            Some("Quantity must be positive")
        }
        else if self.location.is_empty() {
            Some("The location can not be empty")
        }
        else if self.location.chars().count() > 128 {
            Some("The location can not be longer than 128 characters")
        }
        else {
            None
        }
    }
}


pub fn init_resource_sys() {
    let cnt = db::count_resources()
        .expect("Fail to count resources");

    if cnt == 0 {
        let stock = [
            ("Earthmover", 2, "Central Warehouse"),
            ("Medical Kits", 50, "Mobile Unit 1"),
            ("Food Kits", 200, "Central Warehouse"),
        ];

        for &(kind, quantity, location) in &stock {
            db::insert_resource(&db::models::NewResource {
                kind: kind.into(),
                quantity,
                location: location.into(),
            }).expect("Fail to seed resources");
        }
    }
}

#[get("/api/resources")]
pub fn get_resources(user: AuthUser) -> JsonResult {
    require_role(&user, &[Role::Admin, Role::Coordinator])?;

    match db::get_resources() {
        Ok(resources) => {
            let parts = resources.iter()
                .map(|r| {
                    json!({
                        "id": r.id,
                        "type": r.kind,
                        "qty": r.quantity,
                        "location": r.location,
                    })
                })
                .collect::<Vec<_>>();

            Ok(Json(json!({
                "resources": parts,
                "size": parts.len(),
            }).to_string()))
        },
        Err(err) => Err(Custom(Status::InternalServerError, err.to_string())),
    }
}

#[post("/resource", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_resource(form: Option<Form<ResourceForm>>, user: AuthUser) -> StringResult {
    require_role(&user, &[Role::Admin, Role::Coordinator])?;

    let form = match form {
        Some(form) => form,
        None => return Err(Custom(Status::BadRequest, "Invalid form".into())),
    };

    if let Some(err) = form.verify_error() {
        return Err(Custom(Status::BadRequest, err.to_string()));
    }

    let result = db::insert_resource(&db::models::NewResource {
        kind: form.kind.clone(),
        quantity: form.quantity,
        location: form.location.clone(),
    });

    match result {
        Ok(resource) => Ok(resource.id.to_string()),
        Err(err) => Err(Custom(Status::BadRequest, err.to_string())),
    }
}

#[delete("/resource?<id>")]
pub fn delete_resource(id: i32, user: AuthUser) -> StringResult {
    require_role(&user, &[Role::Admin, Role::Coordinator])?;

    match db::delete_resource(id) {
        Ok(cnt) if cnt > 0 => Ok(cnt.to_string()),
        Ok(_) => Err(Custom(Status::NotFound, "Not found".into())),
        Err(err) => Err(Custom(Status::BadRequest, err.to_string())),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_form_validation() {
        let mut form = ResourceForm {
            kind: "Water Bottles".into(),
            quantity: 500,
            location: "Central Warehouse".into(),
        };
        assert!(form.verify_error().is_none());

        form.quantity = 0;
        assert!(form.verify_error().is_some());
        form.quantity = -3;
        assert!(form.verify_error().is_some());

        form.quantity = 1;
        form.kind = "".into();
        assert!(form.verify_error().is_some());

        form.kind = "Earthmover".into();
        form.location = "".into();
        assert!(form.verify_error().is_some());
    }

    #[test]
    fn resource_limits_count_characters() {
        let mut form = ResourceForm {
            kind: "\u{5316}".repeat(64), // 3 bytes per char
            quantity: 5,
            location: "\u{5316}".repeat(128),
        };
        assert!(form.verify_error().is_none());

        form.kind = "\u{5316}".repeat(65);
        assert!(form.verify_error().is_some());

        form.kind = "Tents".into();
        form.location = "\u{5316}".repeat(129);
        assert!(form.verify_error().is_some());
    }
}
