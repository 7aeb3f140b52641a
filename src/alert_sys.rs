use std::env;

use rocket::{
    http::Status,
    request::Form,
    response::{
        content::Json,
        status::Custom,
    },
};
use serde_json::{json, Value as JsonValue};

use crate::db;
use crate::auth_sys::{AuthUser, Role, require_role};


type JsonResult = Result<Json<String>, Custom<String>>;


lazy_static! {
    static ref TWILIO: Option<TwilioConfig> = {
        let account_sid = env::var("TWILIO_ACCOUNT_SID").unwrap_or_default();
        let auth_token = env::var("TWILIO_AUTH_TOKEN").unwrap_or_default();

        if account_sid.is_empty() || auth_token.is_empty() {
            info!("Twilio credentials not set, outbound alerts are disabled");
            None
        }
        else {
            Some(TwilioConfig {
                account_sid,
                auth_token,
                sms_from: env::var("TWILIO_SMS_FROM").unwrap_or_default(),
                // Twilio sandbox number.
                whatsapp_from: env::var("TWILIO_WHATSAPP_FROM")
                    .unwrap_or_else(|_| "whatsapp:+14155238886".into()),
            })
        }
    };
}

const MESSAGE_LIMIT: usize = 1600; // Twilio body limit


struct TwilioConfig {
    account_sid: String,
    auth_token: String,
    sms_from: String,
    whatsapp_from: String,
}


enum RecipientKind {
    AllVolunteers,
    Volunteer,
    PhoneNumber,
    AllUsers,
}

impl RecipientKind {
    fn from_str(s: &str) -> Option<RecipientKind> {
        match s {
            "all_volunteers" => Some(RecipientKind::AllVolunteers),
            "volunteer" => Some(RecipientKind::Volunteer),
            "phone_number" => Some(RecipientKind::PhoneNumber),
            "all_users" => Some(RecipientKind::AllUsers),
            _ => None,
        }
    }

    fn needs_phone(&self) -> bool {
        match self {
            RecipientKind::Volunteer | RecipientKind::PhoneNumber => true,
            _ => false,
        }
    }
}


pub fn is_enabled() -> bool {
    TWILIO.is_some()
}

fn as_whatsapp_number(phone: &str) -> String {
    if phone.starts_with("whatsapp:") {
        phone.to_owned()
    }
    else {
        format!("whatsapp:{}", phone)
    }
}

/// Sends one SMS or WhatsApp message through the Twilio REST API.
/// Returns the provider message id.
pub fn send_alert(phone: &str, message: &str, use_whatsapp: bool) -> Result<String, String> {
    let cfg = match &*TWILIO {
        Some(cfg) => cfg,
        None => return Err("Twilio not configured".into()),
    };

    let from = if use_whatsapp { &cfg.whatsapp_from } else { &cfg.sms_from };
    if from.is_empty() {
        return Err("No sender number configured".into());
    }

    let to = if use_whatsapp {
        as_whatsapp_number(phone)
    }
    else {
        phone.to_owned()
    };

    let uri = format!("https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
        cfg.account_sid);

    let client = reqwest::Client::new();
    let mut response = client.post(&uri)
        .basic_auth(&cfg.account_sid, Some(&cfg.auth_token))
        .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", message)])
        .send()
        .map_err(|err| err.to_string())?;

    let status = response.status();
    let body: JsonValue = response.json()
        .map_err(|err| err.to_string())?;

    if status.is_success() {
        body.get("sid")
            .and_then(|v| v.as_str())
            .map(|sid| sid.to_owned())
            .ok_or_else(|| "No message id in Twilio response".to_owned())
    }
    else {
        Err(body.get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("Twilio request failed")
            .to_owned())
    }
}

fn send_fanout(contacts: &[String], message: &str, use_whatsapp: bool) -> (usize, usize) {
    let mut sent = 0;
    let mut failed = 0;

    for phone in contacts {
        match send_alert(phone, message, use_whatsapp) {
            Ok(_) => sent += 1,
            Err(err) => {
                warn!("Fail to send alert to {}: {}", phone, err);
                failed += 1;
            },
        }
    }

    (sent, failed)
}


#[derive(FromForm)]
pub struct AlertForm {
    recipient_type: String,
    // Absent for the broadcast recipient types.
    phone: Option<String>,
    message: String,
}

impl AlertForm {
    fn verify_error(&self) -> Option<&'static str> {
        let kind = match RecipientKind::from_str(&self.recipient_type) {
            Some(kind) => kind,
            None => return Some("Invalid recipient type"),
        };

        let no_phone = self.phone.as_ref().map_or(true, |p| p.is_empty());

        if self.message.is_empty() {
            Some("Message cannot be empty")
        }
        else if self.message.len() > MESSAGE_LIMIT {
            Some("Message is too long")
        }
        else if kind.needs_phone() && no_phone {
            Some("Phone number is required for this recipient type")
        }
        else {
            None
        }
    }
}


#[get("/alert/status")]
pub fn get_alert_status(user: AuthUser) -> JsonResult {
    require_role(&user, &[Role::Admin, Role::Coordinator])?;

    Ok(Json(json!({
        "enabled": is_enabled(),
    }).to_string()))
}

#[post("/alert", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_alert(form: Option<Form<AlertForm>>, user: AuthUser) -> JsonResult {
    require_role(&user, &[Role::Admin, Role::Coordinator])?;

    let form = match form {
        Some(form) => form,
        None => return Err(Custom(Status::BadRequest, "Invalid form".into())),
    };

    if let Some(err) = form.verify_error() {
        return Err(Custom(Status::BadRequest, err.to_string()));
    }

    if !is_enabled() {
        // Reported, not fatal. The alert page shows the disabled state.
        return Ok(Json(json!({
            "enabled": false,
            "sent": 0,
            "failed": 0,
            "detail": "Twilio not configured",
        }).to_string()));
    }

    let kind = RecipientKind::from_str(&form.recipient_type).unwrap();
    let phone = form.phone.clone().unwrap_or_default();

    // Volunteers are reached over WhatsApp, everyone else over plain SMS.
    let (contacts, use_whatsapp) = match kind {
        RecipientKind::Volunteer => (vec![phone], true),
        RecipientKind::PhoneNumber => (vec![phone], false),
        RecipientKind::AllVolunteers => {
            let contacts = db::get_volunteer_contacts()
                .map_err(|err| Custom(Status::InternalServerError, err.to_string()))?;
            (contacts, true)
        },
        RecipientKind::AllUsers => {
            let contacts = db::get_user_contacts()
                .map_err(|err| Custom(Status::InternalServerError, err.to_string()))?;
            (contacts, false)
        },
    };

    if contacts.is_empty() {
        return Err(Custom(Status::BadRequest, "No recipients with phone numbers found".into()));
    }

    let (sent, failed) = send_fanout(&contacts, &form.message, use_whatsapp);

    Ok(Json(json!({
        "enabled": true,
        "sent": sent,
        "failed": failed,
        "detail": format!("Alert sent to {} recipients ({} failed)", sent, failed),
    }).to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whatsapp_prefix_is_added_once() {
        assert_eq!(as_whatsapp_number("+911234567890"), "whatsapp:+911234567890");
        assert_eq!(as_whatsapp_number("whatsapp:+911234567890"), "whatsapp:+911234567890");
    }

    #[test]
    fn recipient_kinds_parse() {
        assert!(RecipientKind::from_str("all_volunteers").is_some());
        assert!(RecipientKind::from_str("volunteer").is_some());
        assert!(RecipientKind::from_str("phone_number").is_some());
        assert!(RecipientKind::from_str("all_users").is_some());
        assert!(RecipientKind::from_str("everyone").is_none());
    }

    #[test]
    fn targeted_kinds_require_a_phone() {
        assert!(RecipientKind::from_str("volunteer").unwrap().needs_phone());
        assert!(RecipientKind::from_str("phone_number").unwrap().needs_phone());
        assert!(!RecipientKind::from_str("all_volunteers").unwrap().needs_phone());
        assert!(!RecipientKind::from_str("all_users").unwrap().needs_phone());
    }

    #[test]
    fn alert_form_validation() {
        let mut form = AlertForm {
            recipient_type: "all_volunteers".into(),
            phone: Some("".into()),
            message: "Evacuate sector 18 immediately".into(),
        };
        assert!(form.verify_error().is_none());

        form.message = "".into();
        assert!(form.verify_error().is_some());

        form.message = "x".repeat(MESSAGE_LIMIT + 1);
        assert!(form.verify_error().is_some());

        form.message = "Report to the staging area".into();
        form.recipient_type = "volunteer".into();
        assert!(form.verify_error().is_some());

        form.phone = Some("+919000000011".into());
        assert!(form.verify_error().is_none());

        form.recipient_type = "carrier_pigeon".into();
        assert!(form.verify_error().is_some());
    }

    #[test]
    fn broadcast_alert_needs_no_phone_field() {
        // A broadcast form posted without any phone field must pass.
        let mut form = AlertForm {
            recipient_type: "all_volunteers".into(),
            phone: None,
            message: "Evacuate sector 18 immediately".into(),
        };
        assert!(form.verify_error().is_none());

        form.recipient_type = "all_users".into();
        assert!(form.verify_error().is_none());

        // The targeted types still demand one.
        form.recipient_type = "volunteer".into();
        assert!(form.verify_error().is_some());
        form.recipient_type = "phone_number".into();
        assert!(form.verify_error().is_some());
    }
}
