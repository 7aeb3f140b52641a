use std::{
    env,
    sync::RwLock,
    time::Duration,
};
use rocket::{
    response::content::Json,
};
use serde_json::json;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::task_scheduler::{Task, TaskSchedulerBuilder};


lazy_static! {
    static ref CAP_FEED_URL: String = {
        env::var("CAP_FEED_URL")
            .unwrap_or_else(|_| "https://sachet.ndma.gov.in/cap_public_website/rss/rss_india.xml".into())
    };
    static ref CAP_ALERT_CACHE: RwLock<String> = {
        RwLock::new(String::new())
    };
}

const REFRESH_PERIOD: u64 = 60 * 10; // seconds
const RETRY_PERIOD: u64 = 60 * 1; // seconds


#[derive(Default)]
struct CapAlert {
    event: String,
    severity: String,
    headline: String,
    description: String,
    area_desc: String,
    sent: String,
    link: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
}


pub fn init_cap_sys(scheduler: &mut TaskSchedulerBuilder) {
    let delay = match get_cap_data() {
        Ok(data) => {
            update_cap_cache(data);
            Duration::new(REFRESH_PERIOD, 0)
        },
        Err(err) => {
            warn!("Fail to init CAP alert cache: {}", err);

            update_cap_cache(json!({
                "alerts": [],
                "size": 0,
            }).to_string());

            Duration::new(RETRY_PERIOD, 0)
        },
    };

    scheduler.add_task(Task::new(cap_job, delay));
}

#[get("/api/cap-alerts")]
pub fn get_cap_alert_map() -> Json<String> {
    Json(CAP_ALERT_CACHE.read().unwrap().clone())
}

fn cap_job() -> Duration {
    info!("Start job");

    match get_cap_data() {
        Ok(data) => {
            update_cap_cache(data);
            Duration::new(REFRESH_PERIOD, 0)
        },
        Err(err) => {
            warn!("Fail to get CAP alerts: {}", err);
            Duration::new(RETRY_PERIOD, 0)
        },
    }
}

fn update_cap_cache(data: String) {
    *CAP_ALERT_CACHE.write().unwrap() = data;
}

fn get_cap_data() -> Result<String, String> {
    reqwest::get(CAP_FEED_URL.as_str())
        .and_then(|mut res| res.text())
        .map_err(|err| err.to_string())
        .and_then(|xml| parse_cap_feed(&xml))
        .map(|alerts| build_cap_data(&alerts))
}

fn parse_cap_feed(xml: &str) -> Result<Vec<CapAlert>, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut alerts = Vec::new();
    let mut alert: Option<CapAlert> = None;
    let mut tag = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name()).into_owned();

                if name == "item" {
                    alert = Some(CapAlert::default());
                }

                tag = name;
            },
            Ok(Event::End(ref e)) => {
                if e.name() == b"item" {
                    if let Some(done) = alert.take() {
                        alerts.push(done);
                    }
                }

                tag.clear();
            },
            Ok(Event::Text(ref e)) | Ok(Event::CData(ref e)) => {
                if let Some(ref mut a) = alert {
                    let text = e.unescape_and_decode(&reader)
                        .map_err(|err| err.to_string())?;
                    fill_alert_field(a, &tag, &text);
                }
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(err.to_string()),
            _ => (),
        }

        buf.clear();
    }

    Ok(alerts)
}

fn fill_alert_field(alert: &mut CapAlert, tag: &str, text: &str) {
    match tag {
        "title" => alert.headline = text.to_owned(),
        "description" => alert.description = text.to_owned(),
        "link" => alert.link = text.to_owned(),
        "pubDate" | "cap:sent" => alert.sent = text.to_owned(),
        "cap:event" => alert.event = text.to_owned(),
        "cap:severity" => alert.severity = text.to_owned(),
        "cap:areaDesc" => alert.area_desc = text.to_owned(),
        "geo:lat" => alert.latitude = text.parse().ok(),
        "geo:long" => alert.longitude = text.parse().ok(),
        _ => (),
    }
}

fn build_cap_data(alerts: &[CapAlert]) -> String {
    let parts = alerts.iter()
        .map(|a| {
            let centroid = match (a.latitude, a.longitude) {
                (Some(lat), Some(lng)) => json!([lat, lng]),
                _ => json!(null),
            };
            let event = if a.event.is_empty() { &a.headline } else { &a.event };
            let severity = if a.severity.is_empty() { "Unknown" } else { a.severity.as_str() };

            json!({
                "event": event,
                "severity": severity,
                "headline": a.headline,
                "description": a.description,
                "areaDesc": a.area_desc,
                "sent": a.sent,
                "cap_link": a.link,
                "centroid": centroid,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "alerts": parts,
        "size": parts.len(),
    }).to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &'static str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0" xmlns:cap="urn:oasis:names:tc:emergency:cap:1.2"
             xmlns:geo="http://www.w3.org/2003/01/geo/wgs84_pos#">
        <channel>
        <title>CAP Alerts</title>
        <item>
            <title>Heavy Rainfall Alert</title>
            <link>https://example.com/cap/1</link>
            <description><![CDATA[Heavy to very heavy rainfall expected]]></description>
            <pubDate>2026-08-24T10:30:00Z</pubDate>
            <cap:event>Rainfall</cap:event>
            <cap:severity>Moderate</cap:severity>
            <cap:areaDesc>Delhi, NCR region</cap:areaDesc>
            <geo:lat>28.6139</geo:lat>
            <geo:long>77.2090</geo:long>
        </item>
        <item>
            <title>Flood Warning</title>
            <link>https://example.com/cap/2</link>
            <description>River levels rising</description>
            <pubDate>2026-08-24T08:15:00Z</pubDate>
        </item>
        </channel>
        </rss>"#;

    #[test]
    fn parses_items_with_cap_and_geo_extensions() {
        let alerts = parse_cap_feed(FEED).unwrap();
        assert_eq!(alerts.len(), 2);

        let first = &alerts[0];
        assert_eq!(first.headline, "Heavy Rainfall Alert");
        assert_eq!(first.event, "Rainfall");
        assert_eq!(first.severity, "Moderate");
        assert_eq!(first.description, "Heavy to very heavy rainfall expected");
        assert_eq!(first.area_desc, "Delhi, NCR region");
        assert_eq!(first.latitude, Some(28.6139));
        assert_eq!(first.longitude, Some(77.2090));

        let second = &alerts[1];
        assert_eq!(second.headline, "Flood Warning");
        assert!(second.event.is_empty());
        assert_eq!(second.latitude, None);
    }

    #[test]
    fn channel_metadata_is_not_an_alert() {
        let alerts = parse_cap_feed(FEED).unwrap();
        assert!(alerts.iter().all(|a| a.headline != "CAP Alerts"));
    }

    #[test]
    fn cap_document_falls_back_for_missing_fields() {
        let alerts = parse_cap_feed(FEED).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&build_cap_data(&alerts)).unwrap();

        assert_eq!(doc["size"], 2);
        assert_eq!(doc["alerts"][0]["event"], "Rainfall");
        assert_eq!(doc["alerts"][0]["centroid"][0], 28.6139);
        // No cap:event or geo point on the second item.
        assert_eq!(doc["alerts"][1]["event"], "Flood Warning");
        assert_eq!(doc["alerts"][1]["severity"], "Unknown");
        assert!(doc["alerts"][1]["centroid"].is_null());
    }

    #[test]
    fn malformed_feed_is_an_error() {
        assert!(parse_cap_feed("<rss><channel><item></rss>").is_err());
    }
}
