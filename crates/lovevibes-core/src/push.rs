//! Push payload handling
//!
//! Push payloads come from an external service and are untrusted. Anything
//! that is not a JSON object degrades to the default notification; fields of
//! the wrong type are ignored one by one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

/// Action button shown on a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Data carried by a notification back to the click handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Page to open when the notification is clicked
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    /// Arrival time in milliseconds since the epoch
    #[serde(default)]
    pub timestamp: i64,
    /// Any other keys the sender put in `data`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A notification ready to be displayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDescriptor {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub renotify: bool,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
    pub data: NotificationData,
}

/// Content used for whatever the payload does not provide
#[derive(Debug, Clone)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "Love Vibes".to_string(),
            body: "Nouveau message !".to_string(),
            icon: "/icons/icon-192x192.png".to_string(),
            badge: "/icons/icon-192x192.png".to_string(),
            tag: "love-vibes-notification".to_string(),
            vibrate: vec![200, 100, 200],
            actions: vec![
                NotificationAction {
                    action: "open".to_string(),
                    title: "Ouvrir".to_string(),
                },
                NotificationAction {
                    action: "dismiss".to_string(),
                    title: "Ignorer".to_string(),
                },
            ],
        }
    }
}

/// Build the notification for a push payload
///
/// Precedence, lowest first: defaults, top-level fields, the nested
/// `notification` object. Empty strings count as absent. `data` is merged
/// over `{ url: <origin> }` and always stamped with `now_ms`.
pub fn build_notification(
    payload: &[u8],
    defaults: &NotificationDefaults,
    origin: &Url,
    now_ms: i64,
) -> NotificationDescriptor {
    let mut notification = NotificationDescriptor {
        title: defaults.title.clone(),
        body: defaults.body.clone(),
        icon: defaults.icon.clone(),
        badge: defaults.badge.clone(),
        tag: defaults.tag.clone(),
        renotify: true,
        vibrate: defaults.vibrate.clone(),
        actions: defaults.actions.clone(),
        data: NotificationData {
            url: origin_string(origin),
            chat_id: None,
            timestamp: now_ms,
            extra: Map::new(),
        },
    };

    let Some(object) = parse_payload(payload) else {
        return notification;
    };

    apply_fields(&mut notification, &object);
    if let Some(Value::Object(nested)) = object.get("notification") {
        apply_fields(&mut notification, nested);
    }

    if let Some(Value::Object(data)) = object.get("data") {
        for (key, value) in data {
            match (key.as_str(), value) {
                ("url", Value::String(url)) if !url.is_empty() => {
                    notification.data.url = url.clone();
                }
                ("chatId", Value::String(id)) if !id.is_empty() => {
                    notification.data.chat_id = Some(id.clone());
                }
                ("chatId", Value::Number(id)) => {
                    notification.data.chat_id = Some(id.to_string());
                }
                ("url" | "chatId" | "timestamp", _) => {}
                _ => {
                    notification.data.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    notification
}

fn parse_payload(payload: &[u8]) -> Option<Map<String, Value>> {
    if payload.iter().all(|b| b.is_ascii_whitespace()) {
        return None;
    }

    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(object)) => Some(object),
        Ok(other) => {
            warn!("Push payload is not a JSON object ({}), using defaults", kind(&other));
            None
        }
        Err(e) => {
            warn!("Push payload is not JSON, using defaults: {}", e);
            None
        }
    }
}

fn apply_fields(notification: &mut NotificationDescriptor, fields: &Map<String, Value>) {
    let targets: [(&str, &mut String); 5] = [
        ("title", &mut notification.title),
        ("body", &mut notification.body),
        ("icon", &mut notification.icon),
        ("badge", &mut notification.badge),
        ("tag", &mut notification.tag),
    ];

    for (key, target) in targets {
        if let Some(Value::String(value)) = fields.get(key)
            && !value.is_empty()
        {
            *target = value.clone();
        }
    }

    if let Some(Value::Bool(renotify)) = fields.get("renotify") {
        notification.renotify = *renotify;
    }

    if let Some(Value::Array(pattern)) = fields.get("vibrate") {
        let pattern: Option<Vec<u32>> = pattern
            .iter()
            .map(|v| v.as_u64().and_then(|n| u32::try_from(n).ok()))
            .collect();
        if let Some(pattern) = pattern {
            notification.vibrate = pattern;
        }
    }
}

/// `Url::origin` serialization without a trailing slash, like `location.origin`
fn origin_string(origin: &Url) -> String {
    origin.origin().ascii_serialization()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
