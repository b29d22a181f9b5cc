//! Notification click handling

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::host::WindowClient;

/// Action identifier of the button that only closes the notification
pub const DISMISS_ACTION: &str = "dismiss";

/// A click on a displayed notification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationClick {
    /// Button pressed; `None` for a click on the notification body
    #[serde(default)]
    pub action: Option<String>,
    /// Tag of the clicked notification
    #[serde(default)]
    pub tag: Option<String>,
    /// The notification's data map
    #[serde(default)]
    pub data: Value,
}

impl NotificationClick {
    pub fn is_dismiss(&self) -> bool {
        self.action.as_deref() == Some(DISMISS_ACTION)
    }

    /// Page the click should lead to, the origin when the data has none
    pub fn target_url(&self, origin: &Url) -> String {
        self.data
            .get("url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| origin.origin().ascii_serialization())
    }
}

/// What a click resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    /// The dismiss button: nothing beyond closing the notification
    Dismissed,
    /// An open window already shows the target
    Focus { client_id: String, url: String },
    /// No window shows the target, open one
    Open { url: String },
}

/// Decide what a click does given the currently open windows
pub fn resolve_click(
    click: &NotificationClick,
    origin: &Url,
    windows: &[WindowClient],
) -> ClickOutcome {
    if click.is_dismiss() {
        return ClickOutcome::Dismissed;
    }

    let url = click.target_url(origin);
    match windows.iter().find(|w| w.url == url) {
        Some(window) => ClickOutcome::Focus {
            client_id: window.id.clone(),
            url,
        },
        None => ClickOutcome::Open { url },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn origin() -> Url {
        Url::parse("https://lovevibes.app").unwrap()
    }

    fn window(id: &str, url: &str) -> WindowClient {
        WindowClient {
            id: id.to_string(),
            url: url.to_string(),
            focused: false,
            controlled: true,
        }
    }

    #[test]
    fn test_dismiss_ignores_windows() {
        let click = NotificationClick {
            action: Some("dismiss".to_string()),
            data: json!({"url": "https://lovevibes.app"}),
            ..Default::default()
        };
        let windows = vec![window("a", "https://lovevibes.app")];
        assert_eq!(resolve_click(&click, &origin(), &windows), ClickOutcome::Dismissed);
    }

    #[test]
    fn test_focus_matching_window() {
        let click = NotificationClick {
            data: json!({"url": "https://lovevibes.app/chat/42"}),
            ..Default::default()
        };
        let windows = vec![
            window("a", "https://lovevibes.app"),
            window("b", "https://lovevibes.app/chat/42"),
        ];
        assert_eq!(
            resolve_click(&click, &origin(), &windows),
            ClickOutcome::Focus {
                client_id: "b".to_string(),
                url: "https://lovevibes.app/chat/42".to_string()
            }
        );
    }

    #[test]
    fn test_open_when_no_match() {
        let click = NotificationClick {
            action: Some("open".to_string()),
            ..Default::default()
        };
        let windows = vec![window("a", "https://lovevibes.app/settings")];
        assert_eq!(
            resolve_click(&click, &origin(), &windows),
            ClickOutcome::Open {
                url: "https://lovevibes.app".to_string()
            }
        );
    }
}
