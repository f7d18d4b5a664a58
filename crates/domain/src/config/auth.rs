use serde::{Deserialize, Serialize};

/// How the caller's principal is established.
///
/// The host page (or a reverse proxy in front of it) forwards the signed-in
/// user in `principal_header`. Single-user embeds can instead pin every
/// request to `widget_user_id`. With neither, requests are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "d_principal_header")]
    pub principal_header: String,
    #[serde(default)]
    pub widget_user_id: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            principal_header: d_principal_header(),
            widget_user_id: None,
        }
    }
}

fn d_principal_header() -> String {
    "x-widget-user".into()
}
