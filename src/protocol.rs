use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const DEFAULT_BASE_URL: &str = "https://api.melview.net/";
pub const APP_VERSION: &str = "3.0.503";

/// Protocol revision requested from `unitcommand.aspx`.
const STATE_VERSION: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    UnitCapabilities,
    UnitCommand,
    Logout,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Login => "api/login.aspx",
            Endpoint::UnitCapabilities => "api/unitcapabilities.aspx",
            Endpoint::UnitCommand => "api/unitcommand.aspx",
            Endpoint::Logout => "api/logout.aspx",
        }
    }
}

pub fn endpoint_url(base_url: &str, endpoint: Endpoint) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), endpoint.path())
}

pub fn login_params(username: &str, password: &str) -> Value {
    json!({
        "user": username,
        "pass": password,
        "appversion": APP_VERSION,
    })
}

pub fn capabilities_params(index: usize) -> Value {
    json!({ "unitid": index })
}

pub fn state_params(unit_id: &str) -> Value {
    json!({ "unitid": unit_id, "v": STATE_VERSION })
}

pub fn command_params(unit_id: &str, commands: &str) -> Value {
    json!({ "unitid": unit_id, "v": STATE_VERSION, "commands": commands })
}

/// Number of units on the account, or `None` when login was refused.
pub fn parse_login_response(body: &Value) -> Option<usize> {
    let units = match body.get("userunits")? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (units > 0).then_some(units as usize)
}

/// Vendor error carried in the JSON envelope. `"ok"` and absence are success.
pub fn response_error(body: &Value) -> Option<&str> {
    match body.get("error").and_then(|v| v.as_str()) {
        Some("ok") | None => None,
        Some(msg) => Some(msg),
    }
}

pub fn is_session_error(msg: &str) -> bool {
    matches!(msg, "notlogged" | "nologin" | "session")
}

/// Local command code returned alongside a command response.
pub fn local_code(body: &Value) -> Option<&str> {
    body.get("lc")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

pub fn local_url(address: &str) -> String {
    format!("http://{address}/smart")
}

pub fn local_command_body(code: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <CSV><CONNECT>ON</CONNECT><CODE><VALUE>{code}</VALUE></CODE></CSV>"
    )
}

/// Cookies collected from `Set-Cookie` headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub cookies: BTreeMap<String, String>,
}

impl Session {
    /// Merge one `Set-Cookie` header. Attributes after the first `;` are ignored.
    pub fn absorb_set_cookie(&mut self, header: &str) {
        let pair = header.split(';').next().unwrap_or_default();
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                self.cookies.insert(name.to_string(), value.trim().to_string());
            }
        }
    }

    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_tolerate_trailing_slash() {
        assert_eq!(
            endpoint_url("https://api.melview.net/", Endpoint::Login),
            "https://api.melview.net/api/login.aspx"
        );
        assert_eq!(
            endpoint_url("http://127.0.0.1:8080", Endpoint::UnitCommand),
            "http://127.0.0.1:8080/api/unitcommand.aspx"
        );
    }

    #[test]
    fn login_params_carry_app_version() {
        let p = login_params("me@example.com", "hunter2");
        assert_eq!(p["user"], "me@example.com");
        assert_eq!(p["pass"], "hunter2");
        assert_eq!(p["appversion"], APP_VERSION);
    }

    #[test]
    fn command_params_structure() {
        let p = command_params("123", "PW1,MD3");
        assert_eq!(p["unitid"], "123");
        assert_eq!(p["v"], 2);
        assert_eq!(p["commands"], "PW1,MD3");
        assert!(state_params("123").get("commands").is_none());
    }

    #[test]
    fn login_response_unit_count() {
        assert_eq!(parse_login_response(&json!({"userunits": 2})), Some(2));
        assert_eq!(parse_login_response(&json!({"userunits": "1"})), Some(1));
        assert_eq!(parse_login_response(&json!({"userunits": 0})), None);
        assert_eq!(parse_login_response(&json!({"error": "ok"})), None);
    }

    #[test]
    fn error_envelope() {
        assert_eq!(response_error(&json!({"error": "ok"})), None);
        assert_eq!(response_error(&json!({})), None);
        assert_eq!(response_error(&json!({"error": "notlogged"})), Some("notlogged"));
        assert!(is_session_error("notlogged"));
        assert!(!is_session_error("badunit"));
    }

    #[test]
    fn set_cookie_parsing() {
        let mut s = Session::default();
        assert_eq!(s.cookie_header(), None);
        s.absorb_set_cookie("auth=abc123; path=/; HttpOnly");
        s.absorb_set_cookie("lang=en");
        s.absorb_set_cookie("auth=def456; path=/");
        s.absorb_set_cookie("garbage");
        assert_eq!(s.cookie_header().as_deref(), Some("auth=def456; lang=en"));
    }

    #[test]
    fn local_command_payload() {
        assert_eq!(local_code(&json!({"lc": "FC41"})), Some("FC41"));
        assert_eq!(local_code(&json!({"lc": ""})), None);
        assert_eq!(local_url("192.168.1.20"), "http://192.168.1.20/smart");
        let body = local_command_body("FC41");
        assert!(body.contains("<VALUE>FC41</VALUE>"));
        assert!(body.starts_with("<?xml"));
    }
}
