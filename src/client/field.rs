//! Settings page rows for license keys.
//!
//! Rendering is pluggable. [`HiddenField`] renders nothing and is the
//! default; [`LicenseRowRenderer`] renders the full table row with the key
//! input and a status message.

use crate::client::manager::ACCOUNT_URL;
use crate::client::responses::{LicenseData, STATUS_UNREACHABLE};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// What a renderer may see of a license.
#[derive(Debug, Clone, Copy)]
pub struct LicenseView<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub license_key: &'a str,
    pub license_data: Option<&'a LicenseData>,
}

/// Produces the markup of one license row.
pub trait FieldRenderer: Send + Sync {
    fn render(&self, license: &LicenseView<'_>) -> String;
}

/// Renders no row at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct HiddenField;

impl FieldRenderer for HiddenField {
    fn render(&self, _license: &LicenseView<'_>) -> String {
        String::new()
    }
}

/// Full table row: label, key input, deactivate button and status message.
#[derive(Debug, Clone, Copy, Default)]
pub struct LicenseRowRenderer;

impl LicenseRowRenderer {
    /// Render relative to a fixed clock.
    pub fn render_at(&self, license: &LicenseView<'_>, now: DateTime<Utc>) -> String {
        let id = escape(license.id);
        let mut class = "license-null";
        let mut message: Option<String> = None;

        let mut out = format!(
            "<td><label for=\"pll-licenses[{id}]\">{name}</label></td>\
             <td><input name=\"licenses[{id}]\" id=\"pll-licenses[{id}]\" type=\"text\" \
             value=\"{key}\" class=\"regular-text code\" />",
            name = escape(license.name),
            key = escape(license.license_key),
        );

        if let Some(data) = license.license_data {
            let expiration = data.expires().and_then(parse_expiration);
            let mut error = data.error().map(str::to_string);
            let mut failed = data.get("success") == Some(&Value::Bool(false));

            // Expired since the last successful check.
            if !failed && matches!(expiration, Some(exp) if exp < now) {
                failed = true;
                error = Some("expired".to_string());
            }
            if data.status() == Some(STATUS_UNREACHABLE) {
                error = Some(STATUS_UNREACHABLE.to_string());
            }

            if failed {
                class = "notice-error notice-alt";
                message = error
                    .as_deref()
                    .and_then(|e| failure_message(e, license.name, expiration));
            } else {
                class = "license-valid";
                out.push_str(&format!(
                    "<button id=\"deactivate_{id}\" type=\"button\" \
                     class=\"button button-secondary pll-deactivate-license\">Deactivate</button>"
                ));

                message = match (data.expires(), expiration) {
                    (Some("lifetime"), _) => Some("The license key never expires.".to_string()),
                    (_, Some(exp)) if exp - now < Duration::days(30) => {
                        class = "notice-warning notice-alt";
                        Some(format!(
                            "Your license key will expire soon! Precisely, it will expire on {}. \
                             <a href=\"{ACCOUNT_URL}\" target=\"_blank\">Renew your license key today!</a>",
                            format_date(exp)
                        ))
                    }
                    (_, Some(exp)) => Some(format!(
                        "Your license key expires on {}.",
                        format_date(exp)
                    )),
                    _ => None,
                };
            }
        }

        if let Some(message) = message {
            out.push_str(&format!("<p>{message}</p>"));
        }
        out.push_str("</td>");

        format!("<tr id=\"pll-license-{id}\" class=\"{class}\">{out}</tr>")
    }
}

impl FieldRenderer for LicenseRowRenderer {
    fn render(&self, license: &LicenseView<'_>) -> String {
        self.render_at(license, Utc::now())
    }
}

fn failure_message(error: &str, name: &str, expiration: Option<DateTime<Utc>>) -> Option<String> {
    let account_link = format!("<a href=\"{ACCOUNT_URL}\" target=\"_blank\">");
    let message = match error {
        "expired" => format!(
            "Your license key expired on {}. Please {account_link}renew your license key</a>.",
            expiration.map(format_date).unwrap_or_default()
        ),
        "disabled" | "revoked" => "Your license key has been disabled.".to_string(),
        "missing" => format!(
            "Invalid license. Please {account_link}visit your account page</a> and verify it."
        ),
        "invalid" | "site_inactive" => format!(
            "Your {} license key is not active for this URL. Please {account_link}visit your \
             account page</a> to manage your license key URLs.",
            escape(name)
        ),
        "item_name_mismatch" => format!("This is not a {} license key.", escape(name)),
        "no_activations_left" => format!(
            "Your license key has reached its activation limit. {account_link}View possible \
             upgrades</a> now."
        ),
        STATUS_UNREACHABLE => {
            "The license server could not be reached. Please try again later.".to_string()
        }
        _ => return None,
    };
    Some(message)
}

/// Expiry as sent by the API: a datetime, a bare date, or `lifetime`.
fn parse_expiration(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| dt.and_utc())
}

fn format_date(date: DateTime<Utc>) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn escape(raw: &str) -> String {
    html_escape::encode_double_quoted_attribute(raw).into_owned()
}
