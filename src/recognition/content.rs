// SPDX-License-Identifier: GPL-3.0-only

//! Classification of decoded text
//!
//! Barcodes carry anything from product numbers to WiFi credentials. The
//! kind decides what a detection may trigger (only web links are ever
//! opened automatically) and how it is labelled in output.

use serde::Serialize;

/// What a decoded payload appears to be
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentKind {
    /// http or https link with a host
    Url { url: String },
    /// WIFI:S:<ssid>;T:<security>;P:<password>;;
    Wifi {
        ssid: String,
        security: String,
        hidden: bool,
    },
    /// tel: URI
    Phone { number: String },
    /// mailto: URI
    Email { address: String },
    /// sms: or smsto: URI
    Sms {
        number: String,
        message: Option<String>,
    },
    /// geo: URI
    Geo { latitude: f64, longitude: f64 },
    Text,
}

impl ContentKind {
    pub fn classify(content: &str) -> Self {
        let trimmed = content.trim();

        if let Some(rest) = trimmed.strip_prefix("WIFI:") {
            return parse_wifi(rest);
        }

        if is_openable_url(trimmed) {
            return Self::Url {
                url: trimmed.to_string(),
            };
        }

        if let Some(number) = strip_prefix_ignore_case(trimmed, "tel:") {
            return Self::Phone {
                number: number.to_string(),
            };
        }

        if let Some(rest) = strip_prefix_ignore_case(trimmed, "mailto:") {
            let address = rest.split_once('?').map_or(rest, |(a, _)| a);
            return Self::Email {
                address: address.to_string(),
            };
        }

        if let Some(rest) = strip_prefix_ignore_case(trimmed, "smsto:")
            .or_else(|| strip_prefix_ignore_case(trimmed, "sms:"))
        {
            return parse_sms(rest);
        }

        if let Some(rest) = strip_prefix_ignore_case(trimmed, "geo:")
            && let Some(geo) = parse_geo(rest)
        {
            return geo;
        }

        Self::Text
    }

    /// Short label for listings
    pub fn label(&self) -> &'static str {
        match self {
            Self::Url { .. } => "Link",
            Self::Wifi { .. } => "WiFi network",
            Self::Phone { .. } => "Phone number",
            Self::Email { .. } => "Email address",
            Self::Sms { .. } => "SMS",
            Self::Geo { .. } => "Location",
            Self::Text => "Text",
        }
    }

    /// The link to open, for content that may be opened automatically
    pub fn openable_url(&self) -> Option<&str> {
        match self {
            Self::Url { url } => Some(url),
            _ => None,
        }
    }
}

/// `true` for an absolute http(s) URL with a non-empty host
pub fn is_openable_url(text: &str) -> bool {
    let text = text.trim();
    let rest = strip_prefix_ignore_case(text, "https://")
        .or_else(|| strip_prefix_ignore_case(text, "http://"));
    let Some(rest) = rest else {
        return false;
    };
    if rest.chars().any(char::is_whitespace) {
        return false;
    }

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = host_port
        .rsplit_once(':')
        .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
        .map_or(host_port, |(h, _)| h);
    !host.is_empty()
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

fn parse_wifi(content: &str) -> ContentKind {
    let mut ssid = String::new();
    let mut security = String::from("nopass");
    let mut hidden = false;

    for part in content.trim_end_matches(';').split(';') {
        if let Some((key, value)) = part.split_once(':') {
            let value = value.replace("\\:", ":").replace("\\\\", "\\");
            match key {
                "S" => ssid = value,
                "T" if !value.is_empty() => security = value,
                "H" => hidden = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
    }

    ContentKind::Wifi {
        ssid,
        security,
        hidden,
    }
}

fn parse_sms(content: &str) -> ContentKind {
    // smsto:<number>:<message> or sms:<number>?body=<message>
    if let Some((number, message)) = content.split_once(':') {
        return ContentKind::Sms {
            number: number.to_string(),
            message: Some(message.to_string()).filter(|m| !m.is_empty()),
        };
    }

    let (number, params) = content.split_once('?').unwrap_or((content, ""));
    let message = params
        .split('&')
        .filter_map(|p| p.split_once('='))
        .find(|(key, _)| key.eq_ignore_ascii_case("body"))
        .map(|(_, value)| value.to_string());

    ContentKind::Sms {
        number: number.to_string(),
        message,
    }
}

fn parse_geo(content: &str) -> Option<ContentKind> {
    let coords = content.split_once('?').map_or(content, |(c, _)| c);
    let mut parts = coords.split(',');
    let latitude = parts.next()?.trim().parse::<f64>().ok()?;
    let longitude = parts.next()?.trim().parse::<f64>().ok()?;

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }

    Some(ContentKind::Geo {
        latitude,
        longitude,
    })
}
