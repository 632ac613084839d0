//! Device, browser and attribution metadata attached to carts and orders.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

use crate::models::SessionMetadata;

static MOBILE_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)iphone|ipod|android|blackberry|opera mini|windows phone|mobile")
        .expect("mobile user-agent pattern is valid")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Tablet,
    #[default]
    Desktop,
}

impl DeviceType {
    pub fn detect(user_agent: Option<&str>) -> Self {
        let Some(agent) = user_agent else {
            return DeviceType::Desktop;
        };
        let agent = agent.to_lowercase();

        // iPad Safari also advertises "Mobile", so tablets go first.
        let tablet = agent.contains("ipad")
            || agent.contains("tablet")
            || (agent.contains("android") && !agent.contains("mobile"));
        if tablet {
            DeviceType::Tablet
        } else if MOBILE_AGENT.is_match(&agent) {
            DeviceType::Mobile
        } else {
            DeviceType::Desktop
        }
    }
}

pub fn browser_name(user_agent: Option<&str>) -> &'static str {
    let Some(agent) = user_agent else {
        return "unknown";
    };
    let agent = agent.to_lowercase();

    if agent.contains("edg") {
        "Edge"
    } else if agent.contains("opr") || agent.contains("opera") {
        "Opera"
    } else if agent.contains("chrome") {
        "Chrome"
    } else if agent.contains("safari") {
        "Safari"
    } else if agent.contains("firefox") {
        "Firefox"
    } else {
        "unknown"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtmParams {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
}

impl UtmParams {
    /// Reads `utm_*` parameters from an absolute URL or a site-relative path.
    pub fn from_page_url(page_url: &str) -> Self {
        let Some(url) = parse_page_url(page_url) else {
            return Self::default();
        };

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "utm_source" => params.source = Some(value.into_owned()),
                "utm_medium" => params.medium = Some(value.into_owned()),
                "utm_campaign" => params.campaign = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

fn parse_page_url(page_url: &str) -> Option<Url> {
    match Url::parse(page_url) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("http://localhost")
            .and_then(|base| base.join(page_url))
            .ok(),
        Err(_) => None,
    }
}

/// What the page knows about the visitor at the time of a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequestContext {
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub page_url: Option<String>,
}

impl RequestContext {
    pub fn metadata(&self, session_id: Option<&str>) -> SessionMetadata {
        let agent = self.user_agent.as_deref();
        let utm = self
            .page_url
            .as_deref()
            .map(UtmParams::from_page_url)
            .unwrap_or_default();
        let last_page = self
            .page_url
            .as_deref()
            .and_then(parse_page_url)
            .map(|url| url.path().to_string());

        SessionMetadata {
            device_type: DeviceType::detect(agent),
            browser: Some(browser_name(agent).to_string()),
            user_agent: self.user_agent.clone(),
            session_id: session_id.map(str::to_string),
            utm_source: utm.source,
            utm_medium: utm.medium,
            utm_campaign: utm.campaign,
            referrer: self.referrer.clone().filter(|r| !r.is_empty()),
            last_page,
        }
    }
}
