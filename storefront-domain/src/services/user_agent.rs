// Best-effort device classification from a User-Agent header.
// Not a UA grammar: each rule is a plain substring test and the first match wins.

use crate::entities::DeviceInfo;

const MOBILE_MARKERS: [&str; 4] = ["Mobile", "Android", "iPhone", "iPad"];

const BROWSER_RULES: [(&[&str], &str); 3] = [
    (&["Chrome"], "Chrome"),
    (&["Firefox"], "Firefox"),
    (&["Safari"], "Safari"),
];

const OS_RULES: [(&[&str], &str); 5] = [
    (&["Windows"], "Windows"),
    (&["Mac"], "MacOS"),
    (&["Linux"], "Linux"),
    (&["Android"], "Android"),
    (&["iOS", "iPhone", "iPad"], "iOS"),
];

const OTHER: &str = "Other";

pub fn detect_device(user_agent: Option<&str>) -> Option<DeviceInfo> {
    let user_agent = user_agent.map(str::trim).filter(|ua| !ua.is_empty())?;
    let device_type = if MOBILE_MARKERS.iter().any(|marker| user_agent.contains(marker)) {
        "mobile"
    } else {
        "desktop"
    };
    Some(DeviceInfo {
        device_type: device_type.to_string(),
        browser: first_match(user_agent, &BROWSER_RULES).to_string(),
        os: first_match(user_agent, &OS_RULES).to_string(),
    })
}

fn first_match(user_agent: &str, rules: &[(&[&str], &'static str)]) -> &'static str {
    rules
        .iter()
        .find(|(markers, _)| markers.iter().any(|marker| user_agent.contains(marker)))
        .map(|(_, name)| *name)
        .unwrap_or(OTHER)
}
