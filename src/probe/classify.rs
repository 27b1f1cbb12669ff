//! Status derivation for HTTP response codes.

use crate::db::{HttpOptions, ServiceStatus};

/// Map an HTTP response code to a service status.
///
/// A matching `status_mapping` entry wins over `expected_status`; unknown
/// mapping tags fall through. 429 and 503 degrade rather than kill.
pub fn http_status(code: u16, opts: &HttpOptions) -> ServiceStatus {
    if let Some(tag) = opts.status_mapping.get(&code.to_string()) {
        match tag.as_str() {
            "alive" => return ServiceStatus::Alive,
            "degraded" => return ServiceStatus::Degraded,
            "dead" => return ServiceStatus::Dead,
            _ => {}
        }
    }

    if code == opts.expected_status {
        return ServiceStatus::Alive;
    }

    if code == 429 || code == 503 {
        return ServiceStatus::Degraded;
    }

    ServiceStatus::Dead
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::HttpMethod;
    use std::collections::HashMap;

    fn opts(expected: u16, mapping: &[(&str, &str)]) -> HttpOptions {
        HttpOptions {
            path: "/healthz".to_string(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            body: String::new(),
            expected_status: expected,
            status_mapping: mapping
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ssl_verify: true,
            follow_redirects: true,
        }
    }

    #[test]
    fn expected_status_is_alive() {
        assert_eq!(http_status(204, &opts(204, &[])), ServiceStatus::Alive);
    }

    #[test]
    fn mapping_wins_over_expected_status() {
        let o = opts(200, &[("200", "degraded")]);
        assert_eq!(http_status(200, &o), ServiceStatus::Degraded);
    }

    #[test]
    fn unknown_mapping_tag_falls_through() {
        let o = opts(200, &[("200", "sideways")]);
        assert_eq!(http_status(200, &o), ServiceStatus::Alive);
    }

    #[test]
    fn throttling_codes_degrade() {
        let o = opts(200, &[]);
        assert_eq!(http_status(429, &o), ServiceStatus::Degraded);
        assert_eq!(http_status(503, &o), ServiceStatus::Degraded);
    }

    #[test]
    fn anything_else_is_dead() {
        let o = opts(200, &[]);
        assert_eq!(http_status(500, &o), ServiceStatus::Dead);
        assert_eq!(http_status(404, &o), ServiceStatus::Dead);
    }

    #[test]
    fn mapping_can_mark_error_codes_alive() {
        let o = opts(200, &[("404", "alive")]);
        assert_eq!(http_status(404, &o), ServiceStatus::Alive);
    }
}
