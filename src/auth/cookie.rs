use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::config::AppConfig;

pub const SESSION_COOKIE: &str = "easyauth_token";

/// The service's own origin, for cross-origin detection. Prefers the
/// statically configured `PUBLIC_ORIGIN` (a proxy may rewrite Host), falling
/// back to `scheme://host` derived from the request.
fn canonical_origin(config: &AppConfig, headers: &HeaderMap) -> Option<String> {
    if let Some(origin) = &config.public_origin {
        return Some(origin.trim_end_matches('/').to_string());
    }
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let scheme = if config.environment.is_production() {
        "https"
    } else {
        "http"
    };
    Some(format!("{scheme}://{host}"))
}

fn is_cross_origin(config: &AppConfig, headers: &HeaderMap) -> bool {
    let Some(request_origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        // No Origin header: same-origin navigation or a non-browser client.
        return false;
    };
    match canonical_origin(config, headers) {
        Some(own) => !request_origin.trim_end_matches('/').eq_ignore_ascii_case(&own),
        None => false,
    }
}

/// `SameSite=None` is only legal with `Secure`, so the cross-origin relaxation
/// is gated on production where `Secure` is set.
fn build(
    config: &AppConfig,
    headers: &HeaderMap,
    value: String,
    max_age: Duration,
) -> Cookie<'static> {
    let production = config.environment.is_production();
    let same_site = if production && is_cross_origin(config, headers) {
        SameSite::None
    } else {
        SameSite::Lax
    };
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .path("/")
        .secure(production)
        .same_site(same_site)
        .max_age(max_age)
        .build()
}

pub fn session_cookie(config: &AppConfig, headers: &HeaderMap, token: String) -> Cookie<'static> {
    build(
        config,
        headers,
        token,
        Duration::milliseconds(config.jwt.ttl_millis()),
    )
}

/// Same attribute computation with `Max-Age=0`, which tells the client to
/// drop the cookie immediately.
pub fn clear_cookie(config: &AppConfig, headers: &HeaderMap) -> Cookie<'static> {
    build(config, headers, String::new(), Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, JwtConfig};
    use axum::http::HeaderValue;

    fn make_config(environment: Environment, public_origin: Option<&str>) -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/easyauth".into(),
            jwt: JwtConfig {
                secret: "f3b1c9d4e8a2470bb61c5d9e2a7f80c4d5e6f7a8b9c0d1e2".into(),
                ttl_minutes: 15,
            },
            environment,
            host: "0.0.0.0".into(),
            port: 4000,
            cors_origin: "http://localhost:3000".into(),
            public_origin: public_origin.map(|s| s.to_string()),
        }
    }

    fn headers(host: &str, origin: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(header::HOST, HeaderValue::from_str(host).unwrap());
        if let Some(origin) = origin {
            map.insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
        }
        map
    }

    #[test]
    fn development_cookie_is_lax_and_not_secure() {
        let config = make_config(Environment::Development, None);
        let headers = headers("localhost:4000", Some("http://localhost:3000"));
        let cookie = session_cookie(&config, &headers, "token".into());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(15)));
    }

    #[test]
    fn production_same_origin_stays_lax() {
        let config = make_config(Environment::Production, None);
        let headers = headers("auth.example.com", Some("https://auth.example.com"));
        let cookie = session_cookie(&config, &headers, "token".into());
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn production_cross_origin_gets_same_site_none() {
        let config = make_config(Environment::Production, None);
        let headers = headers("auth.example.com", Some("https://app.example.com"));
        let cookie = session_cookie(&config, &headers, "token".into());
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
    }

    #[test]
    fn configured_public_origin_overrides_host_header() {
        // Proxy rewrote Host; the static origin keeps this same-site.
        let config = make_config(Environment::Production, Some("https://app.example.com"));
        let headers = headers("internal-pod:4000", Some("https://app.example.com"));
        let cookie = session_cookie(&config, &headers, "token".into());
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn missing_origin_header_is_treated_as_same_origin() {
        let config = make_config(Environment::Production, None);
        let headers = headers("auth.example.com", None);
        let cookie = session_cookie(&config, &headers, "token".into());
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn clear_cookie_expires_immediately_with_same_attributes() {
        let config = make_config(Environment::Development, None);
        let headers = headers("localhost:4000", None);
        let cookie = clear_cookie(&config, &headers);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
