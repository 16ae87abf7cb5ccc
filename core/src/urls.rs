//! Host normalization and redirect target resolution.

use url::Url;

/// Fixed path prefix of the controller's REST API.
pub const API_PREFIX: &str = "/universal-robots/robot-api";

/// Prefix `http://` unless `host` already carries an `http` or `https` scheme.
///
/// `10.0.0.5` and `localhost:50020` get the prefix; `https://robot` is
/// returned untouched. Leading spaces and C0 control characters are dropped
/// before the scheme is looked at. Empty input stays empty.
pub fn ensure_http_scheme(host: &str) -> String {
    let host = host.trim_start_matches(|c: char| c <= ' ');
    if host.is_empty() {
        return String::new();
    }
    match scheme_of(host) {
        Some(scheme) if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") => {
            host.to_string()
        }
        _ => format!("http://{host}"),
    }
}

/// Base URL for every request against `host`.
pub fn base_url_for(host: &str) -> String {
    let with_scheme = ensure_http_scheme(host);
    format!("{}{API_PREFIX}", with_scheme.trim_end_matches('/'))
}

/// Resolve a `Location` header against the URL that produced it.
///
/// Relative locations inherit the current authority. An absolute location
/// without a port takes the current URL's explicit port, so an http->https
/// upgrade from a non-default deployment keeps talking to the same port. An
/// explicit port in the location always wins. A port written out in the
/// current URL counts even when it is the scheme default. Returns `None` when
/// either URL cannot be parsed.
pub fn resolve_redirect(current: &str, location: &str) -> Option<String> {
    let base = Url::parse(current).ok()?;
    let mut target = base.join(location).ok()?;

    // `Url::port` hides a default port such as `:80`.
    let current_port = if authority_has_port(current) {
        base.port_or_known_default()
    } else {
        None
    };
    if let Some(port) = current_port {
        let names_authority = location.starts_with("//") || Url::parse(location).is_ok();
        if names_authority && target.has_host() && !authority_has_port(location) && target.port().is_none() {
            target.set_port(Some(port)).ok()?;
        }
    }
    Some(target.into())
}

/// The scheme of `s` per RFC 3986 (`ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"`).
fn scheme_of(s: &str) -> Option<&str> {
    let (candidate, _) = s.split_once(':')?;
    let mut chars = candidate.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    chars
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(candidate)
}

/// Whether the authority of an absolute URL string names a port, including a
/// scheme-default port that `Url` would normalize away.
fn authority_has_port(absolute: &str) -> bool {
    let Some((_, rest)) = absolute.split_once("//") else {
        return false;
    };
    let authority = rest
        .split(|c: char| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or("");
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    let after_host = match host_port.rfind(']') {
        Some(end) => &host_port[end + 1..],
        None => host_port,
    };
    after_host.contains(':')
}
