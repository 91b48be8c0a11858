//! Locale prefixes.
//!
//! A site may publish one tree per locale (`/en/...`, `/fr/...`). The static
//! fallback strips a known locale segment before applying the trailing-slash
//! policy and re-applies it to object keys and redirect targets.

use axum::http::{header::COOKIE, HeaderMap};

/// Cookie naming the visitor's preferred locale.
pub const LOCALE_COOKIE: &str = "locale";

/// Viewer-country header set by the CDN in front of the edge.
pub const VIEWER_COUNTRY_HEADER: &str = "cloudfront-viewer-country";

/// A request path split around the tree it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalizedPath<'a> {
    /// Locale segment, or the route prefix of a sub-site.
    pub base: Option<&'a str>,
    /// Path below the base, without its leading `/` (`""` for the root).
    pub rest: &'a str,
}

impl<'a> LocalizedPath<'a> {
    /// Split `path` when its first segment is one of `locales`.
    pub fn split(path: &'a str, locales: &[String]) -> Self {
        let relative = path.strip_prefix('/').unwrap_or(path);

        let (first, rest) = match relative.split_once('/') {
            Some((first, rest)) => (first, rest),
            None => (relative, ""),
        };

        match locales.iter().find(|l| l.as_str() == first) {
            Some(_) if !first.is_empty() => Self {
                base: Some(first),
                rest,
            },
            _ => Self {
                base: None,
                rest: relative,
            },
        }
    }

    /// A path below a fixed base such as a sub-site route.
    pub fn under(base: &'a str, rest: &'a str) -> Self {
        Self {
            base: Some(base),
            rest,
        }
    }

    /// Object key for `candidate`, below the base tree when there is one.
    pub fn key(&self, candidate: &str) -> String {
        match self.base {
            Some(base) => format!("{}/{}", base, candidate),
            None => candidate.to_string(),
        }
    }

    /// Public path for `rest`, re-prefixed with the base.
    pub fn public_path(&self, rest: &str) -> String {
        match self.base {
            Some(base) if rest.is_empty() => format!("/{}", base),
            Some(base) => format!("/{}/{}", base, rest),
            None => format!("/{}", rest),
        }
    }
}

fn cookie_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"'))
}

/// The locale a visitor asked for: the `locale` cookie first, then (when
/// enabled) the viewer-country header. Only known locales are returned.
pub fn preferred_locale<'l>(
    headers: &HeaderMap,
    locales: &'l [String],
    use_viewer_country: bool,
) -> Option<&'l str> {
    if let Some(wanted) = cookie_value(headers, LOCALE_COOKIE) {
        if let Some(locale) = locales.iter().find(|l| l.as_str() == wanted) {
            return Some(locale.as_str());
        }
    }

    if !use_viewer_country {
        return None;
    }

    let country = headers.get(VIEWER_COUNTRY_HEADER)?.to_str().ok()?.trim();
    locales
        .iter()
        .find(|l| l.eq_ignore_ascii_case(country))
        .map(String::as_str)
}
