//! Cache Key Module
//!
//! Deterministic identifiers for cacheable reads.

use std::fmt;

use url::form_urlencoded;

use crate::transport::Method;

// == Cache Key ==
/// Canonical form of `{method, path, query}`.
///
/// Query parameters are sorted by name then value, so two logically identical
/// reads produce the same key regardless of parameter insertion order. A query
/// written inline in `path` is decoded and merged with `params`, so
/// `/services?city=lyon` and `/services` with `city=lyon` share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: String,
    canonical: String,
}

impl CacheKey {
    pub fn new(method: Method, path: &str, params: &[(String, String)]) -> Self {
        let (bare, query) = split_query(path);
        let path = normalize_path(bare);

        let mut sorted: Vec<(String, String)> = query
            .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        sorted.extend(params.iter().cloned());
        sorted.sort_unstable();

        let mut canonical = format!("{} {}", method.as_str(), path);
        for (i, (name, value)) in sorted.iter().enumerate() {
            canonical.push(if i == 0 { '?' } else { '&' });
            canonical.push_str(&escape(name));
            canonical.push('=');
            canonical.push_str(&escape(value));
        }

        Self { path, canonical }
    }

    /// Resource path the key was built from.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Resource path of `path` with any inline query or fragment removed.
pub(crate) fn resource_path(path: &str) -> String {
    normalize_path(split_query(path).0)
}

// Drops the fragment, then splits off the query.
fn split_query(path: &str) -> (&str, Option<&str>) {
    let path = path.split_once('#').map_or(path, |(before, _)| before);
    match path.split_once('?') {
        Some((bare, query)) => (bare, Some(query)),
        None => (path, None),
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let with_slash = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };
    match with_slash.trim_end_matches('/') {
        "" => "/".to_string(),
        p => p.to_string(),
    }
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for ch in component.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            '?' => out.push_str("%3F"),
            '#' => out.push_str("%23"),
            ' ' => out.push_str("%20"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parameter_order_does_not_matter() {
        let a = CacheKey::new(
            Method::Get,
            "/services",
            &params(&[("category", "yoga"), ("city", "lyon")]),
        );
        let b = CacheKey::new(
            Method::Get,
            "/services",
            &params(&[("city", "lyon"), ("category", "yoga")]),
        );

        assert_eq!(a, b);
        assert_eq!(a.as_str(), "GET /services?category=yoga&city=lyon");
    }

    #[test]
    fn test_method_and_path_distinguish_keys() {
        let get = CacheKey::new(Method::Get, "/bookings/42", &[]);
        let delete = CacheKey::new(Method::Delete, "/bookings/42", &[]);
        let other = CacheKey::new(Method::Get, "/bookings/43", &[]);

        assert_ne!(get, delete);
        assert_ne!(get, other);
    }

    #[test]
    fn test_separators_in_values_cannot_collide() {
        let injected = CacheKey::new(Method::Get, "/s", &params(&[("a", "1&b=2")]));
        let split = CacheKey::new(Method::Get, "/s", &params(&[("a", "1"), ("b", "2")]));

        assert_ne!(injected, split);
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(normalize_path("services/"), "/services");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(
            CacheKey::new(Method::Get, "/services/", &[]),
            CacheKey::new(Method::Get, "services", &[])
        );
    }

    #[test]
    fn test_inline_query_matches_params() {
        let reversed = CacheKey::new(Method::Get, "/services?city=lyon&category=yoga", &[]);
        let ordered = CacheKey::new(Method::Get, "/services?category=yoga&city=lyon", &[]);
        let split = CacheKey::new(
            Method::Get,
            "/services",
            &params(&[("category", "yoga"), ("city", "lyon")]),
        );
        let mixed = CacheKey::new(Method::Get, "/services/?city=lyon", &params(&[("category", "yoga")]));

        assert_eq!(reversed, ordered);
        assert_eq!(reversed, split);
        assert_eq!(reversed, mixed);
        assert_eq!(reversed.path(), "/services");
    }

    #[test]
    fn test_inline_query_is_decoded() {
        let encoded = CacheKey::new(Method::Get, "/search?q=hot%20yoga&tag=a%26b", &[]);
        let plain = CacheKey::new(
            Method::Get,
            "/search",
            &params(&[("q", "hot yoga"), ("tag", "a&b")]),
        );

        assert_eq!(encoded, plain);
        assert_eq!(encoded.as_str(), "GET /search?q=hot%20yoga&tag=a%26b");
    }

    #[test]
    fn test_resource_path_strips_query_and_fragment() {
        assert_eq!(resource_path("/services?city=lyon"), "/services");
        assert_eq!(resource_path("services/#top"), "/services");
        assert_eq!(resource_path("/?page=2"), "/");
    }

    #[test]
    fn test_repeated_parameters_are_kept() {
        let key = CacheKey::new(
            Method::Get,
            "/slots",
            &params(&[("day", "tue"), ("day", "mon")]),
        );
        assert_eq!(key.as_str(), "GET /slots?day=mon&day=tue");
    }
}
