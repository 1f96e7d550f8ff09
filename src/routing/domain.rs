//! Mapping registry keys to routing domains.

/// Derive the routing domain for a registry key.
///
/// A key of the form `/<root>/<app>/<version>/...` maps to
/// `<version><sep><app><sep><base_host>`. Returns `None` when the key has
/// fewer than four `/`-separated segments; callers decide whether that is
/// fatal (snapshot load) or skippable (live updates).
pub fn key_to_domain(key: &str, separator: &str, base_host: &str) -> Option<String> {
    let segments: Vec<&str> = key.split('/').collect();
    if segments.len() < 4 {
        return None;
    }
    Some([segments[3], segments[2], base_host].join(separator))
}

/// Separator and base host used to build routing domains.
#[derive(Debug, Clone)]
pub struct DomainScheme {
    separator: String,
    base_host: String,
}

impl DomainScheme {
    pub fn new(separator: impl Into<String>, base_host: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            base_host: base_host.into(),
        }
    }

    /// Routing domain for a registry key, or `None` for a too-shallow key.
    pub fn domain_for(&self, key: &str) -> Option<String> {
        key_to_domain(key, &self.separator, &self.base_host)
    }
}
