//! Reverse-proxy routing rules.

use serde::Serialize;

use crate::service::Endpoint;

/// A prefix route to an upstream service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    /// Path prefix, starting with `/`.
    pub prefix: String,
    /// Target service.
    pub service: String,
    /// Upstream URL of the target.
    pub upstream: String,
}

impl Route {
    /// Whether `path` falls under this prefix on a segment boundary.
    ///
    /// `/api` matches `/api` and `/api/v1` but not `/apix`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let Some(rest) = path.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        rest.is_empty() || self.prefix.ends_with('/') || rest.starts_with('/')
    }
}

/// Prefix routes in declaration order plus a default upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingTable {
    /// Where the proxy listens.
    pub listen: Endpoint,
    /// Prefix routes; the first match wins.
    pub routes: Vec<Route>,
    /// Service receiving requests no prefix matches.
    pub default_service: String,
    /// Upstream URL of the default service.
    pub default_upstream: String,
}

impl RoutingTable {
    /// Service that handles `path`.
    #[must_use]
    pub fn route(&self, path: &str) -> &str {
        self.routes
            .iter()
            .find(|r| r.matches(path))
            .map_or(self.default_service.as_str(), |r| r.service.as_str())
    }

    /// Upstream URL that handles `path`.
    #[must_use]
    pub fn upstream(&self, path: &str) -> &str {
        self.routes
            .iter()
            .find(|r| r.matches(path))
            .map_or(self.default_upstream.as_str(), |r| r.upstream.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(prefix: &str, service: &str) -> Route {
        Route {
            prefix: prefix.into(),
            service: service.into(),
            upstream: format!("http://127.0.0.1/{service}"),
        }
    }

    fn table() -> RoutingTable {
        RoutingTable {
            listen: Endpoint {
                host: "0.0.0.0".into(),
                port: 80,
            },
            routes: vec![
                route("/api/admin", "admin"),
                route("/api", "backend"),
                route("/ws/", "backend"),
            ],
            default_service: "frontend".into(),
            default_upstream: "http://127.0.0.1:3782".into(),
        }
    }

    #[test]
    fn first_matching_prefix_wins() {
        let t = table();
        assert_eq!(t.route("/api/admin/users"), "admin");
        assert_eq!(t.route("/api/v1/chat"), "backend");
        assert_eq!(t.route("/api"), "backend");
    }

    #[test]
    fn prefix_respects_segment_boundary() {
        let t = table();
        assert_eq!(t.route("/apix"), "frontend");
        assert_eq!(t.route("/ws/session"), "backend");
    }

    #[test]
    fn unmatched_goes_to_default() {
        let t = table();
        assert_eq!(t.route("/"), "frontend");
        assert_eq!(t.upstream("/index.html"), "http://127.0.0.1:3782");
    }

    #[test]
    fn shadowed_order_is_declaration_order() {
        let mut t = table();
        t.routes.reverse();
        assert_eq!(t.route("/api/admin/users"), "backend");
    }
}
