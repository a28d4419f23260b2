//! Access control gate.
//!
//! Every request passes through [`access_gate`] before reaching a handler.
//! The routing decision itself is the pure [`GatePolicy::decide`]; the
//! middleware only extracts the session token, verifies it and applies the
//! decision. A session cookie that fails to verify does not hide a valid
//! bearer token.
//!
//! Decision order (first match wins):
//!
//! 1. Public path: forward.
//! 2. No valid session: redirect to the login page.
//! 3. Customer at the bare dashboard root: redirect to the customer landing.
//! 4. Non-admin on an admin-only path: redirect to the customer landing.
//! 5. Customer outside the customer-allowed paths: redirect to the customer
//!    landing.
//! 6. Otherwise forward.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use cookie::Cookie;
use tracing::Span;

use warehub_core::Role;

use crate::models::Caller;
use crate::services::auth::SESSION_COOKIE;
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/login";
pub const ADMIN_LANDING: &str = "/dashboard";
pub const CUSTOMER_LANDING: &str = "/dashboard/my-spaces";

/// Where a role lands after logging in.
#[must_use]
pub const fn landing_path(role: Role) -> &'static str {
    match role {
        Role::Admin => ADMIN_LANDING,
        Role::Customer => CUSTOMER_LANDING,
    }
}

/// What the gate does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Forward,
    /// `303 See Other` to the given path.
    Redirect(&'static str),
}

/// Path tables consulted by the gate.
#[derive(Debug, Clone, Copy)]
pub struct GatePolicy {
    public_exact: &'static [&'static str],
    public_prefixes: &'static [&'static str],
    admin_prefixes: &'static [&'static str],
    customer_prefixes: &'static [&'static str],
}

impl GatePolicy {
    /// The portal's path tables.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            public_exact: &["/", "/login", "/register", "/health", "/health/ready"],
            public_prefixes: &[
                "/api/auth",
                "/api/space-requests",
                "/api/spaces/available",
                "/static",
            ],
            admin_prefixes: &[
                "/dashboard/warehouses",
                "/dashboard/spaces",
                "/dashboard/agreements",
                "/dashboard/clients",
                "/dashboard/space-requests",
                "/api/admin",
                "/api/analytics",
            ],
            customer_prefixes: &[
                "/dashboard/my-spaces",
                "/dashboard/my-agreements",
                "/dashboard/invoices",
                "/dashboard/support",
                "/dashboard/profile",
                "/api/support",
            ],
        }
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public_exact.contains(&path) || matches_any(path, self.public_prefixes)
    }

    /// Decide what to do with a request for `path` from a caller holding
    /// `role` (`None` when there is no valid session).
    #[must_use]
    pub fn decide(&self, path: &str, role: Option<Role>) -> GateDecision {
        if self.is_public(path) {
            return GateDecision::Forward;
        }
        let Some(role) = role else {
            return GateDecision::Redirect(LOGIN_PATH);
        };
        if role == Role::Customer && matches!(path, "/dashboard" | "/dashboard/") {
            return GateDecision::Redirect(CUSTOMER_LANDING);
        }
        if role != Role::Admin && matches_any(path, self.admin_prefixes) {
            return GateDecision::Redirect(CUSTOMER_LANDING);
        }
        if role == Role::Customer && !matches_any(path, self.customer_prefixes) {
            return GateDecision::Redirect(CUSTOMER_LANDING);
        }
        GateDecision::Forward
    }
}

/// Segment-aware prefix match: `/dashboard/spaces` matches
/// `/dashboard/spaces/4` but not `/dashboard/spacesX`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn matches_any(path: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| matches_prefix(path, p))
}

/// Candidate session tokens: the cookie first, then a bearer token.
fn session_tokens(headers: &HeaderMap) -> Vec<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value().to_owned());

    let from_bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_owned());

    from_cookie.into_iter().chain(from_bearer).collect()
}

/// Apply the [`GatePolicy`] to every request.
///
/// On forward with a valid session the decoded [`Caller`] is inserted into
/// the request extensions.
pub async fn access_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let caller: Option<Caller> = session_tokens(request.headers())
        .iter()
        .find_map(|token| {
            state
                .sessions()
                .verify(token)
                .inspect_err(|e| tracing::debug!(error = %e, "Ignoring invalid session token"))
                .ok()
        });

    let path = request.uri().path().to_owned();
    match GatePolicy::standard().decide(&path, caller.as_ref().map(|c| c.role)) {
        GateDecision::Forward => {
            if let Some(caller) = caller {
                Span::current().record("user_id", caller.id.as_i32());
                request.extensions_mut().insert(caller);
            }
            next.run(request).await
        }
        GateDecision::Redirect(to) => {
            tracing::debug!(%path, to, "Gate redirect");
            Redirect::to(to).into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const GATE: GatePolicy = GatePolicy::standard();

    #[test]
    fn test_public_paths_forward_without_session() {
        for path in [
            "/",
            "/login",
            "/register",
            "/health",
            "/health/ready",
            "/api/auth/login",
            "/api/space-requests",
            "/api/spaces/available",
            "/static/app.css",
        ] {
            assert_eq!(GATE.decide(path, None), GateDecision::Forward, "{path}");
            assert_eq!(GATE.decide(path, Some(Role::Customer)), GateDecision::Forward, "{path}");
        }
    }

    #[test]
    fn test_protected_paths_require_session() {
        for path in ["/dashboard", "/dashboard/spaces", "/dashboard/support/3", "/api/admin/users"] {
            assert_eq!(GATE.decide(path, None), GateDecision::Redirect(LOGIN_PATH), "{path}");
        }
    }

    #[test]
    fn test_customer_dashboard_root_goes_to_landing() {
        for path in ["/dashboard", "/dashboard/"] {
            assert_eq!(
                GATE.decide(path, Some(Role::Customer)),
                GateDecision::Redirect(CUSTOMER_LANDING)
            );
        }
        assert_eq!(GATE.decide("/dashboard", Some(Role::Admin)), GateDecision::Forward);
    }

    #[test]
    fn test_customer_cannot_reach_admin_paths() {
        for path in [
            "/dashboard/warehouses",
            "/dashboard/spaces/7",
            "/dashboard/clients",
            "/dashboard/space-requests",
            "/api/admin/users",
            "/api/analytics/revenue",
        ] {
            assert_eq!(
                GATE.decide(path, Some(Role::Customer)),
                GateDecision::Redirect(CUSTOMER_LANDING),
                "{path}"
            );
            assert_eq!(GATE.decide(path, Some(Role::Admin)), GateDecision::Forward, "{path}");
        }
    }

    #[test]
    fn test_customer_allowed_paths_forward() {
        for path in [
            "/dashboard/my-spaces",
            "/dashboard/my-agreements/2",
            "/dashboard/invoices",
            "/dashboard/support/new",
            "/dashboard/profile",
            "/api/support/4/resolve",
        ] {
            assert_eq!(GATE.decide(path, Some(Role::Customer)), GateDecision::Forward, "{path}");
        }
    }

    #[test]
    fn test_unlisted_path_sends_customer_to_landing() {
        assert_eq!(
            GATE.decide("/dashboard/reports", Some(Role::Customer)),
            GateDecision::Redirect(CUSTOMER_LANDING)
        );
        assert_eq!(GATE.decide("/dashboard/reports", Some(Role::Admin)), GateDecision::Forward);
    }

    #[test]
    fn test_prefix_match_respects_segments() {
        assert!(matches_prefix("/dashboard/spaces", "/dashboard/spaces"));
        assert!(matches_prefix("/dashboard/spaces/1", "/dashboard/spaces"));
        assert!(!matches_prefix("/dashboard/spacesX", "/dashboard/spaces"));
        assert_eq!(
            GATE.decide("/dashboard/my-spacesX", Some(Role::Customer)),
            GateDecision::Redirect(CUSTOMER_LANDING)
        );
    }

    #[test]
    fn test_session_token_sources() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}=abc.def.ghi")).unwrap(),
        );
        assert_eq!(session_tokens(&headers), vec!["abc.def.ghi".to_owned()]);

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer tok"),
        );
        assert_eq!(
            session_tokens(&headers),
            vec!["abc.def.ghi".to_owned(), "tok".to_owned()]
        );

        assert!(session_tokens(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn test_landing_paths() {
        assert_eq!(landing_path(Role::Admin), "/dashboard");
        assert_eq!(landing_path(Role::Customer), "/dashboard/my-spaces");
    }
}
