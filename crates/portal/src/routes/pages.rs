//! Server-rendered entry pages: landing, login and registration.

use askama::Template;
use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use serde::Deserialize;

use warehub_core::Page;

use crate::actions::{ListQuery, spaces};
use crate::error::Result;
use crate::middleware::OptionalCaller;
use crate::middleware::gate::landing_path;
use crate::models::{Caller, SpaceDetail};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page))
        .route("/register", get(register_page))
}

/// Flash flags carried back to the forms after a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub viewer: Option<Caller>,
    pub landing: &'static str,
    pub catalog: Page<SpaceDetail>,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub viewer: Option<Caller>,
    pub landing: &'static str,
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub viewer: Option<Caller>,
    pub landing: &'static str,
    pub error: Option<&'static str>,
}

fn landing(caller: Option<&Caller>) -> &'static str {
    caller.map_or("/login", |c| landing_path(c.role))
}

fn error_message(flag: Option<&str>) -> Option<&'static str> {
    flag.map(|flag| match flag {
        "credentials" => "Invalid email or password, or the account is not active yet.",
        _ => "Please check the form and try again.",
    })
}

// =============================================================================
// Handlers
// =============================================================================

async fn home(
    State(state): State<AppState>,
    OptionalCaller(caller): OptionalCaller,
) -> Result<Html<String>> {
    let catalog = spaces::catalog(&state, &ListQuery::default()).await?;
    let template = HomeTemplate {
        landing: landing(caller.as_ref()),
        viewer: caller,
        catalog,
    };
    Ok(Html(template.render()?))
}

async fn login_page(
    OptionalCaller(caller): OptionalCaller,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>> {
    let template = LoginTemplate {
        landing: landing(caller.as_ref()),
        viewer: caller,
        error: error_message(query.error.as_deref()),
        success: query
            .success
            .as_deref()
            .map(|_| "Thanks for registering. We will email you once your account is approved."),
    };
    Ok(Html(template.render()?))
}

async fn register_page(
    OptionalCaller(caller): OptionalCaller,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>> {
    let template = RegisterTemplate {
        landing: landing(caller.as_ref()),
        viewer: caller,
        error: error_message(query.error.as_deref()),
    };
    Ok(Html(template.render()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warehub_core::{Role, UserId};

    #[test]
    fn test_login_page_renders_flash_messages() {
        let page = LoginTemplate {
            viewer: None,
            landing: "/login",
            error: error_message(Some("credentials")),
            success: None,
        };
        let Ok(html) = page.render() else {
            panic!("login page should render");
        };
        assert!(html.contains("Invalid email or password"));
        assert!(html.contains("action=\"/api/auth/login\""));
    }

    #[test]
    fn test_signed_in_header_links_to_landing() {
        let caller = Caller {
            id: UserId::new(3),
            role: Role::Customer,
            name: "Dana Reyes".to_owned(),
            email: "dana@example.com".to_owned(),
        };
        let page = RegisterTemplate {
            landing: landing(Some(&caller)),
            viewer: Some(caller),
            error: None,
        };
        let Ok(html) = page.render() else {
            panic!("register page should render");
        };
        assert!(html.contains("href=\"/dashboard/my-spaces\""));
        assert!(html.contains("Dana Reyes"));
    }
}
