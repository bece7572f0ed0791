//! Route table and admin gating

use std::fmt;

use serde::Serialize;

use crate::auth::User;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", content = "slug", rename_all = "snake_case")]
pub enum Route {
    Home,
    Projects,
    ProjectDetail(String),
    AdminLogin,
    AdminDashboard,
    AdminProjects,
    AdminExperiences,
}

/// Outcome of resolving a route for the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "route", rename_all = "snake_case")]
pub enum Navigation {
    Render(Route),
    Redirect(Route),
}

impl Route {
    /// Match a path against the route table; unknown paths redirect home
    pub fn parse(path: &str) -> Navigation {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let route = match segments.as_slice() {
            [] | ["home"] => Some(Route::Home),
            ["proyectos"] => Some(Route::Projects),
            ["proyectos", slug] => Some(Route::ProjectDetail((*slug).to_string())),
            ["admin"] => Some(Route::AdminDashboard),
            ["admin", "login"] => Some(Route::AdminLogin),
            ["admin", "projects"] => Some(Route::AdminProjects),
            ["admin", "experiences"] => Some(Route::AdminExperiences),
            _ => None,
        };
        match route {
            Some(route) => Navigation::Render(route),
            None => Navigation::Redirect(Route::Home),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Projects => "/proyectos".to_string(),
            Route::ProjectDetail(slug) => format!("/proyectos/{}", slug),
            Route::AdminLogin => "/admin/login".to_string(),
            Route::AdminDashboard => "/admin".to_string(),
            Route::AdminProjects => "/admin/projects".to_string(),
            Route::AdminExperiences => "/admin/experiences".to_string(),
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Route::AdminDashboard | Route::AdminProjects | Route::AdminExperiences
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Gate admin routes behind a signed-in user
pub fn resolve(route: Route, user: Option<&User>) -> Navigation {
    if route.requires_auth() && user.is_none() {
        Navigation::Redirect(Route::AdminLogin)
    } else {
        Navigation::Render(route)
    }
}

/// `Route::parse` followed by `resolve`
pub fn navigate(path: &str, user: Option<&User>) -> Navigation {
    match Route::parse(path) {
        Navigation::Render(route) => resolve(route, user),
        redirect => redirect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> User {
        User {
            id: "u1".to_string(),
            email: Some("admin@example.com".to_string()),
            user_metadata: Default::default(),
        }
    }

    #[test]
    fn test_parse_route_table() {
        assert_eq!(Route::parse("/"), Navigation::Render(Route::Home));
        assert_eq!(Route::parse("/home"), Navigation::Render(Route::Home));
        assert_eq!(Route::parse("/proyectos/"), Navigation::Render(Route::Projects));
        assert_eq!(
            Route::parse("/proyectos/web-app?ref=home"),
            Navigation::Render(Route::ProjectDetail("web-app".to_string()))
        );
        assert_eq!(
            Route::parse("/admin/experiences"),
            Navigation::Render(Route::AdminExperiences)
        );
    }

    #[test]
    fn test_unknown_paths_redirect_home() {
        assert_eq!(Route::parse("/blog"), Navigation::Redirect(Route::Home));
        assert_eq!(
            Route::parse("/proyectos/a/b"),
            Navigation::Redirect(Route::Home)
        );
    }

    #[test]
    fn test_admin_routes_need_user() {
        assert_eq!(
            resolve(Route::AdminProjects, None),
            Navigation::Redirect(Route::AdminLogin)
        );
        assert_eq!(
            resolve(Route::AdminProjects, Some(&admin())),
            Navigation::Render(Route::AdminProjects)
        );
        assert_eq!(
            resolve(Route::AdminLogin, None),
            Navigation::Render(Route::AdminLogin)
        );
        assert_eq!(navigate("/admin", None), Navigation::Redirect(Route::AdminLogin));
    }

    #[test]
    fn test_path_round_trip() {
        for route in [
            Route::Home,
            Route::Projects,
            Route::ProjectDetail("logo".to_string()),
            Route::AdminLogin,
            Route::AdminDashboard,
            Route::AdminProjects,
            Route::AdminExperiences,
        ] {
            assert_eq!(Route::parse(&route.path()), Navigation::Render(route));
        }
    }
}
