//! crates/sonicwave_core/src/routes.rs
//!
//! The route surface of the studio, the sign-in guard in front of it, and the
//! navigation items shown in the header.

use std::fmt;
use uuid::Uuid;

use crate::session::SessionSnapshot;
use crate::views::editor::EditorMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    Login,
    ForgotPassword,
    Dashboard,
    /// `/editor`, `/editor?new=true`, `/editor/:projectId`.
    Editor { project_id: Option<Uuid>, new: bool },
    Profile,
    Settings,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no route matches '{0}'")]
    UnknownPath(String),
    #[error("'{0}' is not a valid project id")]
    InvalidProjectId(String),
}

impl Route {
    pub fn editor_for(project_id: Uuid) -> Self {
        Route::Editor {
            project_id: Some(project_id),
            new: false,
        }
    }

    pub fn new_project() -> Self {
        Route::Editor {
            project_id: None,
            new: true,
        }
    }

    /// Parses a path with an optional query string.
    pub fn parse(target: &str) -> Result<Self, RouteError> {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let route = match segments.as_slice() {
            [] => Route::Root,
            ["login"] => Route::Login,
            ["forgot-password"] => Route::ForgotPassword,
            ["dashboard"] => Route::Dashboard,
            ["profile"] => Route::Profile,
            ["settings"] => Route::Settings,
            ["editor"] => Route::Editor {
                project_id: None,
                new: query_flag(query, "new"),
            },
            ["editor", id] => {
                let project_id = Uuid::parse_str(id)
                    .map_err(|_| RouteError::InvalidProjectId(id.to_string()))?;
                Route::Editor {
                    project_id: Some(project_id),
                    new: query_flag(query, "new"),
                }
            }
            _ => return Err(RouteError::UnknownPath(target.to_string())),
        };
        Ok(route)
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Root | Route::Login | Route::ForgotPassword)
    }

    /// `?new=true` wins over a project id, and a bare `/editor` is a new project.
    pub fn editor_mode(&self) -> Option<EditorMode> {
        match self {
            Route::Editor {
                project_id: Some(id),
                new: false,
            } => Some(EditorMode::Existing(*id)),
            Route::Editor { .. } => Some(EditorMode::New),
            _ => None,
        }
    }
}

fn query_flag(query: Option<&str>, name: &str) -> bool {
    query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .filter_map(|pair| pair.split_once('='))
        .any(|(key, value)| key == name && value == "true")
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Root => f.write_str("/"),
            Route::Login => f.write_str("/login"),
            Route::ForgotPassword => f.write_str("/forgot-password"),
            Route::Dashboard => f.write_str("/dashboard"),
            Route::Profile => f.write_str("/profile"),
            Route::Settings => f.write_str("/settings"),
            Route::Editor { project_id, new } => {
                f.write_str("/editor")?;
                if let Some(id) = project_id {
                    write!(f, "/{}", id)?;
                }
                if *new {
                    f.write_str("?new=true")?;
                }
                Ok(())
            }
        }
    }
}

/// What the shell does with a requested route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(Route),
    /// The session is still being resolved.
    Wait,
}

pub fn guard(route: Route, session: &SessionSnapshot) -> Navigation {
    if route == Route::Root {
        return Navigation::Redirect(Route::Dashboard);
    }
    if session.loading {
        return Navigation::Wait;
    }
    if route.requires_auth() && !session.is_authenticated() {
        return Navigation::Redirect(Route::Login);
    }
    if route == Route::Login && session.is_authenticated() {
        return Navigation::Redirect(Route::Dashboard);
    }
    Navigation::Render(route)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub label: &'static str,
    pub route: Route,
}

pub fn nav_items() -> Vec<NavItem> {
    vec![
        NavItem {
            label: "Dashboard",
            route: Route::Dashboard,
        },
        NavItem {
            label: "Editor",
            route: Route::Editor {
                project_id: None,
                new: false,
            },
        },
    ]
}

/// Active when the current path (without query) equals the item's path.
pub fn is_active(item: &NavItem, current: &Route) -> bool {
    let current = current.to_string();
    let current_path = current.split('?').next().unwrap_or_default();
    item.route.to_string() == current_path
}

/// Where the shell goes after signing out.
pub fn after_sign_out() -> Route {
    Route::Login
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(loading: bool, signed_in: bool) -> SessionSnapshot {
        let identity = signed_in.then(|| crate::domain::Identity {
            id: Uuid::new_v4(),
            email: None,
            created_at: chrono::Utc::now(),
        });
        SessionSnapshot {
            identity,
            profile: None,
            loading,
            error: None,
        }
    }

    #[test]
    fn parses_the_route_surface() {
        let id = Uuid::new_v4();
        assert_eq!(Route::parse("/login"), Ok(Route::Login));
        assert_eq!(Route::parse("/dashboard"), Ok(Route::Dashboard));
        assert_eq!(Route::parse("/"), Ok(Route::Root));
        assert_eq!(Route::parse("/editor?new=true"), Ok(Route::new_project()));
        assert_eq!(Route::parse(&format!("/editor/{}", id)), Ok(Route::editor_for(id)));
        assert_eq!(
            Route::parse("/editor/abc"),
            Err(RouteError::InvalidProjectId("abc".into()))
        );
        assert!(matches!(Route::parse("/admin"), Err(RouteError::UnknownPath(_))));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for route in [
            Route::Settings,
            Route::new_project(),
            Route::editor_for(Uuid::new_v4()),
            Route::ForgotPassword,
        ] {
            assert_eq!(Route::parse(&route.to_string()), Ok(route));
        }
    }

    #[test]
    fn editor_mode_follows_the_new_flag() {
        let id = Uuid::new_v4();
        assert_eq!(Route::editor_for(id).editor_mode(), Some(EditorMode::Existing(id)));
        let flagged = Route::Editor {
            project_id: Some(id),
            new: true,
        };
        assert_eq!(flagged.editor_mode(), Some(EditorMode::New));
        assert_eq!(Route::parse("/editor").unwrap().editor_mode(), Some(EditorMode::New));
        assert_eq!(Route::Profile.editor_mode(), None);
    }

    #[test]
    fn guard_sends_signed_out_users_to_login() {
        assert_eq!(
            guard(Route::Dashboard, &snapshot(false, false)),
            Navigation::Redirect(Route::Login)
        );
        assert_eq!(guard(Route::Dashboard, &snapshot(true, false)), Navigation::Wait);
        assert_eq!(
            guard(Route::Dashboard, &snapshot(false, true)),
            Navigation::Render(Route::Dashboard)
        );
        assert_eq!(
            guard(Route::ForgotPassword, &snapshot(false, false)),
            Navigation::Render(Route::ForgotPassword)
        );
        assert_eq!(
            guard(Route::Login, &snapshot(false, true)),
            Navigation::Redirect(Route::Dashboard)
        );
        assert_eq!(
            guard(Route::Root, &snapshot(true, false)),
            Navigation::Redirect(Route::Dashboard)
        );
    }

    #[test]
    fn active_nav_item_ignores_the_query() {
        let items = nav_items();
        assert!(is_active(&items[0], &Route::Dashboard));
        assert!(is_active(&items[1], &Route::parse("/editor?new=true").unwrap()));
        assert!(!is_active(&items[1], &Route::editor_for(Uuid::new_v4())));
    }
}
