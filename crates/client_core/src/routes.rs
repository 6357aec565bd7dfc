//! Navigable views and the guards in front of them.

use std::fmt;

use shared::{domain::SubmissionId, protocol::UserSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Wizard,
    Login,
    Dashboard,
    Preview(SubmissionId),
    Edit(SubmissionId),
    Users,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Wizard => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Dashboard => "/admin".to_string(),
            Route::Preview(id) => format!("/preview/{id}"),
            Route::Edit(id) => format!("/edit/{id}"),
            Route::Users => "/users".to_string(),
        }
    }

    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim().trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Some(Route::Wizard),
            ["login"] => Some(Route::Login),
            ["admin"] => Some(Route::Dashboard),
            ["users"] => Some(Route::Users),
            ["preview", id] => id.parse().ok().map(|id| Route::Preview(SubmissionId(id))),
            ["edit", id] => id.parse().ok().map(|id| Route::Edit(SubmissionId(id))),
            _ => None,
        }
    }

    pub fn requires_login(&self) -> bool {
        !matches!(self, Route::Login)
    }

    pub fn requires_admin(&self) -> bool {
        matches!(self, Route::Users)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Checks `route` against the signed-in user and returns the redirect target when access is denied.
pub fn guard(route: Route, user: Option<&UserSummary>) -> Result<Route, Route> {
    match user {
        None if route.requires_login() => Err(Route::Login),
        Some(user) if route.requires_admin() && !user.role.is_admin() => Err(Route::Dashboard),
        Some(_) if route == Route::Login => Err(Route::Dashboard),
        _ => Ok(route),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::domain::{Role, UserId};

    fn user(role: Role) -> UserSummary {
        UserSummary {
            id: UserId(1),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn paths_parse_back_to_routes() {
        for route in [
            Route::Wizard,
            Route::Login,
            Route::Dashboard,
            Route::Preview(SubmissionId(4)),
            Route::Edit(SubmissionId(9)),
            Route::Users,
        ] {
            assert_eq!(Route::parse(&route.path()), Some(route));
        }
        assert_eq!(Route::parse("/edit/abc"), None);
        assert_eq!(Route::parse("/nowhere"), None);
    }

    #[test]
    fn anonymous_users_are_sent_to_login() {
        assert_eq!(guard(Route::Dashboard, None), Err(Route::Login));
        assert_eq!(guard(Route::Wizard, None), Err(Route::Login));
        assert_eq!(guard(Route::Login, None), Ok(Route::Login));
    }

    #[test]
    fn writers_cannot_open_user_management() {
        let writer = user(Role::Writer);
        assert_eq!(guard(Route::Users, Some(&writer)), Err(Route::Dashboard));
        assert_eq!(
            guard(Route::Edit(SubmissionId(1)), Some(&writer)),
            Ok(Route::Edit(SubmissionId(1)))
        );
        assert_eq!(guard(Route::Users, Some(&user(Role::Admin))), Ok(Route::Users));
    }

    #[test]
    fn signed_in_users_skip_the_login_view() {
        assert_eq!(
            guard(Route::Login, Some(&user(Role::Writer))),
            Err(Route::Dashboard)
        );
    }
}
