/// Navigation decisions for the portal's pages
///
/// - signed-out visitor on a protected page: redirect to the login path
/// - signed-in visitor on the login page: redirect to the home path
/// - otherwise: allow
///
/// Banned accounts count as signed out.

use serde::{Deserialize, Serialize};

/// Kind of page being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Login,
    Protected,
}

/// Result of the guard check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum NavigationDecision {
    Allow,
    Redirect { location: String },
}

/// Login and home paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPaths {
    pub login: String,
    pub home: String,
}

impl Default for GuardPaths {
    fn default() -> Self {
        Self {
            login: "/login/".to_string(),
            home: "/home/".to_string(),
        }
    }
}

/// Decides what happens when a visitor opens `page`
pub fn decide(page: Page, signed_in: bool, paths: &GuardPaths) -> NavigationDecision {
    match (page, signed_in) {
        (Page::Protected, false) => NavigationDecision::Redirect {
            location: paths.login.clone(),
        },
        (Page::Login, true) => NavigationDecision::Redirect {
            location: paths.home.clone(),
        },
        _ => NavigationDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decisions() {
        let paths = GuardPaths::default();

        assert_eq!(
            decide(Page::Protected, false, &paths),
            NavigationDecision::Redirect { location: "/login/".into() }
        );
        assert_eq!(
            decide(Page::Login, true, &paths),
            NavigationDecision::Redirect { location: "/home/".into() }
        );
        assert_eq!(decide(Page::Protected, true, &paths), NavigationDecision::Allow);
        assert_eq!(decide(Page::Login, false, &paths), NavigationDecision::Allow);
    }

    #[test]
    fn test_wire_format() {
        let allow = serde_json::to_value(NavigationDecision::Allow).unwrap();
        assert_eq!(allow, serde_json::json!({"action": "allow"}));

        let redirect = serde_json::to_value(NavigationDecision::Redirect {
            location: "/login/".into(),
        })
        .unwrap();
        assert_eq!(redirect, serde_json::json!({"action": "redirect", "location": "/login/"}));

        let page: Page = serde_json::from_str("\"protected\"").unwrap();
        assert_eq!(page, Page::Protected);
    }
}
