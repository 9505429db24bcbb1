use serde::Serialize;
use utoipa::ToSchema;

use crate::session::RouteRequirement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RouteClass {
    StaffProtected,
    ClientProtected,
    Public,
    /// Never looked at by the edge: APIs, assets and the login pages.
    Excluded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    Exact,
    Prefix,
}

#[derive(Debug, Clone)]
struct RouteRule {
    path: &'static str,
    matching: Match,
    class: RouteClass,
    roles: Option<&'static [&'static str]>,
    admin_only: bool,
}

impl RouteRule {
    fn staff(path: &'static str) -> Self {
        Self {
            path,
            matching: Match::Prefix,
            class: RouteClass::StaffProtected,
            roles: None,
            admin_only: false,
        }
    }

    fn admin(path: &'static str) -> Self {
        Self {
            admin_only: true,
            ..Self::staff(path)
        }
    }

    fn roles(path: &'static str, roles: &'static [&'static str]) -> Self {
        Self {
            roles: Some(roles),
            ..Self::staff(path)
        }
    }

    fn client(path: &'static str) -> Self {
        Self {
            class: RouteClass::ClientProtected,
            ..Self::staff(path)
        }
    }

    fn exact(self) -> Self {
        Self {
            matching: Match::Exact,
            ..self
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self.matching {
            Match::Exact => path == self.path,
            Match::Prefix => is_segment_prefix(self.path, path),
        }
    }
}

const REPORT_ROLES: &[&str] = &["admin", "manager"];

const EXCLUDED: &[&str] = &[
    "/api",
    "/_next",
    "/static",
    "/assets",
    "/docs",
    "/api-docs",
    "/favicon.ico",
    "/auth",
    "/client-login",
];

/// Static table from path to route class.
///
/// Excluded prefixes are checked first and bypass everything else. Then an
/// exact rule wins over any prefix rule, and among prefix rules the longest
/// one wins. Paths nothing matches are public. Prefixes match on whole
/// segments, so `/tasks` covers `/tasks/42` but not `/taskstats`.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    rules: Vec<RouteRule>,
    excluded: Vec<&'static str>,
}

impl RouteClassifier {
    pub fn standard() -> Self {
        let rules = vec![
            RouteRule::staff("/").exact(),
            RouteRule::staff("/dashboard"),
            RouteRule::staff("/clients"),
            RouteRule::staff("/projects"),
            RouteRule::staff("/tasks"),
            RouteRule::staff("/campaigns"),
            RouteRule::staff("/content"),
            RouteRule::staff("/calendar"),
            RouteRule::staff("/team"),
            RouteRule::staff("/notifications"),
            RouteRule::roles("/reports", REPORT_ROLES),
            RouteRule::admin("/settings"),
            RouteRule::admin("/users"),
            RouteRule::admin("/permissions"),
            RouteRule::client("/portal"),
        ];
        Self {
            rules,
            excluded: EXCLUDED.to_vec(),
        }
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        let path = normalize_path(path);
        if self.excluded.iter().any(|prefix| is_segment_prefix(prefix, &path)) {
            return RouteClass::Excluded;
        }
        self.rule_for(&path).map(|rule| rule.class).unwrap_or(RouteClass::Public)
    }

    /// What the session guard should demand for `path`, or `None` when the
    /// path is public or excluded.
    pub fn requirement(&self, path: &str) -> Option<RouteRequirement> {
        let path = normalize_path(path);
        if self.excluded.iter().any(|prefix| is_segment_prefix(prefix, &path)) {
            return None;
        }
        let rule = self.rule_for(&path)?;
        let requirement = match rule.class {
            RouteClass::ClientProtected => RouteRequirement::client(),
            RouteClass::StaffProtected => {
                let mut requirement = match rule.roles {
                    Some(roles) => RouteRequirement::with_roles(roles),
                    None => RouteRequirement::staff(),
                };
                requirement.admin_only = rule.admin_only;
                requirement
            }
            RouteClass::Public | RouteClass::Excluded => return None,
        };
        Some(requirement)
    }

    fn rule_for(&self, path: &str) -> Option<&RouteRule> {
        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.matching == Match::Exact && rule.matches(path))
        {
            return Some(rule);
        }
        self.rules
            .iter()
            .filter(|rule| rule.matching == Match::Prefix && rule.matches(path))
            .max_by_key(|rule| rule.path.len())
    }
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

/// Drops query and fragment and any trailing slash (except on `/`).
fn normalize_path(raw: &str) -> String {
    let path = raw.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::BuiltinRole;
    use crate::session::CredentialKind;

    #[test]
    fn root_is_staff_only_by_exact_match() {
        let classifier = RouteClassifier::standard();
        assert_eq!(classifier.classify("/"), RouteClass::StaffProtected);
        assert_eq!(classifier.classify("/pricing"), RouteClass::Public);
    }

    #[test]
    fn prefixes_match_whole_segments() {
        let classifier = RouteClassifier::standard();
        assert_eq!(classifier.classify("/tasks"), RouteClass::StaffProtected);
        assert_eq!(classifier.classify("/tasks/42/edit"), RouteClass::StaffProtected);
        assert_eq!(classifier.classify("/taskstats"), RouteClass::Public);
        assert_eq!(classifier.classify("/portal/invoices"), RouteClass::ClientProtected);
    }

    #[test]
    fn query_and_trailing_slash_are_ignored() {
        let classifier = RouteClassifier::standard();
        assert_eq!(classifier.classify("/dashboard/?tab=week"), RouteClass::StaffProtected);
        assert_eq!(classifier.classify("/?ref=mail"), RouteClass::StaffProtected);
    }

    #[test]
    fn excluded_paths_bypass_the_table() {
        let classifier = RouteClassifier::standard();
        for path in ["/api/tasks", "/auth", "/client-login", "/_next/static/app.js", "/favicon.ico"] {
            assert_eq!(classifier.classify(path), RouteClass::Excluded, "{path}");
            assert!(classifier.requirement(path).is_none());
        }
        // `/authors` is not the login page.
        assert_eq!(classifier.classify("/authors"), RouteClass::Public);
    }

    #[test]
    fn admin_sections_are_staff_protected_with_admin_flag() {
        let classifier = RouteClassifier::standard();
        for path in ["/users", "/permissions", "/settings/billing"] {
            assert_eq!(classifier.classify(path), RouteClass::StaffProtected);
            let requirement = classifier.requirement(path).unwrap();
            assert!(requirement.admin_only, "{path}");
            assert_eq!(requirement.audience, CredentialKind::Staff);
        }
    }

    #[test]
    fn reports_carry_a_role_set() {
        let requirement = RouteClassifier::standard().requirement("/reports/q3").unwrap();
        assert_eq!(
            requirement.allowed_roles,
            Some(vec!["admin".to_string(), "manager".to_string()])
        );
        assert!(!requirement.admin_only);
        for role in REPORT_ROLES {
            assert!(BuiltinRole::from_key(role).is_some());
        }
    }

    #[test]
    fn exact_beats_prefix_and_longest_prefix_wins() {
        let classifier = RouteClassifier {
            rules: vec![
                RouteRule::staff("/settings/profile"),
                RouteRule::roles("/settings/profile/export", REPORT_ROLES).exact(),
                RouteRule::admin("/settings"),
            ],
            excluded: Vec::new(),
        };

        let billing = classifier.requirement("/settings/billing").unwrap();
        assert!(billing.admin_only);

        for path in ["/settings/profile", "/settings/profile/avatar", "/settings/profile/export/csv"] {
            let requirement = classifier.requirement(path).unwrap();
            assert_eq!(requirement, RouteRequirement::staff(), "{path}");
        }

        let export = classifier.requirement("/settings/profile/export").unwrap();
        assert!(!export.admin_only);
        assert_eq!(
            export.allowed_roles,
            Some(vec!["admin".to_string(), "manager".to_string()])
        );
    }

    #[test]
    fn portal_requires_client_audience() {
        let requirement = RouteClassifier::standard().requirement("/portal").unwrap();
        assert_eq!(requirement, RouteRequirement::client());
        assert!(RouteClassifier::standard().requirement("/about").is_none());
    }
}
