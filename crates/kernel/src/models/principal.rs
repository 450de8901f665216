//! The acting principal of a request.

/// Identity and roles of whoever issued the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Display name ("anonymous" for unauthenticated requests).
    pub name: String,
    /// Whether the request was authenticated.
    pub authenticated: bool,
    /// Role names granted to the principal.
    pub roles: Vec<String>,
}

impl Principal {
    /// Principal for requests without credentials.
    pub fn anonymous() -> Self {
        Self {
            name: "anonymous".to_string(),
            authenticated: false,
            roles: Vec::new(),
        }
    }

    /// Principal for an authenticated caller.
    pub fn authenticated(name: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            name: name.into(),
            authenticated: true,
            roles,
        }
    }

    /// Check role membership (case-insensitive).
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    /// True if the principal holds any of `roles`.
    pub fn has_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| self.has_role(r))
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::anonymous()
    }
}
