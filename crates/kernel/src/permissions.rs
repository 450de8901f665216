//! Permission checking with DashMap-based caching.
//!
//! Role names grant permissions: editor roles may write and publish, admin
//! roles may do everything. Read access additionally honors the item's own
//! `authorized_roles`.

use std::sync::Arc;

use dashmap::DashMap;

use crate::models::{ContentItem, Principal};

/// An action a principal may perform on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Read,
    Write,
    Publish,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Publish => "publish",
        }
    }
}

/// Decides whether a principal holds a permission on an item.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, item: &ContentItem, principal: &Principal, permission: Permission) -> bool;

    /// Whether the principal may use the editing surface at all.
    fn is_editor(&self, principal: &Principal) -> bool;
}

/// Role grants resolved for one principal.
#[derive(Debug, Clone, Copy, Default)]
struct Grants {
    editor: bool,
    admin: bool,
}

/// Principal name plus its lowercased, sorted roles. Two principals with
/// the same name but different roles never share grants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GrantKey {
    name: String,
    roles: Vec<String>,
}

impl GrantKey {
    fn of(principal: &Principal) -> Self {
        let mut roles: Vec<String> = principal.roles.iter().map(|r| r.to_lowercase()).collect();
        roles.sort();
        roles.dedup();
        Self {
            name: principal.name.clone(),
            roles,
        }
    }
}

/// Authorizer driven by configured role names.
#[derive(Clone)]
pub struct RoleAuthorizer {
    inner: Arc<RoleAuthorizerInner>,
}

struct RoleAuthorizerInner {
    editor_roles: Vec<String>,
    admin_roles: Vec<String>,

    /// Cache of principal identity -> grants. Anonymous principals are not
    /// cached.
    grant_cache: DashMap<GrantKey, Grants>,
}

impl RoleAuthorizer {
    pub fn new(editor_roles: Vec<String>, admin_roles: Vec<String>) -> Self {
        Self {
            inner: Arc::new(RoleAuthorizerInner {
                editor_roles,
                admin_roles,
                grant_cache: DashMap::new(),
            }),
        }
    }

    fn grants(&self, principal: &Principal) -> Grants {
        if !principal.authenticated {
            return Grants::default();
        }

        let key = GrantKey::of(principal);
        if let Some(cached) = self.inner.grant_cache.get(&key) {
            return *cached;
        }

        let admin = principal.has_any_role(&self.inner.admin_roles);
        let grants = Grants {
            editor: admin || principal.has_any_role(&self.inner.editor_roles),
            admin,
        };
        self.inner.grant_cache.insert(key, grants);
        grants
    }
}

impl Authorizer for RoleAuthorizer {
    fn is_authorized(&self, item: &ContentItem, principal: &Principal, permission: Permission) -> bool {
        let grants = self.grants(principal);
        if grants.admin {
            return true;
        }

        let readable = item.is_readable_by(&principal.roles);
        match permission {
            Permission::Read => readable,
            Permission::Write | Permission::Publish => grants.editor && readable,
        }
    }

    fn is_editor(&self, principal: &Principal) -> bool {
        self.grants(principal).editor
    }
}
