//! `Authn`/`SecurityService`: credential → context translation (§4.4).
//!
//! Grounded on `domain/fsal.rs::authorize` (repository lookup +
//! event-on-denial), adapted from volume-ownership checks to DN/FQAN →
//! `UserInfo`/`GroupInfo` resolution.

use crate::domain::errors::CatalogError;
use crate::domain::identity::{GroupInfo, UserInfo};
use crate::domain::security::{SecurityContext, SecurityCredentials};
use async_trait::async_trait;

/// Maps external identity (DN, FQAN-derived group names) to local
/// uid/gid. Implementations may auto-provision unknown identities or fail
/// with `NoSuchUser`/`NoSuchGroup` (§4.4).
#[async_trait]
pub trait Authn: Send + Sync {
    fn impl_id(&self) -> String;
    async fn get_id_map(&self, user_name: &str, group_names: &[String]) -> Result<(UserInfo, Vec<GroupInfo>), CatalogError>;
}

/// `createSecurityContext(credentials) -> context`.
pub async fn create_security_context(
    authn: &dyn Authn,
    credentials: SecurityCredentials,
) -> Result<SecurityContext, CatalogError> {
    let (user, groups) = authn.get_id_map(&credentials.client_name, &credentials.fqans).await?;
    let primary_group = groups.first().cloned().ok_or_else(|| CatalogError::NoSuchGroup(credentials.client_name.clone()))?;
    Ok(SecurityContext { user, primary_group, groups, credentials })
}

/// A simple in-memory `Authn`: maps a fixed DN→uid/gid table, auto-
/// provisioning unknown DNs to a configured default uid/gid band. Useful
/// as the builtin default and in tests; production deployments register a
/// plugin-backed `Authn` instead.
pub struct StaticAuthn {
    users: std::collections::HashMap<String, (UserInfo, GroupInfo)>,
    default_uid: u32,
    default_gid: u32,
}

impl StaticAuthn {
    pub fn new(default_uid: u32, default_gid: u32) -> Self {
        StaticAuthn { users: std::collections::HashMap::new(), default_uid, default_gid }
    }

    pub fn register(&mut self, dn: impl Into<String>, user: UserInfo, group: GroupInfo) {
        self.users.insert(dn.into(), (user, group));
    }
}

#[async_trait]
impl Authn for StaticAuthn {
    fn impl_id(&self) -> String {
        "StaticAuthn".to_owned()
    }

    async fn get_id_map(&self, user_name: &str, _group_names: &[String]) -> Result<(UserInfo, Vec<GroupInfo>), CatalogError> {
        if let Some((user, group)) = self.users.get(user_name) {
            return Ok((user.clone(), vec![group.clone()]));
        }
        let user = UserInfo::new(self.default_uid, user_name);
        let group = GroupInfo::new(self.default_gid, "default");
        Ok((user, vec![group]))
    }
}
