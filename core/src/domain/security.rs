//! Credential → context translation and POSIX + extended ACL permission
//! evaluation.
//!
//! `check_permissions` follows the precedence chain verbatim from §4.3:
//! root bypass, then ban check, then owner, then (extended ACL ? MASK +
//! USER + GROUP_OBJ + ACL_GROUP + OTHER fallthrough : plain group/other).
//! Grounded on the teacher's `SecurityContext::evaluate` deny-then-allow
//! precedence shape, generalized from tool-capability scanning to mode-bit
//! evaluation.

use crate::domain::acl::{Acl, AclBaseType};
use crate::domain::identity::{GroupInfo, Uid, UserInfo};
use serde::{Deserialize, Serialize};

/// bit flags matching POSIX r/w/x, e.g. `Mode::READ | Mode::WRITE`.
pub type Mode = u8;
pub const MODE_READ: Mode = 0b100;
pub const MODE_WRITE: Mode = 0b010;
pub const MODE_EXEC: Mode = 0b001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityCredentials {
    pub mechanism: String,
    pub client_name: String,
    pub remote_address: String,
    pub fqans: Vec<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityContext {
    pub user: UserInfo,
    pub primary_group: GroupInfo,
    pub groups: Vec<GroupInfo>,
    pub credentials: SecurityCredentials,
}

impl SecurityContext {
    pub fn is_root(&self) -> bool {
        self.user.is_root()
    }

    pub fn is_banned(&self) -> bool {
        self.user.banned || self.primary_group.banned
    }

    pub fn group_ids(&self) -> Vec<u32> {
        self.groups.iter().map(|g| g.gid).collect()
    }

    pub fn belongs_to_group(&self, gid: u32) -> bool {
        self.primary_group.gid == gid || self.groups.iter().any(|g| g.gid == gid)
    }
}

/// Minimal shape `check_permissions` needs from an inode: owner uid/gid and
/// POSIX mode bits. `INode` satisfies this directly.
pub struct PermissionSubject {
    pub uid: Uid,
    pub gid: u32,
    pub mode: u16,
}

fn triple(mode: u16, shift: u8) -> Mode {
    ((mode >> shift) & 0o7) as Mode
}

/// §4.3 `checkPermissions`: returns `Ok(())` if allowed, `Err(())` otherwise.
pub fn check_permissions(
    ctx: &SecurityContext,
    acl: &Acl,
    subject: &PermissionSubject,
    requested: Mode,
) -> Result<(), ()> {
    // 1. root bypass.
    if ctx.is_root() {
        return Ok(());
    }
    // 2. banned.
    if ctx.is_banned() {
        return Err(());
    }
    // 3. owner.
    if ctx.user.uid == subject.uid {
        return allow_if(triple(subject.mode, 6) & requested == requested);
    }
    if !acl.has_extended() {
        // 4. no extended ACL: group or other triple.
        if ctx.belongs_to_group(subject.gid) {
            return allow_if(triple(subject.mode, 3) & requested == requested);
        }
        return allow_if(triple(subject.mode, 0) & requested == requested);
    }
    // 5. extended ACL: MASK over group-class entries, USER first (sorted
    // by id, bail once id exceeds the caller's uid), then GROUP_OBJ, then
    // ACL_GROUP entries accumulated across every group the caller belongs
    // to, falling through to OTHER if nothing matched.
    let mask = acl
        .entries()
        .iter()
        .find(|e| !e.acl_type.default && e.acl_type.base == AclBaseType::Mask)
        .map(|e| e.perm as Mode)
        .unwrap_or(0o7);

    let mut users: Vec<_> = acl
        .entries()
        .iter()
        .filter(|e| !e.acl_type.default && e.acl_type.base == AclBaseType::User)
        .collect();
    users.sort_by_key(|e| e.id);
    for e in users {
        if e.id > ctx.user.uid {
            break;
        }
        if e.id == ctx.user.uid {
            return allow_if((e.perm as Mode & mask) & requested == requested);
        }
    }

    if ctx.belongs_to_group(subject.gid) {
        let group_obj = acl
            .entries()
            .iter()
            .find(|e| !e.acl_type.default && e.acl_type.base == AclBaseType::GroupObj)
            .map(|e| e.perm as Mode)
            .unwrap_or(0);
        if (group_obj & mask) & requested == requested {
            return Ok(());
        }
    }

    let accumulated: Mode = acl
        .entries()
        .iter()
        .filter(|e| {
            !e.acl_type.default
                && e.acl_type.base == AclBaseType::Group
                && ctx.belongs_to_group(e.id)
        })
        .fold(0, |acc, e| acc | e.perm as Mode);
    if accumulated != 0 {
        return allow_if((accumulated & mask) & requested == requested);
    }

    let other = acl
        .entries()
        .iter()
        .find(|e| !e.acl_type.default && e.acl_type.base == AclBaseType::Other)
        .map(|e| e.perm as Mode)
        .unwrap_or(triple(subject.mode, 0));
    allow_if(other & requested == requested)
}

fn allow_if(ok: bool) -> Result<(), ()> {
    if ok { Ok(()) } else { Err(()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::acl::AclEntry;

    fn user(uid: u32, gid: u32) -> SecurityContext {
        SecurityContext {
            user: UserInfo::new(uid, format!("u{uid}")),
            primary_group: GroupInfo::new(gid, format!("g{gid}")),
            groups: vec![],
            credentials: SecurityCredentials {
                mechanism: "x509".into(),
                client_name: format!("/CN=u{uid}"),
                remote_address: "127.0.0.1".into(),
                fqans: vec![],
                session_id: None,
            },
        }
    }

    #[test]
    fn scenario_3_permission_check() {
        let subject = PermissionSubject { uid: 100, gid: 200, mode: 0o640 };
        let acl = Acl::default();

        let owner = user(100, 200);
        assert!(check_permissions(&owner, &acl, &subject, MODE_READ).is_ok());
        assert!(check_permissions(&owner, &acl, &subject, MODE_WRITE).is_ok());
        assert!(check_permissions(&owner, &acl, &subject, MODE_EXEC).is_err());

        let grp = user(101, 200);
        assert!(check_permissions(&grp, &acl, &subject, MODE_READ).is_ok());
        assert!(check_permissions(&grp, &acl, &subject, MODE_WRITE).is_err());

        let other = user(102, 201);
        assert!(check_permissions(&other, &acl, &subject, MODE_READ).is_err());
    }

    #[test]
    fn root_always_allowed() {
        let root = user(0, 0);
        let subject = PermissionSubject { uid: 100, gid: 200, mode: 0o000 };
        assert!(check_permissions(&root, &Acl::default(), &subject, MODE_READ | MODE_WRITE | MODE_EXEC).is_ok());
    }

    #[test]
    fn banned_user_denied_even_if_owner() {
        let mut owner = user(100, 200);
        owner.user.banned = true;
        let subject = PermissionSubject { uid: 100, gid: 200, mode: 0o777 };
        assert!(check_permissions(&owner, &Acl::default(), &subject, MODE_READ).is_err());
    }

    #[test]
    fn extended_acl_user_entry_wins_over_group() {
        let subject = PermissionSubject { uid: 1, gid: 10, mode: 0o640 };
        let acl = Acl::new(vec![
            AclEntry::new(crate::domain::acl::AclBaseType::UserObj, false, 1, 6),
            AclEntry::new(crate::domain::acl::AclBaseType::GroupObj, false, 10, 0),
            AclEntry::new(crate::domain::acl::AclBaseType::Mask, false, 0, 7),
            AclEntry::new(crate::domain::acl::AclBaseType::Other, false, 0, 0),
            AclEntry::new(crate::domain::acl::AclBaseType::User, false, 42, 7),
        ]);
        let caller = user(42, 99);
        assert!(check_permissions(&caller, &acl, &subject, MODE_WRITE).is_ok());
    }
}
