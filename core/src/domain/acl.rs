//! POSIX + extended ACL model: entry types, serialization, validation and
//! default-entry inheritance.
//!
//! Serialization follows §6's rule literally: each entry renders as
//! `<type_char><perm_digit><id>`, comma-separated, entries sorted ascending
//! by type, where `type_char = '@' + type_code`. `type_code` assigns
//! `USER_OBJ=0, USER=1, GROUP_OBJ=2, GROUP=3, MASK=4, OTHER=5`, with the
//! `DEFAULT` modifier adding 6 to the base code (so a default `MASK` entry
//! serializes as `'J'` — `'@' + 10`).

use crate::domain::errors::AclError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AclBaseType {
    UserObj,
    User,
    GroupObj,
    Group,
    Mask,
    Other,
}

impl AclBaseType {
    fn code(self) -> u8 {
        match self {
            AclBaseType::UserObj => 0,
            AclBaseType::User => 1,
            AclBaseType::GroupObj => 2,
            AclBaseType::Group => 3,
            AclBaseType::Mask => 4,
            AclBaseType::Other => 5,
        }
    }

    fn from_code(code: u8) -> Result<Self, AclError> {
        Ok(match code {
            0 => AclBaseType::UserObj,
            1 => AclBaseType::User,
            2 => AclBaseType::GroupObj,
            3 => AclBaseType::Group,
            4 => AclBaseType::Mask,
            5 => AclBaseType::Other,
            other => return Err(AclError::Malformed(format!("unknown acl type code {other}"))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AclType {
    pub base: AclBaseType,
    pub default: bool,
}

impl AclType {
    pub fn new(base: AclBaseType, default: bool) -> Self {
        AclType { base, default }
    }

    fn type_char(self) -> char {
        let code = self.base.code() + if self.default { 6 } else { 0 };
        (b'@' + code) as char
    }

    fn from_char(c: char) -> Result<Self, AclError> {
        let c = c as u32;
        let at = b'@' as u32;
        if c < at || c > at + 11 {
            return Err(AclError::Malformed(format!("invalid acl type char '{c}'")));
        }
        let code = (c - at) as u8;
        let default = code >= 6;
        let base = AclBaseType::from_code(if default { code - 6 } else { code })?;
        Ok(AclType { base, default })
    }
}

/// A single (type, id, permission) triple. `id` is meaningless for
/// `GroupObj`/`UserObj`/`Mask`/`Other` entries but always present in the
/// on-wire form, matching §6's fixed `<type><perm><id>` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub acl_type: AclType,
    pub id: u32,
    pub perm: u8,
}

impl AclEntry {
    pub fn new(base: AclBaseType, default: bool, id: u32, perm: u8) -> Self {
        AclEntry { acl_type: AclType::new(base, default), id, perm }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acl(pub Vec<AclEntry>);

impl Acl {
    pub fn new(entries: Vec<AclEntry>) -> Self {
        Acl(entries)
    }

    pub fn entries(&self) -> &[AclEntry] {
        &self.0
    }

    pub fn has_extended(&self) -> bool {
        self.0
            .iter()
            .any(|e| !e.acl_type.default && matches!(e.acl_type.base, AclBaseType::User | AclBaseType::Group))
    }

    /// §6 serialization: `<type_char><perm_digit><id>`, comma-separated,
    /// entries sorted ascending by type.
    pub fn serialize(&self) -> String {
        let mut sorted = self.0.clone();
        sorted.sort_by_key(|e| (e.acl_type, e.id));
        sorted
            .iter()
            .map(|e| format!("{}{}{}", e.acl_type.type_char(), e.perm, e.id))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn deserialize(s: &str) -> Result<Self, AclError> {
        if s.trim().is_empty() {
            return Ok(Acl::default());
        }
        let mut entries = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            let mut chars = part.chars();
            let type_char = chars
                .next()
                .ok_or_else(|| AclError::Malformed("empty acl entry".into()))?;
            let acl_type = AclType::from_char(type_char)?;
            let perm_char = chars
                .next()
                .ok_or_else(|| AclError::Malformed(format!("truncated acl entry {part:?}")))?;
            let perm = perm_char
                .to_digit(8)
                .ok_or_else(|| AclError::Malformed(format!("invalid perm digit in {part:?}")))?
                as u8;
            let id_str: String = chars.collect();
            let id: u32 = id_str
                .parse()
                .map_err(|_| AclError::Malformed(format!("invalid id in {part:?}")))?;
            entries.push(AclEntry { acl_type, id, perm });
        }
        Ok(Acl(entries))
    }

    /// §3 invariant 3.
    pub fn validate(&self) -> Result<(), AclError> {
        validate_subset(&self.0, false)?;
        if self.0.iter().any(|e| e.acl_type.default) {
            validate_subset(&self.0, true)?;
        }
        let mut seen = HashSet::new();
        for e in &self.0 {
            if !seen.insert((e.acl_type, e.id)) {
                return Err(AclError::Invalid(format!(
                    "duplicate (type, id) pair: ({:?}, {})",
                    e.acl_type, e.id
                )));
            }
            if e.perm > 7 {
                return Err(AclError::Invalid(format!("perm {} out of range 0..7", e.perm)));
            }
        }
        Ok(())
    }

    /// §4.3 ACL inheritance: copy each DEFAULT entry of `parent` as an
    /// effective entry on the new child (substituting `id` for
    /// USER_OBJ/GROUP_OBJ), masking `mode` against the inherited
    /// permissions in the appropriate triple. On directories the DEFAULT
    /// entries are additionally copied unchanged so grandchildren inherit.
    pub fn inherit(parent: &Acl, uid: u32, gid: u32, is_dir: bool, mode: u16) -> (Acl, u16) {
        let defaults: Vec<&AclEntry> = parent.0.iter().filter(|e| e.acl_type.default).collect();
        if defaults.is_empty() {
            return (Acl::default(), mode);
        }
        let mut effective = Vec::new();
        let mut new_mode = mode;
        for d in &defaults {
            let (id, base_mode_bits) = match d.acl_type.base {
                AclBaseType::UserObj => (uid, 0o700),
                AclBaseType::GroupObj => (gid, 0o070),
                AclBaseType::Other => (d.id, 0o007),
                _ => (d.id, 0),
            };
            effective.push(AclEntry::new(d.acl_type.base, false, id, d.perm));
            if base_mode_bits != 0 {
                let shift = match d.acl_type.base {
                    AclBaseType::UserObj => 6,
                    AclBaseType::GroupObj => 3,
                    AclBaseType::Other => 0,
                    _ => 0,
                };
                new_mode = (new_mode & !base_mode_bits) | ((d.perm as u16 & 0o7) << shift);
            }
        }
        if is_dir {
            for d in &defaults {
                effective.push((*d).clone());
            }
        }
        (Acl(effective), new_mode)
    }
}

fn validate_subset(entries: &[AclEntry], default: bool) -> Result<(), AclError> {
    let subset: Vec<&AclEntry> = entries.iter().filter(|e| e.acl_type.default == default).collect();
    if subset.is_empty() {
        return Ok(());
    }
    let count = |b: AclBaseType| subset.iter().filter(|e| e.acl_type.base == b).count();
    if count(AclBaseType::UserObj) != 1 {
        return Err(AclError::Invalid("exactly one USER_OBJ entry required".into()));
    }
    if count(AclBaseType::GroupObj) != 1 {
        return Err(AclError::Invalid("exactly one GROUP_OBJ entry required".into()));
    }
    if count(AclBaseType::Other) != 1 {
        return Err(AclError::Invalid("exactly one OTHER entry required".into()));
    }
    let has_extended = count(AclBaseType::User) > 0 || count(AclBaseType::Group) > 0;
    if has_extended && count(AclBaseType::Mask) != 1 {
        return Err(AclError::Invalid("extended entries require exactly one MASK entry".into()));
    }
    Ok(())
}
