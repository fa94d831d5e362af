//! DN → VO mapfile entry parsing (§4.4).
//!
//! Grammar: one entry per line, either `"DN with spaces" VO[,attrs]` or
//! `DN_without_spaces VO`. Lines starting with `#`, and blank lines, are
//! ignored. Grounded on the two-line-format grammar in
//! `original_source/common/Security.cpp`.

use crate::domain::errors::MapfileError;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapFile {
    pub entries: HashMap<String, String>,
}

impl MapFile {
    pub fn parse(path: &str, contents: &str) -> Result<Self, MapfileError> {
        let mut entries = HashMap::new();
        for (idx, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (dn, rest) = if let Some(stripped) = line.strip_prefix('"') {
                let end = stripped.find('"').ok_or_else(|| MapfileError::Malformed {
                    path: path.to_owned(),
                    line: idx + 1,
                })?;
                (&stripped[..end], stripped[end + 1..].trim())
            } else {
                line.split_once(char::is_whitespace)
                    .map(|(a, b)| (a, b.trim()))
                    .ok_or_else(|| MapfileError::Malformed { path: path.to_owned(), line: idx + 1 })?
            };
            // "VO[,attrs]" — only the VO name (before the first comma) matters here.
            let vo = rest.split(',').next().unwrap_or(rest).trim();
            if vo.is_empty() {
                return Err(MapfileError::Malformed { path: path.to_owned(), line: idx + 1 });
            }
            entries.insert(dn.to_owned(), vo.to_owned());
        }
        Ok(MapFile { entries })
    }

    pub fn vo_from_dn(&self, dn: &str) -> Result<&str, MapfileError> {
        self.entries
            .get(dn)
            .map(|s| s.as_str())
            .ok_or_else(|| MapfileError::NoUserMapping(dn.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_and_bare_dns() {
        let contents = "# comment\n\"/O=Grid/CN=Alice Smith\" voA\nbob voB,extra\n";
        let map = MapFile::parse("test.map", contents).unwrap();
        assert_eq!(map.vo_from_dn("/O=Grid/CN=Alice Smith").unwrap(), "voA");
        assert_eq!(map.vo_from_dn("bob").unwrap(), "voB");
    }

    #[test]
    fn unmapped_dn_errors() {
        let map = MapFile::parse("test.map", "a voA\n").unwrap();
        assert!(matches!(map.vo_from_dn("z"), Err(MapfileError::NoUserMapping(_))));
    }

    #[test]
    fn scenario_7_hot_reload_semantics_via_reparse() {
        let first = MapFile::parse("test.map", "DN1 voA\n").unwrap();
        assert_eq!(first.vo_from_dn("DN1").unwrap(), "voA");
        let second = MapFile::parse("test.map", "DN1 voA\nDN2 voB\n").unwrap();
        assert_eq!(second.vo_from_dn("DN2").unwrap(), "voB");
    }
}
