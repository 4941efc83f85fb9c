//! Namespace paths.
//!
//! [`NsPath`] is a validated, normalized absolute path inside the namespace:
//! it always starts with `/`, never ends with one (except for the root), has
//! no empty, `.` or `..` components.

use crate::error::{MemspaceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Path separator.
pub const SEPARATOR: char = '/';

/// An absolute, normalized namespace path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NsPath(String);

impl NsPath {
    /// The root path `/`.
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    /// Parse and normalize a path. Repeated separators collapse and a
    /// trailing separator is dropped.
    pub fn parse(raw: &str) -> Result<Self> {
        if !raw.starts_with(SEPARATOR) {
            return Err(MemspaceError::InvalidPath(format!(
                "path must be absolute: {:?}",
                raw
            )));
        }

        let mut normalized = String::with_capacity(raw.len());
        for component in raw.split(SEPARATOR).filter(|c| !c.is_empty()) {
            validate_name(component).map_err(|reason| {
                MemspaceError::InvalidPath(format!("{:?}: {}", raw, reason))
            })?;
            normalized.push(SEPARATOR);
            normalized.push_str(component);
        }

        if normalized.is_empty() {
            return Ok(Self::root());
        }
        Ok(Self(normalized))
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path components, root excluded.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|c| !c.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.components().count()
    }

    /// Last component; empty for the root.
    pub fn name(&self) -> &str {
        match self.0.rfind(SEPARATOR) {
            Some(pos) => &self.0[pos + 1..],
            None => "",
        }
    }

    /// Parent path, `None` for the root.
    pub fn parent(&self) -> Option<NsPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(0) => Some(Self::root()),
            Some(pos) => Some(Self(self.0[..pos].to_string())),
            None => None,
        }
    }

    /// Append one component.
    pub fn join(&self, name: &str) -> Result<NsPath> {
        validate_name(name).map_err(|reason| {
            MemspaceError::InvalidPath(format!("{:?} under {}: {}", name, self, reason))
        })?;
        if self.is_root() {
            Ok(Self(format!("{}{}", SEPARATOR, name)))
        } else {
            Ok(Self(format!("{}{}{}", self.0, SEPARATOR, name)))
        }
    }

    /// Whether `self` equals `prefix` or lies beneath it.
    pub fn has_prefix(&self, prefix: &NsPath) -> bool {
        self.strip_prefix(prefix).is_some()
    }

    /// Whether `self` lies strictly beneath `other`.
    pub fn is_descendant_of(&self, other: &NsPath) -> bool {
        self != other && self.has_prefix(other)
    }

    /// Remainder of `self` below `prefix`, without a leading separator.
    /// Returns `Some("")` when the paths are equal.
    pub fn strip_prefix(&self, prefix: &NsPath) -> Option<&str> {
        if prefix.is_root() {
            return Some(self.0.trim_start_matches(SEPARATOR));
        }
        let rest = self.0.strip_prefix(prefix.as_str())?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix(SEPARATOR)
        }
    }
}

fn validate_name(name: &str) -> std::result::Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty component");
    }
    if name == "." || name == ".." {
        return Err("relative components are not allowed");
    }
    if name.contains(SEPARATOR) {
        return Err("component contains a separator");
    }
    Ok(())
}

impl fmt::Display for NsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NsPath {
    type Err = MemspaceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NsPath {
    type Error = MemspaceError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<NsPath> for String {
    fn from(path: NsPath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> NsPath {
        NsPath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(p("/a//b/").as_str(), "/a/b");
        assert_eq!(p("///").as_str(), "/");
        assert!(p("/").is_root());
    }

    #[test]
    fn test_parse_rejects_bad_paths() {
        assert!(NsPath::parse("a/b").is_err());
        assert!(NsPath::parse("").is_err());
        assert!(NsPath::parse("/a/../b").is_err());
        assert!(NsPath::parse("/a/./b").is_err());
    }

    #[test]
    fn test_parent_and_name() {
        let path = p("/a/b/c.txt");
        assert_eq!(path.name(), "c.txt");
        assert_eq!(path.parent().unwrap().as_str(), "/a/b");
        assert_eq!(p("/a").parent().unwrap(), NsPath::root());
        assert!(NsPath::root().parent().is_none());
        assert_eq!(NsPath::root().name(), "");
        assert_eq!(path.depth(), 3);
    }

    #[test]
    fn test_join() {
        assert_eq!(NsPath::root().join("a").unwrap().as_str(), "/a");
        assert_eq!(p("/a").join("b").unwrap().as_str(), "/a/b");
        assert!(p("/a").join("..").is_err());
        assert!(p("/a").join("b/c").is_err());
    }

    #[test]
    fn test_prefix_relations() {
        let mnt = p("/mnt");
        assert!(p("/mnt/x").has_prefix(&mnt));
        assert!(mnt.has_prefix(&mnt));
        assert!(!p("/mntx").has_prefix(&mnt));
        assert!(p("/mnt/x").is_descendant_of(&mnt));
        assert!(!mnt.is_descendant_of(&mnt));
        assert_eq!(p("/mnt/x/y").strip_prefix(&mnt), Some("x/y"));
        assert_eq!(mnt.strip_prefix(&mnt), Some(""));
        assert_eq!(p("/a/b").strip_prefix(&NsPath::root()), Some("a/b"));
    }

    #[test]
    fn test_serde_validates() {
        let path: NsPath = serde_json::from_str("\"/x/y\"").unwrap();
        assert_eq!(path.as_str(), "/x/y");
        assert!(serde_json::from_str::<NsPath>("\"relative\"").is_err());
    }
}
