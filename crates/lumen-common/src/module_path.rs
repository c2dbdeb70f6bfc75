//! Module paths.
//!
//! Every declaration handed to semantic analysis is tagged with the module it
//! belongs to. The root module is the empty path.

use std::fmt;

use serde::Serialize;

/// A dotted module path such as `Math.Vector`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModulePath(pub Vec<String>);

impl ModulePath {
    /// The root module.
    pub fn root() -> Self {
        ModulePath(Vec::new())
    }

    /// Parse a dotted path. The empty string is the root module.
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return ModulePath::root();
        }
        ModulePath(dotted.split('.').map(str::to_string).collect())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The path with one more segment appended.
    pub fn child(&self, segment: &str) -> ModulePath {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        ModulePath(segments)
    }

    /// Whether `self` is `other` or nested inside it.
    pub fn starts_with(&self, other: &ModulePath) -> bool {
        self.0.len() >= other.0.len() && self.0[..other.0.len()] == other.0[..]
    }

    /// Qualify a declaration name with this path: `Math.Vector.norm`.
    pub fn qualify(&self, name: &str) -> String {
        if self.is_root() {
            name.to_string()
        } else {
            format!("{}.{}", self.0.join("."), name)
        }
    }

    /// Underscore-joined form used when building layout names.
    pub fn layout_prefix(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("{}_", self.0.join("_"))
        }
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_qualify() {
        let path = ModulePath::parse("Math.Vector");
        assert_eq!(path.segments().len(), 2);
        assert_eq!(path.qualify("norm"), "Math.Vector.norm");
        assert_eq!(ModulePath::root().qualify("main"), "main");
    }

    #[test]
    fn nesting() {
        let outer = ModulePath::parse("Math");
        let inner = outer.child("Vector");
        assert!(inner.starts_with(&outer));
        assert!(!outer.starts_with(&inner));
        assert!(inner.starts_with(&ModulePath::root()));
    }

    #[test]
    fn layout_prefix_is_empty_for_root() {
        assert_eq!(ModulePath::root().layout_prefix(), "");
        assert_eq!(ModulePath::parse("A.B").layout_prefix(), "A_B_");
    }
}
