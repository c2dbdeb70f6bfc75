//! Instantiation requests.
//!
//! Checking never generates code for generic instances; it records one
//! request per distinct concrete instantiation for the monomorphizer.
//! Requests are deduplicated by kind and layout name and kept in the order
//! they were first recorded.

use lumen_common::SourceLocation;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::ty::Ty;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum RequestKind {
    StructType,
    UnionType,
    Function,
    ExtensionMethod { method: String, receiver: Ty },
}

#[derive(Clone, Debug, Serialize)]
pub struct InstantiationRequest {
    pub kind: RequestKind,
    pub template: String,
    /// Concrete arguments; for extension methods the owner's arguments
    /// followed by the method's own.
    pub args: Vec<Ty>,
    pub layout_name: String,
    pub location: SourceLocation,
}

impl InstantiationRequest {
    /// Deduplication key.
    pub fn key(&self) -> String {
        let tag = match &self.kind {
            RequestKind::StructType => "struct",
            RequestKind::UnionType => "union",
            RequestKind::Function => "fn",
            RequestKind::ExtensionMethod { .. } => "method",
        };
        format!("{}:{}", tag, self.layout_name)
    }
}

#[derive(Debug, Default)]
pub struct InstantiationSet {
    requests: Vec<InstantiationRequest>,
    seen: FxHashSet<String>,
}

impl InstantiationSet {
    pub fn new() -> Self {
        InstantiationSet::default()
    }

    /// Record a request. Returns `false` if an equivalent one already exists.
    pub fn insert(&mut self, request: InstantiationRequest) -> bool {
        if !self.seen.insert(request.key()) {
            return false;
        }
        tracing::debug!(
            target: "lumen::sema",
            key = %request.key(),
            location = %request.location,
            "instantiation requested"
        );
        self.requests.push(request);
        true
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstantiationRequest> {
        self.requests.iter()
    }

    /// Whether a request with this layout name exists, of any kind.
    pub fn contains_layout(&self, layout_name: &str) -> bool {
        self.requests.iter().any(|r| r.layout_name == layout_name)
    }

    /// Serialize all requests, in recording order.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_common::span::range;

    fn request(kind: RequestKind, layout: &str) -> InstantiationRequest {
        InstantiationRequest {
            kind,
            template: "List".into(),
            args: vec![Ty::Int],
            layout_name: layout.into(),
            location: SourceLocation::new("main.lm", range(0, 1)),
        }
    }

    #[test]
    fn duplicates_are_dropped() {
        let mut set = InstantiationSet::new();
        assert!(set.insert(request(RequestKind::StructType, "List_I")));
        assert!(!set.insert(request(RequestKind::StructType, "List_I")));
        assert!(set.insert(request(RequestKind::Function, "List_I")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn json_export_lists_requests() {
        let mut set = InstantiationSet::new();
        set.insert(request(RequestKind::StructType, "List_I"));
        let json: serde_json::Value = serde_json::from_str(&set.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["layout_name"], "List_I");
        assert_eq!(json[0]["kind"], "StructType");
        assert_eq!(json[0]["location"]["span"][1], 1);
    }
}
