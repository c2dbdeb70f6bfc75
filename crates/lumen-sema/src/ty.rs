//! Type representation for the Lumen type system.
//!
//! Defines the core `Ty` enum and `NominalRef`, the handle through which
//! struct and union types point at their declaration record in the
//! [`DeclArena`](crate::decls::DeclArena). Scalars and compound shapes compare
//! structurally; nominal types compare by declaration identity only.

use std::fmt;

use lumen_common::ModulePath;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Identity of a struct or union declaration in the arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeclId(pub u32);

/// A handle to a nominal declaration.
///
/// `name` and `layout` are carried for display and layout-key purposes only
/// and are excluded from `PartialEq` and `Hash`, so two handles are the same
/// type exactly when they point at the same arena slot.
#[derive(Clone, Debug, Serialize)]
pub struct NominalRef {
    pub id: DeclId,
    /// Display name, e.g. `Point` or `[Int]List`.
    pub name: String,
    /// Layout name, e.g. `Point` or `List_I`.
    pub layout: String,
}

impl PartialEq for NominalRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NominalRef {}

impl std::hash::Hash for NominalRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A Lumen type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Ty {
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bool,
    Void,
    /// The bottom type of expressions that never produce a value.
    Never,
    Pointer(Box<Ty>),
    /// Single-level reference; a reference to a reference is never built.
    Reference(Box<Ty>),
    WeakReference(Box<Ty>),
    Struct(NominalRef),
    Union(NominalRef),
    /// A struct template applied to arguments that are not all concrete yet.
    GenericStruct { template: String, args: Vec<Ty> },
    /// A union template applied to arguments that are not all concrete yet.
    GenericUnion { template: String, args: Vec<Ty> },
    /// An unresolved type parameter, only valid inside a generic body.
    GenericParam(String),
    Function { params: Vec<Ty>, ret: Box<Ty> },
    TraitObject { trait_name: String, args: Vec<Ty> },
    Module(ModulePath),
}

const SCALARS: &[(&str, Ty)] = &[
    ("Int", Ty::Int),
    ("Int8", Ty::Int8),
    ("Int16", Ty::Int16),
    ("Int32", Ty::Int32),
    ("Int64", Ty::Int64),
    ("UInt", Ty::UInt),
    ("UInt8", Ty::UInt8),
    ("UInt16", Ty::UInt16),
    ("UInt32", Ty::UInt32),
    ("UInt64", Ty::UInt64),
    ("Float32", Ty::Float32),
    ("Float64", Ty::Float64),
    ("Bool", Ty::Bool),
    ("Void", Ty::Void),
    ("Never", Ty::Never),
];

impl Ty {
    /// Look up a built-in scalar by its source name.
    pub fn scalar(name: &str) -> Option<Ty> {
        SCALARS.iter().find(|(n, _)| *n == name).map(|(_, t)| t.clone())
    }

    /// The source name of a scalar type.
    pub fn scalar_name(&self) -> Option<&'static str> {
        SCALARS.iter().find(|(_, t)| t == self).map(|(n, _)| *n)
    }

    pub fn reference(inner: Ty) -> Ty {
        Ty::Reference(Box::new(inner))
    }

    pub fn pointer(inner: Ty) -> Ty {
        Ty::Pointer(Box::new(inner))
    }

    pub fn fun(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Function { params, ret: Box::new(ret) }
    }

    pub fn param(name: &str) -> Ty {
        Ty::GenericParam(name.to_string())
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Ty::Int
                | Ty::Int8
                | Ty::Int16
                | Ty::Int32
                | Ty::Int64
                | Ty::UInt
                | Ty::UInt8
                | Ty::UInt16
                | Ty::UInt32
                | Ty::UInt64
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Ty::Int | Ty::Int8 | Ty::Int16 | Ty::Int32 | Ty::Int64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Ty::Float32 | Ty::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Scalars that compare with native equality instructions.
    pub fn has_builtin_equality(&self) -> bool {
        self.is_numeric() || matches!(self, Ty::Bool | Ty::Pointer(_))
    }

    /// Scalars that compare with native ordering instructions.
    pub fn has_builtin_ordering(&self) -> bool {
        self.is_numeric()
    }

    /// Built-in scalar types (numbers, `Bool`, `Void`, `Never`).
    pub fn is_primitive(&self) -> bool {
        self.scalar_name().is_some()
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Ty::Never)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Ty::Reference(_))
    }

    /// The inclusive value range of an integer type.
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        let range = match self {
            Ty::Int8 => (i8::MIN as i128, i8::MAX as i128),
            Ty::Int16 => (i16::MIN as i128, i16::MAX as i128),
            Ty::Int32 => (i32::MIN as i128, i32::MAX as i128),
            Ty::Int | Ty::Int64 => (i64::MIN as i128, i64::MAX as i128),
            Ty::UInt8 => (0, u8::MAX as i128),
            Ty::UInt16 => (0, u16::MAX as i128),
            Ty::UInt32 => (0, u32::MAX as i128),
            Ty::UInt | Ty::UInt64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(range)
    }

    /// Strip one level of reference, if any.
    pub fn strip_reference(&self) -> &Ty {
        match self {
            Ty::Reference(inner) => inner,
            other => other,
        }
    }

    /// Whether a `GenericParam` occurs anywhere in this type.
    pub fn contains_generic_param(&self) -> bool {
        match self {
            Ty::GenericParam(_) => true,
            Ty::Pointer(inner) | Ty::Reference(inner) | Ty::WeakReference(inner) => {
                inner.contains_generic_param()
            }
            Ty::GenericStruct { args, .. }
            | Ty::GenericUnion { args, .. }
            | Ty::TraitObject { args, .. } => args.iter().any(Ty::contains_generic_param),
            Ty::Function { params, ret } => {
                params.iter().any(Ty::contains_generic_param) || ret.contains_generic_param()
            }
            _ => false,
        }
    }

    /// Replace generic parameters by name.
    ///
    /// This is a purely structural rewrite: a `GenericStruct` whose arguments
    /// become concrete stays a `GenericStruct`. The checker re-canonicalizes
    /// such types through the instantiation engine.
    pub fn substitute(&self, map: &FxHashMap<String, Ty>) -> Ty {
        match self {
            Ty::GenericParam(name) => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            Ty::Pointer(inner) => Ty::Pointer(Box::new(inner.substitute(map))),
            Ty::Reference(inner) => Ty::Reference(Box::new(inner.substitute(map))),
            Ty::WeakReference(inner) => Ty::WeakReference(Box::new(inner.substitute(map))),
            Ty::GenericStruct { template, args } => Ty::GenericStruct {
                template: template.clone(),
                args: args.iter().map(|a| a.substitute(map)).collect(),
            },
            Ty::GenericUnion { template, args } => Ty::GenericUnion {
                template: template.clone(),
                args: args.iter().map(|a| a.substitute(map)).collect(),
            },
            Ty::TraitObject { trait_name, args } => Ty::TraitObject {
                trait_name: trait_name.clone(),
                args: args.iter().map(|a| a.substitute(map)).collect(),
            },
            Ty::Function { params, ret } => Ty::Function {
                params: params.iter().map(|p| p.substitute(map)).collect(),
                ret: Box::new(ret.substitute(map)),
            },
            other => other.clone(),
        }
    }

    /// Canonical string used to name and deduplicate instantiations.
    pub fn layout_key(&self) -> String {
        match self {
            Ty::Int => "I".to_string(),
            Ty::Int8 => "I8".to_string(),
            Ty::Int16 => "I16".to_string(),
            Ty::Int32 => "I32".to_string(),
            Ty::Int64 => "I64".to_string(),
            Ty::UInt => "U".to_string(),
            Ty::UInt8 => "U8".to_string(),
            Ty::UInt16 => "U16".to_string(),
            Ty::UInt32 => "U32".to_string(),
            Ty::UInt64 => "U64".to_string(),
            Ty::Float32 => "F32".to_string(),
            Ty::Float64 => "F64".to_string(),
            Ty::Bool => "B".to_string(),
            Ty::Void => "V".to_string(),
            Ty::Never => "N".to_string(),
            Ty::Pointer(inner) => format!("P_{}", inner.layout_key()),
            Ty::Reference(inner) => format!("R_{}", inner.layout_key()),
            Ty::WeakReference(inner) => format!("W_{}", inner.layout_key()),
            Ty::Struct(nominal) | Ty::Union(nominal) => nominal.layout.clone(),
            Ty::GenericStruct { template, args } | Ty::GenericUnion { template, args } => {
                layout_name(template, args)
            }
            Ty::GenericParam(name) => format!("Param_{}", name),
            Ty::Function { params, ret } => {
                let mut key = "Fn".to_string();
                for p in params {
                    key.push('_');
                    key.push_str(&p.layout_key());
                }
                key.push('_');
                key.push_str(&ret.layout_key());
                key
            }
            Ty::TraitObject { trait_name, args } => format!("Dyn_{}", layout_name(trait_name, args)),
            Ty::Module(path) => format!("Mod_{}", path.0.join("_")),
        }
    }
}

/// Layout name of a template applied to arguments: `List_I`, `Map_I_F64`.
pub fn layout_name(template: &str, args: &[Ty]) -> String {
    let mut name = template.to_string();
    for arg in args {
        name.push('_');
        name.push_str(&arg.layout_key());
    }
    name
}

/// Display name of a template applied to arguments: `[Int, Bool]Map`.
pub fn applied_name(template: &str, args: &[Ty]) -> String {
    if args.is_empty() {
        return template.to_string();
    }
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    format!("[{}]{}", args.join(", "), template)
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.scalar_name() {
            return write!(f, "{}", name);
        }
        match self {
            Ty::Pointer(inner) => write!(f, "{} ptr", inner),
            Ty::Reference(inner) => write!(f, "{} ref", inner),
            Ty::WeakReference(inner) => write!(f, "{} weak", inner),
            Ty::Struct(nominal) | Ty::Union(nominal) => write!(f, "{}", nominal.name),
            Ty::GenericStruct { template, args } | Ty::GenericUnion { template, args } => {
                write!(f, "{}", applied_name(template, args))
            }
            Ty::GenericParam(name) => write!(f, "{}", name),
            Ty::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) -> {}", params.join(", "), ret)
            }
            Ty::TraitObject { trait_name, args } => write!(f, "{}", applied_name(trait_name, args)),
            Ty::Module(path) => write!(f, "module {}", path),
            _ => unreachable!("scalars handled above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nominal(id: u32, name: &str) -> NominalRef {
        NominalRef { id: DeclId(id), name: name.to_string(), layout: name.to_string() }
    }

    #[test]
    fn display_uses_postfix_and_prefix_forms() {
        assert_eq!(Ty::reference(Ty::Int).to_string(), "Int ref");
        assert_eq!(Ty::pointer(Ty::UInt8).to_string(), "UInt8 ptr");
        let list = Ty::GenericStruct { template: "List".into(), args: vec![Ty::param("T")] };
        assert_eq!(list.to_string(), "[T]List");
        assert_eq!(Ty::fun(vec![Ty::Int, Ty::Bool], Ty::Void).to_string(), "(Int, Bool) -> Void");
    }

    #[test]
    fn nominal_identity_ignores_names() {
        let a = Ty::Struct(nominal(3, "Point"));
        let b = Ty::Struct(NominalRef { id: DeclId(3), name: "Other".into(), layout: "X".into() });
        let c = Ty::Struct(nominal(4, "Point"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn layout_keys_are_canonical() {
        assert_eq!(Ty::Int.layout_key(), "I");
        assert_eq!(Ty::reference(Ty::UInt8).layout_key(), "R_U8");
        assert_eq!(layout_name("Map", &[Ty::Int, Ty::Float64]), "Map_I_F64");
        assert_eq!(Ty::fun(vec![Ty::Int], Ty::Bool).layout_key(), "Fn_I_B");
        assert_eq!(Ty::param("T").layout_key(), "Param_T");
    }

    #[test]
    fn generic_param_detection_is_deep() {
        let ty = Ty::fun(vec![Ty::pointer(Ty::param("T"))], Ty::Void);
        assert!(ty.contains_generic_param());
        assert!(!Ty::fun(vec![Ty::Int], Ty::Void).contains_generic_param());
    }

    #[test]
    fn substitute_replaces_params() {
        let mut map = FxHashMap::default();
        map.insert("T".to_string(), Ty::Int);
        let ty = Ty::reference(Ty::param("T")).substitute(&map);
        assert_eq!(ty, Ty::reference(Ty::Int));
    }

    #[test]
    fn integer_ranges() {
        assert_eq!(Ty::UInt8.integer_range(), Some((0, 255)));
        assert_eq!(Ty::Int8.integer_range(), Some((-128, 127)));
        assert_eq!(Ty::Bool.integer_range(), None);
    }
}
