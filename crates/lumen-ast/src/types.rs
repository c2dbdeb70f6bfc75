//! Type expressions as they appear in source.

use rustc_hash::FxHashMap;

/// An unresolved type expression.
///
/// Generic applications are written with the arguments first, `[Int]List`,
/// and references/pointers as postfix words, `Int ref`, `Node ptr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A plain name: a scalar, a declared type, a type parameter or a trait.
    Named(String),
    /// `T ref`
    Ref(Box<TypeExpr>),
    /// `T ptr`
    Ptr(Box<TypeExpr>),
    /// `T weak`
    Weak(Box<TypeExpr>),
    /// `[A, B]Base`
    Generic { base: String, args: Vec<TypeExpr> },
    /// `(A, B) -> R`
    Function { params: Vec<TypeExpr>, ret: Box<TypeExpr> },
    /// `Self` inside traits and givens.
    SelfType,
    /// `Math.Vector` or `[Int]Math.Grid`.
    Qualified {
        module: Vec<String>,
        name: String,
        args: Vec<TypeExpr>,
    },
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> TypeExpr {
        TypeExpr::Named(name.into())
    }

    pub fn void() -> TypeExpr {
        TypeExpr::Named("Void".to_string())
    }

    pub fn reference(inner: TypeExpr) -> TypeExpr {
        TypeExpr::Ref(Box::new(inner))
    }

    pub fn pointer(inner: TypeExpr) -> TypeExpr {
        TypeExpr::Ptr(Box::new(inner))
    }

    pub fn generic(base: impl Into<String>, args: Vec<TypeExpr>) -> TypeExpr {
        TypeExpr::Generic { base: base.into(), args }
    }

    /// The head name used to look the expression up (`List` for `[T]List`).
    pub fn head_name(&self) -> Option<&str> {
        match self {
            TypeExpr::Named(name) => Some(name),
            TypeExpr::Generic { base, .. } => Some(base),
            TypeExpr::Qualified { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether `Self` occurs anywhere inside.
    pub fn mentions_self(&self) -> bool {
        match self {
            TypeExpr::SelfType => true,
            TypeExpr::Named(name) => name == "Self",
            TypeExpr::Ref(inner) | TypeExpr::Ptr(inner) | TypeExpr::Weak(inner) => {
                inner.mentions_self()
            }
            TypeExpr::Generic { args, .. } | TypeExpr::Qualified { args, .. } => {
                args.iter().any(TypeExpr::mentions_self)
            }
            TypeExpr::Function { params, ret } => {
                params.iter().any(TypeExpr::mentions_self) || ret.mentions_self()
            }
        }
    }

    /// Replace plain names according to `map`, leaving everything else intact.
    ///
    /// Used to rewrite trait-parameter names into the argument expressions of a
    /// particular bound, e.g. `X` in `[X]Get` becomes `A` for a bound `[A]Get`.
    pub fn substitute(&self, map: &FxHashMap<String, TypeExpr>) -> TypeExpr {
        match self {
            TypeExpr::Named(name) => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            TypeExpr::Ref(inner) => TypeExpr::Ref(Box::new(inner.substitute(map))),
            TypeExpr::Ptr(inner) => TypeExpr::Ptr(Box::new(inner.substitute(map))),
            TypeExpr::Weak(inner) => TypeExpr::Weak(Box::new(inner.substitute(map))),
            TypeExpr::Generic { base, args } => TypeExpr::Generic {
                base: base.clone(),
                args: args.iter().map(|a| a.substitute(map)).collect(),
            },
            TypeExpr::Function { params, ret } => TypeExpr::Function {
                params: params.iter().map(|p| p.substitute(map)).collect(),
                ret: Box::new(ret.substitute(map)),
            },
            TypeExpr::SelfType => TypeExpr::SelfType,
            TypeExpr::Qualified { module, name, args } => TypeExpr::Qualified {
                module: module.clone(),
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(map)).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_rewrites_nested_names() {
        let expr = TypeExpr::Function {
            params: vec![TypeExpr::SelfType],
            ret: Box::new(TypeExpr::generic("Option", vec![TypeExpr::named("X")])),
        };
        let mut map = FxHashMap::default();
        map.insert("X".to_string(), TypeExpr::named("A"));
        let out = expr.substitute(&map);
        assert_eq!(
            out,
            TypeExpr::Function {
                params: vec![TypeExpr::SelfType],
                ret: Box::new(TypeExpr::generic("Option", vec![TypeExpr::named("A")])),
            }
        );
    }

    #[test]
    fn mentions_self_looks_through_wrappers() {
        assert!(TypeExpr::reference(TypeExpr::SelfType).mentions_self());
        assert!(TypeExpr::generic("List", vec![TypeExpr::named("Self")]).mentions_self());
        assert!(!TypeExpr::pointer(TypeExpr::named("Int")).mentions_self());
    }
}
