//! Maranget's usefulness algorithm for exhaustiveness and redundancy checking.
//!
//! Implements Algorithm U from "Warnings for Pattern Matching" (Maranget,
//! 2007) over an abstract pattern representation ([`Pat`]). The checker
//! translates typed match patterns into `Pat` and describes the scrutinee's
//! constructors with [`TypeInfo`].
//!
//! Columns produced by specializing a constructor have no declared type
//! info; their type is derived from the patterns in the column (the first
//! constructor's `type_name` looked up in the [`TypeRegistry`], or `Bool`
//! for boolean literals). A column of wildcards only is treated as infinite,
//! which never changes the answer.

use rustc_hash::FxHashMap;

/// The kind of a literal pattern value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LitKind {
    Int,
    Bool,
    String,
}

/// Abstract pattern representation for exhaustiveness checking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pat {
    /// Matches anything (wildcard `_` or variable binding).
    Wildcard,
    /// A union case with its payload patterns.
    Constructor {
        name: String,
        type_name: String,
        args: Vec<Pat>,
    },
    Literal { value: String, ty: LitKind },
}

/// A row in the pattern matrix (one match arm's patterns).
pub type PatternRow = Vec<Pat>;

#[derive(Clone, Debug, Default)]
pub struct PatternMatrix {
    pub rows: Vec<PatternRow>,
}

/// Signature of a constructor (name + arity).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstructorSig {
    pub name: String,
    pub arity: usize,
}

/// What constructors a type has.
#[derive(Clone, Debug)]
pub enum TypeInfo {
    /// A union with a finite list of cases.
    SumType { variants: Vec<ConstructorSig> },
    /// `true` and `false`.
    Bool,
    /// Integers, strings and everything else without a finite signature.
    Infinite,
}

/// Constructor signatures of the union types that may appear nested inside
/// patterns, keyed by the `type_name` used in [`Pat::Constructor`].
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: FxHashMap<String, TypeInfo>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    pub fn register(&mut self, type_name: impl Into<String>, info: TypeInfo) {
        self.types.insert(type_name.into(), info);
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeInfo> {
        self.types.get(type_name)
    }
}

/// Check whether a match is exhaustive.
///
/// Returns `None` if exhaustive, or `Some(witness)` with one pattern that is
/// not covered by any arm.
pub fn check_exhaustiveness(
    arms: &[Pat],
    scrutinee_type: &TypeInfo,
    registry: &TypeRegistry,
) -> Option<Vec<Pat>> {
    let rows: Vec<PatternRow> = arms.iter().map(|p| vec![p.clone()]).collect();
    witness(&rows, &[Some(scrutinee_type.clone())], registry)
}

/// Indices (0-based) of arms that can never be reached.
pub fn check_redundancy(arms: &[Pat], scrutinee_type: &TypeInfo, registry: &TypeRegistry) -> Vec<usize> {
    let mut matrix = PatternMatrix::default();
    let mut redundant = Vec::new();
    for (idx, arm) in arms.iter().enumerate() {
        let row = vec![arm.clone()];
        if !is_useful(&matrix, &row, &[scrutinee_type.clone()], registry) {
            redundant.push(idx);
        }
        matrix.rows.push(row);
    }
    redundant
}

/// Core usefulness predicate (Algorithm U).
///
/// Returns `true` if some value matched by `row` is matched by no row of
/// `matrix`.
pub fn is_useful(matrix: &PatternMatrix, row: &[Pat], type_info: &[TypeInfo], registry: &TypeRegistry) -> bool {
    let types: Vec<Option<TypeInfo>> = type_info.iter().cloned().map(Some).collect();
    useful(&matrix.rows, row, &types, registry)
}

/// Render a pattern the way users write it.
pub fn format_pat(pat: &Pat) -> String {
    match pat {
        Pat::Wildcard => "_".to_string(),
        Pat::Constructor { name, args, .. } if args.is_empty() => name.clone(),
        Pat::Constructor { name, args, .. } => {
            let args: Vec<String> = args.iter().map(format_pat).collect();
            format!("{}({})", name, args.join(", "))
        }
        Pat::Literal { value, ty: LitKind::String } => format!("\"{}\"", value),
        Pat::Literal { value, .. } => value.clone(),
    }
}

// ── Algorithm ────────────────────────────────────────────────────────────

/// A head constructor of a column.
#[derive(Clone, Debug, PartialEq)]
enum Ctor {
    Named { name: String, type_name: String, arity: usize },
    Lit { value: String, ty: LitKind },
}

impl Ctor {
    fn arity(&self) -> usize {
        match self {
            Ctor::Named { arity, .. } => *arity,
            Ctor::Lit { .. } => 0,
        }
    }

    fn of(pat: &Pat) -> Option<Ctor> {
        match pat {
            Pat::Constructor { name, type_name, args } => Some(Ctor::Named {
                name: name.clone(),
                type_name: type_name.clone(),
                arity: args.len(),
            }),
            Pat::Literal { value, ty } => Some(Ctor::Lit { value: value.clone(), ty: ty.clone() }),
            _ => None,
        }
    }

    fn matches(&self, pat: &Pat) -> bool {
        match (self, pat) {
            (Ctor::Named { name, .. }, Pat::Constructor { name: other, .. }) => name == other,
            (Ctor::Lit { value, ty }, Pat::Literal { value: v, ty: t }) => value == v && ty == t,
            _ => false,
        }
    }

    fn to_pat(&self, args: Vec<Pat>) -> Pat {
        match self {
            Ctor::Named { name, type_name, .. } => {
                Pat::Constructor { name: name.clone(), type_name: type_name.clone(), args }
            }
            Ctor::Lit { value, ty } => Pat::Literal { value: value.clone(), ty: ty.clone() },
        }
    }
}

/// The type info of the first column.
fn column_type(rows: &[PatternRow], declared: &Option<TypeInfo>, registry: &TypeRegistry) -> TypeInfo {
    if let Some(info) = declared {
        return info.clone();
    }
    for row in rows {
        match row.first() {
            Some(Pat::Constructor { type_name, .. }) => {
                if let Some(info) = registry.get(type_name) {
                    return info.clone();
                }
            }
            Some(Pat::Literal { ty: LitKind::Bool, .. }) => return TypeInfo::Bool,
            _ => {}
        }
    }
    TypeInfo::Infinite
}

/// The complete constructor list of a finite type, if the type is finite.
fn all_ctors(info: &TypeInfo, rows: &[PatternRow]) -> Option<Vec<Ctor>> {
    match info {
        TypeInfo::Bool => Some(
            ["true", "false"]
                .iter()
                .map(|v| Ctor::Lit { value: v.to_string(), ty: LitKind::Bool })
                .collect(),
        ),
        TypeInfo::SumType { variants } => {
            let type_name = rows
                .iter()
                .find_map(|r| match r.first() {
                    Some(Pat::Constructor { type_name, .. }) => Some(type_name.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            Some(
                variants
                    .iter()
                    .map(|v| Ctor::Named { name: v.name.clone(), type_name: type_name.clone(), arity: v.arity })
                    .collect(),
            )
        }
        TypeInfo::Infinite => None,
    }
}

fn head_ctors(rows: &[PatternRow]) -> Vec<Ctor> {
    let mut seen: Vec<Ctor> = Vec::new();
    for row in rows {
        if let Some(ctor) = row.first().and_then(Ctor::of) {
            if !used_contains(&seen, &ctor) {
                seen.push(ctor);
            }
        }
    }
    seen
}

/// Rows whose head matches `ctor`, with the head replaced by its arguments.
fn specialize(rows: &[PatternRow], ctor: &Ctor) -> Vec<PatternRow> {
    rows.iter()
        .filter_map(|row| {
            let (head, rest) = row.split_first()?;
            let mut out = match head {
                Pat::Wildcard => vec![Pat::Wildcard; ctor.arity()],
                Pat::Constructor { args, .. } if ctor.matches(head) => args.clone(),
                Pat::Literal { .. } if ctor.matches(head) => Vec::new(),
                _ => return None,
            };
            out.extend_from_slice(rest);
            Some(out)
        })
        .collect()
}

/// Rows whose head is a wildcard, with the head removed.
fn default_rows(rows: &[PatternRow]) -> Vec<PatternRow> {
    rows.iter()
        .filter(|row| matches!(row.first(), Some(Pat::Wildcard)))
        .map(|row| row[1..].to_vec())
        .collect()
}

fn sub_types(arity: usize, rest: &[Option<TypeInfo>]) -> Vec<Option<TypeInfo>> {
    let mut types = vec![None; arity];
    types.extend_from_slice(rest);
    types
}

fn useful(rows: &[PatternRow], row: &[Pat], types: &[Option<TypeInfo>], registry: &TypeRegistry) -> bool {
    let Some((head, rest)) = row.split_first() else {
        return rows.is_empty();
    };
    match head {
        Pat::Constructor { .. } | Pat::Literal { .. } => {
            let Some(ctor) = Ctor::of(head) else {
                return false;
            };
            let specialized_rows = specialize(rows, &ctor);
            let specialized_row = &specialize(&[row.to_vec()], &ctor)[0];
            useful(&specialized_rows, specialized_row, &sub_types(ctor.arity(), &types[1..]), registry)
        }
        Pat::Wildcard => {
            let info = column_type(rows, &types[0], registry);
            let used = head_ctors(rows);
            match all_ctors(&info, rows) {
                Some(all) if !all.is_empty() && all.iter().all(|c| used_contains(&used, c)) => {
                    all.iter().any(|ctor| {
                        let specialized_rows = specialize(rows, ctor);
                        let specialized_row = &specialize(&[row.to_vec()], ctor)[0];
                        useful(&specialized_rows, specialized_row, &sub_types(ctor.arity(), &types[1..]), registry)
                    })
                }
                _ => useful(&default_rows(rows), rest, &types[1..], registry),
            }
        }
    }
}

fn used_contains(used: &[Ctor], ctor: &Ctor) -> bool {
    used.iter().any(|u| match (u, ctor) {
        (Ctor::Named { name: a, .. }, Ctor::Named { name: b, .. }) => a == b,
        (Ctor::Lit { value: a, .. }, Ctor::Lit { value: b, .. }) => a == b,
        _ => false,
    })
}

/// A vector of patterns matched by no row, or `None` if the rows are
/// exhaustive.
fn witness(rows: &[PatternRow], types: &[Option<TypeInfo>], registry: &TypeRegistry) -> Option<Vec<Pat>> {
    if types.is_empty() {
        return if rows.is_empty() { Some(Vec::new()) } else { None };
    }
    let info = column_type(rows, &types[0], registry);
    let used = head_ctors(rows);
    match all_ctors(&info, rows) {
        Some(all) if !all.is_empty() && all.iter().all(|c| used_contains(&used, c)) => {
            for ctor in &all {
                let arity = ctor.arity();
                let specialized = specialize(rows, ctor);
                if let Some(mut w) = witness(&specialized, &sub_types(arity, &types[1..]), registry) {
                    let rest = w.split_off(arity);
                    let mut out = vec![ctor.to_pat(w)];
                    out.extend(rest);
                    return Some(out);
                }
            }
            None
        }
        all => {
            let rest = witness(&default_rows(rows), &types[1..], registry)?;
            let missing = match all {
                Some(all) if !used.is_empty() => all
                    .into_iter()
                    .find(|c| !used_contains(&used, c))
                    .map(|c| {
                        let args = vec![Pat::Wildcard; c.arity()];
                        c.to_pat(args)
                    })
                    .unwrap_or(Pat::Wildcard),
                _ => Pat::Wildcard,
            };
            let mut out = vec![missing];
            out.extend(rest);
            Some(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Helper constructors ──────────────────────────────────────────

    fn wildcard() -> Pat {
        Pat::Wildcard
    }

    fn ctor(name: &str, type_name: &str, args: Vec<Pat>) -> Pat {
        Pat::Constructor { name: name.to_string(), type_name: type_name.to_string(), args }
    }

    fn lit_int(value: i64) -> Pat {
        Pat::Literal { value: value.to_string(), ty: LitKind::Int }
    }

    fn lit_bool(value: bool) -> Pat {
        Pat::Literal { value: value.to_string(), ty: LitKind::Bool }
    }

    fn sig(name: &str, arity: usize) -> ConstructorSig {
        ConstructorSig { name: name.to_string(), arity }
    }

    fn shape_type() -> TypeInfo {
        TypeInfo::SumType { variants: vec![sig("Circle", 1), sig("Point", 0)] }
    }

    fn option_type() -> TypeInfo {
        TypeInfo::SumType { variants: vec![sig("None", 0), sig("Some", 1)] }
    }

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.register("Shape", shape_type());
        reg.register("Option", option_type());
        reg
    }

    fn matrix(rows: Vec<Vec<Pat>>) -> PatternMatrix {
        PatternMatrix { rows }
    }

    // ── is_useful ────────────────────────────────────────────────────

    #[test]
    fn empty_matrix_makes_any_row_useful() {
        let m = matrix(vec![]);
        assert!(is_useful(&m, &[wildcard()], &[TypeInfo::Infinite], &registry()));
    }

    #[test]
    fn empty_row_is_useless_against_nonempty_matrix() {
        let m = matrix(vec![vec![]]);
        assert!(!is_useful(&m, &[], &[], &registry()));
    }

    #[test]
    fn wildcard_after_all_constructors_is_useless() {
        let m = matrix(vec![vec![ctor("Circle", "Shape", vec![wildcard()])], vec![ctor("Point", "Shape", vec![])]]);
        assert!(!is_useful(&m, &[wildcard()], &[shape_type()], &registry()));
    }

    #[test]
    fn multi_column_rows() {
        let m = matrix(vec![
            vec![lit_bool(true), wildcard()],
            vec![lit_bool(false), wildcard()],
        ]);
        assert!(!is_useful(&m, &[lit_bool(true), lit_bool(true)], &[TypeInfo::Bool, TypeInfo::Bool], &registry()));
    }

    // ── Exhaustiveness ───────────────────────────────────────────────

    #[test]
    fn bool_needs_both_values() {
        assert!(check_exhaustiveness(&[lit_bool(true), lit_bool(false)], &TypeInfo::Bool, &registry()).is_none());
        let witness = check_exhaustiveness(&[lit_bool(true)], &TypeInfo::Bool, &registry()).unwrap();
        assert_eq!(format_pat(&witness[0]), "false");
    }

    #[test]
    fn missing_case_is_reported_as_witness() {
        let witness = check_exhaustiveness(&[ctor("Circle", "Shape", vec![wildcard()])], &shape_type(), &registry())
            .unwrap();
        assert_eq!(format_pat(&witness[0]), "Point");
    }

    #[test]
    fn nested_witness_names_the_inner_case() {
        let arms = [
            ctor("Some", "Option", vec![ctor("Circle", "Shape", vec![wildcard()])]),
            ctor("None", "Option", vec![]),
        ];
        let witness = check_exhaustiveness(&arms, &option_type(), &registry()).unwrap();
        assert_eq!(format_pat(&witness[0]), "Some(Point)");
    }

    #[test]
    fn nested_full_coverage() {
        let arms = [
            ctor("Some", "Option", vec![ctor("Circle", "Shape", vec![wildcard()])]),
            ctor("Some", "Option", vec![ctor("Point", "Shape", vec![])]),
            ctor("None", "Option", vec![]),
        ];
        assert!(check_exhaustiveness(&arms, &option_type(), &registry()).is_none());
    }

    #[test]
    fn integer_literals_need_a_fallback() {
        assert!(check_exhaustiveness(&[lit_int(1), lit_int(2)], &TypeInfo::Infinite, &registry()).is_some());
        assert!(check_exhaustiveness(&[lit_int(1), wildcard()], &TypeInfo::Infinite, &registry()).is_none());
    }

    // ── Redundancy ───────────────────────────────────────────────────

    #[test]
    fn arm_after_wildcard_is_redundant() {
        let arms = [wildcard(), ctor("Point", "Shape", vec![])];
        assert_eq!(check_redundancy(&arms, &shape_type(), &registry()), vec![1]);
    }

    #[test]
    fn repeated_literal_is_redundant() {
        let arms = [lit_bool(true), lit_bool(false), lit_bool(true)];
        assert_eq!(check_redundancy(&arms, &TypeInfo::Bool, &registry()), vec![2]);
    }

    #[test]
    fn distinct_arms_are_not_redundant() {
        let arms = [ctor("Circle", "Shape", vec![wildcard()]), ctor("Point", "Shape", vec![])];
        assert!(check_redundancy(&arms, &shape_type(), &registry()).is_empty());
    }
}
