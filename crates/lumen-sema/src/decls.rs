//! Arena of struct and union declaration records.
//!
//! A declaration is allocated once and addressed by its [`DeclId`] for the
//! rest of the run. Skeletons are allocated before their members are known
//! and filled in place later, so every `Ty` handed out earlier observes the
//! final member list without being re-resolved.

use lumen_common::{Access, ModulePath};
use serde::Serialize;

use crate::ty::{DeclId, NominalRef, Ty};

/// Resolution progress of a declaration record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DeclState {
    /// Registered by name; members not resolved yet.
    Declared,
    /// Members are being resolved by the instantiation engine. Embedding
    /// a declaration in this state by value is illegal recursion.
    InProgress,
    Complete,
}

#[derive(Clone, Debug, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub ty: Ty,
    pub mutable: bool,
    pub access: Access,
}

#[derive(Clone, Debug, Serialize)]
pub struct CaseInfo {
    pub name: String,
    pub params: Vec<(String, Ty)>,
}

#[derive(Clone, Debug, Serialize)]
pub enum DeclBody {
    Struct(Vec<FieldInfo>),
    Union(Vec<CaseInfo>),
}

/// A struct or union declaration record.
#[derive(Clone, Debug, Serialize)]
pub struct NominalDecl {
    pub id: DeclId,
    /// Display name: `Point`, `Math.Vec`, `[Int]List`.
    pub name: String,
    /// Layout name: `Point`, `Math_Vec`, `List_I`.
    pub layout_name: String,
    pub module: ModulePath,
    pub file: String,
    pub access: Access,
    pub body: DeclBody,
    pub state: DeclState,
    /// Template this declaration was instantiated from.
    pub template: Option<String>,
    pub type_args: Vec<Ty>,
    pub intrinsic: bool,
}

impl NominalDecl {
    pub fn is_union(&self) -> bool {
        matches!(self.body, DeclBody::Union(_))
    }

    pub fn fields(&self) -> &[FieldInfo] {
        match &self.body {
            DeclBody::Struct(fields) => fields,
            DeclBody::Union(_) => &[],
        }
    }

    pub fn cases(&self) -> &[CaseInfo] {
        match &self.body {
            DeclBody::Union(cases) => cases,
            DeclBody::Struct(_) => &[],
        }
    }

    pub fn nominal_ref(&self) -> NominalRef {
        NominalRef { id: self.id, name: self.name.clone(), layout: self.layout_name.clone() }
    }

    /// The `Ty` naming this declaration.
    pub fn ty(&self) -> Ty {
        if self.is_union() {
            Ty::Union(self.nominal_ref())
        } else {
            Ty::Struct(self.nominal_ref())
        }
    }
}

/// Stable-id storage for every nominal declaration of the run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DeclArena {
    decls: Vec<NominalDecl>,
}

/// What a fresh arena slot should look like.
pub struct NewDecl {
    pub name: String,
    pub layout_name: String,
    pub module: ModulePath,
    pub file: String,
    pub access: Access,
    pub is_union: bool,
    pub state: DeclState,
    pub template: Option<String>,
    pub type_args: Vec<Ty>,
    pub intrinsic: bool,
}

impl DeclArena {
    pub fn new() -> Self {
        DeclArena::default()
    }

    /// Allocate a slot with an empty member list.
    pub fn alloc(&mut self, new: NewDecl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        let body = if new.is_union {
            DeclBody::Union(Vec::new())
        } else {
            DeclBody::Struct(Vec::new())
        };
        self.decls.push(NominalDecl {
            id,
            name: new.name,
            layout_name: new.layout_name,
            module: new.module,
            file: new.file,
            access: new.access,
            body,
            state: new.state,
            template: new.template,
            type_args: new.type_args,
            intrinsic: new.intrinsic,
        });
        id
    }

    pub fn get(&self, id: DeclId) -> &NominalDecl {
        &self.decls[id.0 as usize]
    }

    pub fn set_state(&mut self, id: DeclId, state: DeclState) {
        self.decls[id.0 as usize].state = state;
    }

    /// Overwrite the member list of a slot and mark it complete.
    pub fn complete(&mut self, id: DeclId, body: DeclBody) {
        let decl = &mut self.decls[id.0 as usize];
        decl.body = body;
        decl.state = DeclState::Complete;
    }

    pub fn iter(&self) -> impl Iterator<Item = &NominalDecl> {
        self.decls.iter()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Declaration ids embedded by value in the members of `id`.
    ///
    /// References, pointers and weak references break the chain; everything
    /// else is stored inline.
    pub fn value_edges(&self, id: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        match &self.get(id).body {
            DeclBody::Struct(fields) => {
                for field in fields {
                    collect_inline(&field.ty, &mut out);
                }
            }
            DeclBody::Union(cases) => {
                for case in cases {
                    for (_, ty) in &case.params {
                        collect_inline(ty, &mut out);
                    }
                }
            }
        }
        out
    }
}

/// The nominal declaration stored inline by a member of type `ty`, if any.
pub fn inline_decl(ty: &Ty) -> Option<DeclId> {
    match ty {
        Ty::Struct(nominal) | Ty::Union(nominal) => Some(nominal.id),
        _ => None,
    }
}

fn collect_inline(ty: &Ty, out: &mut Vec<DeclId>) {
    if let Some(id) = inline_decl(ty) {
        out.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_struct(name: &str) -> NewDecl {
        NewDecl {
            name: name.to_string(),
            layout_name: name.to_string(),
            module: ModulePath::root(),
            file: "main.lm".to_string(),
            access: Access::Public,
            is_union: false,
            state: DeclState::Declared,
            template: None,
            type_args: Vec::new(),
            intrinsic: false,
        }
    }

    #[test]
    fn placeholder_is_overwritten_in_place() {
        let mut arena = DeclArena::new();
        let id = arena.alloc(new_struct("Node"));
        let early = arena.get(id).ty();
        arena.complete(
            id,
            DeclBody::Struct(vec![FieldInfo {
                name: "value".into(),
                ty: Ty::Int,
                mutable: false,
                access: Access::Public,
            }]),
        );
        let late = arena.get(id).ty();
        assert_eq!(early, late);
        assert_eq!(arena.get(id).fields().len(), 1);
        assert_eq!(arena.get(id).state, DeclState::Complete);
    }

    #[test]
    fn references_do_not_count_as_inline_edges() {
        let mut arena = DeclArena::new();
        let a = arena.alloc(new_struct("A"));
        let b = arena.alloc(new_struct("B"));
        let b_ty = arena.get(b).ty();
        arena.complete(
            a,
            DeclBody::Struct(vec![
                FieldInfo { name: "direct".into(), ty: b_ty.clone(), mutable: false, access: Access::Public },
                FieldInfo {
                    name: "indirect".into(),
                    ty: Ty::reference(b_ty),
                    mutable: false,
                    access: Access::Public,
                },
            ]),
        );
        assert_eq!(arena.value_edges(a), vec![b]);
    }
}
