//! Type-variable substitution.
//!
//! `substitute` rewrites every use of a mapped type variable with its
//! replacement, structurally and capture-free. A use that carries explicit
//! primary qualifiers keeps them: the use site is more specific than the
//! replacement it receives.

use rustc_hash::FxHashMap;

use crate::def::TypeVarId;
use crate::qualifiers::QualifierHierarchy;
use crate::types::{AnnotatedType, TypeKind};

pub type TypeSubstitution = FxHashMap<TypeVarId, AnnotatedType>;

/// Apply `map` to `ty`, returning the substituted type.
pub fn substitute(
    hierarchy: &dyn QualifierHierarchy,
    ty: &AnnotatedType,
    map: &TypeSubstitution,
) -> AnnotatedType {
    if map.is_empty() {
        return ty.deep_copy();
    }
    match &ty.kind {
        TypeKind::TypeVar(tv) if !tv.is_declaration => {
            if let Some(replacement) = map.get(&tv.var) {
                let mut result = replacement.deep_copy();
                // Use-site qualifiers win over the replacement's.
                result.replace_qualifiers(hierarchy, &ty.quals);
                return result;
            }
            let mut out = ty.deep_copy();
            if let TypeKind::TypeVar(tv) = &mut out.kind {
                tv.upper = tv.upper.take().map(|b| substitute(hierarchy, &b, map));
                tv.lower = tv.lower.take().map(|b| substitute(hierarchy, &b, map));
            }
            out
        }
        TypeKind::Declared(_) => {
            let mut out = ty.deep_copy();
            if let TypeKind::Declared(d) = &mut out.kind {
                for arg in &mut d.args {
                    *arg = substitute(hierarchy, arg, map);
                }
                d.enclosing = d
                    .enclosing
                    .take()
                    .map(|e| Box::new(substitute(hierarchy, &e, map)));
            }
            out
        }
        TypeKind::Array(component) => {
            let mut out = AnnotatedType::array(substitute(hierarchy, component, map));
            out.quals = ty.quals.clone();
            out
        }
        TypeKind::Wildcard(_) => {
            let mut out = ty.deep_copy();
            if let TypeKind::Wildcard(wc) = &mut out.kind {
                wc.extends = wc.extends.take().map(|b| substitute(hierarchy, &b, map));
                wc.super_bound = wc
                    .super_bound
                    .take()
                    .map(|b| substitute(hierarchy, &b, map));
            }
            out
        }
        TypeKind::Intersection(bounds) => {
            let mut out = AnnotatedType::new(TypeKind::Intersection(
                bounds.iter().map(|b| substitute(hierarchy, b, map)).collect(),
            ));
            out.quals = ty.quals.clone();
            out
        }
        TypeKind::Union(alternatives) => {
            let mut out = AnnotatedType::new(TypeKind::Union(
                alternatives
                    .iter()
                    .map(|a| substitute(hierarchy, a, map))
                    .collect(),
            ));
            out.quals = ty.quals.clone();
            out
        }
        TypeKind::Executable(_) => {
            let mut out = ty.deep_copy();
            if let TypeKind::Executable(exec) = &mut out.kind {
                for param in &mut exec.params {
                    *param = substitute(hierarchy, param, map);
                }
                exec.return_type = substitute(hierarchy, &exec.return_type, map);
                exec.receiver = exec
                    .receiver
                    .take()
                    .map(|r| substitute(hierarchy, &r, map));
                for thrown in &mut exec.thrown {
                    *thrown = substitute(hierarchy, thrown, map);
                }
            }
            out
        }
        TypeKind::TypeVar(_)
        | TypeKind::Primitive(_)
        | TypeKind::Null
        | TypeKind::None => ty.deep_copy(),
    }
}

#[cfg(test)]
#[path = "../tests/instantiate_tests.rs"]
mod tests;
