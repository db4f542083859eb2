//! Construction and structural queries over annotated types.
//!
//! `TypeFactory` is the seam between the engine and its collaborators: the
//! definition store (class/type-parameter declarations) and the qualifier
//! hierarchy. It owns:
//!
//! - validated construction (`declared` synthesizes wildcard arguments for
//!   raw uses; unknown definitions are fatal);
//! - lazy bound materialization for type variables and wildcards;
//! - the substituted direct-supertype walk;
//! - the pure host-type oracles: boxing, unboxing, narrowing, the
//!   universal string type, erasure, erased-subtype tests;
//! - default-qualifier completion and derived primaries of composites.
//!
//! Bound laziness: a freshly built type-variable or wildcard use carries
//! `None` bounds. Materialization copies the declared bound shape and
//! pushes the use's primary qualifiers onto it; any self-reference nested
//! in that shape is again an unmaterialized use, so self-referential
//! (F-bounded) declarations never force an infinite tree.

use tracing::trace;

use crate::def::{DefId, DefStore, TypeVarId};
use crate::instantiate::{TypeSubstitution, substitute};
use crate::qualifiers::{Qualifier, QualifierHierarchy, QualifierSet};
use crate::types::{AnnotatedType, DeclaredType, Kind, PrimitiveKind, TypeKind, WildcardType};

pub struct TypeFactory<'a> {
    store: &'a DefStore,
    hierarchy: &'a dyn QualifierHierarchy,
}

impl<'a> TypeFactory<'a> {
    pub fn new(store: &'a DefStore, hierarchy: &'a dyn QualifierHierarchy) -> Self {
        Self { store, hierarchy }
    }

    pub fn store(&self) -> &'a DefStore {
        self.store
    }

    pub fn hierarchy(&self) -> &'a dyn QualifierHierarchy {
        self.hierarchy
    }

    // ── construction ──

    /// A use of `def` with the given type arguments.
    ///
    /// Passing no arguments for a generic definition builds a *raw* use:
    /// the arguments are synthesized unbounded wildcards over the
    /// definition's parameters. Any other arity mismatch is a fatal error
    /// in the caller.
    pub fn declared(&self, def: DefId, args: Vec<AnnotatedType>) -> AnnotatedType {
        let class = self.store.class(def);
        if args.is_empty() && !class.type_params.is_empty() {
            let args = class
                .type_params
                .iter()
                .map(|&param| self.synthesized_wildcard(param))
                .collect();
            return AnnotatedType::new(TypeKind::Declared(DeclaredType {
                def,
                args,
                enclosing: None,
                was_raw: true,
            }));
        }
        assert!(
            args.len() == class.type_params.len(),
            "{} expects {} type arguments, got {}",
            self.store.class_name(def),
            class.type_params.len(),
            args.len()
        );
        AnnotatedType::new(TypeKind::Declared(DeclaredType {
            def,
            args,
            enclosing: None,
            was_raw: false,
        }))
    }

    /// A use of a type parameter, bounds unmaterialized.
    pub fn type_var(&self, var: TypeVarId) -> AnnotatedType {
        AnnotatedType::type_var_use(var)
    }

    pub fn wildcard_unbounded(&self, var: Option<TypeVarId>) -> AnnotatedType {
        AnnotatedType::new(TypeKind::Wildcard(Box::new(WildcardType {
            var,
            extends: None,
            super_bound: None,
            uninferred: false,
            from_raw: false,
        })))
    }

    pub fn wildcard_extends(&self, var: Option<TypeVarId>, bound: AnnotatedType) -> AnnotatedType {
        AnnotatedType::new(TypeKind::Wildcard(Box::new(WildcardType {
            var,
            extends: Some(bound),
            super_bound: None,
            uninferred: false,
            from_raw: false,
        })))
    }

    pub fn wildcard_super(&self, var: Option<TypeVarId>, bound: AnnotatedType) -> AnnotatedType {
        AnnotatedType::new(TypeKind::Wildcard(Box::new(WildcardType {
            var,
            extends: None,
            super_bound: Some(bound),
            uninferred: false,
            from_raw: false,
        })))
    }

    /// The placeholder wildcard produced when generic-argument inference
    /// fails.
    pub fn uninferred_wildcard(&self, var: Option<TypeVarId>) -> AnnotatedType {
        AnnotatedType::new(TypeKind::Wildcard(Box::new(WildcardType {
            var,
            extends: None,
            super_bound: None,
            uninferred: true,
            from_raw: false,
        })))
    }

    fn synthesized_wildcard(&self, var: TypeVarId) -> AnnotatedType {
        AnnotatedType::new(TypeKind::Wildcard(Box::new(WildcardType {
            var: Some(var),
            extends: None,
            super_bound: None,
            uninferred: false,
            from_raw: true,
        })))
    }

    /// An intersection with its derived primary computed.
    pub fn intersection(&self, bounds: Vec<AnnotatedType>) -> AnnotatedType {
        let mut ty = AnnotatedType::intersection(bounds);
        self.normalize_composites(&mut ty);
        ty
    }

    /// A union with its derived primary computed.
    pub fn union(&self, alternatives: Vec<AnnotatedType>) -> AnnotatedType {
        let mut ty = AnnotatedType::union(alternatives);
        self.normalize_composites(&mut ty);
        ty
    }

    // ── bound materialization ──

    /// The upper bound facing a comparison: a type variable's upper bound
    /// or a wildcard's extends bound, materialized if the node has not
    /// cached one. The node's primary qualifiers overwrite the bound's, per
    /// the coupling invariant.
    pub fn upper_bound(&self, ty: &AnnotatedType) -> AnnotatedType {
        let mut bound = match &ty.kind {
            TypeKind::TypeVar(tv) => match &tv.upper {
                Some(upper) => upper.deep_copy(),
                None => {
                    let mut declared = self.store.param(tv.var).upper.deep_copy();
                    self.add_default_qualifiers(&mut declared);
                    declared
                }
            },
            TypeKind::Wildcard(wc) => match &wc.extends {
                Some(extends) => extends.deep_copy(),
                None => match wc.var {
                    Some(var) => {
                        let mut declared = self.store.param(var).upper.deep_copy();
                        self.add_default_qualifiers(&mut declared);
                        declared
                    }
                    None => {
                        let mut object = self.store.object_type();
                        self.add_default_qualifiers(&mut object);
                        object
                    }
                },
            },
            _ => panic!(
                "upper bound requested of a {:?} type",
                ty.kind()
            ),
        };
        bound.replace_qualifiers(self.hierarchy, &ty.quals);
        bound
    }

    /// The lower bound facing a comparison: a type variable's lower bound
    /// or a wildcard's super bound; the implicit lower bound is the null
    /// type at each hierarchy's bottom.
    pub fn lower_bound(&self, ty: &AnnotatedType) -> AnnotatedType {
        let mut bound = match &ty.kind {
            TypeKind::TypeVar(tv) => match &tv.lower {
                Some(lower) => lower.deep_copy(),
                None => match self.store.param(tv.var).lower {
                    Some(ref lower) => {
                        let mut lower = lower.deep_copy();
                        self.add_default_qualifiers(&mut lower);
                        lower
                    }
                    None => self.null_bottom(),
                },
            },
            TypeKind::Wildcard(wc) => match &wc.super_bound {
                Some(super_bound) => super_bound.deep_copy(),
                None => self.null_bottom(),
            },
            _ => panic!("lower bound requested of a {:?} type", ty.kind()),
        };
        bound.replace_qualifiers(self.hierarchy, &ty.quals);
        bound
    }

    /// Materialize and cache both bounds in place on a type variable or
    /// wildcard node. Other kinds are untouched.
    pub fn ensure_bounds(&self, ty: &mut AnnotatedType) {
        match ty.kind() {
            Kind::TypeVar => {
                let upper = self.upper_bound(ty);
                let lower = self.lower_bound(ty);
                if let TypeKind::TypeVar(tv) = &mut ty.kind {
                    tv.upper.get_or_insert(upper);
                    tv.lower.get_or_insert(lower);
                }
            }
            Kind::Wildcard => {
                let extends = self.upper_bound(ty);
                let super_bound = self.lower_bound(ty);
                if let TypeKind::Wildcard(wc) = &mut ty.kind {
                    wc.extends.get_or_insert(extends);
                    wc.super_bound.get_or_insert(super_bound);
                }
            }
            _ => {}
        }
    }

    /// The null type carrying each hierarchy's bottom qualifier.
    pub fn null_bottom(&self) -> AnnotatedType {
        let mut null = AnnotatedType::null();
        for &top in self.hierarchy.tops() {
            null.quals.insert(self.hierarchy, self.hierarchy.bottom_of(top));
        }
        null
    }

    // ── effective qualifiers ──

    /// The effective qualifier of `ty` in the hierarchy topped by `top`:
    /// the primary if present, otherwise the effective qualifier of the
    /// upper/extends bound.
    pub fn effective_qualifier(&self, ty: &AnnotatedType, top: Qualifier) -> Option<Qualifier> {
        if let Some(q) = ty.qualifier_in(self.hierarchy, top) {
            return Some(q);
        }
        match ty.kind() {
            Kind::TypeVar | Kind::Wildcard => {
                self.effective_qualifier(&self.upper_bound(ty), top)
            }
            _ => None,
        }
    }

    pub fn effective_qualifiers(&self, ty: &AnnotatedType) -> QualifierSet {
        let mut set = QualifierSet::new();
        for &top in self.hierarchy.tops() {
            if let Some(q) = self.effective_qualifier(ty, top) {
                set.insert(self.hierarchy, q);
            }
        }
        set
    }

    /// The qualifiers on the lower-bound side of `ty`, descending through
    /// variable/wildcard lower bounds.
    pub fn effective_lower_qualifiers(&self, ty: &AnnotatedType) -> QualifierSet {
        match ty.kind() {
            Kind::TypeVar | Kind::Wildcard => {
                let lower = self.lower_bound(ty);
                let mut set = self.effective_lower_qualifiers(&lower);
                for q in ty.quals.iter() {
                    set.insert(self.hierarchy, q);
                }
                set
            }
            _ => ty.quals.clone(),
        }
    }

    // ── qualifier completion ──

    /// Complete missing qualifiers on collaborator-provided shapes so the
    /// engine's totality invariant holds: null positions get each
    /// hierarchy's bottom, other concrete positions the top; type
    /// variables and wildcards legitimately stay bare. This is not a
    /// defaulting policy — it is the minimal completion for
    /// engine-internal types.
    pub fn add_default_qualifiers(&self, ty: &mut AnnotatedType) {
        match &mut ty.kind {
            TypeKind::TypeVar(tv) => {
                if let Some(upper) = &mut tv.upper {
                    self.add_default_qualifiers(upper);
                }
                if let Some(lower) = &mut tv.lower {
                    self.add_default_qualifiers(lower);
                }
                return;
            }
            TypeKind::Wildcard(wc) => {
                if let Some(extends) = &mut wc.extends {
                    self.add_default_qualifiers(extends);
                }
                if let Some(super_bound) = &mut wc.super_bound {
                    self.add_default_qualifiers(super_bound);
                }
                return;
            }
            _ => {}
        }

        for &top in self.hierarchy.tops() {
            if !ty.has_qualifier_in(self.hierarchy, top) {
                let q = match ty.kind() {
                    Kind::Null => self.hierarchy.bottom_of(top),
                    _ => top,
                };
                ty.quals.insert(self.hierarchy, q);
            }
        }

        match &mut ty.kind {
            TypeKind::Declared(d) => {
                for arg in &mut d.args {
                    self.add_default_qualifiers(arg);
                }
                if let Some(enclosing) = &mut d.enclosing {
                    self.add_default_qualifiers(enclosing);
                }
            }
            TypeKind::Array(component) => self.add_default_qualifiers(component),
            TypeKind::Intersection(bounds) => {
                for bound in bounds {
                    self.add_default_qualifiers(bound);
                }
            }
            TypeKind::Union(alternatives) => {
                for alternative in alternatives {
                    self.add_default_qualifiers(alternative);
                }
            }
            TypeKind::Executable(exec) => {
                for param in &mut exec.params {
                    self.add_default_qualifiers(param);
                }
                self.add_default_qualifiers(&mut exec.return_type);
                if let Some(receiver) = &mut exec.receiver {
                    self.add_default_qualifiers(receiver);
                }
                for thrown in &mut exec.thrown {
                    self.add_default_qualifiers(thrown);
                }
            }
            _ => {}
        }

        // Composites carry a derived primary; recompute it now that the
        // members are complete.
        self.normalize_composites(ty);
    }

    /// Recompute the derived primary of an intersection (glb of its
    /// bounds) or union (lub of its alternatives). Other kinds are
    /// untouched.
    pub fn normalize_composites(&self, ty: &mut AnnotatedType) {
        enum Fold {
            Lub,
            Glb,
        }
        let (members, fold) = match &ty.kind {
            TypeKind::Intersection(bounds) => (bounds, Fold::Glb),
            TypeKind::Union(alternatives) => (alternatives, Fold::Lub),
            _ => return,
        };
        let mut derived = QualifierSet::new();
        for &top in self.hierarchy.tops() {
            let mut acc: Option<Qualifier> = None;
            for member in members {
                let Some(q) = self.effective_qualifier(member, top) else {
                    acc = None;
                    break;
                };
                acc = Some(match acc {
                    None => q,
                    Some(prev) => match fold {
                        Fold::Lub => self.hierarchy.least_upper_bound(prev, q),
                        Fold::Glb => self.hierarchy.greatest_lower_bound(prev, q),
                    },
                });
            }
            if let Some(q) = acc {
                derived.insert(self.hierarchy, q);
            }
        }
        // Hierarchies whose members carry no qualifier yet keep whatever
        // the node already had; the derived entries overwrite the rest.
        ty.quals.insert_all(self.hierarchy, &derived);
    }

    // ── supertype walk ──

    /// The direct supertypes of a declared use, with the use's type
    /// arguments substituted through and the use's primary qualifiers
    /// carried onto each. Raw uses produce raw supertype uses. Interfaces
    /// (and classes with no declared superclass) report the root object
    /// type.
    pub fn direct_supertypes(&self, ty: &AnnotatedType) -> Vec<AnnotatedType> {
        let TypeKind::Declared(d) = &ty.kind else {
            panic!("direct supertypes requested of a {:?} type", ty.kind());
        };
        let class = self.store.class(d.def);
        let object = self.store.well_known().object;
        trace!(class = %self.store.class_name(d.def), raw = d.was_raw, "direct_supertypes");

        let mut subst = TypeSubstitution::default();
        if !d.was_raw {
            for (i, &param) in class.type_params.iter().enumerate() {
                subst.insert(param, d.args[i].deep_copy());
            }
        }

        let mut out = Vec::new();
        let mut push = |shape: &AnnotatedType| {
            let mut sup = if d.was_raw {
                let def = shape
                    .as_declared()
                    .unwrap_or_else(|| panic!("supertype shape is not declared"))
                    .def;
                self.declared(def, Vec::new())
            } else {
                substitute(self.hierarchy, shape, &subst)
            };
            self.add_default_qualifiers(&mut sup);
            sup.replace_qualifiers(self.hierarchy, &ty.quals);
            out.push(sup);
        };

        if let Some(superclass) = &class.superclass {
            push(superclass);
        }
        for interface in &class.interfaces {
            push(interface);
        }
        if class.superclass.is_none() && d.def != object {
            // Interfaces, and classes registered without an explicit
            // superclass, sit directly below the root object type.
            let mut root = self.declared(object, Vec::new());
            self.add_default_qualifiers(&mut root);
            root.replace_qualifiers(self.hierarchy, &ty.quals);
            out.push(root);
        }
        out
    }

    // ── boxing / unboxing / narrowing / string ──

    /// Box a primitive, carrying its qualifiers.
    pub fn boxed(&self, ty: &AnnotatedType) -> AnnotatedType {
        let TypeKind::Primitive(kind) = &ty.kind else {
            panic!("boxed() requested of a {:?} type", ty.kind());
        };
        let mut boxed = self.declared(self.store.well_known().boxed(*kind), Vec::new());
        boxed.quals = ty.quals.clone();
        boxed
    }

    /// Unbox a declared type if it is a box, carrying its qualifiers.
    pub fn unboxed(&self, ty: &AnnotatedType) -> Option<AnnotatedType> {
        let d = ty.as_declared()?;
        let kind = self.store.well_known().unboxed(d.def)?;
        let mut prim = AnnotatedType::primitive(kind);
        prim.quals = ty.quals.clone();
        Some(prim)
    }

    /// Narrow a primitive to `target`, carrying its qualifiers.
    pub fn narrowed(&self, ty: &AnnotatedType, target: PrimitiveKind) -> AnnotatedType {
        let TypeKind::Primitive(kind) = &ty.kind else {
            panic!("narrowed() requested of a {:?} type", ty.kind());
        };
        assert!(
            kind.can_narrow_to(target),
            "no narrowing conversion from {:?} to {:?}",
            kind,
            target
        );
        let mut prim = AnnotatedType::primitive(target);
        prim.quals = ty.quals.clone();
        prim
    }

    /// The universal string type carrying `from`'s effective qualifiers
    /// (every type converts to it).
    pub fn string_type(&self, from: &AnnotatedType) -> AnnotatedType {
        let mut string = self.declared(self.store.well_known().string, Vec::new());
        string.quals = self.effective_qualifiers(from);
        string
    }

    // ── erasure ──

    /// Erase per the host language: declared types drop arguments, arrays
    /// erase component-wise, variables and wildcards erase to their upper
    /// bound's erasure (keeping the node's primaries), composites erase to
    /// their first member's erasure.
    pub fn erasure(&self, ty: &AnnotatedType) -> AnnotatedType {
        match &ty.kind {
            TypeKind::Declared(d) => {
                let mut erased = AnnotatedType::new(TypeKind::Declared(DeclaredType {
                    def: d.def,
                    args: Vec::new(),
                    enclosing: None,
                    was_raw: false,
                }));
                erased.quals = ty.quals.clone();
                erased
            }
            TypeKind::Array(component) => {
                let mut erased = AnnotatedType::array(self.erasure(component));
                erased.quals = ty.quals.clone();
                erased
            }
            TypeKind::TypeVar(_) | TypeKind::Wildcard(_) => {
                let mut erased = self.erasure(&self.upper_bound(ty));
                erased.replace_qualifiers(self.hierarchy, &ty.quals);
                erased
            }
            TypeKind::Intersection(bounds) => {
                let mut erased = self.erasure(&bounds[0]);
                erased.replace_qualifiers(self.hierarchy, &ty.quals);
                erased
            }
            TypeKind::Union(alternatives) => {
                let mut erased = self.erasure(&alternatives[0]);
                erased.replace_qualifiers(self.hierarchy, &ty.quals);
                erased
            }
            TypeKind::Executable(_) => {
                let mut out = ty.deep_copy();
                if let TypeKind::Executable(exec) = &mut out.kind {
                    for param in &mut exec.params {
                        *param = self.erasure(param);
                    }
                    exec.return_type = self.erasure(&exec.return_type);
                    exec.receiver = exec.receiver.take().map(|r| self.erasure(&r));
                    for thrown in &mut exec.thrown {
                        *thrown = self.erasure(thrown);
                    }
                    exec.type_params.clear();
                }
                out
            }
            TypeKind::Primitive(_) | TypeKind::Null | TypeKind::None => ty.deep_copy(),
        }
    }

    /// Whether the erasure of `sub` is a host-language subtype of the
    /// erasure of `sup`.
    pub fn is_erased_subtype(&self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        let sub = self.erasure(sub);
        let sup = self.erasure(sup);
        self.erased_subtype_inner(&sub, &sup)
    }

    fn erased_subtype_inner(&self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        let wk = self.store.well_known();
        match (&sub.kind, &sup.kind) {
            (TypeKind::Null, TypeKind::Null | TypeKind::Declared(_) | TypeKind::Array(_)) => true,
            (TypeKind::Declared(a), TypeKind::Declared(b)) => {
                self.store.is_erased_subtype(a.def, b.def)
            }
            (TypeKind::Array(_), TypeKind::Declared(b)) => {
                b.def == wk.object || b.def == wk.cloneable || b.def == wk.serializable
            }
            (TypeKind::Array(a), TypeKind::Array(b)) => match (&a.kind, &b.kind) {
                (TypeKind::Primitive(pa), TypeKind::Primitive(pb)) => pa == pb,
                _ => self.erased_subtype_inner(a, b),
            },
            (TypeKind::Primitive(a), TypeKind::Primitive(b)) => a == b,
            _ => false,
        }
    }

    /// Whether `a` and `b` have the same erasure.
    pub fn erased_same(&self, a: &AnnotatedType, b: &AnnotatedType) -> bool {
        let a = self.erasure(a);
        let b = self.erasure(b);
        match (&a.kind, &b.kind) {
            (TypeKind::Declared(da), TypeKind::Declared(db)) => da.def == db.def,
            (TypeKind::Array(ca), TypeKind::Array(cb)) => self.erased_same(ca, cb),
            (TypeKind::Primitive(pa), TypeKind::Primitive(pb)) => pa == pb,
            (TypeKind::Null, TypeKind::Null) | (TypeKind::None, TypeKind::None) => true,
            _ => false,
        }
    }

    /// Whether `ty`'s use of a type variable or wildcard denotes the same
    /// declared type parameter as `other`'s.
    pub fn same_type_parameter(&self, a: &AnnotatedType, b: &AnnotatedType) -> bool {
        match (&a.kind, &b.kind) {
            (TypeKind::TypeVar(ta), TypeKind::TypeVar(tb)) => ta.var == tb.var,
            _ => false,
        }
    }
}

impl std::fmt::Debug for TypeFactory<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeFactory").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../tests/factory_tests.rs"]
mod tests;
