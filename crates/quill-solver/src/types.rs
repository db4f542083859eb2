//! The annotated-type representation.
//!
//! One [`AnnotatedType`] node exists per type *occurrence* (never interned
//! per declaration). A node is a closed [`TypeKind`] variant plus the
//! primary [`QualifierSet`] for that occurrence.
//!
//! Nodes are built mutable, have qualifiers attached, and are then handed
//! to the engine, which only ever mutates private copies. The tree is
//! fully owned, so `Clone` is a deep, structure- and qualifier-preserving
//! copy.
//!
//! Invariants enforced here:
//! - a qualifier set holds at most one qualifier per hierarchy;
//! - setting a primary qualifier on a type variable or wildcard overwrites
//!   that hierarchy's qualifier on both materialized bounds (the bound and
//!   the primary must never disagree);
//! - bound fields of type variables and wildcards are `None` until
//!   materialized by the `TypeFactory`; nested self-references stay
//!   unmaterialized, which is what makes self-referential generic
//!   declarations representable as finite trees.

use crate::def::{DefId, TypeVarId};
use crate::qualifiers::{Qualifier, QualifierHierarchy, QualifierSet};

/// The primitive kinds of the host type system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Char,
    Float,
    Double,
}

impl PrimitiveKind {
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::Short | Self::Int | Self::Long | Self::Char
        )
    }

    /// Whether a constant of kind `self` admits an implicit narrowing
    /// conversion to `target` (assignment of a literal to a narrower
    /// integral kind).
    pub fn can_narrow_to(self, target: PrimitiveKind) -> bool {
        if self == target || !self.is_integral() || !target.is_integral() {
            return false;
        }
        // char is unordered with byte/short; narrowing into and out of it
        // is allowed for constants.
        fn rank(kind: PrimitiveKind) -> u8 {
            match kind {
                PrimitiveKind::Byte => 1,
                PrimitiveKind::Short | PrimitiveKind::Char => 2,
                PrimitiveKind::Int => 3,
                PrimitiveKind::Long => 4,
                _ => u8::MAX,
            }
        }
        rank(target) <= rank(self)
    }
}

/// Discriminant-only view of a node's variant, for messages and quick
/// comparisons.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Declared,
    Array,
    Primitive,
    TypeVar,
    Wildcard,
    Intersection,
    Union,
    Null,
    Executable,
    None,
}

/// A use of a class or interface, with type arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeclaredType {
    pub def: DefId,
    pub args: Vec<AnnotatedType>,
    /// The enclosing instance type for inner-class uses.
    pub enclosing: Option<Box<AnnotatedType>>,
    /// The surface syntax omitted type arguments; `args` then holds
    /// synthesized unbounded wildcards.
    pub was_raw: bool,
}

/// A use of a type parameter.
///
/// `upper`/`lower` are materialized lazily from the declaring
/// [`TypeParamDef`](crate::def::TypeParamDef) by the factory and cached
/// here once a caller mutates them (as structural conversion does).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeVarType {
    pub var: TypeVarId,
    pub upper: Option<AnnotatedType>,
    pub lower: Option<AnnotatedType>,
    /// Declaration-site node (the parameter itself) rather than a use.
    pub is_declaration: bool,
}

/// A wildcard type argument.
///
/// At most one of `extends`/`super_bound` is explicit; the other defaults
/// from the type parameter the wildcard instantiates (`var`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WildcardType {
    /// The type parameter this wildcard instantiates, when known.
    pub var: Option<TypeVarId>,
    pub extends: Option<AnnotatedType>,
    pub super_bound: Option<AnnotatedType>,
    /// Placeholder for failed generic-argument inference.
    pub uninferred: bool,
    /// Synthesized as the argument of a raw type use.
    pub from_raw: bool,
}

/// A method or constructor type. Not part of the subtyping relation, but
/// shares the variant infrastructure (copying, erasure, formatting).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExecutableType {
    pub type_params: Vec<AnnotatedType>,
    pub params: Vec<AnnotatedType>,
    pub return_type: AnnotatedType,
    pub receiver: Option<AnnotatedType>,
    pub thrown: Vec<AnnotatedType>,
}

/// The closed variant set mirroring the host language's static types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Declared(DeclaredType),
    Array(Box<AnnotatedType>),
    Primitive(PrimitiveKind),
    TypeVar(Box<TypeVarType>),
    Wildcard(Box<WildcardType>),
    /// Ordered direct bounds. The primary qualifier is derived: the glb of
    /// the bounds' qualifiers, per hierarchy.
    Intersection(Vec<AnnotatedType>),
    /// Ordered alternatives. The primary qualifier is derived: the lub of
    /// the alternatives' qualifiers, per hierarchy.
    Union(Vec<AnnotatedType>),
    /// The null type, bottom of the reference types.
    Null,
    Executable(Box<ExecutableType>),
    /// void / package / absent positions.
    None,
}

/// One type occurrence: a variant plus its primary qualifiers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnnotatedType {
    pub kind: TypeKind,
    pub quals: QualifierSet,
}

impl AnnotatedType {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            quals: QualifierSet::new(),
        }
    }

    pub fn null() -> Self {
        Self::new(TypeKind::Null)
    }

    pub fn none() -> Self {
        Self::new(TypeKind::None)
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::new(TypeKind::Primitive(kind))
    }

    pub fn array(component: AnnotatedType) -> Self {
        Self::new(TypeKind::Array(Box::new(component)))
    }

    /// A use of a type parameter, bounds unmaterialized.
    pub fn type_var_use(var: TypeVarId) -> Self {
        Self::new(TypeKind::TypeVar(Box::new(TypeVarType {
            var,
            upper: None,
            lower: None,
            is_declaration: false,
        })))
    }

    /// An intersection over `bounds`. The derived primary is not computed
    /// here; `TypeFactory::normalize_composites` does that once a
    /// hierarchy is in scope.
    pub fn intersection(bounds: Vec<AnnotatedType>) -> Self {
        assert!(bounds.len() >= 2, "intersection needs at least two bounds");
        Self::new(TypeKind::Intersection(bounds))
    }

    /// A union over `alternatives`; see `intersection` for the derived
    /// primary.
    pub fn union(alternatives: Vec<AnnotatedType>) -> Self {
        assert!(
            alternatives.len() >= 2,
            "union needs at least two alternatives"
        );
        Self::new(TypeKind::Union(alternatives))
    }

    pub fn kind(&self) -> Kind {
        match &self.kind {
            TypeKind::Declared(_) => Kind::Declared,
            TypeKind::Array(_) => Kind::Array,
            TypeKind::Primitive(_) => Kind::Primitive,
            TypeKind::TypeVar(_) => Kind::TypeVar,
            TypeKind::Wildcard(_) => Kind::Wildcard,
            TypeKind::Intersection(_) => Kind::Intersection,
            TypeKind::Union(_) => Kind::Union,
            TypeKind::Null => Kind::Null,
            TypeKind::Executable(_) => Kind::Executable,
            TypeKind::None => Kind::None,
        }
    }

    /// An explicit deep copy. The tree is fully owned, so this is `clone`;
    /// the name records the intent at call sites that must not alias.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    // ── primary qualifier access ──

    pub fn qualifiers(&self) -> &QualifierSet {
        &self.quals
    }

    /// The primary qualifier in the hierarchy topped by `top`.
    pub fn qualifier_in(
        &self,
        hierarchy: &dyn QualifierHierarchy,
        top: Qualifier,
    ) -> Option<Qualifier> {
        self.quals.in_hierarchy(hierarchy, top)
    }

    pub fn has_qualifier_in(&self, hierarchy: &dyn QualifierHierarchy, top: Qualifier) -> bool {
        self.qualifier_in(hierarchy, top).is_some()
    }

    /// Attach `q`, replacing any qualifier of the same hierarchy.
    ///
    /// On type variables and wildcards this also overwrites that
    /// hierarchy's qualifier on both materialized bounds, keeping bound and
    /// primary consistent on every mutation.
    pub fn add_qualifier(&mut self, hierarchy: &dyn QualifierHierarchy, q: Qualifier) {
        self.quals.insert(hierarchy, q);
        self.propagate_to_bounds(hierarchy, q);
    }

    /// Replace this node's qualifiers with those of `quals`, hierarchy by
    /// hierarchy (hierarchies absent from `quals` keep their entry).
    pub fn replace_qualifiers(&mut self, hierarchy: &dyn QualifierHierarchy, quals: &QualifierSet) {
        for q in quals.iter() {
            self.add_qualifier(hierarchy, q);
        }
    }

    /// Attach the qualifiers of `quals` only for hierarchies with no entry
    /// on this node.
    pub fn add_missing_qualifiers(
        &mut self,
        hierarchy: &dyn QualifierHierarchy,
        quals: &QualifierSet,
    ) {
        for q in quals.iter() {
            let top = hierarchy.top_of(q);
            if !self.has_qualifier_in(hierarchy, top) {
                self.add_qualifier(hierarchy, q);
            }
        }
    }

    /// Remove and return the qualifier of the hierarchy topped by `top`.
    /// Bounds are left untouched.
    pub fn remove_qualifier_in(
        &mut self,
        hierarchy: &dyn QualifierHierarchy,
        top: Qualifier,
    ) -> Option<Qualifier> {
        self.quals.remove_in_hierarchy(hierarchy, top)
    }

    pub fn clear_qualifiers(&mut self) {
        self.quals = QualifierSet::new();
    }

    fn propagate_to_bounds(&mut self, hierarchy: &dyn QualifierHierarchy, q: Qualifier) {
        match &mut self.kind {
            TypeKind::TypeVar(tv) => {
                if let Some(upper) = &mut tv.upper {
                    upper.add_qualifier(hierarchy, q);
                }
                if let Some(lower) = &mut tv.lower {
                    lower.add_qualifier(hierarchy, q);
                }
            }
            TypeKind::Wildcard(wc) => {
                if let Some(extends) = &mut wc.extends {
                    extends.add_qualifier(hierarchy, q);
                }
                if let Some(super_bound) = &mut wc.super_bound {
                    super_bound.add_qualifier(hierarchy, q);
                }
            }
            _ => {}
        }
    }

    // ── variant views ──

    pub fn as_declared(&self) -> Option<&DeclaredType> {
        match &self.kind {
            TypeKind::Declared(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_type_var(&self) -> Option<&TypeVarType> {
        match &self.kind {
            TypeKind::TypeVar(tv) => Some(tv),
            _ => None,
        }
    }

    pub fn as_wildcard(&self) -> Option<&WildcardType> {
        match &self.kind {
            TypeKind::Wildcard(wc) => Some(wc),
            _ => None,
        }
    }

    /// Whether this is a wildcard standing in for a failed inference.
    pub fn is_uninferred_wildcard(&self) -> bool {
        matches!(&self.kind, TypeKind::Wildcard(wc) if wc.uninferred)
    }

    /// Whether this is a raw declared-type use.
    pub fn was_raw(&self) -> bool {
        matches!(&self.kind, TypeKind::Declared(d) if d.was_raw)
    }
}

#[cfg(test)]
#[path = "../tests/types_tests.rs"]
mod tests;
