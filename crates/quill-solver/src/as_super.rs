//! Structural re-basing of qualifiers onto a supertype's shape.
//!
//! `as_super(type, shape)` returns a fresh copy of `shape` carrying
//! `type`'s qualifiers at the primary position and, recursively, at the
//! corresponding bound/component positions, with generic substitution
//! already applied (the supertype walk supplies substituted links).
//!
//! Preconditions and escapes:
//! - the caller guarantees `shape`'s erasure is a supertype of `type`'s;
//!   a missing link is a fatal internal error, except
//! - the universal string type, which every type may convert to, and
//! - sources that are type arguments of raw types, whose qualifiers are
//!   copied verbatim without structural justification.
//!
//! The converter never mutates its arguments; it works on private copies
//! throughout.

use tracing::trace;

use crate::factory::TypeFactory;
use crate::format::TypeFormatter;
use crate::history::DepthCounter;
use crate::types::{AnnotatedType, Kind, TypeKind};
use quill_common::limits::MAX_AS_SUPER_DEPTH;

pub struct AsSuperConverter<'a> {
    factory: &'a TypeFactory<'a>,
    /// Whether the type being visited is a type argument of a raw type;
    /// its underlying type then need not be related to the shape.
    from_raw_type_arg: bool,
    depth: DepthCounter,
}

impl<'a> AsSuperConverter<'a> {
    pub fn new(factory: &'a TypeFactory<'a>) -> Self {
        Self {
            factory,
            from_raw_type_arg: false,
            depth: DepthCounter::new(MAX_AS_SUPER_DEPTH),
        }
    }

    /// Re-express `ty`'s qualifiers in `shape`'s form. Neither argument is
    /// mutated; the result is a fresh tree.
    pub fn as_super(&mut self, ty: &AnnotatedType, shape: &AnnotatedType) -> AnnotatedType {
        trace!(ty = ?ty.kind(), shape = ?shape.kind(), "as_super");
        if ty == shape {
            return ty.deep_copy();
        }
        self.from_raw_type_arg = false;
        self.visit(ty.deep_copy(), shape.deep_copy())
    }

    fn visit(&mut self, mut ty: AnnotatedType, shape: AnnotatedType) -> AnnotatedType {
        if !self.depth.enter() {
            self.fatal("conversion recursion exceeded the depth limit", &ty, &shape);
        }
        // The walk below reads union primaries; recompute the derived
        // value before trusting it.
        self.factory.normalize_composites(&mut ty);
        let result = self.dispatch(ty, shape);
        self.depth.leave();
        result
    }

    fn dispatch(&mut self, ty: AnnotatedType, shape: AnnotatedType) -> AnnotatedType {
        use Kind as K;
        match (ty.kind(), shape.kind()) {
            // ── array sources ──
            (K::Array, K::Array) => self.visit_array_array(ty, shape),
            (K::Array, K::Declared) => self.visit_array_declared(ty, shape),
            (K::Array, K::Intersection) => self.visit_array_intersection(ty, shape),
            (K::Array, K::TypeVar | K::Wildcard) => self.visit_bounded_shape(ty, shape),

            // ── declared sources ──
            (K::Declared, K::Declared) => self.visit_declared_declared(ty, shape),
            (K::Declared, K::Intersection) => self.visit_declared_intersection(ty, shape),
            (K::Declared, K::Primitive) => self.visit_declared_primitive(ty, shape),
            (K::Declared, K::TypeVar | K::Wildcard) => self.visit_bounded_shape(ty, shape),
            (K::Declared, K::Union) => self.copy_primary(&ty, shape),

            // ── intersection sources ──
            (K::Intersection, K::Declared) => self.visit_intersection_declared(ty, shape),
            (K::Intersection, K::Intersection) => self.visit_intersection_intersection(ty, shape),
            (K::Intersection, K::Primitive) => self.visit_intersection_primitive(ty, shape),
            (K::Intersection, K::TypeVar | K::Wildcard) => self.visit_bounded_shape(ty, shape),
            (K::Intersection, K::Union) => self.visit_composite_first(ty, shape),

            // ── primitive sources ──
            (K::Primitive, K::Primitive) => self.copy_primary(&ty, shape),
            (K::Primitive, K::Declared) => self.visit_primitive_declared(ty, shape),
            (K::Primitive, K::Intersection | K::TypeVar | K::Union | K::Wildcard) => {
                let boxed = self.factory.boxed(&ty);
                self.visit(boxed, shape)
            }

            // ── type-variable sources ──
            (K::TypeVar, K::TypeVar) => self.visit_typevar_typevar(ty, shape),
            (K::TypeVar, K::Wildcard) => self.visit_typevar_wildcard(ty, shape),
            (K::TypeVar, K::Array | K::Declared | K::Intersection | K::Primitive | K::Union) => {
                let upper = self.factory.upper_bound(&ty);
                let converted = self.visit(upper, shape);
                self.copy_primary(&ty, converted)
            }

            // ── union sources ──
            (K::Union, K::Union) => self.visit_union_union(ty, shape),
            (K::Union, K::Declared | K::Intersection | K::TypeVar | K::Wildcard) => {
                self.visit_composite_first(ty, shape)
            }

            // ── wildcard sources ──
            (K::Wildcard, K::TypeVar) => self.visit_wildcard_typevar(ty, shape),
            (K::Wildcard, K::Wildcard) => self.visit_wildcard_wildcard(ty, shape),
            (K::Wildcard, K::Array | K::Declared | K::Intersection | K::Primitive | K::Union) => {
                self.visit_wildcard_concrete(ty, shape)
            }

            // The null type converts to any shape by carrying its
            // qualifiers onto the copy.
            (K::Null, _) => self.copy_primary(&ty, shape),

            _ => self.fatal("cannot view type through this supertype shape", &ty, &shape),
        }
    }

    // ── array sources ──

    fn visit_array_array(&mut self, ty: AnnotatedType, mut shape: AnnotatedType) -> AnnotatedType {
        let ty_component = match &ty.kind {
            TypeKind::Array(component) => (**component).clone(),
            _ => unreachable!(),
        };
        if let TypeKind::Array(shape_component) = &mut shape.kind {
            let converted = self.visit(ty_component, (**shape_component).clone());
            **shape_component = converted;
        }
        self.copy_primary(&ty, shape)
    }

    fn visit_array_declared(&mut self, ty: AnnotatedType, shape: AnnotatedType) -> AnnotatedType {
        if self.is_array_supertype(&shape) {
            return self.copy_primary(&ty, shape);
        }
        self.not_erased_subtype(ty, shape)
    }

    fn visit_array_intersection(
        &mut self,
        ty: AnnotatedType,
        mut shape: AnnotatedType,
    ) -> AnnotatedType {
        let bounds = match &shape.kind {
            TypeKind::Intersection(bounds) => bounds.clone(),
            _ => unreachable!(),
        };
        for bound in &bounds {
            if !self.is_array_supertype(bound) {
                return self.not_erased_subtype(ty, shape);
            }
        }
        if let TypeKind::Intersection(bounds) = &mut shape.kind {
            for bound in bounds {
                bound.replace_qualifiers(self.factory.hierarchy(), ty.qualifiers());
            }
        }
        self.copy_primary(&ty, shape)
    }

    /// The declared supertypes an array has: the root object type and the
    /// array marker interfaces.
    fn is_array_supertype(&self, shape: &AnnotatedType) -> bool {
        let wk = self.factory.store().well_known();
        match shape.as_declared() {
            Some(d) => d.def == wk.object || d.def == wk.cloneable || d.def == wk.serializable,
            None => false,
        }
    }

    // ── declared sources ──

    fn visit_declared_declared(&mut self, ty: AnnotatedType, shape: AnnotatedType) -> AnnotatedType {
        if self.factory.erased_same(&ty, &shape) {
            // Same erased class: the source already has the right shape
            // and arguments.
            return ty;
        }
        // Walk the substituted direct supertypes toward the target.
        let supertypes = self.factory.direct_supertypes(&ty);
        for supertype in supertypes {
            if supertype.kind() == Kind::Declared
                && self.factory.is_erased_subtype(&supertype, &shape)
            {
                return self.visit(supertype, shape);
            }
        }
        self.not_erased_subtype(ty, shape)
    }

    fn visit_declared_intersection(
        &mut self,
        ty: AnnotatedType,
        mut shape: AnnotatedType,
    ) -> AnnotatedType {
        let shape_bounds = match &shape.kind {
            TypeKind::Intersection(bounds) => bounds.clone(),
            _ => unreachable!(),
        };
        // Every kept bound is a supertype of the source; convert into each.
        let mut new_bounds = Vec::new();
        for bound in shape_bounds {
            if self.factory.is_erased_subtype(&ty, &bound) {
                new_bounds.push(self.visit(ty.deep_copy(), bound));
            }
        }
        if let TypeKind::Intersection(bounds) = &mut shape.kind {
            *bounds = new_bounds;
        }
        self.copy_primary(&ty, shape)
    }

    fn visit_declared_primitive(&mut self, ty: AnnotatedType, shape: AnnotatedType) -> AnnotatedType {
        match self.factory.unboxed(&ty) {
            Some(unboxed) => self.copy_primary(&unboxed, shape),
            None => self.fatal("source is not a boxed primitive", &ty, &shape),
        }
    }

    // ── intersection sources ──

    fn visit_intersection_declared(
        &mut self,
        ty: AnnotatedType,
        shape: AnnotatedType,
    ) -> AnnotatedType {
        let bounds = match &ty.kind {
            TypeKind::Intersection(bounds) => bounds.clone(),
            _ => unreachable!(),
        };
        for bound in bounds {
            if bound.kind() == Kind::Declared && self.factory.is_erased_subtype(&bound, &shape) {
                let converted = self.visit(bound, shape);
                // The bound's primary may be above the intersection's
                // derived one; the intersection's is the more precise.
                return self.copy_primary(&ty, converted);
            }
        }
        self.not_erased_subtype(ty, shape)
    }

    fn visit_intersection_intersection(
        &mut self,
        ty: AnnotatedType,
        mut shape: AnnotatedType,
    ) -> AnnotatedType {
        let ty_bounds = match &ty.kind {
            TypeKind::Intersection(bounds) => bounds.clone(),
            _ => unreachable!(),
        };
        let shape_bounds = match &shape.kind {
            TypeKind::Intersection(bounds) => bounds.clone(),
            _ => unreachable!(),
        };
        let mut new_bounds = Vec::new();
        for shape_bound in shape_bounds {
            let source = ty_bounds
                .iter()
                .find(|bound| self.factory.is_erased_subtype(bound, &shape_bound));
            match source {
                Some(bound) => new_bounds.push(self.visit(bound.deep_copy(), shape_bound)),
                None => self.fatal("no intersection bound converts to this bound", &ty, &shape),
            }
        }
        if let TypeKind::Intersection(bounds) = &mut shape.kind {
            *bounds = new_bounds;
        }
        self.copy_primary(&ty, shape)
    }

    fn visit_intersection_primitive(
        &mut self,
        ty: AnnotatedType,
        shape: AnnotatedType,
    ) -> AnnotatedType {
        let bounds = match &ty.kind {
            TypeKind::Intersection(bounds) => bounds.clone(),
            _ => unreachable!(),
        };
        for bound in bounds {
            if self.factory.unboxed(&bound).is_some() {
                let converted = self.visit(bound, shape);
                return self.copy_primary(&ty, converted);
            }
        }
        self.fatal("no intersection bound is a boxed primitive", &ty, &shape)
    }

    // ── primitive sources ──

    fn visit_primitive_declared(&mut self, ty: AnnotatedType, shape: AnnotatedType) -> AnnotatedType {
        let ty_kind = match &ty.kind {
            TypeKind::Primitive(kind) => *kind,
            _ => unreachable!(),
        };
        if let Some(shape_d) = shape.as_declared() {
            if let Some(target_kind) = self.factory.store().well_known().unboxed(shape_d.def) {
                if target_kind != ty_kind && ty_kind.can_narrow_to(target_kind) {
                    // A literal narrows before it boxes.
                    let narrowed = self.factory.narrowed(&ty, target_kind);
                    return self.visit(narrowed, shape);
                }
            }
        }
        let boxed = self.factory.boxed(&ty);
        self.visit(boxed, shape)
    }

    // ── type-variable sources ──

    fn visit_typevar_typevar(&mut self, ty: AnnotatedType, mut shape: AnnotatedType) -> AnnotatedType {
        // Copy the source primaries first so they do not later override
        // the converted bounds.
        shape.clear_qualifiers();
        shape.replace_qualifiers(self.factory.hierarchy(), ty.qualifiers());

        self.factory.ensure_bounds(&mut shape);
        let ty_upper = self.factory.upper_bound(&ty);
        let ty_lower = self.factory.lower_bound(&ty);

        let (shape_upper, shape_lower) = match &mut shape.kind {
            TypeKind::TypeVar(tv) => (
                tv.upper.take().expect("bounds materialized"),
                tv.lower.take().expect("bounds materialized"),
            ),
            _ => unreachable!(),
        };

        let new_upper = self.visit(ty_upper, shape_upper);
        let new_lower = self.convert_lower_bound(&ty, ty_lower, shape_lower);

        if let TypeKind::TypeVar(tv) = &mut shape.kind {
            tv.upper = Some(new_upper);
            tv.lower = Some(new_lower);
        }
        shape
    }

    fn visit_typevar_wildcard(&mut self, ty: AnnotatedType, mut shape: AnnotatedType) -> AnnotatedType {
        self.factory.ensure_bounds(&mut shape);
        let ty_lower = self.factory.lower_bound(&ty);

        let (shape_extends, shape_super) = match &mut shape.kind {
            TypeKind::Wildcard(wc) => (
                wc.extends.take().expect("bounds materialized"),
                wc.super_bound.take().expect("bounds materialized"),
            ),
            _ => unreachable!(),
        };

        // If the wildcard's extends bound is a use of this same variable,
        // convert the variable into it whole; otherwise convert the
        // variable's upper bound.
        let same_var = matches!(
            (&ty.kind, &shape_extends.kind),
            (TypeKind::TypeVar(a), TypeKind::TypeVar(b)) if a.var == b.var
        );
        let new_extends = if same_var {
            self.visit(ty.deep_copy(), shape_extends)
        } else {
            let upper = self.factory.upper_bound(&ty);
            self.visit(upper, shape_extends)
        };
        let new_super = self.convert_lower_bound(&ty, ty_lower, shape_super);

        if let TypeKind::Wildcard(wc) = &mut shape.kind {
            wc.extends = Some(new_extends);
            wc.super_bound = Some(new_super);
        }
        self.copy_primary(&ty, shape)
    }

    // ── union sources ──

    fn visit_union_union(&mut self, ty: AnnotatedType, mut shape: AnnotatedType) -> AnnotatedType {
        let quals = ty.qualifiers().clone();
        if let TypeKind::Union(alternatives) = &mut shape.kind {
            for alternative in alternatives {
                alternative.replace_qualifiers(self.factory.hierarchy(), &quals);
            }
        }
        self.copy_primary(&ty, shape)
    }

    /// Convert through the first member of a composite source; every
    /// member reaches the same shape.
    fn visit_composite_first(&mut self, ty: AnnotatedType, shape: AnnotatedType) -> AnnotatedType {
        let first = match &ty.kind {
            TypeKind::Union(alternatives) => alternatives[0].deep_copy(),
            TypeKind::Intersection(bounds) => bounds[0].deep_copy(),
            _ => unreachable!(),
        };
        let converted = self.visit(first, shape);
        self.copy_primary(&ty, converted)
    }

    // ── wildcard sources ──

    fn visit_wildcard_concrete(&mut self, ty: AnnotatedType, shape: AnnotatedType) -> AnnotatedType {
        let saved = self.from_raw_type_arg;
        if matches!(&ty.kind, TypeKind::Wildcard(wc) if wc.from_raw) {
            self.from_raw_type_arg = true;
        }
        let extends = self.factory.upper_bound(&ty);
        let mut converted = self.visit(extends, shape);
        self.from_raw_type_arg = saved;
        self.factory.add_default_qualifiers(&mut converted);
        self.copy_primary(&ty, converted)
    }

    fn visit_wildcard_typevar(&mut self, ty: AnnotatedType, mut shape: AnnotatedType) -> AnnotatedType {
        let saved = self.from_raw_type_arg;
        if matches!(&ty.kind, TypeKind::Wildcard(wc) if wc.from_raw) {
            self.from_raw_type_arg = true;
        }
        self.factory.ensure_bounds(&mut shape);
        let ty_lower = self.factory.lower_bound(&ty);

        let (shape_upper, shape_lower) = match &mut shape.kind {
            TypeKind::TypeVar(tv) => (
                tv.upper.take().expect("bounds materialized"),
                tv.lower.take().expect("bounds materialized"),
            ),
            _ => unreachable!(),
        };

        let extends = self.factory.upper_bound(&ty);
        let new_upper = self.visit(extends, shape_upper);
        let new_lower = self.convert_lower_bound(&ty, ty_lower, shape_lower);

        if let TypeKind::TypeVar(tv) = &mut shape.kind {
            tv.upper = Some(new_upper);
            tv.lower = Some(new_lower);
        }
        self.from_raw_type_arg = saved;
        self.factory.add_default_qualifiers(&mut shape);
        self.copy_primary(&ty, shape)
    }

    fn visit_wildcard_wildcard(&mut self, ty: AnnotatedType, mut shape: AnnotatedType) -> AnnotatedType {
        let saved = self.from_raw_type_arg;
        if matches!(&ty.kind, TypeKind::Wildcard(wc) if wc.from_raw) {
            self.from_raw_type_arg = true;
            if let TypeKind::Wildcard(wc) = &mut shape.kind {
                wc.from_raw = true;
            }
        }
        self.factory.ensure_bounds(&mut shape);
        let ty_extends = self.factory.upper_bound(&ty);
        let ty_lower = self.factory.lower_bound(&ty);

        let (shape_extends, shape_super) = match &mut shape.kind {
            TypeKind::Wildcard(wc) => (
                wc.extends.take().expect("bounds materialized"),
                wc.super_bound.take().expect("bounds materialized"),
            ),
            _ => unreachable!(),
        };

        let new_extends = if self.factory.is_erased_subtype(&ty_extends, &shape_extends) {
            self.visit(ty_extends, shape_extends)
        } else {
            // The wildcard's upper bound can sit above the bound of the
            // parameter it instantiates; keep the shape's bound and carry
            // the qualifiers over.
            let mut kept = shape_extends;
            kept.replace_qualifiers(self.factory.hierarchy(), ty_extends.qualifiers());
            self.factory.add_default_qualifiers(&mut kept);
            kept
        };
        let new_super = self.convert_lower_bound(&ty, ty_lower, shape_super);

        if let TypeKind::Wildcard(wc) = &mut shape.kind {
            wc.extends = Some(new_extends);
            wc.super_bound = Some(new_super);
        }
        self.from_raw_type_arg = saved;
        self.factory.add_default_qualifiers(&mut shape);
        self.copy_primary(&ty, shape)
    }

    // ── shared pieces ──

    /// Annotate a target lower bound from a source-side type.
    ///
    /// A null target lower bound takes the source's effective lower-bound
    /// qualifiers. Otherwise the source converts into it when their
    /// erasures agree; failing that there is no way to convert *down*, so
    /// qualifiers are copied verbatim.
    fn as_super_lower_bound(
        &mut self,
        source: AnnotatedType,
        mut target_lower: AnnotatedType,
    ) -> AnnotatedType {
        if target_lower.kind() == Kind::Null {
            let quals = self.factory.effective_lower_qualifiers(&source);
            target_lower.replace_qualifiers(self.factory.hierarchy(), &quals);
            return target_lower;
        }
        if self.factory.erased_same(&source, &target_lower) {
            return self.visit(source, target_lower);
        }
        self.copy_primary(&source, target_lower)
    }

    /// The lower-bound trichotomy for variable/wildcard sources: both
    /// implicit bounds copy across, an implicit source bound converts the
    /// whole source into the target bound, and explicit bounds convert
    /// bound-to-bound.
    fn convert_lower_bound(
        &mut self,
        source: &AnnotatedType,
        source_lower: AnnotatedType,
        target_lower: AnnotatedType,
    ) -> AnnotatedType {
        if source_lower.kind() == Kind::Null && target_lower.kind() == Kind::Null {
            return self.copy_primary(&source_lower, target_lower);
        }
        if source_lower.kind() == Kind::Null {
            return self.visit(source.deep_copy(), target_lower);
        }
        self.as_super_lower_bound(source_lower, target_lower)
    }

    /// Targets of type-variable/wildcard form for concrete sources.
    fn visit_bounded_shape(&mut self, ty: AnnotatedType, mut shape: AnnotatedType) -> AnnotatedType {
        self.factory.ensure_bounds(&mut shape);

        match &mut shape.kind {
            TypeKind::TypeVar(tv) => {
                let upper = tv.upper.take().expect("bounds materialized");
                let lower = tv.lower.take().expect("bounds materialized");
                let new_upper = self.visit(ty.deep_copy(), upper);
                let new_lower = self.as_super_lower_bound(ty.deep_copy(), lower);
                tv.upper = Some(new_upper);
                tv.lower = Some(new_lower);
            }
            TypeKind::Wildcard(wc) => {
                let extends = wc.extends.take().expect("bounds materialized");
                let super_bound = wc.super_bound.take().expect("bounds materialized");
                let new_extends = self.visit(ty.deep_copy(), extends);
                let new_super = self.as_super_lower_bound(ty.deep_copy(), super_bound);
                wc.extends = Some(new_extends);
                wc.super_bound = Some(new_super);
            }
            _ => unreachable!(),
        }
        self.copy_primary(&ty, shape)
    }

    /// Replace `to`'s qualifiers with `from`'s primaries. Union targets
    /// additionally push missing qualifiers onto their alternatives so
    /// later structural comparisons see a consistent tree.
    fn copy_primary(&self, from: &AnnotatedType, mut to: AnnotatedType) -> AnnotatedType {
        to.replace_qualifiers(self.factory.hierarchy(), from.qualifiers());
        let quals = to.qualifiers().clone();
        if let TypeKind::Union(alternatives) = &mut to.kind {
            for alternative in alternatives {
                alternative.add_missing_qualifiers(self.factory.hierarchy(), &quals);
            }
        }
        to
    }

    fn not_erased_subtype(&mut self, ty: AnnotatedType, shape: AnnotatedType) -> AnnotatedType {
        let wk = self.factory.store().well_known();
        if matches!(shape.as_declared(), Some(d) if d.def == wk.string) {
            // Every type converts to the universal string type.
            let string = self.factory.string_type(&ty);
            return self.visit(string, shape);
        }
        if self.from_raw_type_arg {
            return self.copy_primary(&ty, shape);
        }
        self.fatal("type is not an erased subtype of the supertype shape", &ty, &shape)
    }

    fn fatal(&self, message: &str, ty: &AnnotatedType, shape: &AnnotatedType) -> ! {
        let formatter = TypeFormatter::new(self.factory.store());
        panic!(
            "{message}: {} cannot be viewed as {}",
            formatter.format(ty),
            formatter.format(shape)
        );
    }
}

#[cfg(test)]
#[path = "../tests/as_super_tests.rs"]
mod tests;
