//! The qualifier subtype decision procedure.
//!
//! `is_subtype(sub, sup)` holds iff, for every top qualifier of every
//! supported hierarchy, the single-hierarchy check holds. Each
//! single-hierarchy check is an exhaustive match over the ordered pair of
//! variant kinds; a pair that cannot legally occur under the host
//! language's static semantics is a fatal internal error, never `false`.
//!
//! Comparing two type variables for one hierarchy at a time matters:
//! a variable use may or may not carry a primary qualifier per hierarchy,
//! and the cases demand different treatment — both annotated compares the
//! primaries, neither annotated on the same parameter is equality by
//! construction, and everything else traverses bounds (the subtype's upper
//! bound against the supertype as a whole, and the subtype as a whole
//! against the supertype's lower bound). Two hierarchies can land in
//! different cases on the same pair of nodes, so the engine re-traverses
//! per hierarchy rather than checking all hierarchies in one pass.
//!
//! Termination on self-referential (F-bounded) generic bounds comes from
//! the visit histories: containment optimistically records its pair before
//! descending, so a recursive re-encounter short-circuits instead of
//! looping.

use bitflags::bitflags;
use tracing::trace;

use crate::as_super::AsSuperConverter;
use crate::def::ClassKind;
use crate::factory::TypeFactory;
use crate::format::TypeFormatter;
use crate::history::{DepthCounter, VisitHistory};
use crate::qualifiers::Qualifier;
use crate::types::{AnnotatedType, Kind, TypeKind};
use quill_common::limits::MAX_SUBTYPE_DEPTH;

bitflags! {
    /// Engine-wide behavior knobs, fixed at construction.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SubtypePolicy: u8 {
        /// Skip the type-argument comparison when either side is a raw
        /// (legacy) declared type.
        const IGNORE_RAW_TYPE_ARGUMENTS = 1 << 0;
        /// Require array components to be equal rather than merely
        /// subtype-related.
        const INVARIANT_ARRAY_COMPONENTS = 1 << 1;
        /// Treat wildcards standing in for failed inference as compatible
        /// with everything, to avoid cascading spurious errors.
        const IGNORE_UNINFERRED_TYPE_ARGUMENTS = 1 << 2;
    }
}

impl Default for SubtypePolicy {
    fn default() -> Self {
        Self::IGNORE_RAW_TYPE_ARGUMENTS | Self::IGNORE_UNINFERRED_TYPE_ARGUMENTS
    }
}

pub struct SubtypeChecker<'a> {
    factory: &'a TypeFactory<'a>,
    policy: SubtypePolicy,
    /// The top of the hierarchy currently being checked.
    current_top: Option<Qualifier>,
    /// Proven-true subtype facts. Absence means "not yet proven".
    pub(crate) subtype_history: VisitHistory,
    /// Type-argument containment/equality facts, both polarities.
    pub(crate) arg_history: VisitHistory,
    depth: DepthCounter,
}

impl<'a> SubtypeChecker<'a> {
    pub fn new(factory: &'a TypeFactory<'a>) -> Self {
        Self::with_policy(factory, SubtypePolicy::default())
    }

    pub fn with_policy(factory: &'a TypeFactory<'a>, policy: SubtypePolicy) -> Self {
        Self {
            factory,
            policy,
            current_top: None,
            subtype_history: VisitHistory::new(),
            arg_history: VisitHistory::new(),
            depth: DepthCounter::new(MAX_SUBTYPE_DEPTH),
        }
    }

    pub fn policy(&self) -> SubtypePolicy {
        self.policy
    }

    pub(crate) fn factory(&self) -> &'a TypeFactory<'a> {
        self.factory
    }

    /// Whether `sub <: sup` for every top of every supported hierarchy.
    pub fn is_subtype(&mut self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        let tops: Vec<Qualifier> = self.factory.hierarchy().tops().to_vec();
        for top in tops {
            if !self.is_subtype_in_hierarchy(sub, sup, top) {
                return false;
            }
        }
        true
    }

    /// Whether `sub <: sup` in the hierarchy whose top is `top`. A
    /// top-level entry point: histories are fresh per call.
    pub fn is_subtype_in_hierarchy(
        &mut self,
        sub: &AnnotatedType,
        sup: &AnnotatedType,
        top: Qualifier,
    ) -> bool {
        trace!(top = ?top, "is_subtype_in_hierarchy");
        self.subtype_history.clear();
        self.arg_history.clear();
        self.depth.reset();
        self.current_top = Some(top);
        let result = self.visit(sub, sup);
        self.current_top = None;
        result
    }

    pub(crate) fn top(&self) -> Qualifier {
        self.current_top
            .expect("subtype visit outside a hierarchy pass")
    }

    // ── dispatch ──

    pub(crate) fn visit(&mut self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        if !self.depth.enter() {
            self.fatal("subtype recursion exceeded the depth limit", sub, sup);
        }
        let result = self.dispatch(sub, sup);
        self.depth.leave();
        result
    }

    fn dispatch(&mut self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        use TypeKind as K;
        match (&sub.kind, &sup.kind) {
            // ── array as subtype ──
            (K::Array(sub_comp), K::Array(sup_comp)) => {
                self.is_primary_subtype(sub, sup)
                    && if self.policy.contains(SubtypePolicy::INVARIANT_ARRAY_COMPONENTS) {
                        self.are_equal_in_hierarchy(sub_comp, sup_comp)
                    } else {
                        self.visit(sub_comp, sup_comp)
                    }
            }
            (K::Array(_), K::Declared(_)) => self.is_primary_subtype(sub, sup),
            (K::Array(_), K::Null) => self.is_primary_subtype(sub, sup),
            (K::Array(_), K::Intersection(_)) => {
                let converted = self.cast_as_super(sub, sup);
                self.visit(&converted, sup)
            }
            (K::Array(_), K::Wildcard(_)) => self.visit_wildcard_supertype(sub, sup),

            // ── declared as subtype ──
            (K::Declared(_), K::Array(_)) => self.is_primary_subtype(sub, sup),
            (K::Declared(_), K::Declared(_)) => self.visit_declared_declared(sub, sup),
            (K::Declared(_), K::Intersection(bounds)) => {
                self.visit_intersection_supertype(sub, sup, bounds)
            }
            (K::Declared(_), K::Null) => self.is_primary_subtype(sub, sup),
            (K::Declared(_), K::Primitive(_)) => {
                // Unboxing first: the box's qualifiers travel to the
                // primitive.
                match self.factory.unboxed(sub) {
                    Some(unboxed) => self.is_primary_subtype(&unboxed, sup),
                    None => self.is_primary_subtype(sub, sup),
                }
            }
            (K::Declared(_), K::TypeVar(_)) => self.visit_typevar_supertype(sub, sup),
            (K::Declared(_), K::Union(alternatives)) => alternatives.iter().any(|alternative| {
                self.factory.is_erased_subtype(sub, alternative) && self.visit(sub, alternative)
            }),
            (K::Declared(_), K::Wildcard(_)) => self.visit_wildcard_supertype(sub, sup),

            // ── intersection as subtype ──
            (K::Intersection(bounds), K::Declared(_)) => bounds.iter().any(|bound| {
                self.factory.is_erased_subtype(bound, sup) && self.visit(bound, sup)
            }),
            (K::Intersection(bounds), K::Primitive(_)) => bounds
                .iter()
                .any(|bound| self.factory.unboxed(bound).is_some() && self.visit(bound, sup)),
            (K::Intersection(sub_bounds), K::Intersection(sup_bounds)) => {
                for sub_bound in sub_bounds {
                    for sup_bound in sup_bounds {
                        if self.factory.is_erased_subtype(sub_bound, sup_bound)
                            && !self.visit(sub_bound, sup_bound)
                        {
                            return false;
                        }
                    }
                }
                true
            }
            (K::Intersection(bounds), K::Null) => {
                // Occurs comparing bounds after capture-like conversion.
                bounds.iter().any(|bound| self.is_primary_subtype(bound, sup))
            }
            (K::Intersection(bounds), K::TypeVar(_)) => bounds.iter().any(|bound| {
                self.factory.is_erased_subtype(bound, sup) && self.visit(bound, sup)
            }),

            // ── null as subtype ──
            (K::Null, K::Array(_)) => self.is_primary_subtype(sub, sup),
            (K::Null, K::Declared(_)) => self.is_primary_subtype(sub, sup),
            (K::Null, K::TypeVar(_)) => self.visit_typevar_supertype(sub, sup),
            (K::Null, K::Wildcard(_)) => self.visit_wildcard_supertype(sub, sup),
            // Type-variable lower bounds are usually null types, so
            // null-null comes up comparing them.
            (K::Null, K::Null) => self.is_primary_subtype(sub, sup),
            (K::Null, K::Union(alternatives)) => alternatives
                .iter()
                .any(|alternative| self.visit(sub, alternative)),
            (K::Null, K::Intersection(_)) => self.is_primary_subtype(sub, sup),
            (K::Null, K::Primitive(_)) => self.is_primary_subtype(sub, sup),

            // ── primitive as subtype ──
            (K::Primitive(_), K::Declared(_)) => {
                // Boxing, possibly after an implicit literal narrowing.
                let converted = self.cast_as_super(sub, sup);
                self.is_primary_subtype(&converted, sup)
            }
            (K::Primitive(_), K::Primitive(_)) => self.is_primary_subtype(sub, sup),
            (K::Primitive(_), K::Intersection(bounds)) => {
                self.visit_intersection_supertype(sub, sup, bounds)
            }
            (K::Primitive(_), K::TypeVar(_)) => {
                let upper = self.factory.upper_bound(sup);
                self.visit(sub, &upper)
            }
            (K::Primitive(_), K::Wildcard(_)) => {
                if self.ignored_uninferred(sup) {
                    return true;
                }
                // Occurs passing a primitive to a method on a raw type, or
                // because boxing/capture has not been applied.
                let lower = self.factory.lower_bound(sup);
                self.is_primary_subtype(sub, &lower)
            }

            // ── union as subtype ──
            (K::Union(alternatives), K::Declared(_)) => alternatives.iter().all(|alternative| {
                // An alternative sharing no ancestry with the supertype is
                // an ordinary mismatch, not a conversion precondition.
                self.factory.is_erased_subtype(alternative, sup) && self.visit(alternative, sup)
            }),
            (K::Union(alternatives), K::Intersection(_) | K::Union(_)) => alternatives
                .iter()
                .all(|alternative| self.visit(alternative, sup)),
            (K::Union(_), K::Wildcard(_)) => self.visit_wildcard_supertype(sub, sup),

            // ── type variable as subtype ──
            (K::TypeVar(_), K::Declared(_)) => self.visit_typevar_subtype(sub, sup),
            (K::TypeVar(_), K::Intersection(bounds)) => {
                self.visit_intersection_supertype(sub, sup, bounds)
            }
            (K::TypeVar(_), K::Primitive(_)) => self.visit_typevar_subtype(sub, sup),
            (K::TypeVar(_), K::TypeVar(_)) => self.visit_typevar_typevar(sub, sup),
            (K::TypeVar(_), K::Null) => self.visit_typevar_subtype(sub, sup),
            (K::TypeVar(_), K::Wildcard(_)) => self.visit_wildcard_supertype(sub, sup),

            // ── wildcard as subtype ──
            (K::Wildcard(_), K::Array(_)) => self.visit_wildcard_subtype(sub, sup),
            (K::Wildcard(wc), K::Declared(sup_d)) => {
                if wc.uninferred {
                    if self.policy.contains(SubtypePolicy::IGNORE_UNINFERRED_TYPE_ARGUMENTS) {
                        return true;
                    }
                    if sup_d.args.is_empty() {
                        // The underlying types of an uninferred placeholder
                        // may not be in the right relationship, but against
                        // an argument-less declared type the qualifier
                        // comparison alone is decisive.
                        let top = self.top();
                        let sub_q = self.factory.effective_qualifier(sub, top);
                        let sup_q = sup.qualifier_in(self.factory.hierarchy(), top);
                        return match (sub_q, sup_q) {
                            (Some(a), Some(b)) => self.factory.hierarchy().is_subtype(a, b),
                            _ => self.missing_primary(sub, sup),
                        };
                    }
                }
                self.visit_wildcard_subtype(sub, sup)
            }
            (K::Wildcard(_), K::Intersection(_)) => self.visit_wildcard_subtype(sub, sup),
            (K::Wildcard(wc), K::Primitive(_)) => {
                if wc.uninferred {
                    let top = self.top();
                    let sub_q = self.factory.effective_qualifier(sub, top);
                    let sup_q = sup.qualifier_in(self.factory.hierarchy(), top);
                    return match (sub_q, sup_q) {
                        (Some(a), Some(b)) => self.factory.hierarchy().is_subtype(a, b),
                        _ => self.missing_primary(sub, sup),
                    };
                }
                self.visit_wildcard_subtype(sub, sup)
            }
            (K::Wildcard(_), K::TypeVar(_)) => self.visit_wildcard_subtype(sub, sup),
            (K::Wildcard(_), K::Wildcard(_)) => self.visit_wildcard_subtype(sub, sup),

            _ => self.fatal("incomparable types", sub, sup),
        }
    }

    // ── shared rule bodies ──

    fn visit_declared_declared(&mut self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        let sub_as_super = self.cast_as_super(sub, sup);
        if !self.is_primary_subtype(&sub_as_super, sup) {
            return false;
        }
        let top = self.top();
        if self.subtype_history.contains_true(&sub_as_super, sup, top) {
            return true;
        }
        let result = self.visit_type_args(&sub_as_super, sup, sub.was_raw(), sup.was_raw());
        self.subtype_history.add_if_true(&sub_as_super, sup, top, result);
        result
    }

    /// Compare type arguments pairwise under containment.
    fn visit_type_args(
        &mut self,
        sub: &AnnotatedType,
        sup: &AnnotatedType,
        sub_raw: bool,
        sup_raw: bool,
    ) -> bool {
        if self.policy.contains(SubtypePolicy::IGNORE_RAW_TYPE_ARGUMENTS) && (sub_raw || sup_raw) {
            return true;
        }

        let (Some(sub_d), Some(sup_d)) = (sub.as_declared(), sup.as_declared()) else {
            self.fatal("type-argument comparison on non-declared types", sub, sup)
        };
        if sub_d.args.len() != sup_d.args.len() {
            return false;
        }
        if sub_d.args.is_empty() {
            return true;
        }

        let covariant_args = self.factory.store().class(sup_d.def).covariant_args;
        for (i, (sub_arg, sup_arg)) in sub_d.args.iter().zip(sup_d.args.iter()).enumerate() {
            if !self.is_contained_by(sub_arg, sup_arg, covariant_args.contains(&i)) {
                return false;
            }
        }
        true
    }

    /// JLS-style containment of one type argument by another, extended to
    /// qualifiers. `inside` is the subtype's argument, `outside` the
    /// supertype's.
    fn is_contained_by(
        &mut self,
        inside: &AnnotatedType,
        outside: &AnnotatedType,
        can_be_covariant: bool,
    ) -> bool {
        if self.ignored_uninferred(inside) || self.ignored_uninferred(outside) {
            return true;
        }

        if outside.kind() == Kind::Wildcard {
            let top = self.top();
            if self.arg_history.contains_true(inside, outside, top) {
                return true;
            }
            // Record the pair optimistically before descending; this is
            // what terminates F-bounded recursion.
            self.arg_history.add(inside, outside, top, true);

            let mut outside_upper = self.factory.upper_bound(outside);
            while outside_upper.kind() == Kind::Wildcard {
                if self.ignored_uninferred(&outside_upper) {
                    return true;
                }
                outside_upper = self.factory.upper_bound(&outside_upper);
            }

            let casted_inside = self.cast_as_super(inside, &outside_upper);
            if !self.check_and_subtype(&casted_inside, &outside_upper) {
                self.arg_history.add(inside, outside, top, false);
                return false;
            }

            let outside_lower = self.factory.lower_bound(outside);
            if outside_lower.kind() == Kind::TypeVar {
                // A capture-like lower bound; the variable's own bounds
                // already constrained the upper comparison.
                return true;
            }
            let result = can_be_covariant || self.check_and_subtype(&outside_lower, inside);
            self.arg_history.add(inside, outside, top, result);
            result
        } else if can_be_covariant {
            self.visit(inside, outside)
        } else {
            self.are_equal_in_hierarchy(inside, outside)
        }
    }

    /// History-guarded subtype check.
    pub(crate) fn check_and_subtype(&mut self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        let top = self.top();
        if self.subtype_history.contains_true(sub, sup, top) {
            return true;
        }
        let result = self.visit(sub, sup);
        self.subtype_history.add_if_true(sub, sup, top, result);
        result
    }

    /// An intersection is a supertype iff every bound is.
    fn visit_intersection_supertype(
        &mut self,
        sub: &AnnotatedType,
        sup: &AnnotatedType,
        bounds: &[AnnotatedType],
    ) -> bool {
        let top = self.top();
        if self.subtype_history.contains_true(sub, sup, top) {
            return true;
        }
        let result = bounds.iter().all(|bound| self.visit(sub, bound));
        self.subtype_history.add_if_true(sub, sup, top, result);
        result
    }

    /// A type variable is a supertype iff its lower bound is above the
    /// subtype.
    fn visit_typevar_supertype(&mut self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        let lower = self.factory.lower_bound(sup);
        self.check_and_subtype(sub, &lower)
    }

    /// A type variable is a subtype iff its upper bound is below the
    /// supertype. Together with `visit_typevar_supertype` this checks the
    /// subtype's upper bound against the supertype's lower bound.
    fn visit_typevar_subtype(&mut self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        let mut upper = self.factory.upper_bound(sub);
        if sup.kind() == Kind::Primitive {
            if let Some(unboxed) = self.factory.unboxed(&upper) {
                upper = unboxed;
            }
        }
        if let Some(sup_d) = sup.as_declared() {
            if self.factory.store().class(sup_d.def).kind == ClassKind::Interface {
                // The actual argument could implement the interface while
                // the variable's bound does not; only the qualifiers are
                // decisive here.
                while matches!(upper.kind(), Kind::TypeVar | Kind::Wildcard) {
                    upper = self.factory.upper_bound(&upper);
                }
                if let TypeKind::Intersection(bounds) = &upper.kind {
                    return bounds.iter().any(|bound| {
                        self.factory.is_erased_subtype(bound, sup)
                            && self.is_primary_subtype(bound, sup)
                    });
                }
                return self.is_primary_subtype(&upper, sup);
            }
        }
        self.check_and_subtype(&upper, sup)
    }

    fn visit_typevar_typevar(&mut self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        if self.factory.same_type_parameter(sub, sup) {
            let h = self.factory.hierarchy();
            let top = self.top();
            let sub_has = sub.has_qualifier_in(h, top);
            let sup_has = sup.has_qualifier_in(h, top);

            if sub_has && sup_has {
                // Same bounds; the primaries decide.
                return self.is_primary_subtype_or_empty(sub, sup);
            }
            if !sub_has && !sup_has && self.are_equal_in_hierarchy(sub, sup) {
                // Two unannotated uses of one type parameter are the same
                // type.
                return true;
            }
            let upper = self.factory.upper_bound(sub);
            if upper.kind() == Kind::Intersection {
                // An intersection-bounded parameter where exactly one use
                // carries a qualifier.
                let lower = self.factory.lower_bound(sup);
                return self.visit(&upper, &lower);
            }
        }
        self.visit_typevar_subtype(sub, sup)
    }

    /// A wildcard supertype compares against its super (lower) bound.
    fn visit_wildcard_supertype(&mut self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        if sup.is_uninferred_wildcard() {
            // The underlying types need not be related; the policy decides.
            return self
                .policy
                .contains(SubtypePolicy::IGNORE_UNINFERRED_TYPE_ARGUMENTS);
        }
        let lower = self.factory.lower_bound(sup);
        self.visit(sub, &lower)
    }

    /// A wildcard subtype compares against its extends (upper) bound.
    fn visit_wildcard_subtype(&mut self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        if sub.is_uninferred_wildcard() {
            return self
                .policy
                .contains(SubtypePolicy::IGNORE_UNINFERRED_TYPE_ARGUMENTS);
        }
        if sup.kind() == Kind::Wildcard {
            // A declaration-site variable substituted with a wildcard at a
            // call site lands here.
            let h = self.factory.hierarchy();
            let top = self.top();
            let sub_has = sub.has_qualifier_in(h, top);
            let sup_has = sup.has_qualifier_in(h, top);
            if sub_has && sup_has {
                return self.is_primary_subtype_or_empty(sub, sup);
            }
            if !sub_has && !sup_has && self.are_equal_in_hierarchy(sub, sup) {
                return true;
            }
        }
        let upper = self.factory.upper_bound(sub);
        self.visit(&upper, sup)
    }

    // ── primary comparisons ──

    /// Compare the primary qualifiers of `sub` and `sup` in the current
    /// hierarchy. Both must carry one; a missing primary here is an
    /// invariant violation.
    pub(crate) fn is_primary_subtype(&self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        let h = self.factory.hierarchy();
        let top = self.top();
        match (sub.qualifier_in(h, top), sup.qualifier_in(h, top)) {
            (Some(a), Some(b)) => h.is_subtype(a, b),
            _ => self.missing_primary(sub, sup),
        }
    }

    /// As `is_primary_subtype`, but two bare nodes compare equal (used
    /// where both sides are uses of one parameter or wildcard).
    fn is_primary_subtype_or_empty(&self, sub: &AnnotatedType, sup: &AnnotatedType) -> bool {
        let h = self.factory.hierarchy();
        let top = self.top();
        match (sub.qualifier_in(h, top), sup.qualifier_in(h, top)) {
            (None, None) => true,
            (Some(a), Some(b)) => h.is_subtype(a, b),
            _ => self.missing_primary(sub, sup),
        }
    }

    // ── conversions ──

    /// View `sub` through `sup`'s shape. The null type converts to any
    /// shape by carrying its qualifiers onto a copy.
    pub(crate) fn cast_as_super(&mut self, sub: &AnnotatedType, sup: &AnnotatedType) -> AnnotatedType {
        if sub.kind() == Kind::Null {
            let mut copy = sup.deep_copy();
            copy.replace_qualifiers(self.factory.hierarchy(), &sub.quals);
            return copy;
        }
        AsSuperConverter::new(self.factory).as_super(sub, sup)
    }

    // ── infrastructure ──

    fn ignored_uninferred(&self, ty: &AnnotatedType) -> bool {
        self.policy
            .contains(SubtypePolicy::IGNORE_UNINFERRED_TYPE_ARGUMENTS)
            && ty.is_uninferred_wildcard()
    }

    fn missing_primary(&self, sub: &AnnotatedType, sup: &AnnotatedType) -> ! {
        self.fatal("missing primary qualifier", sub, sup)
    }

    fn fatal(&self, message: &str, sub: &AnnotatedType, sup: &AnnotatedType) -> ! {
        let formatter = TypeFormatter::new(self.factory.store());
        panic!(
            "{message}: {} and {} (hierarchy {:?})",
            formatter.format(sub),
            formatter.format(sup),
            self.current_top
        );
    }
}

#[cfg(test)]
#[path = "../tests/subtype_tests.rs"]
mod tests;
