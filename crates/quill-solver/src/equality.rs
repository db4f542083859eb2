//! Structural equality of annotated types, scoped to one hierarchy.
//!
//! Type-argument containment compares invariant positions with equality,
//! not subtyping, so the comparer lives on [`SubtypeChecker`] and shares
//! its type-argument history. Unlike the subtype history, equality records
//! *both* polarities: a negative fact must also be remembered, or mutually
//! recursive generic arguments re-derive it forever.

use crate::subtype::SubtypeChecker;
use crate::types::{AnnotatedType, TypeKind};

impl<'a> SubtypeChecker<'a> {
    /// Whether `a` and `b` are structurally equal considering only the
    /// qualifiers of the current hierarchy.
    pub(crate) fn are_equal_in_hierarchy(&mut self, a: &AnnotatedType, b: &AnnotatedType) -> bool {
        if a == b {
            return true;
        }
        let top = self.top();
        if let Some(known) = self.arg_history.get(a, b, top) {
            return known;
        }
        // Optimistic entry so recursive arguments terminate; corrected
        // below once the structural walk returns.
        self.arg_history.add(a, b, top, true);
        let result = self.structurally_equal(a, b);
        self.arg_history.add(a, b, top, result);
        result
    }

    fn structurally_equal(&mut self, a: &AnnotatedType, b: &AnnotatedType) -> bool {
        use TypeKind as K;
        match (&a.kind, &b.kind) {
            (K::Declared(da), K::Declared(db)) => {
                if da.def != db.def || !self.primary_quals_equal(a, b) {
                    return false;
                }
                if da.was_raw || db.was_raw {
                    return true;
                }
                da.args.len() == db.args.len()
                    && da
                        .args
                        .iter()
                        .zip(db.args.iter())
                        .all(|(x, y)| self.are_equal_in_hierarchy(x, y))
            }
            (K::Array(ca), K::Array(cb)) => {
                self.primary_quals_equal(a, b) && self.are_equal_in_hierarchy(ca, cb)
            }
            (K::Primitive(pa), K::Primitive(pb)) => {
                pa == pb && self.primary_quals_equal(a, b)
            }
            (K::Null, K::Null) => self.primary_quals_equal(a, b),
            (K::TypeVar(ta), K::TypeVar(tb)) => {
                let bare = !a.has_qualifier_in(self.factory().hierarchy(), self.top())
                    && !b.has_qualifier_in(self.factory().hierarchy(), self.top());
                if ta.var == tb.var && bare && ta.upper == tb.upper && ta.lower == tb.lower {
                    return true;
                }
                // Bounds carry the node primaries once materialized, so
                // comparing bounds covers every annotation placement.
                let (ua, la) = (self.factory().upper_bound(a), self.factory().lower_bound(a));
                let (ub, lb) = (self.factory().upper_bound(b), self.factory().lower_bound(b));
                self.are_equal_in_hierarchy(&ua, &ub) && self.are_equal_in_hierarchy(&la, &lb)
            }
            (K::Wildcard(wa), K::Wildcard(wb)) => {
                let bare = !a.has_qualifier_in(self.factory().hierarchy(), self.top())
                    && !b.has_qualifier_in(self.factory().hierarchy(), self.top());
                if wa.var == wb.var
                    && bare
                    && wa.extends == wb.extends
                    && wa.super_bound == wb.super_bound
                {
                    return true;
                }
                let (ua, la) = (self.factory().upper_bound(a), self.factory().lower_bound(a));
                let (ub, lb) = (self.factory().upper_bound(b), self.factory().lower_bound(b));
                self.are_equal_in_hierarchy(&ua, &ub) && self.are_equal_in_hierarchy(&la, &lb)
            }
            (K::Intersection(ba), K::Intersection(bb)) => {
                ba.len() == bb.len()
                    && ba
                        .iter()
                        .zip(bb.iter())
                        .all(|(x, y)| self.are_equal_in_hierarchy(x, y))
            }
            (K::Union(aa), K::Union(ab)) => {
                aa.len() == ab.len()
                    && aa
                        .iter()
                        .zip(ab.iter())
                        .all(|(x, y)| self.are_equal_in_hierarchy(x, y))
            }
            _ => false,
        }
    }

    /// Equality of the primary qualifiers in the current hierarchy; two
    /// bare nodes are equal.
    fn primary_quals_equal(&self, a: &AnnotatedType, b: &AnnotatedType) -> bool {
        let h = self.factory().hierarchy();
        let top = self.top();
        a.qualifier_in(h, top) == b.qualifier_in(h, top)
    }
}

#[cfg(test)]
#[path = "../tests/equality_tests.rs"]
mod tests;
