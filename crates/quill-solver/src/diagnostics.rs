//! Structured failure reasons for failed subtype checks.
//!
//! `is_subtype` returning `false` is the normal signal of a type mismatch;
//! the surrounding tool then formats a user-facing message. This module is
//! the slow path behind that message: it re-runs the failing check and
//! classifies *where* it failed, so the caller does not have to re-derive
//! the position from scratch.

use crate::qualifiers::Qualifier;
use crate::subtype::SubtypeChecker;
use crate::types::{AnnotatedType, TypeKind};

/// Why a subtype check failed, anchored at the outermost failing position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubtypeFailureReason {
    /// The primary qualifiers are not related in the hierarchy topped by
    /// `top`.
    PrimaryQualifier {
        top: Qualifier,
        sub: AnnotatedType,
        sup: AnnotatedType,
    },
    /// Array component types are incompatible.
    ArrayComponent { top: Qualifier },
    /// The type argument at `index` is not contained by the supertype's.
    TypeArgument { top: Qualifier, index: usize },
    /// The union alternative at `index` is not a subtype.
    UnionAlternative { top: Qualifier, index: usize },
    /// No bound of the intersection supertype admits the subtype.
    IntersectionBound { top: Qualifier, index: usize },
    /// The check failed in the hierarchy topped by `top` without a more
    /// specific position.
    Hierarchy { top: Qualifier },
}

impl<'a> SubtypeChecker<'a> {
    /// Explain why `sub` is not a subtype of `sup`.
    ///
    /// Returns `None` iff the check actually holds. Called only on the
    /// error path, so the re-run cost does not matter.
    pub fn explain_failure(
        &mut self,
        sub: &AnnotatedType,
        sup: &AnnotatedType,
    ) -> Option<SubtypeFailureReason> {
        let tops: Vec<Qualifier> = self.factory().hierarchy().tops().to_vec();
        for top in tops {
            if self.is_subtype_in_hierarchy(sub, sup, top) {
                continue;
            }
            return Some(self.classify_failure(sub, sup, top));
        }
        None
    }

    fn classify_failure(
        &mut self,
        sub: &AnnotatedType,
        sup: &AnnotatedType,
        top: Qualifier,
    ) -> SubtypeFailureReason {
        let h = self.factory().hierarchy();

        // Composite positions first: their derived primaries would
        // otherwise mask the failing member.
        if let TypeKind::Union(alternatives) = &sub.kind {
            for (index, alternative) in alternatives.iter().enumerate() {
                let erased_ok = match &sup.kind {
                    TypeKind::Declared(_) => self.factory().is_erased_subtype(alternative, sup),
                    _ => true,
                };
                if !erased_ok || !self.is_subtype_in_hierarchy(alternative, sup, top) {
                    return SubtypeFailureReason::UnionAlternative { top, index };
                }
            }
            return SubtypeFailureReason::Hierarchy { top };
        }
        if let TypeKind::Intersection(bounds) = &sup.kind {
            for (index, bound) in bounds.iter().enumerate() {
                if !self.is_subtype_in_hierarchy(sub, bound, top) {
                    return SubtypeFailureReason::IntersectionBound { top, index };
                }
            }
            return SubtypeFailureReason::Hierarchy { top };
        }

        // A primary-qualifier mismatch outranks the remaining structural
        // causes.
        if let (Some(sub_q), Some(sup_q)) = (
            self.factory().effective_qualifier(sub, top),
            self.factory().effective_qualifier(sup, top),
        ) {
            if !h.is_subtype(sub_q, sup_q) {
                return SubtypeFailureReason::PrimaryQualifier {
                    top,
                    sub: sub.deep_copy(),
                    sup: sup.deep_copy(),
                };
            }
        }

        match (&sub.kind, &sup.kind) {
            (TypeKind::Array(_), TypeKind::Array(_)) => SubtypeFailureReason::ArrayComponent { top },
            (TypeKind::Declared(_), TypeKind::Declared(sup_d)) => {
                let converted = self.cast_as_super(sub, sup);
                if let (Some(conv_d), false) = (converted.as_declared(), sup_d.args.is_empty()) {
                    for index in 0..conv_d.args.len().min(sup_d.args.len()) {
                        let mut probe = converted.deep_copy();
                        if let TypeKind::Declared(probe_d) = &mut probe.kind {
                            // Make every other argument agree, leaving only
                            // `index` to answer for the failure.
                            for (i, arg) in probe_d.args.iter_mut().enumerate() {
                                if i != index {
                                    *arg = sup_d.args[i].deep_copy();
                                }
                            }
                        }
                        if !self.is_subtype_in_hierarchy(&probe, sup, top) {
                            return SubtypeFailureReason::TypeArgument { top, index };
                        }
                    }
                }
                SubtypeFailureReason::Hierarchy { top }
            }
            _ => SubtypeFailureReason::Hierarchy { top },
        }
    }
}

#[cfg(test)]
#[path = "../tests/diagnostics_tests.rs"]
mod tests;
