//! Recursion guards for the subtyping engine.
//!
//! [`VisitHistory`] memoizes facts about ordered pairs of types within one
//! qualifier hierarchy. Two instances back one engine:
//!
//! - the subtype history records *proven-true* facts only — absence means
//!   "not yet proven", never "false";
//! - the type-argument history records both polarities, because
//!   non-containment must also be remembered to terminate on mutually
//!   recursive generic arguments.
//!
//! Keys are the full content of both operands plus the hierarchy top, so
//! the tables stay correct under the defensive copying the engine does
//! (identity keying would not).
//!
//! [`DepthCounter`] is the backstop: the histories terminate all legitimate
//! recursion, so exceeding the depth limit indicates a bug, not an input.

use rustc_hash::FxHashMap;

use crate::qualifiers::Qualifier;
use crate::types::AnnotatedType;

#[derive(Default)]
pub struct VisitHistory {
    facts: FxHashMap<(AnnotatedType, AnnotatedType, Qualifier), bool>,
}

impl VisitHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded fact for `(sub, sup)` under `top`, if any.
    pub fn get(&self, sub: &AnnotatedType, sup: &AnnotatedType, top: Qualifier) -> Option<bool> {
        self.facts
            .get(&(sub.clone(), sup.clone(), top))
            .copied()
    }

    /// Whether a *true* fact is recorded for `(sub, sup)` under `top`.
    pub fn contains_true(&self, sub: &AnnotatedType, sup: &AnnotatedType, top: Qualifier) -> bool {
        self.get(sub, sup, top) == Some(true)
    }

    /// Record `result` for `(sub, sup)` under `top` (both polarities).
    pub fn add(&mut self, sub: &AnnotatedType, sup: &AnnotatedType, top: Qualifier, result: bool) {
        self.facts.insert((sub.clone(), sup.clone(), top), result);
    }

    /// Record only a positive result; negative results are forgotten so a
    /// later visit re-evaluates instead of trusting a fact that was never
    /// established.
    pub fn add_if_true(
        &mut self,
        sub: &AnnotatedType,
        sup: &AnnotatedType,
        top: Qualifier,
        result: bool,
    ) {
        if result {
            self.add(sub, sup, top, true);
        }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn clear(&mut self) {
        self.facts.clear();
    }
}

/// A lightweight depth counter for stack protection.
///
/// # Debug-mode safety
///
/// In debug builds, dropping a counter with unbalanced `enter`/`leave`
/// calls panics, as does `leave` at depth zero.
pub struct DepthCounter {
    depth: u32,
    max_depth: u32,
    exceeded: bool,
}

impl DepthCounter {
    pub fn new(max_depth: u32) -> Self {
        Self {
            depth: 0,
            max_depth,
            exceeded: false,
        }
    }

    /// Try to enter a deeper level. On `true` the caller must `leave()`
    /// when done; on `false` the limit was hit and depth is unchanged.
    #[inline]
    pub fn enter(&mut self) -> bool {
        if self.depth >= self.max_depth {
            self.exceeded = true;
            return false;
        }
        self.depth += 1;
        true
    }

    #[inline]
    pub fn leave(&mut self) {
        debug_assert!(
            self.depth > 0,
            "DepthCounter::leave() called at depth 0 (leave without a matching enter)"
        );
        self.depth = self.depth.saturating_sub(1);
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Sticky: stays `true` until `reset`.
    #[inline]
    pub fn is_exceeded(&self) -> bool {
        self.exceeded
    }

    pub fn reset(&mut self) {
        self.depth = 0;
        self.exceeded = false;
    }
}

#[cfg(debug_assertions)]
impl Drop for DepthCounter {
    fn drop(&mut self) {
        if !std::thread::panicking() && self.depth > 0 {
            panic!(
                "DepthCounter dropped at depth {} (leaked enter() calls)",
                self.depth
            );
        }
    }
}

#[cfg(test)]
#[path = "../tests/history_tests.rs"]
mod tests;
