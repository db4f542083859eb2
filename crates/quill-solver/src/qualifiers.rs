//! Qualifier identities, per-node qualifier sets, and the hierarchy seam.
//!
//! A qualifier is an interned name drawn from one of possibly several
//! independent lattices ("hierarchies"). A type node carries at most one
//! qualifier per hierarchy. The engine never looks inside a hierarchy: all
//! ordering questions go through the [`QualifierHierarchy`] trait.
//!
//! [`Lattice`] is a concrete finite-poset implementation of that trait,
//! sufficient for tests and for simple real checkers. Malformed lattice
//! definitions are detected at construction time, before the engine runs.

use indexmap::IndexMap;
use quill_common::interner::Atom;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// A qualifier identity: an interned annotation name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qualifier(pub Atom);

/// The primary qualifiers attached directly to one type node.
///
/// Holds at most one qualifier per hierarchy. Kept sorted by atom so that
/// structurally equal sets hash equally (the visit histories key on type
/// content, qualifiers included).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct QualifierSet {
    quals: SmallVec<[Qualifier; 2]>,
}

impl QualifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_quals(
        hierarchy: &dyn QualifierHierarchy,
        quals: impl IntoIterator<Item = Qualifier>,
    ) -> Self {
        let mut set = Self::new();
        for q in quals {
            set.insert(hierarchy, q);
        }
        set
    }

    pub fn iter(&self) -> impl Iterator<Item = Qualifier> + '_ {
        self.quals.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.quals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quals.is_empty()
    }

    pub fn contains(&self, q: Qualifier) -> bool {
        self.quals.contains(&q)
    }

    /// The qualifier from the hierarchy whose top is `top`, if any.
    pub fn in_hierarchy(
        &self,
        hierarchy: &dyn QualifierHierarchy,
        top: Qualifier,
    ) -> Option<Qualifier> {
        self.quals
            .iter()
            .copied()
            .find(|q| hierarchy.top_of(*q) == top)
    }

    /// Insert `q`, replacing any existing qualifier from the same hierarchy.
    pub fn insert(&mut self, hierarchy: &dyn QualifierHierarchy, q: Qualifier) {
        let top = hierarchy.top_of(q);
        self.quals.retain(|existing| hierarchy.top_of(*existing) != top);
        let at = self.quals.partition_point(|existing| *existing < q);
        self.quals.insert(at, q);
    }

    /// Remove and return the qualifier from the hierarchy topped by `top`.
    pub fn remove_in_hierarchy(
        &mut self,
        hierarchy: &dyn QualifierHierarchy,
        top: Qualifier,
    ) -> Option<Qualifier> {
        let found = self.in_hierarchy(hierarchy, top)?;
        self.quals.retain(|q| *q != found);
        Some(found)
    }

    /// Insert every qualifier of `other`, replacing same-hierarchy entries.
    pub fn insert_all(&mut self, hierarchy: &dyn QualifierHierarchy, other: &QualifierSet) {
        for q in other.iter() {
            self.insert(hierarchy, q);
        }
    }

    /// Insert the qualifiers of `other` only for hierarchies this set has no
    /// entry for.
    pub fn insert_missing(&mut self, hierarchy: &dyn QualifierHierarchy, other: &QualifierSet) {
        for q in other.iter() {
            if self.in_hierarchy(hierarchy, hierarchy.top_of(q)).is_none() {
                self.insert(hierarchy, q);
            }
        }
    }
}

/// The narrow interface the engine uses to ask ordering questions about
/// qualifiers. Implementations must satisfy lattice laws per hierarchy; the
/// engine does not re-validate them.
pub trait QualifierHierarchy {
    /// The top (root) qualifier of every supported hierarchy.
    fn tops(&self) -> &[Qualifier];

    /// The top of the hierarchy `q` belongs to.
    fn top_of(&self, q: Qualifier) -> Qualifier;

    /// The bottom of the hierarchy whose top is `top`.
    fn bottom_of(&self, top: Qualifier) -> Qualifier;

    /// Whether `sub` is below-or-equal `sup` within their (shared)
    /// hierarchy.
    fn is_subtype(&self, sub: Qualifier, sup: Qualifier) -> bool;

    fn least_upper_bound(&self, a: Qualifier, b: Qualifier) -> Qualifier;

    fn greatest_lower_bound(&self, a: Qualifier, b: Qualifier) -> Qualifier;

    /// The polymorphic qualifier of the hierarchy topped by `top`, if one
    /// was declared.
    fn polymorphic_qualifier(&self, _top: Qualifier) -> Option<Qualifier> {
        None
    }

    /// The member of `set` that belongs to the same hierarchy as
    /// `exemplar`.
    fn find_in_same_hierarchy(
        &self,
        set: &QualifierSet,
        exemplar: Qualifier,
    ) -> Option<Qualifier> {
        let top = self.top_of(exemplar);
        set.iter().find(|q| self.top_of(*q) == top)
    }
}

#[derive(Clone, Debug)]
struct QualifierInfo {
    top: Qualifier,
    /// Everything reachable going up, including the qualifier itself.
    ups: FxHashSet<Qualifier>,
    /// Everything reachable going down, including the qualifier itself.
    downs: FxHashSet<Qualifier>,
}

/// Builder for [`Lattice`]. Hierarchies are declared top-first; every other
/// qualifier names its direct supers. `build` validates the result.
#[derive(Default)]
pub struct LatticeBuilder {
    tops: Vec<Qualifier>,
    /// Declaration order matters for validation and error reporting, so
    /// this is an `IndexMap`.
    supers: IndexMap<Qualifier, Vec<Qualifier>>,
    poly: FxHashMap<Qualifier, Qualifier>,
}

impl LatticeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new hierarchy with `top` as its root.
    pub fn add_hierarchy(&mut self, top: Qualifier) -> &mut Self {
        assert!(
            !self.supers.contains_key(&top),
            "qualifier {:?} declared twice",
            top
        );
        self.tops.push(top);
        self.supers.insert(top, Vec::new());
        self
    }

    /// Declare `q` with the given direct supers (all previously declared,
    /// all in one hierarchy).
    pub fn add_qualifier(&mut self, q: Qualifier, direct_supers: &[Qualifier]) -> &mut Self {
        assert!(
            !self.supers.contains_key(&q),
            "qualifier {:?} declared twice",
            q
        );
        assert!(
            !direct_supers.is_empty(),
            "qualifier {:?} needs at least one super (tops use add_hierarchy)",
            q
        );
        for s in direct_supers {
            assert!(
                self.supers.contains_key(s),
                "super {:?} of {:?} is not declared",
                s,
                q
            );
        }
        self.supers.insert(q, direct_supers.to_vec());
        self
    }

    /// Declare the polymorphic qualifier of the hierarchy topped by `top`.
    /// The polymorphic qualifier is an identity the surrounding tool
    /// substitutes; it participates in no ordering here.
    pub fn set_polymorphic(&mut self, top: Qualifier, poly: Qualifier) -> &mut Self {
        self.poly.insert(top, poly);
        self
    }

    pub fn build(&self) -> Lattice {
        let mut info: FxHashMap<Qualifier, QualifierInfo> = FxHashMap::default();

        for &q in self.supers.keys() {
            let mut ups = FxHashSet::default();
            let mut stack = vec![q];
            while let Some(cur) = stack.pop() {
                if ups.insert(cur) {
                    stack.extend(self.supers[&cur].iter().copied());
                }
            }
            let reachable_tops: Vec<Qualifier> = self
                .tops
                .iter()
                .copied()
                .filter(|t| ups.contains(t))
                .collect();
            assert!(
                reachable_tops.len() == 1,
                "qualifier {:?} must reach exactly one hierarchy top, reaches {:?}",
                q,
                reachable_tops
            );
            info.insert(
                q,
                QualifierInfo {
                    top: reachable_tops[0],
                    ups,
                    downs: FxHashSet::default(),
                },
            );
        }

        // Invert the up-sets into down-sets.
        let pairs: Vec<(Qualifier, Qualifier)> = info
            .iter()
            .flat_map(|(&q, i)| i.ups.iter().map(move |&up| (up, q)))
            .collect();
        for (up, q) in pairs {
            info.get_mut(&up).expect("closed over declared qualifiers").downs.insert(q);
        }

        // Each hierarchy needs a unique bottom: the one qualifier below
        // every member.
        let mut bottoms = FxHashMap::default();
        for &top in &self.tops {
            let members: Vec<Qualifier> = info
                .iter()
                .filter(|(_, i)| i.top == top)
                .map(|(&q, _)| q)
                .collect();
            let bottom: Vec<Qualifier> = members
                .iter()
                .copied()
                .filter(|q| info[q].ups.len() == members.len())
                .collect();
            assert!(
                bottom.len() == 1,
                "hierarchy {:?} has no unique bottom: {:?}",
                top,
                bottom
            );
            bottoms.insert(top, bottom[0]);
        }

        Lattice {
            tops: self.tops.clone(),
            bottoms,
            poly: self.poly.clone(),
            info,
        }
    }
}

/// A finite poset implementation of [`QualifierHierarchy`], with
/// precomputed reachability. Lub/glb queries panic if the poset is not
/// actually a lattice at the queried pair.
#[derive(Clone, Debug)]
pub struct Lattice {
    tops: Vec<Qualifier>,
    bottoms: FxHashMap<Qualifier, Qualifier>,
    poly: FxHashMap<Qualifier, Qualifier>,
    info: FxHashMap<Qualifier, QualifierInfo>,
}

impl Lattice {
    fn info(&self, q: Qualifier) -> &QualifierInfo {
        self.info
            .get(&q)
            .unwrap_or_else(|| panic!("qualifier {:?} is not part of this lattice", q))
    }

    fn require_same_hierarchy(&self, a: Qualifier, b: Qualifier) -> Qualifier {
        let top = self.info(a).top;
        assert!(
            self.info(b).top == top,
            "qualifiers {:?} and {:?} are from different hierarchies",
            a,
            b
        );
        top
    }

    /// Minimal elements of `candidates` under the lattice order.
    fn minimal(&self, candidates: &FxHashSet<Qualifier>) -> Vec<Qualifier> {
        candidates
            .iter()
            .copied()
            .filter(|c| {
                !candidates
                    .iter()
                    .any(|d| d != c && self.info(*d).ups.contains(c))
            })
            .collect()
    }

    fn maximal(&self, candidates: &FxHashSet<Qualifier>) -> Vec<Qualifier> {
        candidates
            .iter()
            .copied()
            .filter(|c| {
                !candidates
                    .iter()
                    .any(|d| d != c && self.info(*d).downs.contains(c))
            })
            .collect()
    }
}

impl QualifierHierarchy for Lattice {
    fn tops(&self) -> &[Qualifier] {
        &self.tops
    }

    fn top_of(&self, q: Qualifier) -> Qualifier {
        self.info(q).top
    }

    fn bottom_of(&self, top: Qualifier) -> Qualifier {
        *self
            .bottoms
            .get(&top)
            .unwrap_or_else(|| panic!("{:?} is not a hierarchy top", top))
    }

    fn is_subtype(&self, sub: Qualifier, sup: Qualifier) -> bool {
        self.require_same_hierarchy(sub, sup);
        self.info(sub).ups.contains(&sup)
    }

    fn least_upper_bound(&self, a: Qualifier, b: Qualifier) -> Qualifier {
        self.require_same_hierarchy(a, b);
        let common: FxHashSet<Qualifier> = self
            .info(a)
            .ups
            .intersection(&self.info(b).ups)
            .copied()
            .collect();
        let minimal = self.minimal(&common);
        assert!(
            minimal.len() == 1,
            "no least upper bound of {:?} and {:?}: candidates {:?}",
            a,
            b,
            minimal
        );
        minimal[0]
    }

    fn greatest_lower_bound(&self, a: Qualifier, b: Qualifier) -> Qualifier {
        self.require_same_hierarchy(a, b);
        let common: FxHashSet<Qualifier> = self
            .info(a)
            .downs
            .intersection(&self.info(b).downs)
            .copied()
            .collect();
        let maximal = self.maximal(&common);
        assert!(
            maximal.len() == 1,
            "no greatest lower bound of {:?} and {:?}: candidates {:?}",
            a,
            b,
            maximal
        );
        maximal[0]
    }

    fn polymorphic_qualifier(&self, top: Qualifier) -> Option<Qualifier> {
        self.poly.get(&top).copied()
    }
}

#[cfg(test)]
#[path = "../tests/qualifiers_tests.rs"]
mod tests;
