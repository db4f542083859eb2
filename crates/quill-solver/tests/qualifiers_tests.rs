use super::*;
use quill_common::interner::Interner;

fn quals(interner: &Interner, names: &[&str]) -> Vec<Qualifier> {
    names.iter().map(|n| Qualifier(interner.intern(n))).collect()
}

#[test]
fn two_level_hierarchy_orders_correctly() {
    let interner = Interner::new();
    let q = quals(&interner, &["nullable", "nonnull"]);
    let (nullable, nonnull) = (q[0], q[1]);

    let mut builder = LatticeBuilder::new();
    builder.add_hierarchy(nullable);
    builder.add_qualifier(nonnull, &[nullable]);
    let lattice = builder.build();

    assert_eq!(lattice.tops(), &[nullable]);
    assert_eq!(lattice.top_of(nonnull), nullable);
    assert_eq!(lattice.bottom_of(nullable), nonnull);

    assert!(lattice.is_subtype(nonnull, nullable));
    assert!(lattice.is_subtype(nonnull, nonnull));
    assert!(!lattice.is_subtype(nullable, nonnull));

    assert_eq!(lattice.least_upper_bound(nonnull, nullable), nullable);
    assert_eq!(lattice.greatest_lower_bound(nonnull, nullable), nonnull);
}

#[test]
fn diamond_lattice_lub_and_glb() {
    let interner = Interner::new();
    let q = quals(&interner, &["top", "left", "right", "bottom"]);
    let (top, left, right, bottom) = (q[0], q[1], q[2], q[3]);

    let mut builder = LatticeBuilder::new();
    builder.add_hierarchy(top);
    builder.add_qualifier(left, &[top]);
    builder.add_qualifier(right, &[top]);
    builder.add_qualifier(bottom, &[left, right]);
    let lattice = builder.build();

    assert_eq!(lattice.least_upper_bound(left, right), top);
    assert_eq!(lattice.greatest_lower_bound(left, right), bottom);
    assert_eq!(lattice.least_upper_bound(bottom, left), left);
    assert_eq!(lattice.bottom_of(top), bottom);
}

#[test]
#[should_panic(expected = "no unique bottom")]
fn hierarchy_without_bottom_is_rejected_at_build() {
    let interner = Interner::new();
    let q = quals(&interner, &["top", "a", "b"]);

    let mut builder = LatticeBuilder::new();
    builder.add_hierarchy(q[0]);
    builder.add_qualifier(q[1], &[q[0]]);
    builder.add_qualifier(q[2], &[q[0]]);
    builder.build();
}

#[test]
#[should_panic(expected = "different hierarchies")]
fn cross_hierarchy_comparison_is_rejected() {
    let interner = Interner::new();
    let q = quals(&interner, &["nullable", "nonnull", "tainted", "untainted"]);

    let mut builder = LatticeBuilder::new();
    builder.add_hierarchy(q[0]);
    builder.add_qualifier(q[1], &[q[0]]);
    builder.add_hierarchy(q[2]);
    builder.add_qualifier(q[3], &[q[2]]);
    let lattice = builder.build();

    lattice.is_subtype(q[1], q[2]);
}

#[test]
fn polymorphic_qualifier_is_per_hierarchy() {
    let interner = Interner::new();
    let q = quals(&interner, &["tainted", "untainted", "polytainted"]);

    let mut builder = LatticeBuilder::new();
    builder.add_hierarchy(q[0]);
    builder.add_qualifier(q[1], &[q[0]]);
    builder.set_polymorphic(q[0], q[2]);
    let lattice = builder.build();

    assert_eq!(lattice.polymorphic_qualifier(q[0]), Some(q[2]));
}

#[test]
fn qualifier_set_holds_one_entry_per_hierarchy() {
    let interner = Interner::new();
    let q = quals(&interner, &["nullable", "nonnull", "tainted", "untainted"]);
    let (nullable, nonnull, tainted, untainted) = (q[0], q[1], q[2], q[3]);

    let mut builder = LatticeBuilder::new();
    builder.add_hierarchy(nullable);
    builder.add_qualifier(nonnull, &[nullable]);
    builder.add_hierarchy(tainted);
    builder.add_qualifier(untainted, &[tainted]);
    let lattice = builder.build();

    let mut set = QualifierSet::new();
    set.insert(&lattice, nonnull);
    set.insert(&lattice, untainted);
    assert_eq!(set.len(), 2);

    // Same hierarchy: replaces rather than accumulates.
    set.insert(&lattice, nullable);
    assert_eq!(set.len(), 2);
    assert_eq!(set.in_hierarchy(&lattice, nullable), Some(nullable));
    assert_eq!(set.in_hierarchy(&lattice, tainted), Some(untainted));

    assert_eq!(set.remove_in_hierarchy(&lattice, tainted), Some(untainted));
    assert_eq!(set.in_hierarchy(&lattice, tainted), None);

    assert_eq!(
        lattice.find_in_same_hierarchy(&set, nonnull),
        Some(nullable)
    );
}

#[test]
fn insert_missing_does_not_override() {
    let interner = Interner::new();
    let q = quals(&interner, &["nullable", "nonnull", "tainted", "untainted"]);

    let mut builder = LatticeBuilder::new();
    builder.add_hierarchy(q[0]);
    builder.add_qualifier(q[1], &[q[0]]);
    builder.add_hierarchy(q[2]);
    builder.add_qualifier(q[3], &[q[2]]);
    let lattice = builder.build();

    let mut set = QualifierSet::new();
    set.insert(&lattice, q[1]);

    let other = QualifierSet::from_quals(&lattice, [q[0], q[3]]);
    set.insert_missing(&lattice, &other);
    assert_eq!(set.in_hierarchy(&lattice, q[0]), Some(q[1]));
    assert_eq!(set.in_hierarchy(&lattice, q[2]), Some(q[3]));
}
