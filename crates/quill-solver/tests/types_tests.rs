use super::*;
use crate::fixtures::fixture;

#[test]
fn kind_tags_match_variants() {
    let f = fixture();
    let factory = f.factory();

    assert_eq!(AnnotatedType::null().kind(), Kind::Null);
    assert_eq!(AnnotatedType::none().kind(), Kind::None);
    assert_eq!(
        AnnotatedType::primitive(PrimitiveKind::Int).kind(),
        Kind::Primitive
    );
    assert_eq!(f.string(&[]).kind(), Kind::Declared);
    assert_eq!(AnnotatedType::array(f.string(&[])).kind(), Kind::Array);
    assert_eq!(
        factory.wildcard_unbounded(None).kind(),
        Kind::Wildcard
    );
}

#[test]
fn add_qualifier_replaces_within_a_hierarchy() {
    let f = fixture();
    let mut ty = f.string(&[]);
    ty.add_qualifier(&f.lattice, f.nonnull);
    ty.add_qualifier(&f.lattice, f.nullable);
    assert_eq!(ty.qualifier_in(&f.lattice, f.nullable), Some(f.nullable));
    // The tainting hierarchy entry is unaffected.
    assert_eq!(ty.qualifier_in(&f.lattice, f.tainted), Some(f.tainted));
}

#[test]
fn qualifiers_propagate_onto_materialized_bounds() {
    let f = fixture();
    let factory = f.factory();

    let e = f.store.add_type_param("E", f.store.object_type());
    let mut use_site = factory.type_var(e);
    factory.ensure_bounds(&mut use_site);

    use_site.add_qualifier(&f.lattice, f.nonnull);

    let tv = use_site.as_type_var().expect("type variable");
    let upper = tv.upper.as_ref().expect("materialized upper bound");
    let lower = tv.lower.as_ref().expect("materialized lower bound");
    assert_eq!(upper.qualifier_in(&f.lattice, f.nullable), Some(f.nonnull));
    assert_eq!(lower.qualifier_in(&f.lattice, f.nullable), Some(f.nonnull));
}

#[test]
fn unmaterialized_bounds_are_left_alone() {
    let f = fixture();
    let factory = f.factory();

    let e = f.store.add_type_param("E", f.store.object_type());
    let mut use_site = factory.type_var(e);
    use_site.add_qualifier(&f.lattice, f.nonnull);

    let tv = use_site.as_type_var().expect("type variable");
    assert!(tv.upper.is_none());
    assert!(tv.lower.is_none());
    // The factory applies the primary when it materializes the bound.
    assert_eq!(
        factory
            .upper_bound(&use_site)
            .qualifier_in(&f.lattice, f.nullable),
        Some(f.nonnull)
    );
}

#[test]
fn deep_copy_preserves_structure_and_qualifiers() {
    let f = fixture();
    let list = f.declared(
        "java.util.List",
        vec![f.string(&[f.nonnull])],
        &[f.nullable, f.untainted],
    );
    let copy = list.deep_copy();
    assert_eq!(list, copy);

    // Mutating the copy leaves the original untouched.
    let mut copy = copy;
    copy.add_qualifier(&f.lattice, f.tainted);
    assert_ne!(list, copy);
    assert_eq!(list.qualifier_in(&f.lattice, f.tainted), Some(f.untainted));
}

#[test]
fn remove_qualifier_only_touches_its_hierarchy() {
    let f = fixture();
    let mut ty = f.string(&[f.nonnull, f.untainted]);
    assert_eq!(
        ty.remove_qualifier_in(&f.lattice, f.nullable),
        Some(f.nonnull)
    );
    assert_eq!(ty.qualifier_in(&f.lattice, f.nullable), None);
    assert_eq!(ty.qualifier_in(&f.lattice, f.tainted), Some(f.untainted));
}

#[test]
fn raw_and_uninferred_flags_are_visible() {
    let f = fixture();
    let factory = f.factory();

    let raw_list = factory.declared(f.class("java.util.List"), Vec::new());
    assert!(raw_list.was_raw());

    let placeholder = factory.uninferred_wildcard(None);
    assert!(placeholder.is_uninferred_wildcard());
    assert!(!factory.wildcard_unbounded(None).is_uninferred_wildcard());
}

#[test]
#[should_panic(expected = "at least two bounds")]
fn single_bound_intersection_is_rejected() {
    let f = fixture();
    AnnotatedType::intersection(vec![f.string(&[])]);
}
