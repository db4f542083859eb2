use super::*;
use crate::def::{ClassDef, ClassKind};
use crate::fixtures::{deep_fixture, fixture};
use crate::types::{AnnotatedType, PrimitiveKind};

#[test]
fn primary_qualifiers_decide_simple_declared_pairs() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let nonnull_string = f.string(&[f.nonnull]);
    let nullable_string = f.string(&[f.nullable]);

    assert!(checker.is_subtype(&nonnull_string, &nullable_string));
    assert!(!checker.is_subtype(&nullable_string, &nonnull_string));
}

#[test]
fn every_hierarchy_must_agree() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let sub = f.string(&[f.nonnull, f.tainted]);
    let ok = f.string(&[f.nullable, f.tainted]);
    let not_ok = f.string(&[f.nullable, f.untainted]);

    assert!(checker.is_subtype(&sub, &ok));
    // Nullness passes but tainting fails.
    assert!(!checker.is_subtype(&sub, &not_ok));
    assert!(checker.is_subtype_in_hierarchy(&sub, &not_ok, f.nullable));
    assert!(!checker.is_subtype_in_hierarchy(&sub, &not_ok, f.tainted));
}

#[test]
fn declared_subtyping_rebases_through_the_hierarchy() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let string = f.string(&[f.nonnull]);
    let list = f.declared("java.util.List", vec![string.clone()], &[f.nonnull]);
    let collection = f.declared("java.util.Collection", vec![string.clone()], &[f.nullable]);
    let array_list = f.declared("java.util.ArrayList", vec![string.clone()], &[f.nonnull]);

    assert!(checker.is_subtype(&list, &collection));
    assert!(checker.is_subtype(&array_list, &list));
    assert!(checker.is_subtype(&array_list, &collection));
}

#[test]
#[should_panic(expected = "not an erased subtype")]
fn comparing_against_an_unrelated_shape_is_fatal() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    // The caller guarantees erasure compatibility; a supertype that is
    // not actually above the subtype indicates a bug upstream.
    let string = f.string(&[f.nonnull]);
    let collection = f.declared("java.util.Collection", vec![string.clone()], &[f.nullable]);
    let list = f.declared("java.util.List", vec![string], &[f.nullable]);
    checker.is_subtype(&collection, &list);
}

#[test]
fn invariant_type_arguments_require_equal_qualifiers() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let list_nonnull = f.declared("java.util.List", vec![f.string(&[f.nonnull])], &[f.nullable]);
    let list_nullable = f.declared("java.util.List", vec![f.string(&[f.nullable])], &[f.nullable]);

    assert!(checker.is_subtype(&list_nonnull, &list_nonnull.deep_copy()));
    assert!(!checker.is_subtype(&list_nonnull, &list_nullable));
    assert!(!checker.is_subtype(&list_nullable, &list_nonnull));
}

#[test]
fn covariant_positions_accept_subtype_arguments() {
    let f = fixture();
    let factory = f.factory();

    let p = f.store.add_type_param("P", f.store.object_type());
    let source = f.store.add_class(
        ClassDef::new(f.store.intern("demo.Source"), ClassKind::Interface)
            .with_type_params(vec![p])
            .with_covariant_args(vec![0]),
    );

    let mut checker = SubtypeChecker::new(&factory);
    let of_nonnull = f.complete(
        factory.declared(source, vec![f.string(&[f.nonnull])]),
        &[f.nullable],
    );
    let of_nullable = f.complete(
        factory.declared(source, vec![f.string(&[f.nullable])]),
        &[f.nullable],
    );

    assert!(checker.is_subtype(&of_nonnull, &of_nullable));
    assert!(!checker.is_subtype(&of_nullable, &of_nonnull));
}

#[test]
fn array_components_follow_the_configured_policy() {
    let f = fixture();
    let factory = f.factory();

    let nonnull_array = f.complete(AnnotatedType::array(f.string(&[f.nonnull])), &[f.nonnull]);
    let nullable_array = f.complete(AnnotatedType::array(f.string(&[f.nullable])), &[f.nonnull]);

    let mut covariant = SubtypeChecker::new(&factory);
    assert!(covariant.is_subtype(&nonnull_array, &nullable_array));
    assert!(!covariant.is_subtype(&nullable_array, &nonnull_array));

    let mut invariant = SubtypeChecker::with_policy(
        &factory,
        SubtypePolicy::default() | SubtypePolicy::INVARIANT_ARRAY_COMPONENTS,
    );
    assert!(!invariant.is_subtype(&nonnull_array, &nullable_array));
    assert!(invariant.is_subtype(&nonnull_array, &nonnull_array.deep_copy()));
}

#[test]
fn wildcard_containment_is_bounded_both_ways() {
    let d = deep_fixture();
    let factory = d.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let wc = factory.wildcard_extends(None, d.declared("java.lang.String", vec![], &[d.mid]));
    let list_of_wc = d.complete(
        factory.declared(d.class("java.util.List"), vec![wc]),
        &[d.top],
    );

    let list_of_bottom = d.declared(
        "java.util.List",
        vec![d.declared("java.lang.String", vec![], &[d.bottom])],
        &[d.top],
    );
    let list_of_top = d.declared(
        "java.util.List",
        vec![d.declared("java.lang.String", vec![], &[d.top])],
        &[d.top],
    );

    // `? extends @mid String` contains `@bottom String` ...
    assert!(checker.is_subtype(&list_of_bottom, &list_of_wc));
    // ... but not `@top String`.
    assert!(!checker.is_subtype(&list_of_top, &list_of_wc));
}

#[test]
fn super_wildcards_check_the_lower_bound() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let wc = factory.wildcard_super(None, f.string(&[f.nonnull]));
    let list_of_wc = f.complete(
        factory.declared(f.class("java.util.List"), vec![wc]),
        &[f.nullable],
    );
    let list_of_nullable =
        f.declared("java.util.List", vec![f.string(&[f.nullable])], &[f.nullable]);
    let list_of_nonnull =
        f.declared("java.util.List", vec![f.string(&[f.nonnull])], &[f.nullable]);

    // `? super @nonnull String` contains any argument above the bound.
    assert!(checker.is_subtype(&list_of_nullable, &list_of_wc));
    assert!(checker.is_subtype(&list_of_nonnull, &list_of_wc));
}

#[test]
fn raw_types_are_accommodated_by_policy() {
    let f = fixture();
    let factory = f.factory();

    let raw_list = f.complete(factory.declared(f.class("java.util.List"), Vec::new()), &[f.nullable]);
    let list_nonnull = f.declared("java.util.List", vec![f.string(&[f.nonnull])], &[f.nullable]);

    let mut lenient = SubtypeChecker::new(&factory);
    assert!(lenient.is_subtype(&raw_list, &list_nonnull));
    assert!(lenient.is_subtype(&list_nonnull, &raw_list));

    let mut strict = SubtypeChecker::with_policy(
        &factory,
        SubtypePolicy::IGNORE_UNINFERRED_TYPE_ARGUMENTS,
    );
    // The raw side's synthesized unbounded wildcards accept anything ...
    assert!(strict.is_subtype(&list_nonnull, &raw_list));
    // ... but cannot stand in for a required concrete argument.
    assert!(!strict.is_subtype(&raw_list, &list_nonnull));
}

#[test]
fn uninferred_wildcards_are_compatible_under_the_escape_hatch() {
    let f = fixture();
    let factory = f.factory();

    let placeholder = factory.uninferred_wildcard(None);
    let string = f.string(&[f.nonnull]);

    let mut lenient = SubtypeChecker::new(&factory);
    assert!(lenient.is_subtype(&placeholder, &string));
    assert!(lenient.is_subtype(&string, &placeholder));

    let mut strict =
        SubtypeChecker::with_policy(&factory, SubtypePolicy::IGNORE_RAW_TYPE_ARGUMENTS);
    // Against an argument-less declared type only the qualifiers decide:
    // the placeholder's effective qualifier is the hierarchy top.
    assert!(!strict.is_subtype(&placeholder, &string));
    assert!(strict.is_subtype(&placeholder, &f.string(&[f.nullable])));
}

#[test]
fn boxing_and_unboxing_carry_qualifiers() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let nonnull_int = f.primitive(PrimitiveKind::Int, &[f.nonnull]);
    let nonnull_integer = f.declared("java.lang.Integer", Vec::new(), &[f.nonnull]);
    let nullable_integer = f.declared("java.lang.Integer", Vec::new(), &[f.nullable]);

    assert!(checker.is_subtype(&nonnull_int, &nonnull_integer));
    assert!(checker.is_subtype(&nonnull_integer, &nonnull_int));
    // A nullable box cannot unbox into a primitive position.
    assert!(!checker.is_subtype(&nullable_integer, &nonnull_int));

    // Boxing reaches supertypes of the box as well.
    let nonnull_number = f.declared("java.lang.Number", Vec::new(), &[f.nonnull]);
    assert!(checker.is_subtype(&nonnull_int, &nonnull_number));
}

#[test]
fn literal_narrowing_boxes_to_the_narrower_box() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let nonnull_int = f.primitive(PrimitiveKind::Int, &[f.nonnull]);
    let nonnull_short = f.declared("java.lang.Short", Vec::new(), &[f.nonnull]);
    assert!(checker.is_subtype(&nonnull_int, &nonnull_short));
}

#[test]
fn union_subtyping_requires_every_alternative() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let serializable = f.declared("java.io.Serializable", Vec::new(), &[f.nullable]);
    let both_throwable = f.complete(
        AnnotatedType::union(vec![
            f.declared("java.lang.RuntimeException", Vec::new(), &[f.nonnull]),
            f.declared("java.lang.Exception", Vec::new(), &[f.nonnull]),
        ]),
        &[],
    );
    assert!(checker.is_subtype(&both_throwable, &serializable));

    // One alternative shares no ancestry with the target interface.
    let char_sequence = f.declared("java.lang.CharSequence", Vec::new(), &[f.nullable]);
    let mixed = f.complete(
        AnnotatedType::union(vec![
            f.string(&[f.nonnull]),
            f.declared("java.lang.Exception", Vec::new(), &[f.nonnull]),
        ]),
        &[],
    );
    assert!(!checker.is_subtype(&mixed, &char_sequence));
}

#[test]
fn intersection_bounded_variables_widen_to_each_bound() {
    let f = fixture();
    let factory = f.factory();

    let upper = factory.intersection(vec![
        f.declared("java.lang.CharSequence", Vec::new(), &[f.nonnull]),
        f.declared("java.io.Serializable", Vec::new(), &[f.nullable]),
    ]);
    let x = f.store.add_type_param("X", upper.clone());
    let x_use = factory.type_var(x);

    // The derived primary of the bound is the glb of its members.
    assert_eq!(upper.qualifier_in(&f.lattice, f.nullable), Some(f.nonnull));

    let mut checker = SubtypeChecker::new(&factory);
    let char_sequence = f.declared("java.lang.CharSequence", Vec::new(), &[f.nullable]);
    let serializable = f.declared("java.io.Serializable", Vec::new(), &[f.nullable]);
    assert!(checker.is_subtype(&x_use, &char_sequence));
    assert!(checker.is_subtype(&x_use, &serializable));
}

#[test]
fn intersection_supertype_requires_every_bound() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let target = factory.intersection(vec![
        f.declared("java.lang.CharSequence", Vec::new(), &[f.nullable]),
        f.declared("java.io.Serializable", Vec::new(), &[f.nullable]),
    ]);
    assert!(checker.is_subtype(&f.string(&[f.nonnull]), &target));

    let strict_target = factory.intersection(vec![
        f.declared("java.lang.CharSequence", Vec::new(), &[f.nonnull]),
        f.declared("java.io.Serializable", Vec::new(), &[f.nullable]),
    ]);
    assert!(!checker.is_subtype(&f.string(&[f.nullable]), &strict_target));
}

#[test]
fn same_parameter_uses_compare_primaries_when_both_annotated() {
    let f = fixture();
    let factory = f.factory();
    let x = f.store.add_type_param("X", f.store.object_type());

    let mut nonnull_use = factory.type_var(x);
    nonnull_use.add_qualifier(&f.lattice, f.nonnull);
    let mut nullable_use = factory.type_var(x);
    nullable_use.add_qualifier(&f.lattice, f.nullable);
    let bare_use = factory.type_var(x);

    let mut checker = SubtypeChecker::new(&factory);
    assert!(checker.is_subtype(&nonnull_use, &nullable_use));
    assert!(!checker.is_subtype(&nullable_use, &nonnull_use));
    // Two bare uses of one parameter are the same type.
    assert!(checker.is_subtype(&bare_use, &bare_use.deep_copy()));
    // An annotated use against a bare one traverses the bounds; the bare
    // use's implicit lower bound sits at the hierarchy bottom.
    assert!(!checker.is_subtype(&nullable_use, &bare_use));
}

#[test]
fn variables_check_against_declared_bounds() {
    let f = fixture();
    let factory = f.factory();
    let x = f
        .store
        .add_type_param("X", f.complete(f.store.object_type(), &[f.nonnull]));
    let x_use = factory.type_var(x);

    let mut checker = SubtypeChecker::new(&factory);
    let nullable_object = f.declared("java.lang.Object", Vec::new(), &[f.nullable]);
    let nonnull_object = f.declared("java.lang.Object", Vec::new(), &[f.nonnull]);
    assert!(checker.is_subtype(&x_use, &nullable_object));
    assert!(checker.is_subtype(&x_use, &nonnull_object));

    // The null type flows into a variable only down at its lower bound.
    let null_bottom = factory.null_bottom();
    assert!(checker.is_subtype(&null_bottom, &x_use));
}

#[test]
fn f_bounded_parameters_terminate() {
    let f = fixture();
    let factory = f.factory();

    // X extends Comparable<X>
    let x = f.store.add_type_param("X", f.store.object_type());
    let comparable = f.store.well_known().comparable;
    let bound = factory.declared(comparable, vec![AnnotatedType::type_var_use(x)]);
    f.store.set_type_param_upper(x, bound);

    let x_use = factory.type_var(x);
    let comparable_x = f.complete(
        factory.declared(comparable, vec![AnnotatedType::type_var_use(x)]),
        &[f.nullable],
    );

    let mut checker = SubtypeChecker::new(&factory);
    assert!(checker.is_subtype(&x_use, &comparable_x));
}

#[test]
fn self_referential_wildcard_bounds_terminate() {
    let f = fixture();
    let factory = f.factory();

    // class Rec<T extends Rec<?>>
    let t = f.store.add_type_param("T", f.store.object_type());
    let rec = f.store.add_class(
        ClassDef::new(f.store.intern("demo.Rec"), ClassKind::Class)
            .with_type_params(vec![t])
            .with_superclass(f.store.object_type()),
    );
    let bound = factory.declared(rec, vec![factory.wildcard_unbounded(Some(t))]);
    f.store.set_type_param_upper(t, bound);

    let ty = f.complete(
        factory.declared(rec, vec![factory.wildcard_unbounded(Some(t))]),
        &[f.nonnull],
    );

    // Diverges without the containment history's optimistic entry.
    let mut checker = SubtypeChecker::new(&factory);
    assert!(checker.is_subtype(&ty, &ty.deep_copy()));
}

#[test]
fn null_type_sits_below_reference_types() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let null = factory.null_bottom();
    assert!(checker.is_subtype(&null, &f.string(&[f.nonnull])));
    assert!(checker.is_subtype(
        &null,
        &f.complete(AnnotatedType::array(f.string(&[f.nullable])), &[f.nullable])
    ));
    assert!(checker.is_subtype(&null, &null.deep_copy()));
}

#[test]
#[should_panic(expected = "incomparable types")]
fn illegal_kind_pairs_are_fatal() {
    let f = fixture();
    let factory = f.factory();
    let mut checker = SubtypeChecker::new(&factory);

    let int = f.primitive(PrimitiveKind::Int, &[f.nonnull]);
    let null = factory.null_bottom();
    // A primitive can never sit above the null type.
    checker.is_subtype(&int, &null);
}
