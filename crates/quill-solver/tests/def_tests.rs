use super::*;
use crate::types::{AnnotatedType, PrimitiveKind};

#[test]
fn minimal_core_defines_the_collections_chain() {
    let store = DefStore::with_minimal_core();
    for name in [
        "java.lang.Object",
        "java.lang.String",
        "java.lang.Iterable",
        "java.util.Collection",
        "java.util.List",
        "java.util.ArrayList",
    ] {
        assert!(store.class_id(name).is_some(), "{name} should be defined");
    }
}

#[test]
fn erased_subtyping_walks_superclasses_and_interfaces() {
    let store = DefStore::with_minimal_core();
    let wk = store.well_known().clone();
    let list = store.class_id("java.util.List").expect("List exists");
    let array_list = store.class_id("java.util.ArrayList").expect("ArrayList exists");

    assert!(store.is_erased_subtype(array_list, list));
    assert!(store.is_erased_subtype(array_list, wk.iterable));
    assert!(store.is_erased_subtype(array_list, wk.object));
    assert!(!store.is_erased_subtype(list, array_list));

    assert!(store.is_erased_subtype(wk.string, wk.char_sequence));
    assert!(store.is_erased_subtype(wk.integer, wk.number));
    assert!(store.is_erased_subtype(wk.runtime_exception, wk.throwable));
}

#[test]
fn interfaces_implicitly_reach_the_root_type() {
    let store = DefStore::new();
    let wk = store.well_known().clone();
    assert!(store.is_erased_subtype(wk.cloneable, wk.object));
    assert!(store.is_erased_subtype(wk.comparable, wk.object));
}

#[test]
fn boxing_tables_round_trip() {
    let store = DefStore::new();
    let wk = store.well_known().clone();
    for kind in [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Char,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ] {
        assert_eq!(wk.unboxed(wk.boxed(kind)), Some(kind));
    }
    assert_eq!(wk.unboxed(wk.string), None);
}

#[test]
fn narrowing_is_integral_and_downward_only() {
    use PrimitiveKind::*;
    assert!(Int.can_narrow_to(Byte));
    assert!(Int.can_narrow_to(Short));
    assert!(Int.can_narrow_to(Char));
    assert!(Long.can_narrow_to(Int));
    assert!(Char.can_narrow_to(Byte));
    assert!(!Byte.can_narrow_to(Int));
    assert!(!Int.can_narrow_to(Int));
    assert!(!Double.can_narrow_to(Int));
    assert!(!Int.can_narrow_to(Boolean));
}

#[test]
fn registration_assigns_fresh_valid_ids() {
    let store = DefStore::new();
    let object = store.object_type();
    let id = store.add_class(
        ClassDef::new(store.intern("demo.Widget"), ClassKind::Class).with_superclass(object),
    );
    assert!(id.is_valid());
    assert_eq!(store.class_id("demo.Widget"), Some(id));
    assert_eq!(store.class_name(id), "demo.Widget");
}

#[test]
#[should_panic(expected = "registered twice")]
fn duplicate_class_names_are_a_configuration_error() {
    let store = DefStore::new();
    let def = ClassDef::new(store.intern("demo.Widget"), ClassKind::Class);
    store.add_class(def.clone());
    store.add_class(def);
}

#[test]
fn type_params_carry_their_declared_bounds() {
    let store = DefStore::new();
    let object = store.object_type();
    let t = store.add_type_param("T", object.clone());
    let param = store.param(t);
    assert_eq!(store.interner().resolve(param.name), "T");
    assert_eq!(param.upper, object);
    assert!(param.lower.is_none());

    let u = store.add_type_param_with_lower("U", object.clone(), AnnotatedType::null());
    assert_eq!(store.param(u).lower, Some(AnnotatedType::null()));
}
