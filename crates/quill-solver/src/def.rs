//! Definition identifiers and storage.
//!
//! The solver owns its own identifiers for classes (`DefId`) and type
//! parameters (`TypeVarId`) rather than referencing any front-end symbol
//! table. This keeps the engine testable without a host compiler and gives
//! the visit histories stable keys.
//!
//! [`DefStore`] is the shared, thread-safe registry behind those ids. It
//! also answers the pure structural oracle queries the engine needs from
//! the host type system: erased-subtype reachability, boxing/unboxing, and
//! the well-known types.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use quill_common::interner::{Atom, Interner};
use quill_common::limits::MAX_SUPERTYPE_WALK;
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::types::{AnnotatedType, DeclaredType, PrimitiveKind, TypeKind};

/// Solver-owned class/interface identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub u32);

impl DefId {
    /// Sentinel value for an invalid `DefId`.
    pub const INVALID: Self = Self(0);

    /// First valid `DefId`.
    pub const FIRST_VALID: u32 = 1;

    pub const fn is_valid(self) -> bool {
        self.0 >= Self::FIRST_VALID
    }
}

/// Solver-owned type-parameter identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVarId(pub u32);

/// Kind of class definition. Interfaces get the implicit root supertype
/// during supertype walks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Interface,
}

/// A class or interface definition.
///
/// Supertype shapes (`superclass`, `interfaces`) are stored as unannotated
/// [`AnnotatedType`]s over the definition's own type variables; the factory
/// substitutes actual arguments when walking supertypes of a use.
#[derive(Clone, Debug)]
pub struct ClassDef {
    pub name: Atom,
    pub kind: ClassKind,
    pub type_params: Vec<TypeVarId>,
    pub superclass: Option<AnnotatedType>,
    pub interfaces: Vec<AnnotatedType>,
    /// Type-argument positions declared covariant by an explicit variance
    /// marker on the definition.
    pub covariant_args: Vec<usize>,
}

impl ClassDef {
    pub fn new(name: Atom, kind: ClassKind) -> Self {
        Self {
            name,
            kind,
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            covariant_args: Vec::new(),
        }
    }

    pub fn with_type_params(mut self, params: Vec<TypeVarId>) -> Self {
        self.type_params = params;
        self
    }

    pub fn with_superclass(mut self, superclass: AnnotatedType) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn with_interfaces(mut self, interfaces: Vec<AnnotatedType>) -> Self {
        self.interfaces = interfaces;
        self
    }

    pub fn with_covariant_args(mut self, positions: Vec<usize>) -> Self {
        self.covariant_args = positions;
        self
    }
}

/// A type-parameter declaration: its name and declared bounds.
#[derive(Clone, Debug)]
pub struct TypeParamDef {
    pub name: Atom,
    /// Declared upper bound shape (an intersection for multiple bounds).
    pub upper: AnnotatedType,
    /// Explicit lower bound; `None` means the null type.
    pub lower: Option<AnnotatedType>,
}

/// Ids of the types the engine treats specially.
#[derive(Clone, Debug)]
pub struct WellKnown {
    pub object: DefId,
    pub string: DefId,
    pub char_sequence: DefId,
    pub cloneable: DefId,
    pub serializable: DefId,
    pub comparable: DefId,
    pub iterable: DefId,
    pub number: DefId,
    pub throwable: DefId,
    pub exception: DefId,
    pub runtime_exception: DefId,
    pub boolean: DefId,
    pub byte: DefId,
    pub short: DefId,
    pub integer: DefId,
    pub long: DefId,
    pub character: DefId,
    pub float: DefId,
    pub double: DefId,
}

impl WellKnown {
    /// The boxed class of a primitive kind.
    pub fn boxed(&self, kind: PrimitiveKind) -> DefId {
        match kind {
            PrimitiveKind::Boolean => self.boolean,
            PrimitiveKind::Byte => self.byte,
            PrimitiveKind::Short => self.short,
            PrimitiveKind::Int => self.integer,
            PrimitiveKind::Long => self.long,
            PrimitiveKind::Char => self.character,
            PrimitiveKind::Float => self.float,
            PrimitiveKind::Double => self.double,
        }
    }

    /// The primitive kind a class unboxes to, if it is a box.
    pub fn unboxed(&self, def: DefId) -> Option<PrimitiveKind> {
        [
            (self.boolean, PrimitiveKind::Boolean),
            (self.byte, PrimitiveKind::Byte),
            (self.short, PrimitiveKind::Short),
            (self.integer, PrimitiveKind::Int),
            (self.long, PrimitiveKind::Long),
            (self.character, PrimitiveKind::Char),
            (self.float, PrimitiveKind::Float),
            (self.double, PrimitiveKind::Double),
        ]
        .into_iter()
        .find(|(d, _)| *d == def)
        .map(|(_, k)| k)
    }
}

/// Thread-safe storage for class and type-parameter definitions.
///
/// `new()` bootstraps the core language types (the root object type,
/// string, the boxes, the throwable chain); `with_minimal_core()` adds a
/// small collections fixture for tests and examples.
pub struct DefStore {
    interner: Interner,
    classes: DashMap<DefId, ClassDef>,
    params: DashMap<TypeVarId, TypeParamDef>,
    by_name: DashMap<Atom, DefId>,
    next_class: AtomicU32,
    next_param: AtomicU32,
    well_known: OnceLock<WellKnown>,
}

impl Default for DefStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DefStore {
    pub fn new() -> Self {
        let store = Self {
            interner: Interner::new(),
            classes: DashMap::new(),
            params: DashMap::new(),
            by_name: DashMap::new(),
            next_class: AtomicU32::new(DefId::FIRST_VALID),
            next_param: AtomicU32::new(1),
            well_known: OnceLock::new(),
        };
        store.bootstrap_core();
        store
    }

    /// A store pre-populated with a small collections universe
    /// (`Iterable`/`Collection`/`List`/`ArrayList`) on top of the core
    /// language types.
    pub fn with_minimal_core() -> Self {
        let store = Self::new();
        let object = store.object_type();
        let wk = store.well_known().clone();

        let e = store.add_type_param("E", object.clone());
        let collection = store.add_class(
            ClassDef::new(store.intern("java.util.Collection"), ClassKind::Interface)
                .with_type_params(vec![e])
                .with_interfaces(vec![Self::shape(wk.iterable, vec![AnnotatedType::type_var_use(e)])]),
        );

        let e = store.add_type_param("E", object.clone());
        let list = store.add_class(
            ClassDef::new(store.intern("java.util.List"), ClassKind::Interface)
                .with_type_params(vec![e])
                .with_interfaces(vec![Self::shape(collection, vec![AnnotatedType::type_var_use(e)])]),
        );

        let e = store.add_type_param("E", object.clone());
        store.add_class(
            ClassDef::new(store.intern("java.util.ArrayList"), ClassKind::Class)
                .with_type_params(vec![e])
                .with_superclass(object.clone())
                .with_interfaces(vec![Self::shape(list, vec![AnnotatedType::type_var_use(e)])]),
        );

        store
    }

    fn shape(def: DefId, args: Vec<AnnotatedType>) -> AnnotatedType {
        AnnotatedType::new(TypeKind::Declared(DeclaredType {
            def,
            args,
            enclosing: None,
            was_raw: false,
        }))
    }

    fn bootstrap_core(&self) {
        let object = self.add_class(ClassDef::new(
            self.intern("java.lang.Object"),
            ClassKind::Class,
        ));
        let object_ty = Self::shape(object, vec![]);

        let iface = |name: &str| ClassDef::new(self.intern(name), ClassKind::Interface);
        let class = |name: &str| {
            ClassDef::new(self.intern(name), ClassKind::Class)
                .with_superclass(object_ty.clone())
        };

        let char_sequence = self.add_class(iface("java.lang.CharSequence"));
        let cloneable = self.add_class(iface("java.lang.Cloneable"));
        let serializable = self.add_class(iface("java.io.Serializable"));

        let t = self.add_type_param("T", object_ty.clone());
        let comparable = self.add_class(
            iface("java.lang.Comparable").with_type_params(vec![t]),
        );
        let t = self.add_type_param("T", object_ty.clone());
        let iterable = self.add_class(iface("java.lang.Iterable").with_type_params(vec![t]));

        let string = self.add_class(class("java.lang.String").with_interfaces(vec![
            Self::shape(char_sequence, vec![]),
            Self::shape(serializable, vec![]),
        ]));
        let number = self.add_class(
            class("java.lang.Number").with_interfaces(vec![Self::shape(serializable, vec![])]),
        );
        let number_ty = Self::shape(number, vec![]);

        let numeric_box = |name: &str| {
            ClassDef::new(self.intern(name), ClassKind::Class)
                .with_superclass(number_ty.clone())
                .with_interfaces(vec![Self::shape(serializable, vec![])])
        };

        let boolean = self.add_class(class("java.lang.Boolean"));
        let byte = self.add_class(numeric_box("java.lang.Byte"));
        let short = self.add_class(numeric_box("java.lang.Short"));
        let integer = self.add_class(numeric_box("java.lang.Integer"));
        let long = self.add_class(numeric_box("java.lang.Long"));
        let character = self.add_class(class("java.lang.Character"));
        let float = self.add_class(numeric_box("java.lang.Float"));
        let double = self.add_class(numeric_box("java.lang.Double"));

        let throwable = self.add_class(
            class("java.lang.Throwable").with_interfaces(vec![Self::shape(serializable, vec![])]),
        );
        let exception = self.add_class(
            ClassDef::new(self.intern("java.lang.Exception"), ClassKind::Class)
                .with_superclass(Self::shape(throwable, vec![])),
        );
        let runtime_exception = self.add_class(
            ClassDef::new(self.intern("java.lang.RuntimeException"), ClassKind::Class)
                .with_superclass(Self::shape(exception, vec![])),
        );

        self.well_known
            .set(WellKnown {
                object,
                string,
                char_sequence,
                cloneable,
                serializable,
                comparable,
                iterable,
                number,
                throwable,
                exception,
                runtime_exception,
                boolean,
                byte,
                short,
                integer,
                long,
                character,
                float,
                double,
            })
            .expect("core types bootstrapped twice");
    }

    // ── registration ──

    pub fn intern(&self, name: &str) -> Atom {
        self.interner.intern(name)
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Register a class definition and return its id.
    ///
    /// Duplicate names are a configuration error and panic.
    pub fn add_class(&self, def: ClassDef) -> DefId {
        assert!(
            !self.by_name.contains_key(&def.name),
            "class {:?} registered twice",
            self.interner.resolve(def.name)
        );
        let id = DefId(self.next_class.fetch_add(1, Ordering::SeqCst));
        trace!(def_id = id.0, name = %self.interner.resolve(def.name), "DefStore::add_class");
        self.by_name.insert(def.name, id);
        self.classes.insert(id, def);
        id
    }

    /// Register a type parameter with the given declared upper bound.
    pub fn add_type_param(&self, name: &str, upper: AnnotatedType) -> TypeVarId {
        let id = TypeVarId(self.next_param.fetch_add(1, Ordering::SeqCst));
        self.params.insert(
            id,
            TypeParamDef {
                name: self.intern(name),
                upper,
                lower: None,
            },
        );
        id
    }

    /// Register a type parameter with an explicit lower bound as well.
    pub fn add_type_param_with_lower(
        &self,
        name: &str,
        upper: AnnotatedType,
        lower: AnnotatedType,
    ) -> TypeVarId {
        let id = self.add_type_param(name, upper);
        self.params
            .get_mut(&id)
            .expect("param registered above")
            .lower = Some(lower);
        id
    }

    /// Re-point a registered type parameter's upper bound. Needed when a
    /// bound refers to the parameter itself (F-bounded declarations), which
    /// cannot be expressed in one registration step.
    pub fn set_type_param_upper(&self, id: TypeVarId, upper: AnnotatedType) {
        self.params
            .get_mut(&id)
            .unwrap_or_else(|| panic!("unknown type parameter {:?}", id))
            .upper = upper;
    }

    // ── lookup ──

    pub fn class(&self, id: DefId) -> ClassDef {
        self.classes
            .get(&id)
            .unwrap_or_else(|| panic!("unknown class {:?}", id))
            .clone()
    }

    pub fn class_id(&self, name: &str) -> Option<DefId> {
        let atom = self.interner.intern(name);
        self.by_name.get(&atom).map(|r| *r)
    }

    pub fn class_name(&self, id: DefId) -> String {
        self.interner.resolve(self.class(id).name)
    }

    pub fn param(&self, id: TypeVarId) -> TypeParamDef {
        self.params
            .get(&id)
            .unwrap_or_else(|| panic!("unknown type parameter {:?}", id))
            .clone()
    }

    pub fn well_known(&self) -> &WellKnown {
        self.well_known.get().expect("core types bootstrapped")
    }

    /// An unannotated use of the root object type.
    pub fn object_type(&self) -> AnnotatedType {
        Self::shape(self.well_known().object, vec![])
    }

    // ── structural oracles ──

    /// Whether `sub`'s erasure is a subtype of `sup`'s erasure, walking the
    /// superclass/interface graph. Interfaces implicitly reach the root
    /// object type.
    pub fn is_erased_subtype(&self, sub: DefId, sup: DefId) -> bool {
        let object = self.well_known().object;
        let mut queue = vec![sub];
        let mut seen: FxHashSet<DefId> = FxHashSet::default();
        let mut walked = 0u32;
        while let Some(cur) = queue.pop() {
            if !seen.insert(cur) {
                continue;
            }
            walked += 1;
            assert!(
                walked <= MAX_SUPERTYPE_WALK,
                "supertype graph walk exceeded {} classes; the store is corrupted",
                MAX_SUPERTYPE_WALK
            );
            if cur == sup {
                return true;
            }
            let def = self.class(cur);
            if let Some(superclass) = &def.superclass {
                queue.push(Self::shape_def(superclass));
            }
            for interface in &def.interfaces {
                queue.push(Self::shape_def(interface));
            }
            if def.kind == ClassKind::Interface {
                queue.push(object);
            }
        }
        false
    }

    fn shape_def(shape: &AnnotatedType) -> DefId {
        match &shape.kind {
            TypeKind::Declared(d) => d.def,
            _ => panic!("supertype shape is not a declared type: {:?}", shape.kind()),
        }
    }
}

#[cfg(test)]
#[path = "../tests/def_tests.rs"]
mod tests;
