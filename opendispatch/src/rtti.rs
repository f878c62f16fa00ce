//! Type identity.
//!
//! Every participating class is known to the engine by one or more
//! [`TypeId`]s. An [`Rtti`] provider maps Rust types and live objects to
//! those identifiers:
//!
//! - [`StdRtti`] derives identifiers from [`std::any::TypeId`] and needs no
//!   coordination between units.
//! - [`StaticRtti`] uses identifiers assigned by hand, which are small and
//!   dense enough to index a vector directly.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};

/// Process-wide identifier of a class.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(u64);

impl TypeId {
    /// Wrap a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The identifier [`StdRtti`] assigns to `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_std(std::any::TypeId::of::<T>())
    }

    /// Scatter a native type id over the 64-bit space.
    pub fn from_std(id: std::any::TypeId) -> Self {
        let mut hasher = FxHasher::default();
        id.hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Identifier derived from a class name, for hierarchies described
    /// outside of Rust's type system.
    pub fn from_name(name: &str) -> Self {
        let mut hasher = FxHasher::default();
        name.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({:#x})", self.0)
    }
}

/// A type identity provider.
pub trait Rtti: Send + Sync + fmt::Debug {
    /// Identifier of a Rust type, or `None` if the provider does not know it.
    fn static_type(&self, id: std::any::TypeId) -> Option<TypeId>;

    /// Identifier of the exact dynamic type of `object`.
    fn dynamic_type(&self, object: &dyn Any) -> Option<TypeId> {
        self.static_type(Any::type_id(object))
    }
}

/// Identity derived from native runtime type information.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdRtti;

impl Rtti for StdRtti {
    #[inline]
    fn static_type(&self, id: std::any::TypeId) -> Option<TypeId> {
        Some(TypeId::from_std(id))
    }
}

/// Identity assigned by hand, one identifier per participating type.
///
/// ```
/// use opendispatch::{Rtti, StaticRtti, TypeId};
///
/// struct Cow;
/// let rtti = StaticRtti::new().assign::<Cow>(3);
/// assert_eq!(rtti.static_type(std::any::TypeId::of::<Cow>()), Some(TypeId::new(3)));
/// assert_eq!(rtti.static_type(std::any::TypeId::of::<u8>()), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticRtti {
    ids: FxHashMap<std::any::TypeId, TypeId>,
}

impl StaticRtti {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `id` to `T`, replacing any earlier assignment.
    pub fn assign<T: ?Sized + 'static>(mut self, id: u64) -> Self {
        self.ids.insert(std::any::TypeId::of::<T>(), TypeId::new(id));
        self
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Rtti for StaticRtti {
    #[inline]
    fn static_type(&self, id: std::any::TypeId) -> Option<TypeId> {
        self.ids.get(&id).copied()
    }
}

/// Access to the dynamic type of a dispatch object.
///
/// Make it a supertrait of the trait whose objects are dispatched on:
/// `trait Shape: AsAny { .. }`.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reference to a class at registration time.
///
/// Rust types are resolved through the registry's [`Rtti`] when the registry
/// is initialized, so the same registration works with either provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClassRef {
    /// A Rust type.
    Native {
        id: std::any::TypeId,
        name: &'static str,
    },
    /// An explicit identifier.
    Id(TypeId),
}

impl ClassRef {
    pub fn of<T: ?Sized + 'static>() -> Self {
        ClassRef::Native {
            id: std::any::TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub const fn id(id: TypeId) -> Self {
        ClassRef::Id(id)
    }

    /// The class without its name.
    pub(crate) fn key(&self) -> ClassKey {
        match *self {
            ClassRef::Native { id, .. } => ClassKey::Native(id),
            ClassRef::Id(id) => ClassKey::Id(id),
        }
    }

    /// Resolve to an identifier through `rtti`.
    pub fn resolve(&self, rtti: &dyn Rtti) -> Option<TypeId> {
        self.key().resolve(rtti)
    }

    /// Identifier used in diagnostics when resolution fails.
    pub fn fallback_id(&self) -> TypeId {
        self.key().fallback_id()
    }

    /// Display name; empty for bare identifiers.
    pub fn name(&self) -> &'static str {
        match *self {
            ClassRef::Native { name, .. } => name,
            ClassRef::Id(_) => "",
        }
    }
}

/// A [`ClassRef`] stripped of its type name.
///
/// Records that can outlive the unit that created them hold keys, since the
/// name of a `ClassRef` borrows static data of the binary it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ClassKey {
    Native(std::any::TypeId),
    Id(TypeId),
}

impl ClassKey {
    pub(crate) fn resolve(&self, rtti: &dyn Rtti) -> Option<TypeId> {
        match *self {
            ClassKey::Native(id) => rtti.static_type(id),
            ClassKey::Id(id) => Some(id),
        }
    }

    pub(crate) fn fallback_id(&self) -> TypeId {
        match *self {
            ClassKey::Native(id) => TypeId::from_std(id),
            ClassKey::Id(id) => id,
        }
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassRef::Native { name, .. } => f.write_str(name),
            ClassRef::Id(id) => write!(f, "{id}"),
        }
    }
}
