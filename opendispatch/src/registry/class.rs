use crate::rtti::{ClassRef, TypeId};

/// A class registration.
///
/// ```
/// use opendispatch::{AsAny, Class};
///
/// trait Animal: AsAny {}
/// struct Cow;
/// impl Animal for Cow {}
///
/// let animal = Class::of::<dyn Animal>().make_abstract();
/// let cow = Class::of::<Cow>().base::<dyn Animal>();
/// assert!(animal.is_abstract());
/// assert_eq!(cow.bases().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    id: ClassRef,
    name: String,
    aliases: Vec<ClassRef>,
    bases: Vec<ClassRef>,
    is_abstract: bool,
}

impl Class {
    /// The Rust type `T`, named after its type name.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_ref(ClassRef::of::<T>())
    }

    /// A class known only by identifier.
    pub fn id(id: TypeId) -> Self {
        Self::from_ref(ClassRef::id(id))
    }

    pub fn from_ref(id: ClassRef) -> Self {
        Self {
            id,
            name: id.name().to_string(),
            aliases: Vec::new(),
            bases: Vec::new(),
            is_abstract: false,
        }
    }

    /// Override the diagnostic name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn base<B: ?Sized + 'static>(self) -> Self {
        self.base_ref(ClassRef::of::<B>())
    }

    pub fn base_id(self, id: TypeId) -> Self {
        self.base_ref(ClassRef::id(id))
    }

    pub fn base_ref(mut self, base: ClassRef) -> Self {
        self.bases.push(base);
        self
    }

    /// Another type objects of this class may be seen as.
    pub fn alias<A: ?Sized + 'static>(self) -> Self {
        self.alias_ref(ClassRef::of::<A>())
    }

    pub fn alias_id(self, id: TypeId) -> Self {
        self.alias_ref(ClassRef::id(id))
    }

    pub fn alias_ref(mut self, alias: ClassRef) -> Self {
        self.aliases.push(alias);
        self
    }

    /// No object has this exact dynamic type.
    pub fn make_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn class_ref(&self) -> ClassRef {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[ClassRef] {
        &self.aliases
    }

    pub fn bases(&self) -> &[ClassRef] {
        &self.bases
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }
}
