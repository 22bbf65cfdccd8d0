//! # Field Model
//!
//! Field discovery works without runtime reflection. Every type that can sit
//! in a processed struct implements [`Field`], which tells the collector what
//! kind of value it holds:
//!
//! - [`Slot::Text`]: a `String` that can receive a resolved value
//! - [`Slot::Struct`]: a nested [`SecretStruct`] to recurse into
//! - [`Slot::Other`]: anything else, which is an error when annotated
//!
//! `Option<T>` plays the role of an optional reference. A `None` is
//! materialized with [`Field::zeroed`] only when `T` is a string or a
//! structure; for every other `T` it stays `None` and reports itself as
//! [`Slot::Other`]. Chains such as `Option<Option<String>>` follow the same
//! rule one level at a time.
//!
//! `#[derive(SecretStruct)]` implements both [`SecretStruct`] and [`Field`]
//! for a struct. Leaf types of your own can be declared with
//! [`opaque_field!`](crate::opaque_field).

use crate::Result;
use crate::collect::Fields;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A structure whose fields can be populated from variables.
///
/// Usually derived. A manual implementation hands each field to
/// [`Fields::field`] in declaration order.
pub trait SecretStruct {
    /// Walks this struct's fields, registering resolution tasks.
    fn collect_fields<'a>(&'a mut self, fields: &mut Fields<'a>) -> Result<()>;
}

/// Writable view of a field after optional references were dereferenced.
pub enum Slot<'a> {
    Text(&'a mut String),
    Struct(&'a mut dyn SecretStruct),
    Other(Cow<'static, str>),
}

/// Classification of a field type.
pub trait Field {
    /// Declared type name, used in error messages.
    fn type_name() -> Cow<'static, str>
    where
        Self: Sized;

    /// Zero value used to materialize an absent optional reference.
    ///
    /// Only string and structure kinds have one.
    fn zeroed() -> Option<Self>
    where
        Self: Sized,
    {
        None
    }

    /// Dereferences the field down to its underlying kind.
    fn slot(&mut self) -> Slot<'_>;

    /// The field as a top-level structure, if it is one.
    ///
    /// Optional references are never valid top-level inputs, even when set.
    fn as_struct(&mut self) -> Option<&mut dyn SecretStruct> {
        None
    }
}

impl Field for String {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("String")
    }

    fn zeroed() -> Option<Self> {
        Some(String::new())
    }

    fn slot(&mut self) -> Slot<'_> {
        Slot::Text(self)
    }
}

impl<T: Field> Field for Option<T> {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("Option<{}>", T::type_name()))
    }

    fn slot(&mut self) -> Slot<'_> {
        if self.is_none() {
            match T::zeroed() {
                Some(zero) => *self = Some(zero),
                None => return Slot::Other(Self::type_name()),
            }
        }
        match self {
            Some(inner) => inner.slot(),
            None => Slot::Other(Self::type_name()),
        }
    }
}

impl<T: Field> Field for Box<T> {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("Box<{}>", T::type_name()))
    }

    fn zeroed() -> Option<Self> {
        T::zeroed().map(Box::new)
    }

    fn slot(&mut self) -> Slot<'_> {
        self.as_mut().slot()
    }
}

/// Implements [`Field`] for leaf types the collector never writes to.
///
/// Unannotated fields of these types are skipped; annotated ones fail
/// collection with [`UnsupportedFieldType`](crate::SecretStructError::UnsupportedFieldType).
///
/// # Usage
///
/// ```ignore
/// struct Port(u16);
///
/// secretstruct::opaque_field!(Port);
/// ```
#[macro_export]
macro_rules! opaque_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::Field for $ty {
                fn type_name() -> ::std::borrow::Cow<'static, str> {
                    ::std::borrow::Cow::Borrowed(stringify!($ty))
                }

                fn slot(&mut self) -> $crate::Slot<'_> {
                    $crate::Slot::Other(<Self as $crate::Field>::type_name())
                }
            }
        )*
    };
}

opaque_field!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

macro_rules! opaque_collection {
    ($name:literal, $ty:ident<$($param:ident),+>) => {
        impl<$($param),+> Field for $ty<$($param),+> {
            fn type_name() -> Cow<'static, str> {
                Cow::Borrowed($name)
            }

            fn slot(&mut self) -> Slot<'_> {
                Slot::Other(Self::type_name())
            }
        }
    };
}

opaque_collection!("Vec", Vec<T>);
opaque_collection!("HashMap", HashMap<K, V>);
opaque_collection!("BTreeMap", BTreeMap<K, V>);
opaque_collection!("HashSet", HashSet<T>);
opaque_collection!("BTreeSet", BTreeSet<T>);
