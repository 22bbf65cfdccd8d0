//! Field collection: turns an annotated struct into a flat list of
//! resolution tasks.

use crate::field::{Field, SecretStruct, Slot};
use crate::{Result, SecretStructError};

/// Annotation key used by `#[derive(SecretStruct)]`.
pub const TAG_NAME: &str = "secretstruct";

/// Annotation value that makes the field's current content its locator.
pub const SELF_TAG_VALUE: &str = "self";

/// Annotation value that excludes a field and its substructure.
pub const STOP_TAG_VALUE: &str = "-";

/// One field waiting for its value.
///
/// Holds an exclusive borrow of the target `String`, so every task writes to
/// a distinct location and is consumed exactly once.
#[derive(Debug)]
pub struct Task<'a> {
    /// Field identifier, used in error messages.
    pub name: &'static str,
    /// Locator of the variable providing the value.
    pub locator: String,
    target: &'a mut String,
}

impl Task<'_> {
    /// Current content of the target field.
    pub fn current(&self) -> &str {
        self.target
    }

    /// Overwrites the target field, consuming the task.
    pub fn set(self, value: String) {
        *self.target = value;
    }
}

/// Accumulates tasks while a [`SecretStruct`] walks its fields.
#[derive(Debug, Default)]
pub struct Fields<'a> {
    tasks: Vec<Task<'a>>,
}

impl<'a> Fields<'a> {
    /// Registers one declared field.
    ///
    /// `annotation` is `None` when the field carries no `secretstruct`
    /// attribute. Structures are recursed into whatever the annotation,
    /// except for the stop marker, which skips the field entirely.
    pub fn field<F: Field>(
        &mut self,
        name: &'static str,
        annotation: Option<&str>,
        value: &'a mut F,
    ) -> Result<()> {
        if annotation == Some(STOP_TAG_VALUE) {
            tracing::debug!(field = name, "field ignored");
            return Ok(());
        }

        match value.slot() {
            Slot::Struct(inner) => inner.collect_fields(self),
            Slot::Text(target) => {
                let Some(annotation) = annotation else {
                    return Ok(());
                };
                let locator = if annotation == SELF_TAG_VALUE {
                    target.clone()
                } else {
                    annotation.to_string()
                };
                tracing::debug!(field = name, "field collected");
                self.tasks.push(Task {
                    name,
                    locator,
                    target,
                });
                Ok(())
            }
            Slot::Other(type_name) => match annotation {
                None => Ok(()),
                Some(_) => Err(SecretStructError::UnsupportedFieldType {
                    field: name.to_string(),
                    type_name: type_name.into_owned(),
                }),
            },
        }
    }

    /// Number of tasks collected so far.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn into_tasks(self) -> Vec<Task<'a>> {
        self.tasks
    }
}

/// Collects the resolution tasks of `target`, in declaration order.
///
/// `target` must be a structure value; optional references, strings and any
/// other kind fail with [`SecretStructError::InvalidInput`]. The first
/// unsupported annotated field aborts collection.
pub fn collect<T: Field>(target: &mut T) -> Result<Vec<Task<'_>>> {
    let root = target.as_struct().ok_or(SecretStructError::InvalidInput)?;
    let mut fields = Fields::default();
    root.collect_fields(&mut fields)?;
    Ok(fields.into_tasks())
}
