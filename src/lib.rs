//! secretstruct - populate struct fields from secrets and runtime variables
//!
//! Fields are annotated with the URL of the variable holding their value.
//! [`process`] walks the struct, opens every annotated variable concurrently,
//! reads its current value once and writes it into the field.
//!
//! # Annotations
//!
//! | Attribute                              | Effect                                           |
//! |----------------------------------------|--------------------------------------------------|
//! | none                                   | ignored, unless the field is a struct (recursed) |
//! | `#[secretstruct = "-"]`                | field and its substructure ignored               |
//! | `#[secretstruct = "self"]`             | the field's current content is the URL           |
//! | `#[secretstruct = "<url>"]`            | the URL is used as given                         |
//!
//! Only `pub` fields are processed. Annotated fields must be `String`,
//! possibly behind `Option` or `Box`; `None` optionals of strings and structs
//! are filled with their zero value first.
//!
//! # Example
//!
//! ```ignore
//! use secretstruct::SecretStruct;
//!
//! #[derive(Debug, Default, SecretStruct)]
//! pub struct Database {
//!     #[secretstruct = "env:DB_PASSWORD?decoder=string"]
//!     pub password: String,
//! }
//!
//! #[derive(Debug, Default, SecretStruct)]
//! pub struct Settings {
//!     #[secretstruct = "constant://?val=my-service&decoder=string"]
//!     pub service: String,
//!     #[secretstruct = "self"]
//!     pub api_key: String,
//!     pub database: Option<Database>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut settings = Settings {
//!         api_key: "file:///run/secrets/api_key?decoder=string".to_string(),
//!         ..Default::default()
//!     };
//!     secretstruct::process(&mut settings).await?;
//!     println!("{}", settings.service);
//!     Ok(())
//! }
//! ```

// Lets the derive macro's `::secretstruct` paths resolve inside this crate
extern crate self as secretstruct;

mod config;
mod error;
mod field;
mod processor;

pub mod collect;
pub mod resolve;
pub mod variable;

pub use collect::{Fields, SELF_TAG_VALUE, STOP_TAG_VALUE, TAG_NAME, Task, collect};
pub use config::{Config, TIMEOUT_ENV};
pub use error::{Result, SecretStructError};
pub use field::{Field, SecretStruct, Slot};
pub use processor::{Processor, process};
pub use resolve::Scope;
pub use variable::{Opener, SchemeRegistry, Snapshot, Value, Variable, VariableError};

#[cfg(feature = "macros")]
pub use secretstruct_derive::SecretStruct;

// Re-exported for generated code
#[doc(hidden)]
pub mod __private {
    pub use std::borrow::Cow;
    pub use std::default::Default;
    pub use std::option::Option;
    pub use std::result::Result;
}

#[cfg(test)]
mod tests;
