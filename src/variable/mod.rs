//! # Variable Providers
//!
//! A variable is an externally stored value addressed by a URL. The scheme
//! selects the provider, the rest of the URL configures it:
//!
//! ```text
//! constant://?val=hello&decoder=string
//! env:DATABASE_URL
//! file:///run/secrets/db_password?decoder=string
//! dotenv:///srv/app/.env?key=API_KEY
//! ```
//!
//! Resolution only ever opens a variable, reads one [`Snapshot`] and closes
//! it again. Providers register themselves with
//! [`register_variable!`](crate::register_variable) and are looked up by
//! [`SchemeRegistry`], the default [`Opener`].
//!
//! ## Decoders
//!
//! Every built-in provider accepts a `decoder` query parameter controlling how
//! raw bytes become a [`Value`]:
//!
//! - `bytes` (default): [`Value::Bytes`]
//! - `string`: [`Value::Text`], the bytes must be UTF-8
//! - `jsonmap`: [`Value::Json`], the bytes must be a JSON object

use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::SystemTime;
use thiserror::Error;
use url::Url;

pub mod constant;
pub mod dotenv;
pub mod env;
pub mod file;
#[macro_use]
pub mod macros;


/// Macro support types
pub use macros::{VARIABLE_REGISTRY, VariableRegistration};

/// Errors produced by variable providers.
#[derive(Error, Debug)]
pub enum VariableError {
    #[error("no scheme in URL {0:?}")]
    NoScheme(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("no variable provider registered for scheme {0:?}")]
    UnknownScheme(String),
    #[error("invalid decoder: unsupported decoder {0:?}")]
    InvalidDecoder(String),
    #[error("invalid query parameter {0:?}")]
    InvalidParameter(String),
    #[error("missing required parameter {0:?}")]
    MissingParameter(&'static str),
    #[error("variable {0:?} not found")]
    NotFound(String),
    #[error("value is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("failed to decode JSON map: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Dotenv error: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("{0}")]
    Provider(String),
}

/// A decoded variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bytes(Vec<u8>),
    Text(String),
    Json(serde_json::Map<String, serde_json::Value>),
}

impl Value {
    /// Name of the representation, as reported in type mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "string",
            Value::Json(_) => "json map",
        }
    }
}

/// A point-in-time read of a variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// `None` when the provider has no value to offer.
    pub value: Option<Value>,
    pub update_time: Option<SystemTime>,
}

impl Snapshot {
    pub fn new(value: Value) -> Self {
        Self {
            value: Some(value),
            update_time: Some(SystemTime::now()),
        }
    }
}

/// Turns raw provider bytes into a [`Value`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Decoder {
    #[default]
    Bytes,
    String,
    JsonMap,
}

impl FromStr for Decoder {
    type Err = VariableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "bytes" => Ok(Decoder::Bytes),
            "string" => Ok(Decoder::String),
            "jsonmap" => Ok(Decoder::JsonMap),
            other => Err(VariableError::InvalidDecoder(other.to_string())),
        }
    }
}

impl Decoder {
    pub fn decode(self, data: Vec<u8>) -> Result<Value, VariableError> {
        match self {
            Decoder::Bytes => Ok(Value::Bytes(data)),
            Decoder::String => Ok(Value::Text(String::from_utf8(data)?)),
            Decoder::JsonMap => Ok(Value::Json(serde_json::from_slice(&data)?)),
        }
    }
}

/// Reads the query parameters of `url`, rejecting any not listed in `allowed`.
///
/// The `decoder` parameter is always accepted.
pub fn query_params(url: &Url, allowed: &[&str]) -> Result<HashMap<String, String>, VariableError> {
    let mut params = HashMap::new();
    for (key, value) in url.query_pairs() {
        if key != "decoder" && !allowed.contains(&key.as_ref()) {
            return Err(VariableError::InvalidParameter(key.into_owned()));
        }
        params.insert(key.into_owned(), value.into_owned());
    }
    Ok(params)
}

/// Parses the `decoder` entry of already extracted query parameters.
pub fn decoder_param(params: &HashMap<String, String>) -> Result<Decoder, VariableError> {
    params
        .get("decoder")
        .map(|name| name.parse())
        .unwrap_or(Ok(Decoder::default()))
}

/// An opened variable.
#[async_trait]
pub trait Variable: Send {
    /// Returns the current value of the variable.
    ///
    /// A successful read may still carry no value; see [`Snapshot::value`].
    async fn latest(&mut self) -> Result<Snapshot, VariableError>;

    /// Releases the resources held by this variable.
    async fn close(&mut self) -> Result<(), VariableError> {
        Ok(())
    }
}

/// Opens variables from locator strings.
#[async_trait]
pub trait Opener: Send + Sync {
    async fn open(&self, locator: &str) -> Result<Box<dyn Variable>, VariableError>;
}

/// Information about a variable provider.
///
/// Contains metadata used for listing available providers, including the
/// provider's name, description, and example URLs.
#[derive(Debug, Clone)]
pub struct VariableInfo {
    /// The canonical name of the provider (e.g., "constant", "env").
    pub name: &'static str,
    /// A human-readable description of what the provider does.
    pub description: &'static str,
    /// Example URLs showing how to address this provider.
    pub examples: &'static [&'static str],
}

impl VariableInfo {
    /// Formats the provider information for display, including examples if available.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let info = VariableInfo {
    ///     name: "env",
    ///     description: "Process environment variables",
    ///     examples: &["env:DATABASE_URL"],
    /// };
    /// assert_eq!(
    ///     info.display_with_examples(),
    ///     "env: Process environment variables (e.g., env:DATABASE_URL)"
    /// );
    /// ```
    pub fn display_with_examples(&self) -> String {
        if self.examples.is_empty() {
            format!("{}: {}", self.name, self.description)
        } else {
            format!(
                "{}: {} (e.g., {})",
                self.name,
                self.description,
                self.examples.join(", ")
            )
        }
    }
}

/// Returns metadata for every registered variable provider.
pub fn variables() -> Vec<VariableInfo> {
    VARIABLE_REGISTRY
        .iter()
        .map(|reg| reg.info.clone())
        .collect()
}

/// The default [`Opener`], dispatching on the locator's URL scheme to the
/// providers registered in [`VARIABLE_REGISTRY`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemeRegistry;

impl SchemeRegistry {
    /// Parses a locator into a URL.
    ///
    /// Locators without a scheme, including the empty string, fail with
    /// [`VariableError::NoScheme`].
    pub fn parse(locator: &str) -> Result<Url, VariableError> {
        match Url::parse(locator) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Err(VariableError::NoScheme(locator.to_string()))
            }
            Err(err) => Err(VariableError::InvalidUrl(err)),
        }
    }

    /// Opens a variable synchronously.
    pub fn open_url(url: &Url) -> Result<Box<dyn Variable>, VariableError> {
        let scheme = url.scheme();
        let registration = VARIABLE_REGISTRY
            .iter()
            .find(|reg| reg.schemes.contains(&scheme))
            .ok_or_else(|| VariableError::UnknownScheme(scheme.to_string()))?;

        (registration.factory)(url)
    }
}

#[async_trait]
impl Opener for SchemeRegistry {
    async fn open(&self, locator: &str) -> Result<Box<dyn Variable>, VariableError> {
        let url = Self::parse(locator)?;
        Self::open_url(&url)
    }
}
