use super::{Decoder, Snapshot, Variable, VariableError, decoder_param, query_params};
use async_trait::async_trait;
use url::Url;

/// Configuration for the constant variable provider.
///
/// Everything is carried in the query string:
///
/// - `val`: the value, decoded with the `decoder` parameter
/// - `err`: when present, every read fails with this message
///
/// A constant without `val` holds an empty value.
///
/// # Example
///
/// ```ignore
/// # use url::Url;
/// # use secretstruct::variable::constant::ConstantConfig;
/// let url = Url::parse("constant://?val=hello&decoder=string").unwrap();
/// let config = ConstantConfig::try_from(&url).unwrap();
/// assert_eq!(config.value, b"hello");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantConfig {
    pub value: Vec<u8>,
    pub error: Option<String>,
    pub decoder: Decoder,
}

impl TryFrom<&Url> for ConstantConfig {
    type Error = VariableError;

    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if url.scheme() != "constant" {
            return Err(VariableError::Provider(format!(
                "Invalid scheme '{}' for constant provider",
                url.scheme()
            )));
        }

        let params = query_params(url, &["val", "err"])?;
        Ok(Self {
            value: params.get("val").cloned().unwrap_or_default().into_bytes(),
            error: params.get("err").cloned(),
            decoder: decoder_param(&params)?,
        })
    }
}

/// A variable whose value never changes.
///
/// Mostly useful in tests and for wiring literal defaults through the same
/// resolution path as real secrets.
pub struct ConstantVariable {
    config: ConstantConfig,
}

crate::register_variable! {
    struct: ConstantVariable,
    config: ConstantConfig,
    name: "constant",
    description: "Fixed value embedded in the URL",
    schemes: ["constant"],
    examples: ["constant://?val=hello&decoder=string", "constant://?err=unavailable"],
}

impl ConstantVariable {
    pub fn new(config: ConstantConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Variable for ConstantVariable {
    async fn latest(&mut self) -> Result<Snapshot, VariableError> {
        if let Some(message) = &self.config.error {
            return Err(VariableError::Provider(message.clone()));
        }
        let value = self.config.decoder.decode(self.config.value.clone())?;
        Ok(Snapshot::new(value))
    }
}
