use super::{Decoder, Snapshot, Variable, VariableError, decoder_param, query_params};
use async_trait::async_trait;
use url::Url;

/// Configuration for the environment variable provider.
///
/// The variable name is the URL path (`env:DATABASE_URL`) or, failing that,
/// its host (`env://DATABASE_URL`).
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub name: String,
    pub decoder: Decoder,
}

impl TryFrom<&Url> for EnvConfig {
    type Error = VariableError;

    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if url.scheme() != "env" {
            return Err(VariableError::Provider(format!(
                "Invalid scheme '{}' for env provider",
                url.scheme()
            )));
        }

        let path = url.path().trim_matches('/');
        let name = match url.host_str() {
            Some(host) if !host.is_empty() && path.is_empty() => host,
            _ => path,
        };
        if name.is_empty() {
            return Err(VariableError::MissingParameter("name"));
        }

        let params = query_params(url, &[])?;
        Ok(Self {
            name: name.to_string(),
            decoder: decoder_param(&params)?,
        })
    }
}

/// A read-only variable backed by the process environment.
///
/// The environment is read on every [`latest`](Variable::latest) call, not
/// when the variable is opened.
pub struct EnvVariable {
    config: EnvConfig,
}

crate::register_variable! {
    struct: EnvVariable,
    config: EnvConfig,
    name: "env",
    description: "Process environment variables",
    schemes: ["env"],
    examples: ["env:DATABASE_URL", "env:API_TOKEN?decoder=string"],
}

impl EnvVariable {
    pub fn new(config: EnvConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Variable for EnvVariable {
    async fn latest(&mut self) -> Result<Snapshot, VariableError> {
        let value = std::env::var_os(&self.config.name)
            .ok_or_else(|| VariableError::NotFound(self.config.name.clone()))?;
        let bytes = value.into_string().map_err(|_| {
            VariableError::Provider(format!(
                "environment variable {:?} is not valid unicode",
                self.config.name
            ))
        })?;
        Ok(Snapshot::new(self.config.decoder.decode(bytes.into_bytes())?))
    }
}
