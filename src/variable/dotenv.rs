use super::{Decoder, Snapshot, Variable, VariableError, decoder_param, query_params};
use async_trait::async_trait;
use std::path::PathBuf;
use url::Url;

/// Configuration for the dotenv variable provider.
///
/// The URL path names the `.env` file and the `key` query parameter the entry
/// to read from it:
///
/// ```text
/// dotenv:///srv/app/.env?key=API_KEY   # absolute path
/// dotenv:.env.production?key=API_KEY   # relative to the working directory
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DotEnvConfig {
    pub path: PathBuf,
    pub key: String,
    pub decoder: Decoder,
}

impl TryFrom<&Url> for DotEnvConfig {
    type Error = VariableError;

    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if url.scheme() != "dotenv" {
            return Err(VariableError::Provider(format!(
                "Invalid scheme '{}' for dotenv provider",
                url.scheme()
            )));
        }

        // Host part, if any, is the first path component of a relative path
        let path = match url.host_str() {
            Some(host) if !host.is_empty() => format!("{}{}", host, url.path()),
            _ => url.path().to_string(),
        };
        let path = if path.is_empty() { ".env".to_string() } else { path };

        let params = query_params(url, &["key"])?;
        let key = params
            .get("key")
            .cloned()
            .ok_or(VariableError::MissingParameter("key"))?;

        Ok(Self {
            path: PathBuf::from(path),
            key,
            decoder: decoder_param(&params)?,
        })
    }
}

/// A variable read from a single key of a `.env` file.
pub struct DotEnvVariable {
    config: DotEnvConfig,
}

crate::register_variable! {
    struct: DotEnvVariable,
    config: DotEnvConfig,
    name: "dotenv",
    description: "Entry of a .env file",
    schemes: ["dotenv"],
    examples: ["dotenv:///srv/app/.env?key=API_KEY", "dotenv:.env.production?key=API_KEY"],
}

impl DotEnvVariable {
    pub fn new(config: DotEnvConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Variable for DotEnvVariable {
    async fn latest(&mut self) -> Result<Snapshot, VariableError> {
        let contents = tokio::fs::read(&self.config.path).await?;
        for item in dotenvy::from_read_iter(contents.as_slice()) {
            let (key, value) = item?;
            if key == self.config.key {
                return Ok(Snapshot::new(self.config.decoder.decode(value.into_bytes())?));
            }
        }
        Err(VariableError::NotFound(self.config.key.clone()))
    }
}
