use super::{Decoder, Snapshot, Variable, VariableError, decoder_param, query_params};
use async_trait::async_trait;
use std::path::PathBuf;
use url::Url;

/// Configuration for the file variable provider.
///
/// Only absolute `file://` URLs are accepted, e.g.
/// `file:///run/secrets/db_password?decoder=string`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileConfig {
    pub path: PathBuf,
    pub decoder: Decoder,
}

impl TryFrom<&Url> for FileConfig {
    type Error = VariableError;

    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if url.scheme() != "file" {
            return Err(VariableError::Provider(format!(
                "Invalid scheme '{}' for file provider",
                url.scheme()
            )));
        }

        let path = url
            .to_file_path()
            .map_err(|_| VariableError::Provider(format!("URL '{}' is not a file path", url)))?;
        let params = query_params(url, &[])?;
        Ok(Self {
            path,
            decoder: decoder_param(&params)?,
        })
    }
}

/// A variable holding the contents of a file.
///
/// Typical for secrets mounted into containers. The file is read on every
/// [`latest`](Variable::latest) call.
pub struct FileVariable {
    config: FileConfig,
}

crate::register_variable! {
    struct: FileVariable,
    config: FileConfig,
    name: "file",
    description: "Contents of a local file",
    schemes: ["file"],
    examples: ["file:///run/secrets/db_password?decoder=string"],
}

impl FileVariable {
    pub fn new(config: FileConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Variable for FileVariable {
    async fn latest(&mut self) -> Result<Snapshot, VariableError> {
        let data = tokio::fs::read(&self.config.path).await?;
        Ok(Snapshot::new(self.config.decoder.decode(data)?))
    }
}
