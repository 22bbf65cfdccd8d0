use crate::collect::collect;
use crate::config::Config;
use crate::field::Field;
use crate::resolve::{Scope, resolve};
use crate::variable::{Opener, SchemeRegistry};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Populates annotated struct fields from variables.
///
/// A processor is cheap to clone and can be reused for any number of
/// `process` calls; nothing outlives a single call.
///
/// # Example
///
/// ```ignore
/// use secretstruct::{Processor, SecretStruct};
///
/// #[derive(Default, SecretStruct)]
/// pub struct Settings {
///     #[secretstruct = "env:DATABASE_URL?decoder=string"]
///     pub database_url: String,
/// }
///
/// let mut settings = Settings::default();
/// Processor::new()
///     .with_timeout(std::time::Duration::from_secs(5))
///     .process(&mut settings)
///     .await?;
/// ```
#[derive(Clone)]
pub struct Processor {
    opener: Arc<dyn Opener>,
    token: CancellationToken,
    timeout: Option<Duration>,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// Creates a processor using the registered variable providers.
    pub fn new() -> Self {
        Self {
            opener: Arc::new(SchemeRegistry),
            token: CancellationToken::new(),
            timeout: None,
        }
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.timeout = config.timeout();
        self
    }

    /// Replaces the way locators are opened.
    pub fn with_opener(mut self, opener: impl Opener + 'static) -> Self {
        self.opener = Arc::new(opener);
        self
    }

    /// Ties every call to `token`: cancelling it cancels in-flight resolution.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Collects the annotated fields of `target` and resolves them concurrently.
    ///
    /// Collection errors are returned before any variable is opened.
    /// Resolution errors are wrapped with the failing field's name; see
    /// [`resolve`](crate::resolve::resolve) for how several are reported.
    pub async fn process<T: Field>(&self, target: &mut T) -> Result<()> {
        let tasks = collect(target)?;
        tracing::debug!(fields = tasks.len(), "resolving fields");

        // A timeout too large to represent as an instant means no deadline
        let deadline = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let scope = Scope::new(self.token.child_token(), deadline);
        resolve(&scope, self.opener.as_ref(), tasks).await
    }
}

/// Populates `target` using the registered variable providers and no deadline.
pub async fn process<T: Field>(target: &mut T) -> Result<()> {
    Processor::new().process(target).await
}
