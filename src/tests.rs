use crate::resolve::{Scope, into_text, resolve, resolve_task};
use crate::variable::{Opener, Snapshot, Value, Variable, VariableError};
use crate::{Config, Fields, Processor, SecretStruct, SecretStructError, collect};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a scripted variable does when read.
#[derive(Clone)]
enum Latest {
    Value(Snapshot),
    Error(String),
    Pending,
}

#[derive(Clone)]
struct Script {
    latest: Latest,
    close_error: Option<String>,
}

impl Script {
    fn value(value: Value) -> Self {
        Self {
            latest: Latest::Value(Snapshot::new(value)),
            close_error: None,
        }
    }

    fn latest(latest: Latest) -> Self {
        Self {
            latest,
            close_error: None,
        }
    }

    fn failing_close(mut self, message: &str) -> Self {
        self.close_error = Some(message.to_string());
        self
    }
}

/// Mock opener serving scripted variables keyed by locator
#[derive(Clone, Default)]
struct MockOpener {
    scripts: Arc<HashMap<String, Script>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MockOpener {
    fn new(scripts: impl IntoIterator<Item = (&'static str, Script)>) -> Self {
        Self {
            scripts: Arc::new(
                scripts
                    .into_iter()
                    .map(|(locator, script)| (locator.to_string(), script))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockVariable {
    script: Script,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Variable for MockVariable {
    async fn latest(&mut self) -> Result<Snapshot, VariableError> {
        match &self.script.latest {
            Latest::Value(snapshot) => Ok(snapshot.clone()),
            Latest::Error(message) => Err(VariableError::Provider(message.clone())),
            Latest::Pending => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), VariableError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        match &self.script.close_error {
            Some(message) => Err(VariableError::Provider(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Opener for MockOpener {
    async fn open(&self, locator: &str) -> Result<Box<dyn Variable>, VariableError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .get(locator)
            .cloned()
            .ok_or_else(|| VariableError::UnknownScheme(locator.to_string()))?;
        Ok(Box::new(MockVariable {
            script,
            closed: self.closed.clone(),
        }))
    }
}

#[derive(Debug, Default, SecretStruct)]
pub struct Single {
    #[secretstruct = "mock:test"]
    pub test: String,
}

#[derive(Debug, Default, SecretStruct)]
pub struct Pair {
    #[secretstruct = "mock:first"]
    pub first: String,
    #[secretstruct = "mock:second"]
    pub second: String,
}

async fn process_single(opener: &MockOpener) -> (Single, crate::Result<()>) {
    let mut single = Single {
        test: "test".to_string(),
    };
    let result = Processor::new()
        .with_opener(opener.clone())
        .process(&mut single)
        .await;
    (single, result)
}

#[tokio::test]
async fn test_fetch_error_is_returned_with_field_name() {
    let opener = MockOpener::new([("mock:test", Script::latest(Latest::Error("test error".into())))]);

    let (single, result) = process_single(&opener).await;
    let err = result.unwrap_err();

    assert_eq!(
        err.to_string(),
        "processing field \"test\" failed: fetch latest value: test error"
    );
    assert_eq!(err.field(), Some("test"));
    assert!(matches!(err.root(), SecretStructError::Fetch(_)));
    assert_eq!(single.test, "test");
    assert_eq!(opener.closed(), 1);
}

#[tokio::test]
async fn test_nil_latest_value() {
    let opener = MockOpener::new([("mock:test", Script::latest(Latest::Value(Snapshot::default())))]);

    let (_, result) = process_single(&opener).await;
    let err = result.unwrap_err();

    assert!(matches!(err.root(), SecretStructError::InvalidLatestValue));
    assert_eq!(
        err.to_string(),
        "processing field \"test\" failed: latest value is nil"
    );
}

#[tokio::test]
async fn test_invalid_value_type() {
    let mut map = serde_json::Map::new();
    map.insert("answer".to_string(), serde_json::json!(42));
    let opener = MockOpener::new([("mock:test", Script::value(Value::Json(map)))]);

    let (single, result) = process_single(&opener).await;
    let err = result.unwrap_err();

    assert!(matches!(
        err.root(),
        SecretStructError::TypeMismatch { type_name } if type_name == "json map"
    ));
    assert_eq!(
        err.root().to_string(),
        "can't use value of type json map, must be bytes or string: type mismatch"
    );
    assert_eq!(single.test, "test");
}

#[tokio::test]
async fn test_bytes_and_text_values_are_written() {
    let opener = MockOpener::new([
        ("mock:first", Script::value(Value::Bytes(b"from-bytes".to_vec()))),
        ("mock:second", Script::value(Value::Text("from-text".into()))),
    ]);

    let mut pair = Pair::default();
    Processor::new()
        .with_opener(opener.clone())
        .process(&mut pair)
        .await
        .unwrap();

    assert_eq!(pair.first, "from-bytes");
    assert_eq!(pair.second, "from-text");
    assert_eq!(opener.opened(), 2);
    assert_eq!(opener.closed(), 2);
}

#[test]
fn test_into_text() {
    assert_eq!(into_text(Some(Value::Text("a".into()))).unwrap(), "a");
    assert_eq!(into_text(Some(Value::Bytes(b"b".to_vec()))).unwrap(), "b");
    assert!(matches!(
        into_text(None),
        Err(SecretStructError::InvalidLatestValue)
    ));
    assert!(matches!(
        into_text(Some(Value::Bytes(vec![0xff, 0xfe]))),
        Err(SecretStructError::TypeMismatch { type_name }) if type_name == "non-UTF-8 bytes"
    ));
}

#[tokio::test]
async fn test_close_failure_alone_is_surfaced() {
    let opener = MockOpener::new([(
        "mock:test",
        Script::value(Value::Text("resolved".into())).failing_close("close failed"),
    )]);

    let (single, result) = process_single(&opener).await;
    let err = result.unwrap_err();

    // The value was still written before the close failed
    assert_eq!(single.test, "resolved");
    assert!(matches!(err.root(), SecretStructError::Close(_)));
    assert_eq!(
        err.to_string(),
        "processing field \"test\" failed: close variable: close failed"
    );
}

#[tokio::test]
async fn test_close_failure_never_masks_fetch_failure() {
    let opener = MockOpener::new([(
        "mock:test",
        Script::latest(Latest::Error("fetch failed".into())).failing_close("close failed"),
    )]);

    let (_, result) = process_single(&opener).await;
    let err = result.unwrap_err();

    assert!(matches!(err.root(), SecretStructError::Fetch(_)));
    let SecretStructError::Field { source, .. } = &err else {
        panic!("expected a field error, got {err:?}");
    };
    let causes = source.errors();
    assert_eq!(causes.len(), 2);
    assert!(matches!(causes[0], SecretStructError::Fetch(_)));
    assert!(matches!(causes[1], SecretStructError::Close(_)));
    assert_eq!(
        err.to_string(),
        "processing field \"test\" failed: fetch latest value: fetch failed; close variable: close failed"
    );
}

#[tokio::test]
async fn test_open_failure_is_not_closed() {
    let opener = MockOpener::default();

    let (_, result) = process_single(&opener).await;
    let err = result.unwrap_err();

    assert!(matches!(
        err.root(),
        SecretStructError::Open { locator, source: VariableError::UnknownScheme(_) } if locator == "mock:test"
    ));
    assert_eq!(opener.opened(), 1);
    assert_eq!(opener.closed(), 0);
}

#[tokio::test]
async fn test_failure_does_not_affect_ready_sibling() {
    let opener = MockOpener::new([
        ("mock:first", Script::latest(Latest::Value(Snapshot::default()))),
        ("mock:second", Script::value(Value::Text("second".into()))),
    ]);

    let mut pair = Pair::default();
    let err = Processor::new()
        .with_opener(opener.clone())
        .process(&mut pair)
        .await
        .unwrap_err();

    assert_eq!(err.field(), Some("first"));
    assert!(matches!(err.root(), SecretStructError::InvalidLatestValue));
    assert_eq!(err.errors().len(), 1);
    assert_eq!(pair.second, "second");
}

#[tokio::test]
async fn test_first_failure_cancels_blocked_sibling() {
    let opener = MockOpener::new([
        ("mock:first", Script::latest(Latest::Pending)),
        ("mock:second", Script::latest(Latest::Error("boom".into()))),
    ]);

    let mut pair = Pair::default();
    let err = Processor::new()
        .with_opener(opener.clone())
        .process(&mut pair)
        .await
        .unwrap_err();

    // The primary error is the real failure, the cancelled sibling follows
    assert_eq!(err.field(), Some("second"));
    assert!(matches!(err.root(), SecretStructError::Fetch(_)));
    let causes = err.errors();
    assert_eq!(causes.len(), 2);
    assert_eq!(causes[1].field(), Some("first"));
    assert!(causes[1].is_cancellation());
    // Both variables were released
    assert_eq!(opener.closed(), 2);
    assert!(pair.first.is_empty());
}

#[tokio::test]
async fn test_caller_cancellation_stops_before_opening() {
    let opener = MockOpener::new([
        ("mock:first", Script::value(Value::Text("first".into()))),
        ("mock:second", Script::value(Value::Text("second".into()))),
    ]);
    let token = CancellationToken::new();
    token.cancel();

    let mut pair = Pair::default();
    let err = Processor::new()
        .with_opener(opener.clone())
        .with_cancellation(token)
        .process(&mut pair)
        .await
        .unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(err.errors().len(), 2);
    assert_eq!(opener.opened(), 0);
    assert!(pair.first.is_empty() && pair.second.is_empty());
}

#[tokio::test]
async fn test_caller_cancellation_interrupts_blocked_fetch() {
    let opener = MockOpener::new([("mock:test", Script::latest(Latest::Pending))]);
    let token = CancellationToken::new();
    let processor = Processor::new()
        .with_opener(opener.clone())
        .with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let mut single = Single::default();
    let err = processor.process(&mut single).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err.root(), SecretStructError::Cancelled));
    assert_eq!(opener.closed(), 1);
}

#[tokio::test]
async fn test_timeout_from_config() {
    let opener = MockOpener::new([("mock:test", Script::latest(Latest::Pending))]);
    let config = Config {
        timeout_secs: Some(0),
    };

    let mut single = Single::default();
    let err = Processor::new()
        .with_opener(opener.clone())
        .with_config(&config)
        .process(&mut single)
        .await
        .unwrap_err();

    assert!(matches!(err.root(), SecretStructError::DeadlineExceeded));
    assert_eq!(opener.opened(), 0);
}

#[tokio::test]
async fn test_unrepresentable_timeout_means_no_deadline() {
    let opener = MockOpener::new([("mock:test", Script::value(Value::Text("resolved".into())))]);
    let config = Config::from_toml_str("timeout_secs = 9223372036854775807").unwrap();

    let mut single = Single::default();
    Processor::new()
        .with_opener(opener.clone())
        .with_config(&config)
        .process(&mut single)
        .await
        .unwrap();
    assert_eq!(single.test, "resolved");

    let mut single = Single::default();
    Processor::new()
        .with_opener(opener)
        .with_timeout(Duration::MAX)
        .process(&mut single)
        .await
        .unwrap();
    assert_eq!(single.test, "resolved");
}

#[tokio::test]
async fn test_timeout_interrupts_blocked_fetch() {
    let opener = MockOpener::new([("mock:test", Script::latest(Latest::Pending))]);

    let mut single = Single::default();
    let err = Processor::new()
        .with_opener(opener.clone())
        .with_timeout(Duration::from_millis(20))
        .process(&mut single)
        .await
        .unwrap_err();

    assert!(matches!(err.root(), SecretStructError::DeadlineExceeded));
    assert_eq!(
        err.to_string(),
        "processing field \"test\" failed: deadline exceeded"
    );
    assert_eq!(opener.closed(), 1);
}

#[tokio::test]
async fn test_resolve_task_directly() {
    let opener = MockOpener::new([("mock:test", Script::value(Value::Text("direct".into())))]);
    let mut single = Single::default();
    let task = collect(&mut single).unwrap().into_iter().next().unwrap();
    assert_eq!(task.current(), "");

    resolve_task(&Scope::default(), &opener, task).await.unwrap();
    assert_eq!(single.test, "direct");
}

#[test]
fn test_fields_counts_collected_tasks() {
    let mut pair = Pair::default();
    let mut fields = Fields::default();
    assert!(fields.is_empty());

    pair.collect_fields(&mut fields).unwrap();
    assert_eq!(fields.len(), 2);
    assert!(!fields.is_empty());
    let names: Vec<_> = fields.into_tasks().iter().map(|task| task.name).collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[tokio::test]
async fn test_resolve_without_tasks() {
    let opener = MockOpener::default();
    resolve(&Scope::default(), &opener, Vec::new()).await.unwrap();
    assert_eq!(opener.opened(), 0);
}

#[derive(Debug, Default, SecretStruct)]
pub struct WithNumber {
    #[secretstruct = "mock:first"]
    pub first: String,
    #[secretstruct = "mock:count"]
    pub count: i64,
}

#[tokio::test]
async fn test_unsupported_field_aborts_before_resolution() {
    let opener = MockOpener::new([("mock:first", Script::value(Value::Text("first".into())))]);

    let mut with_number = WithNumber::default();
    let err = Processor::new()
        .with_opener(opener.clone())
        .process(&mut with_number)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "field count (i64): unsupported field type");
    assert_eq!(opener.opened(), 0);
    assert!(with_number.first.is_empty());
}

#[derive(Debug, Default, SecretStruct)]
pub struct Optionals {
    #[secretstruct = "mock:first"]
    pub nested_some: Option<Option<String>>,
    pub nested_none: Option<Option<String>>,
    pub number: Option<i32>,
    #[secretstruct = "mock:second"]
    pub boxed: Box<String>,
}

#[test]
fn test_optional_chains() {
    let mut optionals = Optionals {
        nested_some: Some(None),
        ..Default::default()
    };

    let tasks = collect(&mut optionals).unwrap();
    let names: Vec<_> = tasks.iter().map(|task| task.name).collect();
    assert_eq!(names, vec!["nested_some", "boxed"]);
    drop(tasks);

    // Inner level was materialized, unset multi-level and non-string
    // optionals are left alone
    assert_eq!(optionals.nested_some, Some(Some(String::new())));
    assert_eq!(optionals.nested_none, None);
    assert_eq!(optionals.number, None);
}

#[derive(Debug, Default, SecretStruct)]
pub struct AnnotatedNestedNone {
    #[secretstruct = "mock:first"]
    pub value: Option<Option<String>>,
}

#[derive(Debug, Default, SecretStruct)]
pub struct AnnotatedNumber {
    #[secretstruct = "self"]
    pub value: Option<i32>,
}

#[test]
fn test_unset_unsupported_optionals() {
    let mut nested = AnnotatedNestedNone::default();
    let err = collect(&mut nested).unwrap_err();
    assert_eq!(
        err.to_string(),
        "field value (Option<Option<String>>): unsupported field type"
    );
    assert_eq!(nested.value, None);

    let mut number = AnnotatedNumber::default();
    let err = collect(&mut number).unwrap_err();
    assert_eq!(err.to_string(), "field value (Option<i32>): unsupported field type");

    // A set optional is dereferenced, so the error names the inner type
    let mut number = AnnotatedNumber { value: Some(5) };
    let err = collect(&mut number).unwrap_err();
    assert_eq!(err.to_string(), "field value (i32): unsupported field type");
}

#[test]
fn test_invalid_input() {
    let mut text = String::from("test");
    assert!(matches!(collect(&mut text), Err(SecretStructError::InvalidInput)));
    assert_eq!(text, "test");

    let mut number = 5i32;
    assert!(matches!(collect(&mut number), Err(SecretStructError::InvalidInput)));

    let mut none: Option<Single> = None;
    assert!(matches!(collect(&mut none), Err(SecretStructError::InvalidInput)));
    assert!(none.is_none());

    let mut some = Some(Single::default());
    assert!(matches!(collect(&mut some), Err(SecretStructError::InvalidInput)));
}

#[test]
fn test_error_helpers() {
    use SecretStructError as E;

    assert!(E::append(Ok(()), Ok(())).is_ok());
    assert!(matches!(
        E::append(Err(E::InvalidLatestValue), Ok(())),
        Err(E::InvalidLatestValue)
    ));
    assert!(matches!(E::append(Ok(()), Err(E::Cancelled)), Err(E::Cancelled)));

    let combined = E::append(Err(E::InvalidLatestValue), Err(E::Cancelled)).unwrap_err();
    assert_eq!(combined.to_string(), "latest value is nil; operation cancelled");
    assert!(matches!(combined.root(), E::InvalidLatestValue));

    let flattened = combined.combine(E::DeadlineExceeded);
    assert_eq!(flattened.errors().len(), 3);

    assert!(E::from_errors(Vec::new()).is_none());
    assert!(matches!(
        E::from_errors(vec![E::Cancelled]),
        Some(E::Cancelled)
    ));

    let wrapped = E::DeadlineExceeded.in_field("token");
    assert_eq!(wrapped.field(), Some("token"));
    assert!(wrapped.is_cancellation());
}

#[test]
fn test_config_from_toml() {
    let config = Config::from_toml_str("timeout_secs = 5").unwrap();
    assert_eq!(config.timeout(), Some(Duration::from_secs(5)));

    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.timeout(), None);

    assert!(matches!(
        Config::from_toml_str("retries = 3"),
        Err(SecretStructError::Toml(_))
    ));
}

#[test]
fn test_config_load_from_file() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("secretstruct.toml");
    std::fs::write(&path, "timeout_secs = 7\n").unwrap();

    // Only meaningful when the override is not set in the test environment
    if std::env::var_os(crate::TIMEOUT_ENV).is_none() {
        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout_secs, Some(7));
    }

    assert!(matches!(
        Config::load(temp_dir.path().join("missing.toml")),
        Err(SecretStructError::Io(_))
    ));
}
