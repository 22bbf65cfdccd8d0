use std::path::Path;
use url::Url;

/// Builds a `file://` locator for `path` with the given query string.
pub fn file_locator(path: &Path, query: &str) -> String {
    let mut url = Url::from_file_path(path).expect("absolute path");
    url.set_query(Some(query));
    url.to_string()
}

/// Builds a `dotenv://` locator reading `key` from the file at `path`.
pub fn dotenv_locator(path: &Path, key: &str) -> String {
    let url = Url::from_file_path(path).expect("absolute path");
    format!("dotenv://{}?key={}&decoder=string", url.path(), key)
}
