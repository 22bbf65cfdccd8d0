use secretstruct::SecretStruct;
use std::collections::HashMap;

#[derive(Default, SecretStruct)]
pub struct Inner {
    #[secretstruct = "constant://?val=inner"]
    pub value: String,
}

#[derive(Default, SecretStruct)]
pub struct Settings {
    #[secretstruct = "self"]
    pub token: String,
    #[secretstruct = "constant://?val=x"]
    pub optional: Option<String>,
    #[secretstruct = "-"]
    pub ignored: HashMap<String, String>,
    pub inner: Inner,
    pub maybe_inner: Option<Box<Inner>>,
    pub port: u16,
    #[allow(dead_code)]
    private: String,
}

fn main() {
    let mut settings = Settings::default();
    let tasks = secretstruct::collect(&mut settings).unwrap();
    assert_eq!(tasks.len(), 4);
}
