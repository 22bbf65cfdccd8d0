use secretstruct::SecretStruct;

#[derive(Default, SecretStruct)]
pub struct Leaf {
    #[secretstruct = "constant://?val=leaf"]
    pub value: String,
}

#[derive(Default, SecretStruct)]
pub struct Wrapper<T> {
    pub inner: T,
    #[secretstruct = "self"]
    pub label: String,
}

#[derive(Default, SecretStruct)]
pub struct Pair(#[secretstruct = "self"] pub String, pub Option<String>);

#[derive(Default, SecretStruct)]
pub struct Empty;

fn main() {
    let mut wrapper = Wrapper::<Leaf>::default();
    let _ = secretstruct::collect(&mut wrapper).unwrap();

    let mut pair = Pair::default();
    let _ = secretstruct::collect(&mut pair).unwrap();

    let mut empty = Empty;
    assert!(secretstruct::collect(&mut empty).unwrap().is_empty());
}
