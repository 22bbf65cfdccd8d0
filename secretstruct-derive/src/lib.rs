use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote, quote_spanned};
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{
    Attribute, Data, DeriveInput, Error, Expr, ExprLit, Index, Lit, LitStr, Member, Meta,
    Visibility, parse_macro_input,
};

const TAG_NAME: &str = "secretstruct";
const STOP_TAG_VALUE: &str = "-";

/// Derives `secretstruct::SecretStruct` and `secretstruct::Field` for a struct.
///
/// Fields are visited in declaration order. Each `pub` field is handed to the
/// collector with its annotation:
///
/// ```ignore
/// #[derive(Default, SecretStruct)]
/// pub struct Settings {
///     #[secretstruct = "constant://?val=hello&decoder=string"]
///     pub greeting: String,
///     #[secretstruct = "self"]
///     pub token: String,
///     #[secretstruct = "-"]
///     pub cache: HashMap<String, String>,
///     pub nested: Option<Inner>,
///     private_note: String,
/// }
/// ```
///
/// Private fields are never visited. Fields annotated `-` are left out of the
/// generated code, so their type needs no `Field` implementation. The struct
/// must implement `Default`, which provides the zero value used when an
/// absent `Option<Self>` is materialized.
#[proc_macro_derive(SecretStruct, attributes(secretstruct))]
pub fn derive_secret_struct(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

pub(crate) fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(
            &input.ident,
            "SecretStruct can only be derived for structs",
        ));
    };

    let ident = &input.ident;
    let type_name = ident.unraw().to_string();

    let mut bindings = Vec::new();
    let mut registrations = Vec::new();
    let mut bounds = Vec::new();

    for (index, field) in data.fields.iter().enumerate() {
        let annotation = parse_annotation(&field.attrs)?;

        if matches!(field.vis, Visibility::Inherited) {
            continue;
        }
        if annotation.as_ref().is_some_and(|lit| lit.value() == STOP_TAG_VALUE) {
            continue;
        }

        let (member, name) = match &field.ident {
            Some(field_ident) => (
                Member::Named(field_ident.clone()),
                field_ident.unraw().to_string(),
            ),
            None => (Member::Unnamed(Index::from(index)), index.to_string()),
        };
        let binding = format_ident!("__field_{}", index);
        let annotation = match annotation {
            Some(lit) => quote! { ::secretstruct::__private::Option::Some(#lit) },
            None => quote! { ::secretstruct::__private::Option::None },
        };

        bindings.push(quote! { #member: #binding });
        registrations.push(quote! {
            fields.field(#name, #annotation, #binding)?;
        });

        let ty = &field.ty;
        bounds.push(quote_spanned! {ty.span()=> #ty: ::secretstruct::Field });
    }

    // Generic structs need their field types bounded; the zero value of a
    // generic struct additionally needs `Self: Default`.
    let mut generics = input.generics.clone();
    let mut field_generics = input.generics.clone();
    if !generics.params.is_empty() {
        let (_, ty_generics, _) = input.generics.split_for_impl();
        let where_clause = generics.make_where_clause();
        for bound in &bounds {
            where_clause.predicates.push(syn::parse2(bound.clone())?);
        }
        let field_where_clause = field_generics.make_where_clause();
        field_where_clause.predicates = where_clause.predicates.clone();
        field_where_clause
            .predicates
            .push(syn::parse_quote!(#ident #ty_generics: ::secretstruct::__private::Default));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let field_where_clause = &field_generics.where_clause;

    let body = if registrations.is_empty() {
        quote! {
            let _ = fields;
        }
    } else {
        quote! {
            let Self { #(#bindings,)* .. } = self;
            #(#registrations)*
        }
    };

    Ok(quote! {
        impl #impl_generics ::secretstruct::SecretStruct for #ident #ty_generics #where_clause {
            fn collect_fields<'__a>(
                &'__a mut self,
                fields: &mut ::secretstruct::Fields<'__a>,
            ) -> ::secretstruct::Result<()> {
                #body
                ::secretstruct::__private::Result::Ok(())
            }
        }

        impl #impl_generics ::secretstruct::Field for #ident #ty_generics #field_where_clause {
            fn type_name() -> ::secretstruct::__private::Cow<'static, str> {
                ::secretstruct::__private::Cow::Borrowed(#type_name)
            }

            fn zeroed() -> ::secretstruct::__private::Option<Self> {
                ::secretstruct::__private::Option::Some(
                    <Self as ::secretstruct::__private::Default>::default(),
                )
            }

            fn slot(&mut self) -> ::secretstruct::Slot<'_> {
                ::secretstruct::Slot::Struct(self)
            }

            fn as_struct(
                &mut self,
            ) -> ::secretstruct::__private::Option<&mut dyn ::secretstruct::SecretStruct> {
                ::secretstruct::__private::Option::Some(self)
            }
        }
    })
}

/// Reads the `#[secretstruct = "..."]` annotation of a field, if any.
fn parse_annotation(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut annotation = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident(TAG_NAME)) {
        let Meta::NameValue(meta) = &attr.meta else {
            return Err(Error::new_spanned(
                attr,
                "expected `#[secretstruct = \"...\"]`",
            ));
        };
        let Expr::Lit(ExprLit {
            lit: Lit::Str(lit), ..
        }) = &meta.value
        else {
            return Err(Error::new_spanned(
                &meta.value,
                "secretstruct annotation must be a string literal",
            ));
        };
        if annotation.is_some() {
            return Err(Error::new_spanned(attr, "duplicate secretstruct annotation"));
        }
        annotation = Some(lit.clone());
    }

    Ok(annotation)
}
