//! Procedural macros for the docpatch project.
//!
//! - `#[derive(Schema)]` describes the addressable fields of a struct so selectors can be
//!   validated and mapped to stored field names.
//! - `#[derive(Document)]` names a struct for the key and tag-name conventions.
//!
//! Generated code refers to `docpatch_core`; `use docpatch::prelude::*` brings that name
//! into scope for crates depending on the facade only.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Fields, GenericArgument, Ident, LitStr, PathArguments,
    Result, Type, ext::IdentExt, meta::ParseNestedMeta, parse_macro_input, spanned::Spanned,
};

/// Derives `docpatch_core::schema::Schema` for a struct with named fields.
///
/// Stored field names follow the serde attributes on the type (`rename_all`, `rename`,
/// `skip`, `skip_serializing`, `flatten`). Additional `#[schema(...)]` options:
///
/// - `rename = "Name"` on a field overrides the stored name
/// - `rename_all = "..."` on the struct, for types that do not derive `Serialize`
/// - `nested` on a field whose type (through `Option` or `Box`) also derives `Schema`
/// - `collection` on a field that can be appended to but is not a recognized sequence type
/// - `skip` on a field that selectors must not address
#[proc_macro_derive(Schema, attributes(schema, serde))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_schema(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Derives `docpatch_core::document::Document`.
///
/// `#[document(collection = "Name")]` overrides the default tag name.
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_document(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

fn expand_schema(input: &DeriveInput) -> Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Schema cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(Error::new(
                    input.ident.span(),
                    "Schema requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(Error::new(
                input.ident.span(),
                "Schema can only be derived for structs",
            ));
        }
    };

    let rename_rule = parse_container_attrs(&input.attrs)?;
    let mut entries = Vec::with_capacity(fields.len());

    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new(field.span(), "Schema requires named fields"))?;

        let Some(entry) = SchemaField::from_field(ident, &field.ty, &field.attrs, rename_rule)? else {
            continue;
        };

        entries.push(entry.to_tokens());
    }

    let name = &input.ident;

    Ok(quote! {
        impl docpatch_core::schema::Schema for #name {
            fn fields() -> &'static [docpatch_core::schema::FieldSchema] {
                const FIELDS: &[docpatch_core::schema::FieldSchema] = &[#(#entries),*];
                FIELDS
            }
        }
    })
}

fn expand_document(input: &DeriveInput) -> Result<TokenStream2> {
    let mut collection: Option<LitStr> = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("document") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;

                if value.value().is_empty() {
                    return Err(meta.error("collection name must not be empty"));
                }

                collection = Some(value);
                Ok(())
            } else {
                Err(meta.error("unknown document attribute, expected collection"))
            }
        })?;
    }

    let name = &input.ident;
    let type_name = name.unraw().to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let collection_name = collection.map(|collection| {
        quote! {
            fn collection_name() -> ::std::option::Option<&'static str> {
                ::std::option::Option::Some(#collection)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics docpatch_core::document::Document for #name #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #type_name
            }

            #collection_name
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameRule {
    None,
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(value: &LitStr) -> Result<Self> {
        Ok(match value.value().as_str() {
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            "PascalCase" => Self::Pascal,
            "camelCase" => Self::Camel,
            "snake_case" => Self::Snake,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnake,
            "kebab-case" => Self::Kebab,
            "SCREAMING-KEBAB-CASE" => Self::ScreamingKebab,
            other => {
                return Err(Error::new(value.span(), format!("unknown rename rule `{other}`")));
            }
        })
    }

    /// Applies the rule to a snake_case field name.
    fn apply(self, field: &str) -> String {
        match self {
            Self::None | Self::Snake => field.to_string(),
            Self::Lower => field.to_ascii_lowercase(),
            Self::Upper | Self::ScreamingSnake => field.to_ascii_uppercase(),
            Self::Kebab => field.replace('_', "-"),
            Self::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
            Self::Pascal => {
                let mut pascal = String::with_capacity(field.len());
                let mut capitalize = true;

                for ch in field.chars() {
                    if ch == '_' {
                        capitalize = true;
                    } else if capitalize {
                        pascal.push(ch.to_ascii_uppercase());
                        capitalize = false;
                    } else {
                        pascal.push(ch);
                    }
                }

                pascal
            }
            Self::Camel => {
                let pascal = Self::Pascal.apply(field);
                let mut chars = pascal.chars();

                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => pascal,
                }
            }
        }
    }
}

fn parse_container_attrs(attrs: &[Attribute]) -> Result<RenameRule> {
    let mut rule = RenameRule::None;

    for attr in attrs {
        if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    if let Some(value) = parse_serialize_name(&meta)? {
                        rule = RenameRule::parse(&value)?;
                    }
                    Ok(())
                } else {
                    skip_meta(&meta)
                }
            })?;
        } else if attr.path().is_ident("schema") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    let value: LitStr = meta.value()?.parse()?;
                    rule = RenameRule::parse(&value)?;
                    Ok(())
                } else {
                    Err(meta.error("unknown schema attribute, expected rename_all"))
                }
            })?;
        }
    }

    Ok(rule)
}

/// Reads `name = "x"` or `name(serialize = "x", ...)`, the two forms serde accepts.
fn parse_serialize_name(meta: &ParseNestedMeta) -> Result<Option<LitStr>> {
    if meta.input.peek(syn::Token![=]) {
        return Ok(Some(meta.value()?.parse()?));
    }

    let mut name = None;

    meta.parse_nested_meta(|nested| {
        if nested.path.is_ident("serialize") {
            name = Some(nested.value()?.parse()?);
            Ok(())
        } else {
            skip_meta(&nested)
        }
    })?;

    Ok(name)
}

/// Consumes a serde option this macro does not interpret.
fn skip_meta(meta: &ParseNestedMeta) -> Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let _content;
        syn::parenthesized!(_content in meta.input);
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Value,
    Collection,
}

struct SchemaField {
    ident: String,
    name: String,
    shape: Shape,
    nested: Option<Type>,
}

impl SchemaField {
    /// Returns `None` for fields that are not stored as addressable members.
    fn from_field(
        ident: &Ident,
        ty: &Type,
        attrs: &[Attribute],
        rename_rule: RenameRule,
    ) -> Result<Option<Self>> {
        let field_ident = ident.unraw().to_string();
        let mut rename: Option<String> = None;
        let mut skipped = false;
        let mut nested = false;
        let mut collection = false;

        for attr in attrs {
            if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        if let Some(value) = parse_serialize_name(&meta)? {
                            rename = Some(value.value());
                        }
                        Ok(())
                    } else if meta.path.is_ident("skip")
                        || meta.path.is_ident("skip_serializing")
                        || meta.path.is_ident("flatten")
                    {
                        skipped = true;
                        Ok(())
                    } else {
                        skip_meta(&meta)
                    }
                })?;
            } else if attr.path().is_ident("schema") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        let value: LitStr = meta.value()?.parse()?;

                        if value.value().is_empty() {
                            return Err(meta.error("field name must not be empty"));
                        }

                        rename = Some(value.value());
                    } else if meta.path.is_ident("nested") {
                        nested = true;
                    } else if meta.path.is_ident("collection") {
                        collection = true;
                    } else if meta.path.is_ident("skip") {
                        skipped = true;
                    } else {
                        return Err(meta.error(
                            "unknown schema attribute, expected rename, nested, collection, or skip",
                        ));
                    }
                    Ok(())
                })?;
            }
        }

        if skipped {
            return Ok(None);
        }

        if nested && collection {
            return Err(Error::new(
                ident.span(),
                "a field cannot be both `nested` and `collection`",
            ));
        }

        let name = rename.unwrap_or_else(|| rename_rule.apply(&field_ident));
        let shape = if collection || is_sequence(ty) {
            Shape::Collection
        } else {
            Shape::Value
        };

        let nested = if nested {
            if shape == Shape::Collection {
                return Err(Error::new(
                    ty.span(),
                    "`nested` fields must hold a single object, not a sequence",
                ));
            }

            Some(unwrap_wrappers(ty).clone())
        } else {
            None
        };

        Ok(Some(Self {
            ident: field_ident,
            name,
            shape,
            nested,
        }))
    }

    fn to_tokens(&self) -> TokenStream2 {
        let ident = &self.ident;
        let name = &self.name;

        let kind = match (&self.nested, self.shape) {
            (Some(inner), _) => quote! {
                docpatch_core::schema::FieldKind::Object(
                    <#inner as docpatch_core::schema::Schema>::fields
                )
            },
            (None, Shape::Collection) => quote! { docpatch_core::schema::FieldKind::Collection },
            (None, Shape::Value) => quote! { docpatch_core::schema::FieldKind::Value },
        };

        quote! {
            docpatch_core::schema::FieldSchema::new(#ident, #name, #kind)
        }
    }
}

const SEQUENCE_TYPES: &[&str] = &[
    "Vec",
    "VecDeque",
    "LinkedList",
    "HashSet",
    "BTreeSet",
    "BinaryHeap",
];

/// Whether the type, through `Option` and `Box`, is a sequence that can be appended to.
fn is_sequence(ty: &Type) -> bool {
    match unwrap_wrappers(ty) {
        Type::Array(_) | Type::Slice(_) => true,
        Type::Reference(reference) => matches!(*reference.elem, Type::Slice(_)),
        Type::Path(path) if path.qself.is_none() => path
            .path
            .segments
            .last()
            .is_some_and(|segment| SEQUENCE_TYPES.contains(&segment.ident.to_string().as_str())),
        _ => false,
    }
}

/// Strips `Option<_>` and `Box<_>` layers.
fn unwrap_wrappers(ty: &Type) -> &Type {
    let mut current = ty;

    loop {
        match single_type_argument(current, &["Option", "Box"]) {
            Some(inner) => current = inner,
            None => return current,
        }
    }
}

fn single_type_argument<'a>(ty: &'a Type, wrappers: &[&str]) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };

    if path.qself.is_some() {
        return None;
    }

    let segment = path.path.segments.last()?;

    if !wrappers.iter().any(|wrapper| segment.ident == wrapper) {
        return None;
    }

    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };

    match arguments.args.first()? {
        GenericArgument::Type(inner) if arguments.args.len() == 1 => Some(inner),
        _ => None,
    }
}
