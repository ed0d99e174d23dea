//! Typed property selectors and property path extraction.
//!
//! A [`Selector<T>`] is a field-access expression over a root type `T`, written as Rust
//! closure text and parsed once at construction:
//!
//! ```ignore
//! use docpatch::select;
//!
//! let city = select!(Customer, |c| c.address.city)?;
//! assert_eq!(city.extract()?.as_slice(), ["address", "city"]);
//!
//! // A single widening conversion around the final access is looked through.
//! let count = select!(Customer, |c| c.visits as i64)?;
//! ```
//!
//! Extraction only accepts a pure chain of named field accesses rooted at the closure
//! parameter. Method calls, indexers, arithmetic, tuple indices, and fields that are not
//! present in the type's [`Schema`] raise [`DocumentStoreError::InvalidSelector`].

use std::{fmt, marker::PhantomData};

use syn::{Expr, Member, Pat, ext::IdentExt};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    schema::{FieldSchema, Schema, find_field},
};

/// Builds a [`Selector`] from a closure over the given root type.
///
/// The closure is never executed; its source text is parsed and validated.
///
/// ```ignore
/// let selector = select!(BlogPost, |p| p.author.name)?;
/// ```
#[macro_export]
macro_rules! select {
    ($ty:ty, $($selector:tt)+) => {
        $crate::selector::Selector::<$ty>::parse(stringify!($($selector)+))
    };
}

/// An ordered, non-empty sequence of stored field names from root to leaf.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath(Vec<String>);

impl PropertyPath {
    /// Creates a property path from field names.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ArgumentNull`] if the path or any of its names is empty.
    pub fn new<I, S>(names: I) -> DocumentStoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect::<Vec<String>>();

        if names.is_empty() || names.iter().any(String::is_empty) {
            return Err(DocumentStoreError::ArgumentNull("path"));
        }

        Ok(Self(names))
    }

    /// Returns the field names root-first.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of levels in the path. Always at least one.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last (leaf) field name.
    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// Iterates over field names root-first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Owned expression tree lowered from the parsed selector text.
#[derive(Debug, Clone, PartialEq)]
enum SelectorExpr {
    Parameter(String),
    Member {
        target: Box<SelectorExpr>,
        member: String,
    },
    TupleIndex {
        target: Box<SelectorExpr>,
        index: u32,
    },
    Convert {
        operand: Box<SelectorExpr>,
    },
    MethodCall {
        method: String,
    },
    Index,
    Other(&'static str),
}

impl SelectorExpr {
    fn lower(expr: &Expr) -> Self {
        match expr {
            Expr::Paren(paren) => Self::lower(&paren.expr),
            Expr::Group(group) => Self::lower(&group.expr),
            Expr::Path(path) => match path.path.get_ident() {
                Some(ident) if path.qself.is_none() => Self::Parameter(ident.to_string()),
                _ => Self::Other("path expression"),
            },
            Expr::Field(field) => {
                let target = Box::new(Self::lower(&field.base));

                match &field.member {
                    Member::Named(ident) => Self::Member {
                        target,
                        member: ident.unraw().to_string(),
                    },
                    Member::Unnamed(index) => Self::TupleIndex {
                        target,
                        index: index.index,
                    },
                }
            }
            Expr::Cast(cast) => Self::Convert {
                operand: Box::new(Self::lower(&cast.expr)),
            },
            Expr::MethodCall(call) => Self::MethodCall {
                method: call.method.to_string(),
            },
            Expr::Index(_) => Self::Index,
            Expr::Call(_) => Self::Other("function call"),
            Expr::Binary(_) => Self::Other("binary expression"),
            Expr::Unary(_) => Self::Other("unary expression"),
            Expr::Lit(_) => Self::Other("literal"),
            Expr::Reference(_) => Self::Other("reference expression"),
            _ => Self::Other("unsupported expression"),
        }
    }
}

/// A field-access selector over the root type `T`.
///
/// Selectors are immutable and can be resolved any number of times.
pub struct Selector<T> {
    source: String,
    parameter: Option<String>,
    body: SelectorExpr,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Selector<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            parameter: self.parameter.clone(),
            body: self.body.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("source", &self.source)
            .finish()
    }
}

impl<T> fmt::Display for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A resolved selector: the stored path and the schema entry of its leaf field.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedSelector {
    pub(crate) path: PropertyPath,
    pub(crate) leaf: &'static FieldSchema,
}

impl<T: Schema> Selector<T> {
    /// Parses selector text.
    ///
    /// Accepts a single-parameter closure (`|x| x.a.b`, `|x: T| x.a.b as Value`) or a bare
    /// access chain (`x.a.b`). The shape of the expression is checked by [`Selector::extract`].
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ArgumentNull`] for empty text and
    /// [`DocumentStoreError::InvalidSelector`] for text that is not a Rust expression or a
    /// closure with other than one parameter.
    pub fn parse(source: &str) -> DocumentStoreResult<Self> {
        let source = source.trim();

        if source.is_empty() {
            return Err(DocumentStoreError::ArgumentNull("selector"));
        }

        let expr = syn::parse_str::<Expr>(source)
            .map_err(|err| DocumentStoreError::invalid_selector(source, err.to_string()))?;

        let (parameter, body) = match &expr {
            Expr::Closure(closure) => {
                if closure.inputs.len() != 1 {
                    return Err(DocumentStoreError::invalid_selector(
                        source,
                        "selector closures take exactly one parameter",
                    ));
                }

                let parameter = closure_parameter(&closure.inputs[0]).ok_or_else(|| {
                    DocumentStoreError::invalid_selector(
                        source,
                        "selector parameter must be a plain identifier",
                    )
                })?;

                (Some(parameter), SelectorExpr::lower(&closure.body))
            }
            other => (None, SelectorExpr::lower(other)),
        };

        Ok(Self {
            source: source.to_string(),
            parameter,
            body,
            _marker: PhantomData,
        })
    }

    /// The selector source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Resolves the selector into stored field names, root to leaf.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidSelector`] if the expression is not a pure chain
    /// of field accesses or names a member that is not a data field of `T`.
    pub fn extract(&self) -> DocumentStoreResult<PropertyPath> {
        Ok(self.resolve()?.path)
    }

    pub(crate) fn resolve(&self) -> DocumentStoreResult<ResolvedSelector> {
        // One widening conversion around the final access is allowed.
        let body = match &self.body {
            SelectorExpr::Convert { operand } => operand.as_ref(),
            other => other,
        };

        if !matches!(body, SelectorExpr::Member { .. }) {
            return Err(self.not_a_property_selector(body));
        }

        let mut idents = Vec::new();
        self.collect_members(body, &mut idents)?;

        let mut fields = T::fields();
        let mut names = Vec::with_capacity(idents.len());
        let mut leaf = None;

        for (position, ident) in idents.iter().enumerate() {
            let field = find_field(fields, ident).ok_or_else(|| {
                DocumentStoreError::invalid_selector(
                    &self.source,
                    format!("`{ident}` is not a data field of the selected type"),
                )
            })?;

            names.push(field.name().to_string());

            if position + 1 < idents.len() {
                fields = field.nested().ok_or_else(|| {
                    DocumentStoreError::invalid_selector(
                        &self.source,
                        format!("`{ident}` is not a nested object and cannot be descended into"),
                    )
                })?;
            }

            leaf = Some(field);
        }

        let leaf = leaf.ok_or_else(|| {
            DocumentStoreError::invalid_selector(&self.source, "selector selects no field")
        })?;

        Ok(ResolvedSelector {
            path: PropertyPath(names),
            leaf,
        })
    }

    fn collect_members(
        &self,
        expr: &SelectorExpr,
        idents: &mut Vec<String>,
    ) -> DocumentStoreResult<()> {
        match expr {
            SelectorExpr::Member { target, member } => {
                self.collect_members(target, idents)?;
                idents.push(member.clone());

                Ok(())
            }
            SelectorExpr::Parameter(name) => match &self.parameter {
                Some(parameter) if parameter != name => Err(DocumentStoreError::invalid_selector(
                    &self.source,
                    format!("selector must start at its parameter `{parameter}`, not `{name}`"),
                )),
                _ => Ok(()),
            },
            other => Err(self.not_a_property_selector(other)),
        }
    }

    fn not_a_property_selector(&self, expr: &SelectorExpr) -> DocumentStoreError {
        let reason = match expr {
            SelectorExpr::Parameter(_) => "the expression selects the root itself, not a field".to_string(),
            SelectorExpr::TupleIndex { index, .. } => {
                format!("tuple index `{index}` is not a named data field")
            }
            SelectorExpr::Convert { .. } => "only a single conversion is allowed".to_string(),
            SelectorExpr::MethodCall { method } => format!("method call `{method}()` is not a field access"),
            SelectorExpr::Index => "indexers are not field accesses".to_string(),
            SelectorExpr::Other(kind) => format!("{kind} is not a field access"),
            SelectorExpr::Member { .. } => "the expression is not a property selector".to_string(),
        };

        DocumentStoreError::invalid_selector(&self.source, reason)
    }
}

fn closure_parameter(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(ident) if ident.subpat.is_none() => Some(ident.ident.to_string()),
        Pat::Type(typed) => closure_parameter(&typed.pat),
        _ => None,
    }
}
