//! Query templates, the entity registry and query compilation.
//!
//! Each remote entity type is registered once with its operation templates
//! and identity fragment. The [`QueryCompiler`] combines those with the
//! field-selection fragments into executable documents, validated against
//! the remote schema before any sourcing traffic is sent.

pub mod compile;
pub mod document;

pub use compile::{CompiledEntityType, CompiledQuery, QueryCompiler, SourcingPlan};
pub use document::{parse_fragments, Field, FragmentDefinition, Selection};

/// An operation over one root field, with arguments bound to same-named variables.
///
/// `QueryTemplate::new("NODE_PRODUCT", "getProductByHandle", &["handle", "locale"])`
/// compiles to `getProductByHandle(handle: $handle, locale: $locale)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    pub operation_name: String,
    pub root_field: String,
    pub arguments: Vec<String>,
}

impl QueryTemplate {
    #[must_use]
    pub fn new(operation_name: &str, root_field: &str, arguments: &[&str]) -> Self {
        Self {
            operation_name: operation_name.to_string(),
            root_field: root_field.to_string(),
            arguments: arguments.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

/// The minimal selection that identifies an instance, e.g.
/// `fragment _ProductId_ on Product { __typename handle locale }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRef {
    pub name: String,
    pub fields: Vec<String>,
}

impl FragmentRef {
    #[must_use]
    pub fn new(name: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    /// The fragment definition for `remote_type`.
    #[must_use]
    pub fn definition(&self, remote_type: &str) -> FragmentDefinition {
        FragmentDefinition {
            name: self.name.clone(),
            type_condition: remote_type.to_string(),
            selections: self.fields.iter().map(|f| Selection::field(f)).collect(),
        }
    }
}

/// Registration of one remote entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeSpec {
    pub remote_type_name: String,
    /// Paginated listing; `None` for singletons.
    pub list_query: Option<QueryTemplate>,
    /// Lookup by natural key; no arguments for singletons.
    pub lookup_query: QueryTemplate,
    pub identity_fragment: FragmentRef,
}

impl EntityTypeSpec {
    /// Exactly-one-instance types: no listing, lookup takes no key.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.list_query.is_none() && self.lookup_query.arguments.is_empty()
    }
}

/// The immutable set of entity types sourced in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRegistry {
    types: Vec<EntityTypeSpec>,
}

impl EntityRegistry {
    /// Products, collections and the space singleton.
    #[must_use]
    pub fn nacelle() -> Self {
        Self {
            types: vec![
                EntityTypeSpec {
                    remote_type_name: "Product".to_string(),
                    list_query: Some(QueryTemplate::new(
                        "LIST_PRODUCTS",
                        "getProducts",
                        &["first", "after"],
                    )),
                    lookup_query: QueryTemplate::new(
                        "NODE_PRODUCT",
                        "getProductByHandle",
                        &["handle", "locale"],
                    ),
                    identity_fragment: FragmentRef::new(
                        "_ProductId_",
                        &["__typename", "handle", "locale"],
                    ),
                },
                EntityTypeSpec {
                    remote_type_name: "Collection".to_string(),
                    list_query: Some(QueryTemplate::new(
                        "LIST_COLLECTION",
                        "getCollections",
                        &["first", "after"],
                    )),
                    lookup_query: QueryTemplate::new(
                        "NODE_COLLECTION",
                        "getCollectionByHandle",
                        &["handle", "locale"],
                    ),
                    identity_fragment: FragmentRef::new(
                        "_CollectionId_",
                        &["__typename", "handle", "locale"],
                    ),
                },
                EntityTypeSpec {
                    remote_type_name: "Space".to_string(),
                    list_query: None,
                    lookup_query: QueryTemplate::new("NODE_SPACE", "getSpace", &[]),
                    identity_fragment: FragmentRef::new("_SpaceId_", &["__typename", "id"]),
                },
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityTypeSpec> {
        self.types.iter()
    }

    #[must_use]
    pub fn get(&self, remote_type_name: &str) -> Option<&EntityTypeSpec> {
        self.types
            .iter()
            .find(|t| t.remote_type_name == remote_type_name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.types
            .iter()
            .map(|t| t.remote_type_name.as_str())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
