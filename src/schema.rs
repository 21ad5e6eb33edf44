//! Remote schema model, loaded by introspection.
//!
//! Only what query compilation needs is kept: object-like types, their
//! fields, field arguments and type references. The schema is loaded once
//! per run and shared read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::executor::{QueryExecutor, QueryRequest};

/// Operation name of the introspection query.
pub const INTROSPECTION_OPERATION: &str = "IntrospectionQuery";

/// Introspection query, three wrapper levels deep (e.g. `[String!]!`).
pub const INTROSPECTION_QUERY: &str = r"query IntrospectionQuery {
  __schema {
    queryType { name }
    types {
      kind
      name
      fields(includeDeprecated: true) {
        name
        args { name type { ...TypeRef } }
        type { ...TypeRef }
      }
    }
  }
}
fragment TypeRef on __Type {
  kind
  name
  ofType { kind name ofType { kind name ofType { kind name ofType { kind name } } } }
}";

/// GraphQL type kinds as reported by introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

impl TypeKind {
    /// Leaf types are selected without a sub-selection.
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        matches!(self, Self::Scalar | Self::Enum)
    }

    /// Types whose fields can be selected.
    #[must_use]
    pub const fn is_composite(self) -> bool {
        matches!(self, Self::Object | Self::Interface | Self::Union)
    }
}

/// A (possibly wrapped) reference to a named type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    pub kind: TypeKind,
    pub name: Option<String>,
    pub of_type: Option<Box<TypeRef>>,
}

impl TypeRef {
    #[must_use]
    pub fn named(kind: TypeKind, name: &str) -> Self {
        Self {
            kind,
            name: Some(name.to_string()),
            of_type: None,
        }
    }

    #[must_use]
    pub fn list(inner: Self) -> Self {
        Self {
            kind: TypeKind::List,
            name: None,
            of_type: Some(Box::new(inner)),
        }
    }

    #[must_use]
    pub fn non_null(inner: Self) -> Self {
        Self {
            kind: TypeKind::NonNull,
            name: None,
            of_type: Some(Box::new(inner)),
        }
    }

    /// Name of the innermost named type.
    #[must_use]
    pub fn named_type(&self) -> Option<&str> {
        match (&self.name, &self.of_type) {
            (Some(name), _) => Some(name),
            (None, Some(inner)) => inner.named_type(),
            (None, None) => None,
        }
    }

    /// Kind of the innermost named type.
    #[must_use]
    pub fn named_kind(&self) -> TypeKind {
        match (&self.kind, &self.of_type) {
            (TypeKind::List | TypeKind::NonNull, Some(inner)) => inner.named_kind(),
            (kind, _) => *kind,
        }
    }

    #[must_use]
    pub fn is_non_null(&self) -> bool {
        self.kind == TypeKind::NonNull
    }

    /// Whether the reference is a list, looking through non-null.
    #[must_use]
    pub fn is_list(&self) -> bool {
        match (&self.kind, &self.of_type) {
            (TypeKind::List, _) => true,
            (TypeKind::NonNull, Some(inner)) => inner.is_list(),
            _ => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.of_type, &self.name) {
            (TypeKind::NonNull, Some(inner), _) => write!(f, "{inner}!"),
            (TypeKind::List, Some(inner), _) => write!(f, "[{inner}]"),
            (_, _, Some(name)) => f.write_str(name),
            _ => f.write_str("?"),
        }
    }
}

/// An argument of a field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputValue {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
}

/// A field of an object or interface type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(default)]
    pub args: Vec<InputValue>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
}

impl SchemaField {
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&InputValue> {
        self.args.iter().find(|a| a.name == name)
    }

    /// Whether the field can be selected without passing arguments.
    #[must_use]
    pub fn has_required_args(&self) -> bool {
        self.args.iter().any(|a| a.type_ref.is_non_null())
    }
}

/// A named type of the remote schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchemaType {
    pub kind: TypeKind,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fields: Vec<SchemaField>,
}

impl SchemaType {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<SchemaField>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<SchemaField>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionData {
    #[serde(rename = "__schema")]
    schema: IntrospectionSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionSchema {
    query_type: NamedRef,
    types: Vec<SchemaType>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

/// The remote schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSchema {
    query_type: String,
    types: BTreeMap<String, SchemaType>,
}

impl RemoteSchema {
    /// Build a schema from the query root name and its types.
    #[must_use]
    pub fn new(query_type: &str, types: impl IntoIterator<Item = SchemaType>) -> Self {
        Self {
            query_type: query_type.to_string(),
            types: types.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Build a schema from the `data` of an introspection response.
    ///
    /// Introspection meta types (`__Type`, `__Field`, ...) are dropped.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the payload is not an introspection result.
    pub fn from_introspection(data: &Value) -> Result<Self> {
        let parsed: IntrospectionData = serde_json::from_value(data.clone()).map_err(|e| {
            Error::Transport(format!("Invalid introspection result: {e}"))
        })?;

        let types = parsed
            .schema
            .types
            .into_iter()
            .filter(|t| !t.name.starts_with("__"));

        Ok(Self::new(&parsed.schema.query_type.name, types))
    }

    /// Load the schema from the remote endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the introspection call fails or returns garbage.
    pub async fn load<E: QueryExecutor>(executor: &E) -> Result<Self> {
        let request = QueryRequest::new(INTROSPECTION_OPERATION, INTROSPECTION_QUERY, Map::new());
        let data = executor.execute(&request).await?;
        let schema = Self::from_introspection(&data)?;
        debug!(types = schema.types.len(), "Loaded remote schema");
        Ok(schema)
    }

    #[must_use]
    pub fn query_type(&self) -> Option<&SchemaType> {
        self.types.get(&self.query_type)
    }

    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&SchemaType> {
        self.types.get(name)
    }

    /// A field of the query root.
    #[must_use]
    pub fn root_field(&self, name: &str) -> Option<&SchemaField> {
        self.query_type().and_then(|q| q.field(name))
    }

    /// Kind of a named type, treating the built-in scalars as known.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<TypeKind> {
        self.types.get(name).map(|t| t.kind).or_else(|| {
            matches!(name, "String" | "Int" | "Float" | "Boolean" | "ID").then_some(TypeKind::Scalar)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::nacelle_schema;

    #[test]
    fn test_type_ref_display() {
        let t = TypeRef::non_null(TypeRef::list(TypeRef::non_null(TypeRef::named(
            TypeKind::Scalar,
            "String",
        ))));
        assert_eq!(t.to_string(), "[String!]!");
        assert_eq!(t.named_type(), Some("String"));
        assert_eq!(t.named_kind(), TypeKind::Scalar);
        assert!(t.is_list());
        assert!(t.is_non_null());
    }

    #[test]
    fn test_from_introspection() {
        let schema = nacelle_schema();

        let products = schema.root_field("getProducts").unwrap();
        assert_eq!(products.arg("first").unwrap().type_ref.to_string(), "Int");
        assert_eq!(products.type_ref.named_type(), Some("ProductConnection"));

        let product = schema.get_type("Product").unwrap();
        assert_eq!(product.kind, TypeKind::Object);
        assert!(product.field("handle").is_some());

        assert!(schema.get_type("__Type").is_none());
    }

    #[test]
    fn test_kind_of_builtin_scalars() {
        let schema = nacelle_schema();
        assert_eq!(schema.kind_of("String"), Some(TypeKind::Scalar));
        assert_eq!(schema.kind_of("Product"), Some(TypeKind::Object));
        assert_eq!(schema.kind_of("Nope"), None);
    }

    #[test]
    fn test_from_introspection_rejects_garbage() {
        let err = RemoteSchema::from_introspection(&serde_json::json!({"nope": true})).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
