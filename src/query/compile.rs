//! Query compilation and schema validation.
//!
//! For every registered entity type the compiler produces a listing
//! document (paginated types only) and a lookup document, each carrying the
//! identity fragment plus the type's field-selection fragments. Everything
//! is checked against the remote schema here, so a bad fragment fails
//! before any sourcing request is made instead of as a remote rejection.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::document::{parse_fragments, print_selections, Field, FragmentDefinition, Selection};
use super::{EntityRegistry, EntityTypeSpec, QueryTemplate};
use crate::error::{Error, Result};
use crate::executor::QueryRequest;
use crate::fragments::FragmentProvider;
use crate::pagination::{PaginationAdapter, ITEMS_FIELD, NEXT_TOKEN_FIELD};
use crate::schema::{RemoteSchema, SchemaField, SchemaType};

/// An executable query document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub operation_name: String,
    pub root_field: String,
    pub variable_names: Vec<String>,
    pub text: String,
}

impl CompiledQuery {
    /// A request executing this document with `variables`.
    #[must_use]
    pub fn request(&self, variables: Map<String, Value>) -> QueryRequest {
        QueryRequest {
            query: self.text.clone(),
            operation_name: self.operation_name.clone(),
            variables,
        }
    }
}

/// Compiled documents of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledEntityType {
    pub spec: EntityTypeSpec,
    /// Listing document; `None` for singletons.
    pub list: Option<CompiledQuery>,
    pub lookup: CompiledQuery,
}

impl CompiledEntityType {
    #[must_use]
    pub fn remote_type(&self) -> &str {
        &self.spec.remote_type_name
    }

    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.spec.is_singleton()
    }
}

/// Every compiled entity type of a run, in registry order.
///
/// Built once before sourcing starts and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcingPlan {
    types: Vec<CompiledEntityType>,
}

impl SourcingPlan {
    pub fn iter(&self) -> impl Iterator<Item = &CompiledEntityType> {
        self.types.iter()
    }

    #[must_use]
    pub fn get(&self, remote_type: &str) -> Option<&CompiledEntityType> {
        self.types.iter().find(|t| t.remote_type() == remote_type)
    }

    /// Types walked by pagination.
    pub fn multi_instance(&self) -> impl Iterator<Item = &CompiledEntityType> {
        self.types.iter().filter(|t| t.list.is_some())
    }

    /// Exactly-one-instance types.
    pub fn singletons(&self) -> impl Iterator<Item = &CompiledEntityType> {
        self.types.iter().filter(|t| t.is_singleton())
    }
}

/// Compiles entity types against one remote schema.
pub struct QueryCompiler<'a> {
    schema: &'a RemoteSchema,
    list_variables: BTreeSet<String>,
}

impl<'a> QueryCompiler<'a> {
    /// Listing templates must bind exactly the adapter's expected variables.
    #[must_use]
    pub fn new(schema: &'a RemoteSchema, adapter: &dyn PaginationAdapter) -> Self {
        Self {
            schema,
            list_variables: adapter
                .expected_variable_names()
                .iter()
                .map(|v| (*v).to_string())
                .collect(),
        }
    }

    /// Compile every registered type with fragments from `fragments`.
    ///
    /// # Errors
    ///
    /// Returns the first fragment or compilation error encountered.
    pub fn compile_all(
        &self,
        registry: &EntityRegistry,
        fragments: &impl FragmentProvider,
    ) -> Result<SourcingPlan> {
        let types = registry
            .iter()
            .map(|spec| {
                let text = fragments.get_fragment(&spec.remote_type_name)?;
                self.compile(spec, &text)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(types = types.len(), "Compiled sourcing queries");
        Ok(SourcingPlan { types })
    }

    /// Compile one entity type with the given fragment document.
    ///
    /// # Errors
    ///
    /// Returns `Compilation` if the fragments do not parse, reference
    /// unknown types, fields or fragments, or if the templates do not fit
    /// the schema's root fields.
    pub fn compile(&self, spec: &EntityTypeSpec, fragment_text: &str) -> Result<CompiledEntityType> {
        let remote_type = spec.remote_type_name.as_str();

        let custom = parse_fragments(fragment_text).map_err(|e| Error::Compilation {
            operation: format!("fragments for {remote_type}"),
            message: e.to_string(),
        })?;
        if !custom.iter().any(|f| f.type_condition == remote_type) {
            return Err(Error::Compilation {
                operation: format!("fragments for {remote_type}"),
                message: format!("no fragment on type `{remote_type}` is defined"),
            });
        }

        let mut fragments = vec![spec.identity_fragment.definition(remote_type)];
        fragments.extend(custom);

        for (i, fragment) in fragments.iter().enumerate() {
            if fragments[..i].iter().any(|f| f.name == fragment.name) {
                return Err(Error::Compilation {
                    operation: format!("fragment {}", fragment.name),
                    message: "fragment is defined more than once".to_string(),
                });
            }
            self.validate_fragment(fragment, &fragments)
                .map_err(|message| Error::Compilation {
                    operation: format!("fragment {}", fragment.name),
                    message,
                })?;
        }

        let root_spreads: Vec<Selection> = fragments
            .iter()
            .filter(|f| f.type_condition == remote_type)
            .map(|f| Selection::spread(&f.name))
            .collect();
        check_all_used(&root_spreads, &fragments)?;

        let lookup = self.compile_lookup(spec, &root_spreads, &fragments)?;
        let list = spec
            .list_query
            .as_ref()
            .map(|template| self.compile_list(remote_type, template, &root_spreads, &fragments))
            .transpose()?;

        debug!(
            remote_type,
            lookup = %lookup.operation_name,
            list = list.as_ref().map(|l| l.operation_name.as_str()),
            "Compiled entity type"
        );

        Ok(CompiledEntityType {
            spec: spec.clone(),
            list,
            lookup,
        })
    }

    fn compile_lookup(
        &self,
        spec: &EntityTypeSpec,
        root_spreads: &[Selection],
        fragments: &[FragmentDefinition],
    ) -> Result<CompiledQuery> {
        let template = &spec.lookup_query;
        let error = |message: String| Error::Compilation {
            operation: template.operation_name.clone(),
            message,
        };

        let field = self.root_field(template).map_err(error)?;
        let returns = field.type_ref.named_type().unwrap_or_default();
        if returns != spec.remote_type_name {
            return Err(error(format!(
                "`{}` returns `{returns}`, not `{}`",
                template.root_field, spec.remote_type_name
            )));
        }

        let variables = variable_definitions(template, field).map_err(error)?;
        let body = vec![Selection::Field(Field {
            arguments: bound_arguments(template),
            selections: root_spreads.to_vec(),
            ..Field::new(&template.root_field)
        })];

        Ok(CompiledQuery {
            operation_name: template.operation_name.clone(),
            root_field: template.root_field.clone(),
            variable_names: template.arguments.clone(),
            text: print_document(&template.operation_name, &variables, &body, fragments),
        })
    }

    fn compile_list(
        &self,
        remote_type: &str,
        template: &QueryTemplate,
        root_spreads: &[Selection],
        fragments: &[FragmentDefinition],
    ) -> Result<CompiledQuery> {
        let error = |message: String| Error::Compilation {
            operation: template.operation_name.clone(),
            message,
        };

        let declared: BTreeSet<String> = template.arguments.iter().cloned().collect();
        if declared != self.list_variables {
            return Err(error(format!(
                "listing variables {declared:?} do not match the pagination adapter's {:?}",
                self.list_variables
            )));
        }

        let field = self.root_field(template).map_err(error)?;
        let connection_name = field.type_ref.named_type().unwrap_or_default();
        let connection = self
            .schema
            .get_type(connection_name)
            .filter(|t| t.kind.is_composite())
            .ok_or_else(|| {
                error(format!(
                    "`{}` returns `{connection_name}`, which is not an object type",
                    template.root_field
                ))
            })?;

        let items = connection.field(ITEMS_FIELD).ok_or_else(|| {
            error(format!("`{connection_name}` has no `{ITEMS_FIELD}` field"))
        })?;
        if !items.type_ref.is_list() || items.type_ref.named_type() != Some(remote_type) {
            return Err(error(format!(
                "`{connection_name}.{ITEMS_FIELD}` is `{}`, expected a list of `{remote_type}`",
                items.type_ref
            )));
        }

        let token_is_leaf = connection
            .field(NEXT_TOKEN_FIELD)
            .and_then(|f| f.type_ref.named_type())
            .and_then(|name| self.schema.kind_of(name))
            .is_some_and(|kind| kind.is_leaf());
        if !token_is_leaf {
            return Err(error(format!(
                "`{connection_name}` has no scalar `{NEXT_TOKEN_FIELD}` field"
            )));
        }

        let variables = variable_definitions(template, field).map_err(error)?;
        let body = vec![Selection::Field(Field {
            arguments: bound_arguments(template),
            selections: vec![
                Selection::field(NEXT_TOKEN_FIELD),
                Selection::object(ITEMS_FIELD, root_spreads.to_vec()),
            ],
            ..Field::new(&template.root_field)
        })];

        Ok(CompiledQuery {
            operation_name: template.operation_name.clone(),
            root_field: template.root_field.clone(),
            variable_names: template.arguments.clone(),
            text: print_document(&template.operation_name, &variables, &body, fragments),
        })
    }

    fn root_field(&self, template: &QueryTemplate) -> std::result::Result<&'a SchemaField, String> {
        self.schema
            .root_field(&template.root_field)
            .ok_or_else(|| format!("unknown root field `{}`", template.root_field))
    }

    fn validate_fragment(
        &self,
        fragment: &FragmentDefinition,
        fragments: &[FragmentDefinition],
    ) -> std::result::Result<(), String> {
        let on = self
            .schema
            .get_type(&fragment.type_condition)
            .ok_or_else(|| format!("unknown type `{}`", fragment.type_condition))?;
        if !on.kind.is_composite() {
            return Err(format!(
                "fragments cannot be defined on non-object type `{}`",
                on.name
            ));
        }
        self.validate_selections(&fragment.selections, on, fragments)
    }

    fn validate_selections(
        &self,
        selections: &[Selection],
        parent: &SchemaType,
        fragments: &[FragmentDefinition],
    ) -> std::result::Result<(), String> {
        for selection in selections {
            match selection {
                Selection::Field(field) => self.validate_field(field, parent, fragments)?,
                Selection::FragmentSpread(name) => {
                    if !fragments.iter().any(|f| &f.name == name) {
                        return Err(format!("unknown fragment `{name}`"));
                    }
                }
                Selection::InlineFragment {
                    type_condition,
                    selections,
                } => {
                    let on = match type_condition {
                        Some(name) => self
                            .schema
                            .get_type(name)
                            .filter(|t| t.kind.is_composite())
                            .ok_or_else(|| format!("unknown object type `{name}`"))?,
                        None => parent,
                    };
                    self.validate_selections(selections, on, fragments)?;
                }
            }
        }
        Ok(())
    }

    fn validate_field(
        &self,
        field: &Field,
        parent: &SchemaType,
        fragments: &[FragmentDefinition],
    ) -> std::result::Result<(), String> {
        if field.name == "__typename" {
            if !field.selections.is_empty() {
                return Err("`__typename` cannot have a selection".to_string());
            }
            return Ok(());
        }

        let definition = parent
            .field(&field.name)
            .ok_or_else(|| format!("unknown field `{}` on type `{}`", field.name, parent.name))?;

        if field.arguments.is_none() && definition.has_required_args() {
            return Err(format!(
                "field `{}.{}` requires arguments",
                parent.name, field.name
            ));
        }

        let named = definition.type_ref.named_type().unwrap_or_default();
        let kind = self
            .schema
            .kind_of(named)
            .ok_or_else(|| format!("unknown type `{named}`"))?;

        if kind.is_leaf() {
            if !field.selections.is_empty() {
                return Err(format!(
                    "field `{}.{}` of type `{named}` cannot have a selection",
                    parent.name, field.name
                ));
            }
            return Ok(());
        }

        if field.selections.is_empty() {
            return Err(format!(
                "field `{}.{}` of type `{named}` must have a selection",
                parent.name, field.name
            ));
        }
        let nested = self
            .schema
            .get_type(named)
            .ok_or_else(|| format!("unknown type `{named}`"))?;
        self.validate_selections(&field.selections, nested, fragments)
    }
}

/// `$name: Type` for each template argument, typed from the root field.
fn variable_definitions(
    template: &QueryTemplate,
    field: &SchemaField,
) -> std::result::Result<Vec<String>, String> {
    for required in field.args.iter().filter(|a| a.type_ref.is_non_null()) {
        if !template.arguments.contains(&required.name) {
            return Err(format!(
                "required argument `{}` of `{}` is not bound",
                required.name, template.root_field
            ));
        }
    }

    template
        .arguments
        .iter()
        .map(|name| {
            field
                .arg(name)
                .map(|arg| format!("${name}: {}", arg.type_ref))
                .ok_or_else(|| format!("`{}` has no argument `{name}`", template.root_field))
        })
        .collect()
}

/// `handle: $handle, locale: $locale`
fn bound_arguments(template: &QueryTemplate) -> Option<String> {
    if template.arguments.is_empty() {
        return None;
    }
    Some(
        template
            .arguments
            .iter()
            .map(|name| format!("{name}: ${name}"))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

fn print_document(
    operation_name: &str,
    variables: &[String],
    body: &[Selection],
    fragments: &[FragmentDefinition],
) -> String {
    let mut out = format!("query {operation_name}");
    if !variables.is_empty() {
        let _ = write!(out, "({})", variables.join(", "));
    }
    out.push_str(" {\n");
    print_selections(body, 1, &mut out);
    out.push('}');

    for fragment in fragments {
        out.push_str("\n\n");
        out.push_str(&fragment.print());
    }
    out.push('\n');
    out
}

fn collect_spreads<'s>(selections: &'s [Selection], out: &mut Vec<&'s str>) {
    for selection in selections {
        match selection {
            Selection::Field(field) => collect_spreads(&field.selections, out),
            Selection::FragmentSpread(name) => out.push(name),
            Selection::InlineFragment { selections, .. } => collect_spreads(selections, out),
        }
    }
}

/// Servers reject documents with unused fragments, so catch them here.
fn check_all_used(root_spreads: &[Selection], fragments: &[FragmentDefinition]) -> Result<()> {
    let mut pending = Vec::new();
    collect_spreads(root_spreads, &mut pending);
    let mut used: BTreeSet<&str> = BTreeSet::new();

    while let Some(name) = pending.pop() {
        if used.insert(name) {
            if let Some(fragment) = fragments.iter().find(|f| f.name == name) {
                collect_spreads(&fragment.selections, &mut pending);
            }
        }
    }

    match fragments.iter().find(|f| !used.contains(f.name.as_str())) {
        Some(unused) => Err(Error::Compilation {
            operation: format!("fragment {}", unused.name),
            message: "fragment is never used".to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::MemoryFragments;
    use crate::pagination::NacellePagination;
    use crate::testing::nacelle_schema;

    fn compile(remote_type: &str, fragment: &str) -> Result<CompiledEntityType> {
        let schema = nacelle_schema();
        let adapter = NacellePagination::new();
        let compiler = QueryCompiler::new(&schema, &adapter);
        let registry = EntityRegistry::nacelle();
        compiler.compile(registry.get(remote_type).unwrap(), fragment)
    }

    fn compile_message(remote_type: &str, fragment: &str) -> String {
        match compile(remote_type, fragment) {
            Err(Error::Compilation { message, .. }) => message,
            other => panic!("expected compilation error, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_product_documents() {
        let compiled = compile("Product", "fragment Product on Product { handle title }").unwrap();

        let list = compiled.list.unwrap();
        assert_eq!(
            list.text,
            "query LIST_PRODUCTS($first: Int, $after: String) {\n\
             \x20 getProducts(first: $first, after: $after) {\n\
             \x20   nextToken\n\
             \x20   items {\n\
             \x20     ..._ProductId_\n\
             \x20     ...Product\n\
             \x20   }\n\
             \x20 }\n\
             }\n\n\
             fragment _ProductId_ on Product {\n\
             \x20 __typename\n\
             \x20 handle\n\
             \x20 locale\n\
             }\n\n\
             fragment Product on Product {\n\
             \x20 handle\n\
             \x20 title\n\
             }\n"
        );

        let lookup = compiled.lookup;
        assert_eq!(lookup.operation_name, "NODE_PRODUCT");
        assert!(lookup
            .text
            .starts_with("query NODE_PRODUCT($handle: String!, $locale: String) {\n  getProductByHandle(handle: $handle, locale: $locale) {"));
    }

    #[test]
    fn test_compile_singleton_has_no_variables() {
        let compiled = compile("Space", "fragment Space on Space { id name }").unwrap();

        assert!(compiled.list.is_none());
        assert!(compiled.is_singleton());
        assert!(compiled.lookup.text.starts_with("query NODE_SPACE {\n  getSpace {\n"));
        assert!(compiled.lookup.variable_names.is_empty());
    }

    #[test]
    fn test_unknown_field_fails() {
        let message = compile_message("Product", "fragment Product on Product { handle nope }");
        assert_eq!(message, "unknown field `nope` on type `Product`");
    }

    #[test]
    fn test_unknown_type_condition_fails() {
        let message = compile_message(
            "Product",
            "fragment Product on Product { handle ...Ghost }\nfragment Ghost on Ghost { id }",
        );
        assert_eq!(message, "unknown type `Ghost`");
    }

    #[test]
    fn test_selection_shape_is_checked() {
        let message = compile_message("Product", "fragment Product on Product { handle { x } }");
        assert!(message.contains("cannot have a selection"));

        let message = compile_message("Product", "fragment Product on Product { featuredMedia }");
        assert!(message.contains("must have a selection"));

        let message = compile_message("Product", "fragment Product on Product { metafield { value } }");
        assert!(message.contains("requires arguments"));
    }

    #[test]
    fn test_spreads_must_resolve_and_be_used() {
        let message = compile_message("Product", "fragment Product on Product { ...Missing }");
        assert_eq!(message, "unknown fragment `Missing`");

        let err = compile(
            "Product",
            "fragment Product on Product { handle }\nfragment Media on Media { src }",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Compilation { operation, .. } if operation == "fragment Media"));
    }

    #[test]
    fn test_helper_fragments_are_included() {
        let compiled = compile(
            "Product",
            "fragment Product on Product { featuredMedia { ...Media } }\nfragment Media on Media { src }",
        )
        .unwrap();
        assert!(compiled.lookup.text.contains("fragment Media on Media {\n  src\n}"));
        assert!(compiled
            .lookup
            .text
            .contains("locale: $locale) {\n    ..._ProductId_\n    ...Product\n  }\n}"));
    }

    #[test]
    fn test_fragment_on_other_type_only_fails() {
        let message = compile_message("Product", "fragment Media on Media { src }");
        assert!(message.contains("no fragment on type `Product`"));
    }

    #[test]
    fn test_listing_variables_must_match_adapter() {
        let schema = nacelle_schema();
        let adapter = NacellePagination::new();
        let compiler = QueryCompiler::new(&schema, &adapter);
        let mut spec = EntityRegistry::nacelle().get("Product").unwrap().clone();
        spec.list_query = Some(QueryTemplate::new("LIST_PRODUCTS", "getProducts", &["first"]));

        let err = compiler
            .compile(&spec, "fragment Product on Product { handle }")
            .unwrap_err();
        assert!(matches!(err, Error::Compilation { message, .. } if message.contains("pagination adapter")));
    }

    #[test]
    fn test_lookup_root_field_must_return_entity() {
        let schema = nacelle_schema();
        let adapter = NacellePagination::new();
        let compiler = QueryCompiler::new(&schema, &adapter);
        let mut spec = EntityRegistry::nacelle().get("Product").unwrap().clone();
        spec.lookup_query = QueryTemplate::new("NODE_PRODUCT", "getSpace", &[]);

        let err = compiler
            .compile(&spec, "fragment Product on Product { handle }")
            .unwrap_err();
        assert!(matches!(err, Error::Compilation { message, .. } if message.contains("returns `Space`")));
    }

    #[test]
    fn test_required_argument_must_be_bound() {
        let schema = nacelle_schema();
        let adapter = NacellePagination::new();
        let compiler = QueryCompiler::new(&schema, &adapter);
        let mut spec = EntityRegistry::nacelle().get("Product").unwrap().clone();
        spec.lookup_query = QueryTemplate::new("NODE_PRODUCT", "getProductByHandle", &["locale"]);

        let err = compiler
            .compile(&spec, "fragment Product on Product { handle }")
            .unwrap_err();
        assert!(matches!(err, Error::Compilation { message, .. } if message.contains("`handle`")));
    }

    #[test]
    fn test_compile_all_with_generated_fragments() {
        let schema = nacelle_schema();
        let adapter = NacellePagination::new();
        let compiler = QueryCompiler::new(&schema, &adapter);
        let plan = compiler
            .compile_all(&EntityRegistry::nacelle(), &MemoryFragments::generated(&schema))
            .unwrap();

        assert_eq!(plan.multi_instance().count(), 2);
        assert_eq!(plan.singletons().count(), 1);
        assert!(plan.get("Collection").unwrap().list.is_some());
    }
}
