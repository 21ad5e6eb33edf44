//! Default fragment generation from the remote schema.

use crate::error::{Error, Result};
use crate::query::{FragmentDefinition, Selection};
use crate::schema::{RemoteSchema, SchemaType, TypeKind};

/// How many object levels below the entity a default fragment expands.
pub const MAX_DEPTH: usize = 3;

const GENERATED_HEADER: &str =
    "# Generated by nsrc from the remote schema.\n# Edit freely: this file is never overwritten.\n";

/// Build the default fragment for `remote_type`.
///
/// Selects every leaf field that takes no required arguments, and expands
/// object and interface fields up to [`MAX_DEPTH`] levels, skipping types
/// already on the current path and fields whose expansion comes out empty.
/// Union-typed fields are left out.
///
/// # Errors
///
/// Returns `Compilation` if the type is unknown or not an object type, or
/// if nothing on it is selectable.
pub fn default_fragment(schema: &RemoteSchema, remote_type: &str) -> Result<FragmentDefinition> {
    let compile_error = |message: String| Error::Compilation {
        operation: format!("fragment {remote_type}"),
        message,
    };

    let schema_type = schema
        .get_type(remote_type)
        .ok_or_else(|| compile_error(format!("unknown type `{remote_type}`")))?;

    if !matches!(schema_type.kind, TypeKind::Object | TypeKind::Interface) {
        return Err(compile_error(format!(
            "`{remote_type}` is not an object type"
        )));
    }

    let mut path = vec![remote_type.to_string()];
    let selections = select_fields(schema, schema_type, 0, &mut path);
    if selections.is_empty() {
        return Err(compile_error(format!(
            "`{remote_type}` has no selectable fields"
        )));
    }

    Ok(FragmentDefinition {
        name: remote_type.to_string(),
        type_condition: remote_type.to_string(),
        selections,
    })
}

/// The default fragment rendered as a fragment file.
///
/// # Errors
///
/// Same as [`default_fragment`].
pub fn default_fragment_text(schema: &RemoteSchema, remote_type: &str) -> Result<String> {
    let fragment = default_fragment(schema, remote_type)?;
    Ok(format!("{GENERATED_HEADER}{}\n", fragment.print()))
}

fn select_fields(
    schema: &RemoteSchema,
    schema_type: &SchemaType,
    depth: usize,
    path: &mut Vec<String>,
) -> Vec<Selection> {
    let mut selections = Vec::new();

    for field in &schema_type.fields {
        if field.has_required_args() {
            continue;
        }
        let Some(named) = field.type_ref.named_type() else {
            continue;
        };
        let kind = schema
            .kind_of(named)
            .unwrap_or_else(|| field.type_ref.named_kind());

        if kind.is_leaf() {
            selections.push(Selection::field(&field.name));
            continue;
        }

        if !matches!(kind, TypeKind::Object | TypeKind::Interface)
            || depth + 1 > MAX_DEPTH
            || path.iter().any(|p| p == named)
        {
            continue;
        }

        let Some(nested_type) = schema.get_type(named) else {
            continue;
        };

        path.push(named.to_string());
        let nested = select_fields(schema, nested_type, depth + 1, path);
        path.pop();

        if !nested.is_empty() {
            selections.push(Selection::object(&field.name, nested));
        }
    }

    selections
}
