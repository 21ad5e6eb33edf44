//! Shared test fixtures: a Nacelle-shaped schema and a scripted executor.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::executor::{QueryExecutor, QueryRequest};
use crate::schema::RemoteSchema;

fn named(kind: &str, name: &str) -> Value {
    json!({"kind": kind, "name": name, "ofType": null})
}

fn scalar(name: &str) -> Value {
    named("SCALAR", name)
}

fn object(name: &str) -> Value {
    named("OBJECT", name)
}

fn list(inner: Value) -> Value {
    json!({"kind": "LIST", "name": null, "ofType": inner})
}

fn non_null(inner: Value) -> Value {
    json!({"kind": "NON_NULL", "name": null, "ofType": inner})
}

fn arg(name: &str, type_ref: Value) -> Value {
    json!({"name": name, "type": type_ref})
}

fn field(name: &str, type_ref: Value) -> Value {
    json!({"name": name, "args": [], "type": type_ref})
}

fn field_with_args(name: &str, args: Vec<Value>, type_ref: Value) -> Value {
    json!({"name": name, "args": args, "type": type_ref})
}

fn object_type(name: &str, fields: Vec<Value>) -> Value {
    json!({"kind": "OBJECT", "name": name, "fields": fields})
}

fn scalar_type(name: &str) -> Value {
    json!({"kind": "SCALAR", "name": name, "fields": null})
}

/// Introspection `data` for a small Nacelle-like schema.
pub fn nacelle_introspection() -> Value {
    let listing_args = || vec![arg("first", scalar("Int")), arg("after", scalar("String"))];
    let lookup_args = || {
        vec![
            arg("handle", non_null(scalar("String"))),
            arg("locale", scalar("String")),
        ]
    };

    json!({
        "__schema": {
            "queryType": {"name": "Query"},
            "types": [
                object_type("Query", vec![
                    field_with_args("getProducts", listing_args(), object("ProductConnection")),
                    field_with_args("getCollections", listing_args(), object("CollectionConnection")),
                    field_with_args("getProductByHandle", lookup_args(), object("Product")),
                    field_with_args("getCollectionByHandle", lookup_args(), object("Collection")),
                    field("getSpace", object("Space")),
                ]),
                object_type("ProductConnection", vec![
                    field("items", list(object("Product"))),
                    field("nextToken", scalar("String")),
                ]),
                object_type("CollectionConnection", vec![
                    field("items", list(object("Collection"))),
                    field("nextToken", scalar("String")),
                ]),
                object_type("Product", vec![
                    field("id", non_null(scalar("ID"))),
                    field("handle", scalar("String")),
                    field("locale", scalar("String")),
                    field("title", scalar("String")),
                    field("featuredMedia", object("Media")),
                    field_with_args(
                        "metafield",
                        vec![
                            arg("namespace", non_null(scalar("String"))),
                            arg("key", non_null(scalar("String"))),
                        ],
                        object("Metafield"),
                    ),
                    field("collections", list(object("Collection"))),
                ]),
                object_type("Media", vec![
                    field("src", scalar("String")),
                    field("altText", scalar("String")),
                ]),
                object_type("Metafield", vec![
                    field("key", scalar("String")),
                    field("value", scalar("String")),
                ]),
                object_type("Collection", vec![
                    field("id", non_null(scalar("ID"))),
                    field("handle", scalar("String")),
                    field("locale", scalar("String")),
                    field("title", scalar("String")),
                    field("products", list(object("Product"))),
                ]),
                object_type("Space", vec![
                    field("id", non_null(scalar("ID"))),
                    field("name", scalar("String")),
                    field("domain", scalar("String")),
                ]),
                scalar_type("String"),
                scalar_type("Int"),
                scalar_type("Boolean"),
                scalar_type("ID"),
                object_type("__Type", vec![field("name", scalar("String"))]),
            ]
        }
    })
}

pub fn nacelle_schema() -> RemoteSchema {
    RemoteSchema::from_introspection(&nacelle_introspection()).unwrap()
}

/// `data` of a listing response under `root_field`.
pub fn listing(root_field: &str, items: Vec<Value>, next_token: Option<&str>) -> Value {
    json!({ root_field: { "items": items, "nextToken": next_token } })
}

/// Listing items keyed `<prefix>-<n>` in the `en-US` locale.
pub fn handles(prefix: &str, range: std::ops::Range<usize>) -> Vec<Value> {
    range
        .map(|i| json!({"handle": format!("{prefix}-{i}"), "locale": "en-US", "title": format!("{prefix} {i}")}))
        .collect()
}

/// Executor replaying scripted responses per operation name, in order.
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<Value, String>>>>,
    calls: Mutex<Vec<QueryRequest>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, operation: &str, data: Value) -> Self {
        self.push(operation, Ok(data));
        self
    }

    pub fn fail(self, operation: &str, message: &str) -> Self {
        self.push(operation, Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<QueryRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Operation names of the calls made so far.
    pub fn operations(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.operation_name).collect()
    }

    fn push(&self, operation: &str, response: std::result::Result<Value, String>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(operation.to_string())
            .or_default()
            .push_back(response);
    }
}

impl QueryExecutor for ScriptedExecutor {
    async fn execute(&self, request: &QueryRequest) -> Result<Value> {
        self.calls.lock().unwrap().push(request.clone());
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.operation_name)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Ok(data)) => Ok(data),
            Some(Err(message)) => Err(Error::Transport(message)),
            None => Err(Error::Transport(format!(
                "no scripted response for {}",
                request.operation_name
            ))),
        }
    }
}
