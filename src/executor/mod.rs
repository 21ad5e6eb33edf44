//! Query execution against the remote GraphQL endpoint.
//!
//! The [`QueryExecutor`] trait is the only seam through which the pipeline
//! talks to the network. [`HttpExecutor`] is the real implementation and
//! [`LoggingExecutor`] adds per-call logging on top of any executor.

mod http;
mod logging;

pub use http::{HttpExecutor, SPACE_ID_HEADER, SPACE_TOKEN_HEADER};
pub use logging::LoggingExecutor;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// A named operation with its variables.
///
/// Serializes to the wire body `{ query, operationName, variables }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    pub operation_name: String,
    pub variables: Map<String, Value>,
}

impl QueryRequest {
    #[must_use]
    pub fn new(operation_name: &str, query: &str, variables: Map<String, Value>) -> Self {
        Self {
            query: query.to_string(),
            operation_name: operation_name.to_string(),
            variables,
        }
    }
}

/// Sends operations to the remote source.
///
/// Implementations return the response's `data` value, or an error whose
/// message is the remote error verbatim.
pub trait QueryExecutor: Send + Sync {
    /// Execute one operation.
    fn execute(&self, request: &QueryRequest) -> impl std::future::Future<Output = Result<Value>> + Send;
}

impl<E: QueryExecutor> QueryExecutor for &E {
    fn execute(&self, request: &QueryRequest) -> impl std::future::Future<Output = Result<Value>> + Send {
        (**self).execute(request)
    }
}
