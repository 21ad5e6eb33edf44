//! Per-call logging decorator.

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{QueryExecutor, QueryRequest};
use crate::error::Result;

/// Wraps an executor and logs every call.
///
/// With `verbose` set the operation name and variables of each call are
/// logged at `info`; otherwise they only show up at `debug`.
pub struct LoggingExecutor<E> {
    inner: E,
    verbose: bool,
}

impl<E: QueryExecutor> LoggingExecutor<E> {
    #[must_use]
    pub fn new(inner: E, verbose: bool) -> Self {
        Self { inner, verbose }
    }

    #[must_use]
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: QueryExecutor> QueryExecutor for LoggingExecutor<E> {
    async fn execute(&self, request: &QueryRequest) -> Result<Value> {
        let variables = Value::Object(request.variables.clone());
        if self.verbose {
            info!(operation = %request.operation_name, %variables, "Executing");
        } else {
            debug!(operation = %request.operation_name, %variables, "Executing");
        }

        let started = Instant::now();
        let result = self.inner.execute(request).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(_) => debug!(operation = %request.operation_name, elapsed_ms, "Completed"),
            Err(e) => warn!(operation = %request.operation_name, elapsed_ms, error = %e, "Failed"),
        }

        result
    }
}
