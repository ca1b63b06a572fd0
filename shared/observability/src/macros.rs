//! Convenience macros for common logging patterns in the retrieval core.
//!
//! These macros provide consistent, low-ceremony tracing for hot paths.

/// Log a function entry with arguments (for debugging)
#[macro_export]
macro_rules! log_fn_entry {
    ($fn_name:expr) => {
        tracing::debug!(target: "function", fn_name = $fn_name, "→ entering");
    };
    ($fn_name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::debug!(target: "function", fn_name = $fn_name, $($key = ?$value),*, "→ entering");
    };
}

/// Log a function exit with optional result
#[macro_export]
macro_rules! log_fn_exit {
    ($fn_name:expr) => {
        tracing::debug!(target: "function", fn_name = $fn_name, "← exiting");
    };
    ($fn_name:expr, $result:expr) => {
        tracing::debug!(target: "function", fn_name = $fn_name, result = ?$result, "← exiting");
    };
}

/// Log a timed operation (measures and logs duration)
#[macro_export]
macro_rules! log_timed {
    ($name:expr, $block:expr) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(target: "timing", operation = $name, duration_ms = duration_ms, "operation completed");
        result
    }};
}

/// Log a vector/graph store operation
#[macro_export]
macro_rules! log_store {
    ($store:expr, $operation:expr) => {
        tracing::debug!(target: "store", store = $store, operation = $operation, "store operation");
    };
    ($store:expr, $operation:expr, $id:expr) => {
        tracing::debug!(target: "store", store = $store, operation = $operation, id = ?$id, "store operation");
    };
    ($store:expr, $operation:expr, $id:expr, $duration_ms:expr) => {
        tracing::debug!(target: "store", store = $store, operation = $operation, id = ?$id, duration_ms = $duration_ms, "store operation");
    };
}

/// Log an external service call (vector/graph backends)
#[macro_export]
macro_rules! log_external_call {
    ($service:expr, $endpoint:expr) => {
        tracing::debug!(target: "external", service = $service, endpoint = $endpoint, "calling external service");
    };
    ($service:expr, $endpoint:expr, $duration_ms:expr, $status:expr) => {
        tracing::info!(target: "external", service = $service, endpoint = $endpoint, duration_ms = $duration_ms, status = $status, "external call completed");
    };
}

/// Log a retry attempt
#[macro_export]
macro_rules! log_retry {
    ($operation:expr, $attempt:expr, $max_attempts:expr) => {
        tracing::warn!(target: "retry", operation = $operation, attempt = $attempt, max_attempts = $max_attempts, "retrying operation");
    };
    ($operation:expr, $attempt:expr, $max_attempts:expr, $error:expr) => {
        tracing::warn!(target: "retry", operation = $operation, attempt = $attempt, max_attempts = $max_attempts, error = %$error, "retrying after error");
    };
}
