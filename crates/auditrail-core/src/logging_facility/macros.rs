//! Canonical logging macros
//!
//! Every capture operation concerns one tracked entity, so the macros accept
//! an `item = (item_type, item_id)` target that expands to the canonical
//! `item_type`/`item_id` fields of `auditrail_core_types::schema`.

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use auditrail_core::log_op_start;
/// log_op_start!("load_config");
/// log_op_start!("finalize_version", item = ("Order", 42), version_event = "update");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = auditrail_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, item = ($item_type:expr, $item_id:expr) $(, $($field:tt)*)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = auditrail_core_types::schema::EVENT_START,
            item_type = %$item_type,
            item_id = %$item_id,
            $($($field)*)?
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = auditrail_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use auditrail_core::log_op_end;
/// log_op_end!("finalize_version", duration_ms = 3, version_id = 17);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = auditrail_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = auditrail_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error
///
/// The error expression must convert into [`ExError`](crate::errors::ExError);
/// its `item_type`, `item_id` and `request_id` are logged when set.
///
/// # Example
///
/// ```
/// # use auditrail_core::{log_op_error, AuditError};
/// let err = AuditError::MissingAccessor {
///     item_type: "Order".to_string(),
///     accessor: "summary".to_string(),
/// };
/// log_op_error!("after_create", err, duration_ms = 1);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = auditrail_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
            item_type = ex_err.item_type(),
            item_id = ex_err.item_id(),
            request_id = ex_err.request_id().map(|id| id.as_str()),
            $($($field)*)?
        );
    }};
}
