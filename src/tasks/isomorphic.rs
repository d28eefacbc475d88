//! # Single-object-argument tasks.
//!
//! An [`IsomorphicTask`] takes exactly one argument: a JSON object. The
//! [`Isomorphic`] adapter turns it into a regular [`Task`] and enforces the
//! calling convention before `main` ever sees the arguments:
//!
//! - more than one positional argument → [`TaskError::InvalidNumberOfArguments`];
//! - a single argument that is neither an object nor `null` → [`TaskError::InvalidArgument`];
//! - no argument or `null` → `None`.
//!
//! Flow tasks use the same convention through [`single_object_arg`], which
//! reads a missing object as an empty one.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::TaskError;
use crate::tasks::context::TaskContext;
use crate::tasks::meta::TaskMeta;
use crate::tasks::task::{Args, Task, TaskResult};

/// Task whose input is one JSON object.
#[async_trait]
pub trait IsomorphicTask: Send + Sync + 'static {
    /// The work, called with the validated object argument (`None` for no
    /// argument or `null`).
    async fn main(&self, ctx: &TaskContext, input: Option<Map<String, Value>>) -> TaskResult;

    /// Registration defaults, forwarded as the adapter's [`Task::meta`].
    fn meta() -> TaskMeta
    where
        Self: Sized,
    {
        TaskMeta::default()
    }
}

/// Adapts an [`IsomorphicTask`] to [`Task`].
#[derive(Default)]
pub struct Isomorphic<T>(pub T);

impl<T> Isomorphic<T> {
    /// Wraps `inner`.
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    /// The wrapped task.
    pub fn inner(&self) -> &T {
        &self.0
    }
}

#[async_trait]
impl<T: IsomorphicTask> Task for Isomorphic<T> {
    async fn main(&self, ctx: &TaskContext, args: Args) -> TaskResult {
        let input = optional_object_arg(args)?;
        self.0.main(ctx, input).await
    }

    fn meta() -> TaskMeta {
        T::meta()
    }
}

/// Validates the one-object calling convention and returns the object,
/// empty if none was given.
pub fn single_object_arg(args: Args) -> Result<Map<String, Value>, TaskError> {
    optional_object_arg(args).map(Option::unwrap_or_default)
}

fn optional_object_arg(args: Args) -> Result<Option<Map<String, Value>>, TaskError> {
    if args.len() > 1 {
        return Err(TaskError::InvalidNumberOfArguments {
            expected: 1,
            actual: args.len(),
        });
    }
    match args.into_iter().next() {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(TaskError::invalid_argument(format!(
            "expected an object argument, got {}",
            json_kind(&other)
        ))),
    }
}

pub(crate) fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl<T: IsomorphicTask> From<T> for Isomorphic<T> {
    fn from(inner: T) -> Self {
        Isomorphic(inner)
    }
}

/// Shared handle to an adapted task.
pub type IsomorphicRef<T> = Arc<Isomorphic<T>>;
