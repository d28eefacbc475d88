//! # Flow input: which sub-tasks to run and with what arguments.
//!
//! A [`FlowSpec`] is either built in code (so entries may be ad-hoc
//! [`TaskClass`]es) or parsed from the flow's single object argument:
//!
//! ```text
//! { "args": <value | [values]>,
//!   "tasks": [ "name", { "task": "name", "args": <value | [values]> }, ... ] }
//! ```
//!
//! A non-array `args` value is wrapped as one positional argument. An entry
//! without its own `args` receives the flow-level `args`.

use serde_json::{Map, Value};

use crate::error::TaskError;
use crate::tasks::{Args, TaskClass, json_kind, single_object_arg};

/// Reference to a sub-task: a registered name or an unregistered class.
#[derive(Debug, Clone)]
pub enum TaskRef {
    /// Registered task, run through `TaskManager::run`.
    Name(String),
    /// Ad-hoc class, run through `TaskManager::run_once`.
    Class(TaskClass),
}

impl TaskRef {
    /// Key used in parallel results: the name, or the class key.
    pub fn key(&self) -> &str {
        match self {
            TaskRef::Name(name) => name,
            TaskRef::Class(class) => class.key(),
        }
    }
}

impl From<&str> for TaskRef {
    fn from(name: &str) -> Self {
        TaskRef::Name(name.to_string())
    }
}

impl From<String> for TaskRef {
    fn from(name: String) -> Self {
        TaskRef::Name(name)
    }
}

impl From<TaskClass> for TaskRef {
    fn from(class: TaskClass) -> Self {
        TaskRef::Class(class)
    }
}

/// One element of a flow's task list.
#[derive(Debug, Clone)]
pub struct FlowEntry {
    /// Sub-task to run.
    pub task: TaskRef,
    /// Per-entry arguments; `None` falls back to the flow-level arguments.
    pub args: Option<Args>,
}

impl FlowEntry {
    pub fn new(task: impl Into<TaskRef>) -> Self {
        Self {
            task: task.into(),
            args: None,
        }
    }

    /// Sets per-entry arguments.
    pub fn with_args(mut self, args: Args) -> Self {
        self.args = Some(args);
        self
    }
}

impl From<&str> for FlowEntry {
    fn from(name: &str) -> Self {
        FlowEntry::new(name)
    }
}

impl From<String> for FlowEntry {
    fn from(name: String) -> Self {
        FlowEntry::new(name)
    }
}

impl From<TaskClass> for FlowEntry {
    fn from(class: TaskClass) -> Self {
        FlowEntry::new(class)
    }
}

impl From<TaskRef> for FlowEntry {
    fn from(task: TaskRef) -> Self {
        FlowEntry { task, args: None }
    }
}

/// Sub-tasks of a flow plus the flow-level arguments.
#[derive(Debug, Clone, Default)]
pub struct FlowSpec {
    /// Arguments for entries that carry none of their own.
    pub args: Args,
    /// Entries in execution order.
    pub tasks: Vec<FlowEntry>,
}

impl FlowSpec {
    /// Spec over the given entries, without flow-level arguments.
    pub fn new<I>(tasks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FlowEntry>,
    {
        Self {
            args: Vec::new(),
            tasks: tasks.into_iter().map(Into::into).collect(),
        }
    }

    /// Sets the flow-level arguments.
    pub fn with_args(mut self, args: Args) -> Self {
        self.args = args;
        self
    }

    /// Appends an entry.
    pub fn then(mut self, entry: impl Into<FlowEntry>) -> Self {
        self.tasks.push(entry.into());
        self
    }

    /// Parses a spec from a flow task's raw arguments.
    ///
    /// Exactly one object argument is accepted; its `tasks` must be an array
    /// of task names or `{ "task": name, "args": .. }` objects.
    pub fn from_args(args: Args) -> Result<Self, TaskError> {
        let mut obj = single_object_arg(args)?;
        let args = obj.remove("args").map(positional).unwrap_or_default();
        let tasks = match obj.remove("tasks") {
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| parse_entry(i, item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(TaskError::invalid_argument(format!(
                    "'tasks' must be an array, got {}",
                    json_kind(&other)
                )));
            }
            None => return Err(TaskError::invalid_argument("missing 'tasks'")),
        };
        Ok(Self { args, tasks })
    }
}

fn parse_entry(index: usize, item: Value) -> Result<FlowEntry, TaskError> {
    match item {
        Value::String(name) => Ok(FlowEntry::new(name)),
        Value::Object(obj) => parse_object_entry(index, obj),
        other => Err(TaskError::invalid_argument(format!(
            "tasks[{index}]: expected a task name or an object, got {}",
            json_kind(&other)
        ))),
    }
}

fn parse_object_entry(index: usize, mut obj: Map<String, Value>) -> Result<FlowEntry, TaskError> {
    let name = match obj.remove("task") {
        Some(Value::String(name)) => name,
        Some(other) => {
            return Err(TaskError::invalid_argument(format!(
                "tasks[{index}].task: expected a task name, got {}",
                json_kind(&other)
            )));
        }
        None => {
            return Err(TaskError::invalid_argument(format!(
                "tasks[{index}]: missing 'task'"
            )));
        }
    };
    Ok(FlowEntry {
        task: TaskRef::Name(name),
        args: obj.remove("args").map(positional),
    })
}

/// Array → positional list; anything else → one argument.
fn positional(v: Value) -> Args {
    match v {
        Value::Array(items) => items,
        other => vec![other],
    }
}
