//! # Task classes.
//!
//! A [`TaskClass`] is what gets registered: a factory producing task instances
//! plus the static [`TaskMeta`] of the type and a class name. Because the
//! factory can only yield `Arc<dyn Task>`, anything registered is a proper
//! [`Task`] by construction.
//!
//! Closures become classes through [`TaskClass::from_fn`], which wraps the
//! function in an ad-hoc task whose `main` calls it:
//!
//! ```rust
//! use serde_json::json;
//! use tasklane::{Args, TaskClass, TaskContext};
//!
//! let class = TaskClass::from_fn(|_ctx: TaskContext, _args: Args| async move {
//!     Ok(json!(42))
//! });
//! assert!(class.name().starts_with("fn-"));
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;

use crate::tasks::context::TaskContext;
use crate::tasks::meta::TaskMeta;
use crate::tasks::task::{Args, Task, TaskResult};

type Factory = Arc<dyn Fn() -> Arc<dyn Task> + Send + Sync>;

/// Instantiable task type with its registration defaults.
#[derive(Clone)]
pub struct TaskClass {
    name: Cow<'static, str>,
    meta: TaskMeta,
    factory: Factory,
}

impl TaskClass {
    /// Class of a `Default`-constructible task type; reads [`Task::meta`].
    pub fn of<T: Task + Default>() -> Self {
        Self::with_factory(T::default)
    }

    /// Class built from a custom constructor; reads [`Task::meta`] of `T`.
    pub fn with_factory<T, F>(factory: F) -> Self
    where
        T: Task,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            name: Cow::Owned(short_type_name::<T>()),
            meta: T::meta(),
            factory: Arc::new(move || Arc::new(factory()) as Arc<dyn Task>),
        }
    }

    /// Wraps a function as an ad-hoc task class.
    ///
    /// The class gets a random `fn-…` name; use [`TaskClass::named`] to pick one.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(TaskContext, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let f = Arc::new(f);
        Self {
            name: Cow::Owned(format!("fn-{}", random_suffix())),
            meta: TaskMeta::default(),
            factory: Arc::new(move || {
                Arc::new(FnTask {
                    f: Arc::clone(&f),
                }) as Arc<dyn Task>
            }),
        }
    }

    /// Overrides the class name.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the static metadata.
    pub fn with_meta(mut self, meta: TaskMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Class name (type name for typed classes).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Static registration defaults.
    pub fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    /// Key identifying this class when it runs unregistered: the metadata
    /// name if present, the class name otherwise.
    pub fn key(&self) -> &str {
        self.meta.name.as_deref().unwrap_or(&self.name)
    }

    /// Creates a fresh instance.
    pub fn instantiate(&self) -> Arc<dyn Task> {
        (self.factory)()
    }
}

impl fmt::Debug for TaskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskClass")
            .field("name", &self.name)
            .field("meta", &self.meta)
            .finish()
    }
}

/// Ad-hoc task calling a function.
struct FnTask<F> {
    f: Arc<F>,
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(TaskContext, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    async fn main(&self, ctx: &TaskContext, args: Args) -> TaskResult {
        (self.f)(ctx.clone(), args).await
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}
