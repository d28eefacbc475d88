//! # Bulk task sources.
//!
//! A [`TaskSource`] yields task classes for
//! [`TaskManager::load_tasks`](crate::TaskManager::load_tasks). Discovery
//! (scanning a plugin directory, reading a manifest, ...) is the source's
//! business; the manager only registers what it gets, one `add_task` per class.

use crate::error::TaskError;
use crate::tasks::TaskClass;

/// Producer of task classes to register in bulk.
pub trait TaskSource {
    /// Classes to register, in registration order.
    fn classes(&self) -> Result<Vec<TaskClass>, TaskError>;

    /// Short label for logs.
    fn describe(&self) -> &str {
        "task source"
    }
}

impl TaskSource for [TaskClass] {
    fn classes(&self) -> Result<Vec<TaskClass>, TaskError> {
        Ok(self.to_vec())
    }

    fn describe(&self) -> &str {
        "class list"
    }
}

impl TaskSource for Vec<TaskClass> {
    fn classes(&self) -> Result<Vec<TaskClass>, TaskError> {
        self.as_slice().classes()
    }

    fn describe(&self) -> &str {
        "class list"
    }
}
