//! TypedRegistry - task_type ごとの Handler 表
//!
//! 起動時に組み立て、ディスパッチ中は読み取り専用。ワーカーは
//! `RegistryLocator` 経由でここから handler を引く。

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::TaskKind;
use crate::domain::TaskType;

/// Handlers keyed by [`TaskType`].
///
/// ```ignore
/// let mut registry = TypedRegistry::new();
/// registry.register::<Thumbnail, _>(ThumbnailHandler)?;
/// assert!(registry.contains(&Thumbnail::task_type()));
/// ```
#[derive(Default)]
pub struct TypedRegistry {
    handlers: HashMap<TaskType, Arc<dyn DynHandler>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a handler for task_type={0} is already registered")]
    AlreadyRegistered(TaskType),
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One handler per task type; a second registration is rejected and the
    /// first one stays in place.
    pub fn register<T: TaskKind, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        let task_type = T::task_type();
        if self.handlers.contains_key(&task_type) {
            return Err(RegistryError::AlreadyRegistered(task_type));
        }
        self.handlers
            .insert(task_type, Arc::new(TypedHandler::<T, H>::new(handler)));
        Ok(())
    }

    pub fn get(&self, task_type: &TaskType) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn contains(&self, task_type: &TaskType) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Registered task types, sorted.
    pub fn registered_types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = self.handlers.keys().cloned().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
