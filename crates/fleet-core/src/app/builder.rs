//! FleetBuilder - ディスパッチャの構築とワイヤリング
//!
//! # 起動時検証（Fail-fast）
//! - locator が未設定なら BuildError::MissingLocator
//! - 設定が不正なら BuildError::InvalidConfig
//!
//! それ以外の依存（decider, event sink, id 生成, clock）は本番向けの
//! デフォルトで埋める。

use std::sync::Arc;

use crate::domain::{Decider, FleetConfig, FleetError, RetryPolicy};
use crate::impls::{RegistryLocator, TracingEventSink};
use crate::ports::{Clock, EventSink, IdGenerator, SystemClock, UlidGenerator, WorkerLocator};
use crate::typed::TypedRegistry;

use super::dispatcher::FleetDispatcher;

/// Builds a [`FleetDispatcher`].
///
/// # 使用例
/// ```ignore
/// let fleet = FleetBuilder::new()
///     .config(FleetConfig { max_concurrent_workers: 4, ..FleetConfig::default() })
///     .registry(registry)
///     .build()?;
/// ```
#[derive(Default)]
pub struct FleetBuilder {
    config: FleetConfig,
    locator: Option<Arc<dyn WorkerLocator>>,
    decider: Option<Arc<dyn Decider>>,
    events: Option<Arc<dyn EventSink>>,
    ids: Option<Arc<dyn IdGenerator>>,
    clock: Option<Arc<dyn Clock>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No worker locator configured. Call .locator(..) or .registry(..) before build().")]
    MissingLocator,

    #[error("Invalid fleet config: {0}")]
    InvalidConfig(FleetError),
}

impl FleetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: FleetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn locator(mut self, locator: Arc<dyn WorkerLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Use a [`RegistryLocator`] over `registry` as the worker fleet.
    pub fn registry(self, registry: TypedRegistry) -> Self {
        self.locator(Arc::new(RegistryLocator::new(registry)))
    }

    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<FleetDispatcher, BuildError> {
        let locator = self.locator.ok_or(BuildError::MissingLocator)?;
        self.config.validate().map_err(BuildError::InvalidConfig)?;

        Ok(FleetDispatcher::from_parts(
            self.config,
            locator,
            self.decider.unwrap_or_else(|| Arc::new(RetryPolicy)),
            self.events.unwrap_or_else(|| Arc::new(TracingEventSink)),
            self.ids
                .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock))),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        ))
    }
}
