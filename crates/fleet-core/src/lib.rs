//! fleet-core
//!
//! Batch dispatcher that runs each task on an ephemeral worker, bounded by a
//! configurable concurrency limit, with retry and batch status tracking.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, result, batch, worker, decision, config, errors, events）
//! - **ports**: 抽象化レイヤー（WorkerLocator, WorkerExecutor, EventSink, IdGenerator, Clock）
//! - **app**: アプリケーションロジック（builder, dispatcher, dispatch loop, gate, state）
//! - **typed**: 型付き Task API（TaskKind trait, Handler trait, TypedRegistry）
//! - **impls**: 実装（RegistryLocator, TracingEventSink, InMemoryEventSink）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use crate::app::{BuildError, FleetBuilder, FleetDispatcher, FleetSnapshot, FleetStats};
pub use crate::domain::{
    BatchId, BatchStatus, BatchStatusView, FleetConfig, FleetConfigPatch, FleetError, FleetResult,
    Outcome, Task, TaskId, TaskResult, TaskType, WorkerId,
};
