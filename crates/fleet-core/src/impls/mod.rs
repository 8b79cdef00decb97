//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **RegistryLocator**: TypedRegistry をワーカーとして使う WorkerLocator
//! - **TracingEventSink**: tracing にイベントを流す（デフォルト）
//! - **InMemoryEventSink**: イベントを記録する（テスト・デモ用）

pub mod event_sinks;
pub mod registry_locator;

pub use self::event_sinks::{InMemoryEventSink, TracingEventSink};
pub use self::registry_locator::{RegistryExecutor, RegistryLocator};
