//! EventSink port - イベント記録の抽象化
//!
//! - TracingEventSink: tracing に流す（デフォルト）
//! - InMemoryEventSink: 記録して後から検査する（テスト用）

use crate::domain::DomainEvent;

/// EventSink はドメインイベントを記録
///
/// ディスパッチャの状態ロックを握ったまま呼ばれることがあるので、同期で
/// すぐ戻ること。
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}
