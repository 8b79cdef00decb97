//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部のもの（ワーカー、時刻、ID、ログ先）へのインターフェースを
//! 提供し、ディスパッチャ本体から実装の詳細を隠蔽します。

pub mod clock;
pub mod event_sink;
pub mod executor;
pub mod id_generator;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::EventSink;
pub use self::executor::{ExecutionContext, WorkerExecutor, WorkerLocator};
pub use self::id_generator::{IdGenerator, UlidGenerator};
