//! App - アプリケーション層
//!
//! ports を組み合わせてディスパッチャを組み立てる。
//!
//! # 主要コンポーネント
//! - **FleetBuilder**: 依存のワイヤリングと起動時検証
//! - **FleetDispatcher**: batch の受付・照会・制御（公開 API）
//! - **dispatch_loop**: 1 batch を bounded pool で流すループ
//! - **ConcurrencyGate**: in-flight 集合（同時実行数の上限）
//! - **FleetState**: ディスパッチャが所有する状態の集約

pub mod builder;
mod dispatch_loop;
pub mod dispatcher;
mod gate;
mod state;
pub mod status;

#[cfg(test)]
mod scenarios;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, FleetBuilder};
pub use self::dispatcher::FleetDispatcher;
pub use self::state::FleetCounters;
pub use self::status::{FleetSnapshot, FleetStats};
