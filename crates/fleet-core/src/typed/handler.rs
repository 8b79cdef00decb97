//! Handler trait - TaskKind を実行する Handler の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<T>)
//! - Object-safe trait (DynHandler)
//! - Type erasure パターン (TypedHandler<T, H> → DynHandler)

use std::marker::PhantomData;

use async_trait::async_trait;

use super::task::TaskKind;
use crate::domain::{FleetResult, Outcome};
use crate::ports::ExecutionContext;

/// Handler は TaskKind を実行して Outcome を返す
///
/// # 使用例
/// ```ignore
/// struct ThumbnailHandler;
///
/// #[async_trait]
/// impl Handler<Thumbnail> for ThumbnailHandler {
///     async fn handle(&self, task: Thumbnail, ctx: &ExecutionContext) -> FleetResult<Outcome> {
///         Ok(Outcome::success())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: TaskKind>: Send + Sync {
    async fn handle(&self, task: T, ctx: &ExecutionContext) -> FleetResult<Outcome>;
}

/// DynHandler は object-safe な Handler の抽象化
///
/// TypedHandler<T, H> を DynHandler に変換することで、
/// HashMap<String, Arc<dyn DynHandler>> に格納可能にします。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(
        &self,
        payload: &serde_json::Value,
        ctx: &ExecutionContext,
    ) -> FleetResult<Outcome>;

    fn task_type(&self) -> &str;
}

pub struct TypedHandler<T: TaskKind, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TaskKind, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TaskKind, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(
        &self,
        payload: &serde_json::Value,
        ctx: &ExecutionContext,
    ) -> FleetResult<Outcome> {
        // decode 失敗は Serialization エラーとしてタスクの失敗になる
        let task: T = serde_json::from_value(payload.clone())?;
        self.handler.handle(task, ctx).await
    }

    fn task_type(&self) -> &str {
        T::TYPE
    }
}
