//! TaskKind trait - 型付き payload の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const TYPE`)
//! - Trait bounds の組み合わせ (Serialize + DeserializeOwned + Send + Sync + 'static)

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{FleetResult, Task, TaskType};

/// TaskKind は task_type と payload の型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Thumbnail {
///     url: String,
/// }
///
/// impl TaskKind for Thumbnail {
///     const TYPE: &'static str = "media.thumbnail.v1";
/// }
///
/// let task = Thumbnail { url: "...".into() }.into_task()?;
/// ```
///
/// # 命名規約
/// - `{namespace}.{domain}.{action}.v{major}`
pub trait TaskKind: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;

    fn task_type() -> TaskType {
        TaskType::new(Self::TYPE)
    }

    /// Wrap this payload in a fresh first-attempt [`Task`].
    fn into_task(self) -> FleetResult<Task> {
        let payload = serde_json::to_value(&self)?;
        Ok(Task::new(Self::task_type(), payload))
    }
}
