/// 引擎抽象
///
/// 原生传输引擎是外部协作者，本库只通过这组窄接口与其交互。
/// `Engine` 是三种变体共同的句柄管理能力，三个扩展 trait 分别对应
/// 引擎的单次传输、共享资源池与批量执行设施。
///
/// 句柄管理（init / applyOption / close）是同步调用：原生引擎的
/// 配置入口不做任何 IO，真正会阻塞的只有传输执行本身。

pub mod loopback;

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    error::{EngineCode, TransferError},
    options::{OptionKey, OptionValue},
    share::SharedResource,
    HandleId,
};

/// 单次传输的成功载荷
#[derive(Debug, Clone, PartialEq)]
pub struct TransferPayload {
    /// 响应状态码
    pub status: u16,
    /// 响应体
    pub body: Bytes,
}

/// 传输结局
///
/// `Failed` 只是失败标记；消息与结果码要在失败后立刻通过
/// [`TransferEngine::diagnostics`] 从同一句柄读取。
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// 传输完成
    Success(TransferPayload),
    /// 传输失败
    Failed,
}

impl TransferOutcome {
    /// 是否成功
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success(_))
    }
}

/// 句柄诊断信息
///
/// 仅在同一句柄传输失败后立即读取才有效，之后的引擎调用可能将其重置。
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    /// 诊断消息
    pub message: String,
    /// 结果码
    pub code: EngineCode,
}

/// 传输元数据字段键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InfoKey {
    /// 最终生效的地址（重定向之后）
    EffectiveUrl,
    /// 响应状态码
    ResponseCode,
    /// 总耗时（秒）
    TotalTime,
    /// 响应内容类型
    ContentType,
    /// 响应头字节数
    HeaderSize,
    /// 响应体字节数
    BodySize,
    /// 重定向次数
    RedirectCount,
}

/// 一次传输之后可读取的元数据集合
///
/// 字段取值由引擎定义，形态不一，用 JSON 值承载。
pub type Metadata = BTreeMap<InfoKey, serde_json::Value>;

/// 暂停状态
///
/// 引擎侧的可扩展枚举：单向暂停、双向暂停与恢复运行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PauseState {
    /// 暂停接收
    RecvPaused,
    /// 暂停发送
    SendPaused,
    /// 双向暂停
    AllPaused,
    /// 正常运行
    #[default]
    Running,
}

/// 共享声明动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareAction {
    /// 加入共享集合
    Share,
    /// 移出共享集合
    Unshare,
}

/// 批量执行中单个成员的结果
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// 成员传输句柄
    pub handle: HandleId,
    /// 传输结局
    pub outcome: TransferOutcome,
    /// 失败成员的诊断信息，由引擎在批次结束时一并带回
    pub diagnostics: Option<Diagnostics>,
}

/// 引擎句柄管理能力
///
/// 三种变体（单次传输 / 共享池 / 批次）各自把这组操作落到自己的句柄
/// 类别上。`close` 对已关闭的句柄不保证安全，调用方必须自己跟踪连接
/// 状态，见 [`crate::lifecycle::Lifecycle`]。
pub trait Engine: Send + Sync {
    /// 分配一个新的引擎侧资源
    fn init(&self) -> Result<HandleId, TransferError>;

    /// 向句柄施加一项配置
    ///
    /// 同键重复施加是幂等的；非法的键值组合由引擎拒绝，本库不做
    /// 任何前置校验。
    fn apply_option(
        &self,
        handle: HandleId,
        key: OptionKey,
        value: &OptionValue,
    ) -> Result<(), TransferError>;

    /// 关闭句柄并释放引擎侧资源
    fn close(&self, handle: HandleId) -> Result<(), TransferError>;
}

/// 单次传输设施
#[async_trait]
pub trait TransferEngine: Engine {
    /// 按句柄当前配置执行一次完整传输
    async fn perform(&self, handle: HandleId) -> Result<TransferOutcome, TransferError>;

    /// 读取句柄的诊断缓冲区
    fn diagnostics(&self, handle: HandleId) -> Diagnostics;

    /// 读取最近一次传输的元数据
    fn metadata(&self, handle: HandleId) -> Result<Metadata, TransferError>;

    /// 读取最近一次传输的单个元数据字段
    fn metadata_field(
        &self,
        handle: HandleId,
        key: InfoKey,
    ) -> Result<Option<serde_json::Value>, TransferError> {
        // 默认实现：从完整元数据集中取字段
        let mut metadata = self.metadata(handle)?;
        Ok(metadata.remove(&key))
    }

    /// 暂停或恢复句柄上的传输，返回引擎结果码
    fn pause(&self, handle: HandleId, state: PauseState) -> EngineCode;
}

/// 共享资源池设施
pub trait ShareEngine: Engine {
    /// 向池句柄的共享集合中加入或移除一类资源
    fn share(
        &self,
        handle: HandleId,
        action: ShareAction,
        resource: SharedResource,
    ) -> Result<(), TransferError>;
}

/// 批量执行设施
///
/// 并发调度完全发生在引擎内部，本库只负责成员登记。
#[async_trait]
pub trait BatchEngine: Engine {
    /// 将一个传输句柄登记进批次
    fn add_transfer(&self, batch: HandleId, member: HandleId) -> Result<(), TransferError>;

    /// 将一个传输句柄移出批次
    fn remove_transfer(&self, batch: HandleId, member: HandleId) -> Result<(), TransferError>;

    /// 驱动批次内全部成员并发执行，直到所有传输结束
    async fn run(&self, batch: HandleId) -> Result<Vec<BatchResult>, TransferError>;
}
