/// 单次传输客户端
///
/// 在选项存储与连接生命周期之上提供请求执行：惰性建连、执行时的
/// 一次性选项叠加、失败时从句柄诊断缓冲区提取错误、以及元数据自省。

use std::fmt;
use std::sync::Arc;

use crate::{
    engine::{InfoKey, Metadata, PauseState, TransferEngine, TransferOutcome, TransferPayload},
    error::TransferError,
    lifecycle::{ConnectionState, Lifecycle},
    options::{OptionKey, OptionSource, OptionStore, OptionValue},
    HandleId,
};

/// 单次传输客户端
pub struct TransferClient {
    engine: Arc<dyn TransferEngine>,
    options: OptionStore,
    lifecycle: Lifecycle,
}

impl TransferClient {
    /// 创建空白客户端
    pub fn new(engine: Arc<dyn TransferEngine>) -> Self {
        Self {
            engine,
            options: OptionStore::new(),
            lifecycle: Lifecycle::new(),
        }
    }

    /// 从来源创建客户端
    ///
    /// 来源可以是地址简写、选项集合或另一个客户端的全部选项。
    pub fn with_source(engine: Arc<dyn TransferEngine>, source: impl Into<OptionSource>) -> Self {
        let mut client = Self::new(engine);
        client.merge(source);
        client
    }

    /// 设置单个选项
    pub fn set_option(&mut self, key: OptionKey, value: impl Into<OptionValue>) -> &mut Self {
        self.options.set(key, value);
        self
    }

    /// 读取单个选项，未设置返回 None
    pub fn option(&self, key: OptionKey) -> Option<&OptionValue> {
        self.options.get(key)
    }

    /// 删除单个选项
    pub fn unset_option(&mut self, key: OptionKey) -> &mut Self {
        self.options.unset(key);
        self
    }

    /// 是否设置了某选项
    pub fn has_option(&self, key: OptionKey) -> bool {
        self.options.contains(key)
    }

    /// 全部选项
    pub fn options(&self) -> &OptionStore {
        &self.options
    }

    /// 合并选项来源，来源覆盖同键旧值
    pub fn merge(&mut self, source: impl Into<OptionSource>) -> &mut Self {
        self.options.merge_from(source);
        self
    }

    /// 连接状态
    pub fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// 是否已连接
    pub fn is_connected(&self) -> bool {
        self.lifecycle.is_connected()
    }

    /// 当前句柄标识，不触发连接
    pub fn current_handle(&self) -> Option<HandleId> {
        self.lifecycle.handle()
    }

    /// 建立（或复用）连接并回放全部选项，返回存活句柄
    ///
    /// 供共享池、批次等组件引用本客户端的句柄。
    pub fn handle(&mut self) -> Result<HandleId, TransferError> {
        self.lifecycle.connect(self.engine.as_ref(), &self.options)
    }

    /// 建立连接
    pub fn connect(&mut self) -> Result<(), TransferError> {
        self.handle().map(|_| ())
    }

    /// 断开连接，未连接时为空操作
    pub fn disconnect(&mut self) -> Result<(), TransferError> {
        self.lifecycle.disconnect(self.engine.as_ref())
    }

    /// 按当前选项执行一次传输
    pub async fn execute(&mut self) -> Result<TransferPayload, TransferError> {
        self.run_transfer().await
    }

    /// 附加一次性选项执行传输
    ///
    /// 叠加选项在当前选项快照之上合并，仅对本次调用生效；执行结束后
    /// 恢复原有选项，无论成败。
    pub async fn execute_with(
        &mut self,
        overlay: impl Into<OptionSource>,
    ) -> Result<TransferPayload, TransferError> {
        let saved = self.options.clone();
        self.options.merge_from(overlay);

        let result = self.run_transfer().await;
        self.options = saved;

        result
    }

    async fn run_transfer(&mut self) -> Result<TransferPayload, TransferError> {
        let handle = self.lifecycle.connect(self.engine.as_ref(), &self.options)?;
        tracing::debug!("executing transfer on {}", handle);

        match self.engine.perform(handle).await? {
            TransferOutcome::Success(payload) => {
                tracing::debug!("transfer on {} completed with status {}", handle, payload.status);
                Ok(payload)
            }
            TransferOutcome::Failed => {
                // 必须在任何后续引擎调用之前读取诊断，它们可能重置诊断状态
                let diagnostics = self.engine.diagnostics(handle);
                tracing::debug!(
                    "transfer on {} failed: {} (code {})",
                    handle,
                    diagnostics.message,
                    diagnostics.code
                );

                Err(TransferError::Transfer {
                    message: diagnostics.message,
                    code: diagnostics.code,
                })
            }
        }
    }

    /// 读取全部传输元数据
    ///
    /// 从未连接的客户端没有可自省的句柄，返回 None。
    pub fn info(&self) -> Result<Option<Metadata>, TransferError> {
        match self.lifecycle.handle() {
            Some(handle) => self.engine.metadata(handle).map(Some),
            None => Ok(None),
        }
    }

    /// 读取单个元数据字段
    pub fn info_field(&self, key: InfoKey) -> Result<Option<serde_json::Value>, TransferError> {
        match self.lifecycle.handle() {
            Some(handle) => self.engine.metadata_field(handle, key),
            None => Ok(None),
        }
    }

    /// 暂停传输
    ///
    /// 从未连接的客户端上没有可暂停的传输，直接返回。引擎返回非 OK
    /// 结果码时报 [`TransferError::Pause`]；这类失败不会写入句柄的
    /// 诊断缓冲区，错误消息来自静态描述表。
    pub fn pause(&mut self, state: PauseState) -> Result<(), TransferError> {
        let Some(handle) = self.lifecycle.handle() else {
            return Ok(());
        };

        let code = self.engine.pause(handle, state);
        if code.is_ok() {
            return Ok(());
        }

        Err(TransferError::Pause { code })
    }

    /// 恢复传输
    pub fn resume(&mut self) -> Result<(), TransferError> {
        self.pause(PauseState::Running)
    }
}

/// 克隆只复制选项快照，不复制连接：新客户端从 Disconnected 起步
impl Clone for TransferClient {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            options: self.options.clone(),
            lifecycle: Lifecycle::new(),
        }
    }
}

/// 所有者析构时关闭仍存活的连接
impl Drop for TransferClient {
    fn drop(&mut self) {
        self.lifecycle.disconnect_on_drop(self.engine.as_ref());
    }
}

impl From<&TransferClient> for OptionSource {
    fn from(client: &TransferClient) -> Self {
        OptionSource::Store(client.options.clone())
    }
}

impl fmt::Debug for TransferClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferClient")
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}
