/// 批量执行协调器
///
/// 把多个传输客户端编成一组，交给引擎的多路执行设施并发完成。
/// 并发调度完全发生在引擎内部，这里只做成员登记与选项透传。
/// 成员客户端保持自我所有，协调器只持有句柄标识的非拥有引用，
/// 协调器句柄的生命周期与成员互相独立。

use std::fmt;
use std::sync::Arc;

use crate::{
    client::TransferClient,
    engine::{BatchEngine, BatchResult},
    error::TransferError,
    lifecycle::{ConnectionState, Lifecycle},
    options::{OptionKey, OptionSource, OptionStore, OptionValue},
    HandleId,
};

/// 批量执行协调器
pub struct BatchCoordinator {
    engine: Arc<dyn BatchEngine>,
    options: OptionStore,
    lifecycle: Lifecycle,
    members: Vec<HandleId>,
}

impl BatchCoordinator {
    /// 创建空批次
    pub fn new(engine: Arc<dyn BatchEngine>) -> Self {
        Self {
            engine,
            options: OptionStore::new(),
            lifecycle: Lifecycle::new(),
            members: Vec::new(),
        }
    }

    /// 设置批次句柄上的选项，连接时透传给引擎
    pub fn set_option(&mut self, key: OptionKey, value: impl Into<OptionValue>) -> &mut Self {
        self.options.set(key, value);
        self
    }

    /// 读取批次句柄上的选项
    pub fn option(&self, key: OptionKey) -> Option<&OptionValue> {
        self.options.get(key)
    }

    /// 删除批次句柄上的选项
    pub fn unset_option(&mut self, key: OptionKey) -> &mut Self {
        self.options.unset(key);
        self
    }

    /// 合并选项来源
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

    /// 批次句柄，强制建连
    pub fn handle(&mut self) -> Result<HandleId, TransferError> {
        self.lifecycle.connect(self.engine.as_ref(), &self.options)
    }

    /// 断开批次句柄，未连接时为空操作
    ///
    /// 只释放协调器自己的句柄，成员客户端不受影响。
    pub fn disconnect(&mut self) -> Result<(), TransferError> {
        self.members.clear();
        self.lifecycle.disconnect(self.engine.as_ref())
    }

    /// 登记一个客户端
    ///
    /// 强制客户端建连后把它的句柄交给引擎的批次设施。一个客户端
    /// 同一时间只能属于一个批次。
    pub fn attach(&mut self, client: &mut TransferClient) -> Result<(), TransferError> {
        let batch = self.lifecycle.connect(self.engine.as_ref(), &self.options)?;
        let member = client.handle()?;

        if self.members.contains(&member) {
            return Err(TransferError::membership_error(format!(
                "transfer {} is already attached to batch {}",
                member, batch
            )));
        }

        self.engine.add_transfer(batch, member)?;
        self.members.push(member);
        tracing::debug!("transfer {} attached to batch {}", member, batch);

        Ok(())
    }

    /// 移出一个客户端
    ///
    /// 协调器或客户端尚未连接、或客户端本就不在批次中时为空操作。
    pub fn detach(&mut self, client: &mut TransferClient) -> Result<(), TransferError> {
        let Some(batch) = self.lifecycle.handle() else {
            return Ok(());
        };
        let Some(member) = client.current_handle() else {
            return Ok(());
        };
        if !self.members.contains(&member) {
            return Ok(());
        }

        self.engine.remove_transfer(batch, member)?;
        self.members.retain(|registered| *registered != member);
        tracing::debug!("transfer {} detached from batch {}", member, batch);

        Ok(())
    }

    /// 当前成员句柄快照
    pub fn members(&self) -> &[HandleId] {
        &self.members
    }

    /// 并发执行全部成员，直到所有传输结束
    ///
    /// 返回每个成员句柄的结局；失败成员附带引擎带回的诊断信息。
    pub async fn run(&mut self) -> Result<Vec<BatchResult>, TransferError> {
        let batch = self.lifecycle.connect(self.engine.as_ref(), &self.options)?;
        tracing::info!("running batch {} with {} transfers", batch, self.members.len());

        self.engine.run(batch).await
    }
}

/// 所有者析构时关闭仍存活的批次句柄
impl Drop for BatchCoordinator {
    fn drop(&mut self) {
        self.lifecycle.disconnect_on_drop(self.engine.as_ref());
    }
}

impl fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("options", &self.options)
            .field("state", &self.state())
            .field("members", &self.members)
            .finish()
    }
}
