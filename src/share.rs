/// 共享资源池
///
/// 声明 Cookie / DNS 缓存 / TLS 会话这几类资源在一组客户端之间共享。
/// 池自身也是一个引擎句柄：惰性建连，声明动作逐类下发，客户端通过
/// 专用的 `SharePool` 选项槽位绑定到池句柄上。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    client::TransferClient,
    engine::{ShareAction, ShareEngine, TransferEngine},
    error::TransferError,
    lifecycle::{ConnectionState, Lifecycle},
    options::{OptionKey, OptionSource, OptionStore, OptionValue},
    HandleId,
};

/// 可共享的资源类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SharedResource {
    /// Cookie
    Cookies,
    /// DNS 缓存
    ///
    /// 注意：若池内客户端同时被编入同一个批次，引擎会让整个批次
    /// 共享这份 DNS 缓存，而不仅限于池内声明的成员。这是引擎层的
    /// 副作用，本库无法阻止。
    DnsCache,
    /// TLS 会话标识
    ///
    /// 复用会话标识可以缩短与同一服务器重连时的握手耗时。同一句柄
    /// 自身的会话标识默认就会被复用。
    TlsSessions,
}

/// 共享资源池
pub struct SharedPool {
    engine: Arc<dyn ShareEngine>,
    options: OptionStore,
    lifecycle: Lifecycle,
}

impl SharedPool {
    /// 创建空池
    pub fn new(engine: Arc<dyn ShareEngine>) -> Self {
        Self {
            engine,
            options: OptionStore::new(),
            lifecycle: Lifecycle::new(),
        }
    }

    /// 创建后立即共享指定资源
    pub fn with_resources(
        engine: Arc<dyn ShareEngine>,
        resources: impl IntoIterator<Item = SharedResource>,
    ) -> Result<Self, TransferError> {
        let mut pool = Self::new(engine);
        pool.share(resources)?;

        Ok(pool)
    }

    /// 设置池句柄上的选项
    pub fn set_option(&mut self, key: OptionKey, value: impl Into<OptionValue>) -> &mut Self {
        self.options.set(key, value);
        self
    }

    /// 读取池句柄上的选项
    pub fn option(&self, key: OptionKey) -> Option<&OptionValue> {
        self.options.get(key)
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

    /// 池句柄，强制建连
    pub fn handle(&mut self) -> Result<HandleId, TransferError> {
        self.lifecycle.connect(self.engine.as_ref(), &self.options)
    }

    /// 断开池句柄，未连接时为空操作
    pub fn disconnect(&mut self) -> Result<(), TransferError> {
        self.lifecycle.disconnect(self.engine.as_ref())
    }

    fn declare(
        &mut self,
        action: ShareAction,
        resources: impl IntoIterator<Item = SharedResource>,
    ) -> Result<(), TransferError> {
        let handle = self.lifecycle.connect(self.engine.as_ref(), &self.options)?;
        for resource in resources {
            self.engine.share(handle, action, resource)?;
            tracing::debug!("pool {} {:?} {:?}", handle, action, resource);
        }

        Ok(())
    }

    /// 声明哪些资源类别对关联客户端共享
    ///
    /// 惰性建连后，每类资源对应一次引擎声明调用。
    pub fn share(
        &mut self,
        resources: impl IntoIterator<Item = SharedResource>,
    ) -> Result<(), TransferError> {
        self.declare(ShareAction::Share, resources)
    }

    /// 取消某些资源类别的共享
    pub fn unshare(
        &mut self,
        resources: impl IntoIterator<Item = SharedResource>,
    ) -> Result<(), TransferError> {
        self.declare(ShareAction::Unshare, resources)
    }

    /// 把客户端纳入本池
    ///
    /// 向每个客户端的专用 `SharePool` 槽位写入池句柄；绑定在客户端
    /// 下一次连接时生效。解除绑定要删除该槽位后完整重连（先断开再
    /// 连接）：引擎不会因为回放时缺了这个选项就忘掉已有绑定。
    pub fn attach<'a>(
        &mut self,
        clients: impl IntoIterator<Item = &'a mut TransferClient>,
    ) -> Result<(), TransferError> {
        let handle = self.lifecycle.connect(self.engine.as_ref(), &self.options)?;
        for client in clients {
            client.set_option(OptionKey::SharePool, OptionValue::Handle(handle));
            tracing::debug!("client attached to share pool {}", handle);
        }

        Ok(())
    }

    /// 创建一个新客户端并立即纳入本池
    pub fn create_attached_client(
        &mut self,
        engine: Arc<dyn TransferEngine>,
        source: impl Into<OptionSource>,
    ) -> Result<TransferClient, TransferError> {
        let mut client = TransferClient::with_source(engine, source);
        self.attach([&mut client])?;

        Ok(client)
    }
}

/// 所有者析构时关闭仍存活的池句柄
impl Drop for SharedPool {
    fn drop(&mut self) {
        self.lifecycle.disconnect_on_drop(self.engine.as_ref());
    }
}

impl fmt::Debug for SharedPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPool")
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}
