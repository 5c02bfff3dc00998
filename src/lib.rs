/// httptrans - 统一 HTTP 传输客户端库
///
/// 在原生传输引擎之上提供面向对象的客户端封装：选项集配置、惰性连接生命周期、
/// 单次请求执行、共享资源池（Cookie / DNS 缓存 / TLS 会话）以及批量并发执行。
/// TLS 握手、套接字 IO、DNS 解析、连接复用等真正的传输工作全部发生在外部引擎
/// 内部，本库只通过一组窄接口与其协作。

// 引擎抽象
pub mod engine;

// 核心类型
pub mod error;
pub mod options;
pub mod lifecycle;

// 客户端变体
pub mod client;
pub mod share;
pub mod batch;

/// 引擎句柄标识的类型安全包装器
///
/// 句柄本体由引擎拥有，本库各组件只保管这个标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HandleId(u64);

impl HandleId {
    /// 创建新的句柄标识
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// 获取原始标识值
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// 生成下一个句柄标识
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

impl From<u64> for HandleId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<HandleId> for u64 {
    fn from(handle_id: HandleId) -> Self {
        handle_id.0
    }
}

// 重新导出核心类型
pub use error::{EngineCode, TransferError};
pub use options::{OptionKey, OptionSource, OptionStore, OptionValue};
pub use engine::{
    BatchEngine, BatchResult, Diagnostics, Engine, InfoKey, Metadata,
    PauseState, ShareAction, ShareEngine, TransferEngine, TransferOutcome,
    TransferPayload,
};
pub use engine::loopback::{EngineCall, LoopbackEngine};
pub use lifecycle::{ConnectionState, Lifecycle};
pub use client::TransferClient;
pub use share::{SharedPool, SharedResource};
pub use batch::BatchCoordinator;

/// 便捷的类型别名
pub type Result<T> = std::result::Result<T, TransferError>;
