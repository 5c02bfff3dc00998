/// 连接生命周期
///
/// 三种客户端变体共用的两态生命周期：Disconnected 与 Connected，
/// 没有其它状态。连接时总是完整回放全部选项，句柄存续期间的选项
/// 改动因此始终生效。

use crate::{
    engine::Engine,
    error::TransferError,
    options::OptionStore,
    HandleId,
};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 未连接
    Disconnected,
    /// 已连接，选项已施加
    Connected,
}

/// 生命周期状态机
///
/// 句柄由引擎拥有，这里只保管它的标识。克隆所有者时不得复制本结构，
/// 新的所有者从 Disconnected 起步。
#[derive(Debug, Default)]
pub struct Lifecycle {
    handle: Option<HandleId>,
}

impl Lifecycle {
    /// 创建未连接的生命周期
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// 当前状态
    pub fn state(&self) -> ConnectionState {
        match self.handle {
            Some(_) => ConnectionState::Connected,
            None => ConnectionState::Disconnected,
        }
    }

    /// 是否已连接
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// 当前句柄标识，不触发连接
    pub fn handle(&self) -> Option<HandleId> {
        self.handle
    }

    /// 确保连接并回放全部选项，返回存活句柄
    ///
    /// 已连接时复用现有句柄，但仍然完整回放选项：两次调用之间的选项
    /// 改动必须生效，哪怕句柄一直存活。回放是整表重放而非增量差分。
    pub fn connect<E: Engine + ?Sized>(
        &mut self,
        engine: &E,
        options: &OptionStore,
    ) -> Result<HandleId, TransferError> {
        let handle = match self.handle {
            Some(handle) => handle,
            None => {
                let handle = engine.init()?;
                tracing::debug!("engine handle {} initialized", handle);
                self.handle = Some(handle);
                handle
            }
        };

        for (key, value) in options.iter() {
            engine.apply_option(handle, *key, value)?;
        }

        Ok(handle)
    }

    /// 断开连接
    ///
    /// 未连接时为空操作，可安全地重复调用。引擎的 close 对已关闭的
    /// 句柄没有保障，所以句柄标识在调用 close 之前就被取走。
    pub fn disconnect<E: Engine + ?Sized>(&mut self, engine: &E) -> Result<(), TransferError> {
        if let Some(handle) = self.handle.take() {
            engine.close(handle)?;
            tracing::debug!("engine handle {} closed", handle);
        }

        Ok(())
    }

    /// 断开连接，失败时只记录日志
    ///
    /// 供所有者析构时调用。
    pub fn disconnect_on_drop<E: Engine + ?Sized>(&mut self, engine: &E) {
        if let Some(handle) = self.handle.take() {
            if let Err(error) = engine.close(handle) {
                tracing::warn!("error closing engine handle {}: {:?}", handle, error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{OptionKey, OptionValue};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// 只数调用次数的引擎
    #[derive(Default)]
    struct CountingEngine {
        inits: AtomicU64,
        applies: AtomicU64,
        closes: AtomicU64,
    }

    impl Engine for CountingEngine {
        fn init(&self) -> Result<HandleId, TransferError> {
            let id = self.inits.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(HandleId::new(id))
        }

        fn apply_option(
            &self,
            _handle: HandleId,
            _key: OptionKey,
            _value: &OptionValue,
        ) -> Result<(), TransferError> {
            self.applies.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&self, _handle: HandleId) -> Result<(), TransferError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_connect_reuses_handle_and_replays_options() {
        let engine = CountingEngine::default();
        let mut options = OptionStore::new();
        options.set(OptionKey::Url, "http://example.test");
        options.set(OptionKey::Timeout, 30i64);

        let mut lifecycle = Lifecycle::new();
        let first = lifecycle.connect(&engine, &options).unwrap();
        let second = lifecycle.connect(&engine, &options).unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.inits.load(Ordering::SeqCst), 1);
        // 两次连接各回放一遍全部选项
        assert_eq!(engine.applies.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_disconnect_twice_is_noop() {
        let engine = CountingEngine::default();
        let options = OptionStore::new();

        let mut lifecycle = Lifecycle::new();
        lifecycle.connect(&engine, &options).unwrap();
        assert!(lifecycle.is_connected());

        lifecycle.disconnect(&engine).unwrap();
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);

        // 第二次断开不再触发引擎调用
        lifecycle.disconnect(&engine).unwrap();
        assert_eq!(engine.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disconnect_before_connect_is_noop() {
        let engine = CountingEngine::default();
        let mut lifecycle = Lifecycle::new();

        lifecycle.disconnect(&engine).unwrap();
        assert_eq!(engine.closes.load(Ordering::SeqCst), 0);
        assert!(!lifecycle.is_connected());
    }
}
