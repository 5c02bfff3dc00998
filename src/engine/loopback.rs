/// 回环引擎
///
/// 进程内的引擎实现：不做任何网络 IO，按预置路由表回应传输请求，
/// 同时记录每一次引擎调用。测试与演示都靠它驱动公共 API。

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
    engine::{
        BatchEngine, BatchResult, Diagnostics, Engine, InfoKey, Metadata, PauseState,
        ShareAction, ShareEngine, TransferEngine, TransferOutcome, TransferPayload,
    },
    error::{EngineCode, TransferError},
    options::{OptionKey, OptionValue},
    share::SharedResource,
    HandleId,
};

/// 一次引擎调用的记录
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    /// 分配句柄
    Init(HandleId),
    /// 施加选项
    ApplyOption(HandleId, OptionKey),
    /// 关闭句柄
    Close(HandleId),
    /// 执行传输
    Perform(HandleId),
    /// 暂停/恢复
    Pause(HandleId, PauseState),
    /// 共享声明
    Share(HandleId, ShareAction, SharedResource),
    /// 批次登记
    AddTransfer(HandleId, HandleId),
    /// 批次移出
    RemoveTransfer(HandleId, HandleId),
    /// 批次执行
    Run(HandleId),
}

/// 预置路由
#[derive(Debug, Clone)]
enum Route {
    Respond { status: u16, body: Bytes },
    Fail { code: EngineCode, message: String },
}

/// 单个句柄的引擎侧状态
#[derive(Debug, Default)]
struct HandleState {
    options: BTreeMap<OptionKey, OptionValue>,
    last_diagnostics: Option<Diagnostics>,
    metadata: Metadata,
    share_binding: Option<HandleId>,
    paused: PauseState,
}

#[derive(Debug, Default)]
struct Inner {
    next_handle: u64,
    handles: BTreeMap<HandleId, HandleState>,
    routes: BTreeMap<String, Route>,
    shares: BTreeMap<HandleId, BTreeSet<SharedResource>>,
    batches: BTreeMap<HandleId, Vec<HandleId>>,
    pause_results: VecDeque<EngineCode>,
    calls: Vec<EngineCall>,
}

impl Inner {
    fn state_mut(&mut self, handle: HandleId, operation: &str) -> Result<&mut HandleState, TransferError> {
        match self.handles.get_mut(&handle) {
            Some(state) => Ok(state),
            None => Err(TransferError::engine_error(
                operation,
                format!("unknown handle {}", handle),
            )),
        }
    }

    fn perform_transfer(&mut self, handle: HandleId) -> Result<TransferOutcome, TransferError> {
        let routes = self.routes.clone();
        let state = self.state_mut(handle, "perform")?;

        let url = state
            .options
            .get(&OptionKey::Url)
            .and_then(OptionValue::as_str)
            .map(str::to_owned);
        let route = url.as_deref().and_then(|url| routes.get(url).cloned());

        match route {
            Some(Route::Respond { status, body }) => {
                state.last_diagnostics = None;
                state.metadata.clear();
                if let Some(url) = url {
                    state.metadata.insert(InfoKey::EffectiveUrl, serde_json::json!(url));
                }
                state.metadata.insert(InfoKey::ResponseCode, serde_json::json!(status));
                state.metadata.insert(InfoKey::BodySize, serde_json::json!(body.len()));
                state.metadata.insert(InfoKey::TotalTime, serde_json::json!(0.0));
                state.metadata.insert(InfoKey::RedirectCount, serde_json::json!(0));

                Ok(TransferOutcome::Success(TransferPayload { status, body }))
            }
            Some(Route::Fail { code, message }) => {
                state.last_diagnostics = Some(Diagnostics { message, code });
                Ok(TransferOutcome::Failed)
            }
            None => {
                let target = url.unwrap_or_else(|| "<no url>".to_owned());
                state.last_diagnostics = Some(Diagnostics {
                    message: format!("could not resolve host: {}", target),
                    code: EngineCode::COULD_NOT_RESOLVE,
                });

                Ok(TransferOutcome::Failed)
            }
        }
    }
}

/// 回环引擎
///
/// 同一个实例同时提供三种设施，与真实引擎的形态一致：单次传输、
/// 共享池与批次句柄都从同一个引擎分配。
#[derive(Debug, Default)]
pub struct LoopbackEngine {
    inner: Mutex<Inner>,
}

impl LoopbackEngine {
    /// 创建空路由表的引擎
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一条成功路由
    pub fn respond(&self, url: impl Into<String>, status: u16, body: impl Into<Bytes>) {
        self.inner.lock().routes.insert(
            url.into(),
            Route::Respond {
                status,
                body: body.into(),
            },
        );
    }

    /// 注册一条失败路由
    pub fn fail(&self, url: impl Into<String>, code: EngineCode, message: impl Into<String>) {
        self.inner.lock().routes.insert(
            url.into(),
            Route::Fail {
                code,
                message: message.into(),
            },
        );
    }

    /// 预置接下来若干次 pause 调用的结果码
    pub fn script_pause_result(&self, code: EngineCode) {
        self.inner.lock().pause_results.push_back(code);
    }

    /// 调用记录快照
    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    /// 清空调用记录
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// 查询某个句柄上已生效的全部选项
    pub fn applied_options(&self, handle: HandleId) -> Option<BTreeMap<OptionKey, OptionValue>> {
        self.inner.lock().handles.get(&handle).map(|state| state.options.clone())
    }

    /// 查询某个传输句柄绑定的共享池句柄
    pub fn share_binding(&self, handle: HandleId) -> Option<HandleId> {
        self.inner.lock().handles.get(&handle).and_then(|state| state.share_binding)
    }

    /// 查询某个池句柄声明共享的资源类别
    pub fn shared_resources(&self, handle: HandleId) -> Vec<SharedResource> {
        self.inner
            .lock()
            .shares
            .get(&handle)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 查询批次成员
    pub fn batch_members(&self, batch: HandleId) -> Vec<HandleId> {
        self.inner.lock().batches.get(&batch).cloned().unwrap_or_default()
    }

    /// 当前存活的句柄数量
    pub fn live_handles(&self) -> usize {
        self.inner.lock().handles.len()
    }

    /// 查询某个句柄当前的暂停状态
    pub fn pause_state(&self, handle: HandleId) -> Option<PauseState> {
        self.inner.lock().handles.get(&handle).map(|state| state.paused)
    }
}

impl Engine for LoopbackEngine {
    fn init(&self) -> Result<HandleId, TransferError> {
        let mut inner = self.inner.lock();
        inner.next_handle += 1;
        let handle = HandleId::new(inner.next_handle);
        inner.handles.insert(handle, HandleState::default());
        inner.calls.push(EngineCall::Init(handle));

        Ok(handle)
    }

    fn apply_option(
        &self,
        handle: HandleId,
        key: OptionKey,
        value: &OptionValue,
    ) -> Result<(), TransferError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::ApplyOption(handle, key));

        let state = inner.state_mut(handle, "applyOption")?;
        if key == OptionKey::SharePool {
            match value.as_handle() {
                Some(pool) => state.share_binding = Some(pool),
                None => {
                    return Err(TransferError::engine_error(
                        "applyOption",
                        "SharePool expects a handle value",
                    ))
                }
            }
        }
        state.options.insert(key, value.clone());

        Ok(())
    }

    fn close(&self, handle: HandleId) -> Result<(), TransferError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Close(handle));

        if inner.handles.remove(&handle).is_none() {
            return Err(TransferError::engine_error(
                "close",
                format!("unknown handle {}", handle),
            ));
        }
        inner.shares.remove(&handle);
        inner.batches.remove(&handle);
        for members in inner.batches.values_mut() {
            members.retain(|member| *member != handle);
        }

        Ok(())
    }
}

#[async_trait]
impl TransferEngine for LoopbackEngine {
    async fn perform(&self, handle: HandleId) -> Result<TransferOutcome, TransferError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Perform(handle));
        inner.perform_transfer(handle)
    }

    fn diagnostics(&self, handle: HandleId) -> Diagnostics {
        self.inner
            .lock()
            .handles
            .get(&handle)
            .and_then(|state| state.last_diagnostics.clone())
            .unwrap_or(Diagnostics {
                message: String::new(),
                code: EngineCode::OK,
            })
    }

    fn metadata(&self, handle: HandleId) -> Result<Metadata, TransferError> {
        let mut inner = self.inner.lock();
        let state = inner.state_mut(handle, "getMetadata")?;

        Ok(state.metadata.clone())
    }

    fn pause(&self, handle: HandleId, state: PauseState) -> EngineCode {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Pause(handle, state));

        if !inner.handles.contains_key(&handle) {
            return EngineCode::BAD_OPTION;
        }
        if let Some(code) = inner.pause_results.pop_front() {
            return code;
        }
        if let Some(handle_state) = inner.handles.get_mut(&handle) {
            handle_state.paused = state;
        }

        EngineCode::OK
    }
}

impl ShareEngine for LoopbackEngine {
    fn share(
        &self,
        handle: HandleId,
        action: ShareAction,
        resource: SharedResource,
    ) -> Result<(), TransferError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Share(handle, action, resource));

        inner.state_mut(handle, "share")?;
        let declared = inner.shares.entry(handle).or_default();
        match action {
            ShareAction::Share => {
                declared.insert(resource);
            }
            ShareAction::Unshare => {
                declared.remove(&resource);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl BatchEngine for LoopbackEngine {
    fn add_transfer(&self, batch: HandleId, member: HandleId) -> Result<(), TransferError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::AddTransfer(batch, member));

        inner.state_mut(batch, "addTransfer")?;
        inner.state_mut(member, "addTransfer")?;
        let already_registered = inner.batches.values().any(|members| members.contains(&member));
        if already_registered {
            return Err(TransferError::membership_error(format!(
                "transfer {} is already registered in a batch",
                member
            )));
        }
        inner.batches.entry(batch).or_default().push(member);

        Ok(())
    }

    fn remove_transfer(&self, batch: HandleId, member: HandleId) -> Result<(), TransferError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::RemoveTransfer(batch, member));

        let members = inner.batches.entry(batch).or_default();
        let before = members.len();
        members.retain(|registered| *registered != member);
        if members.len() == before {
            return Err(TransferError::membership_error(format!(
                "transfer {} is not registered in batch {}",
                member, batch
            )));
        }

        Ok(())
    }

    async fn run(&self, batch: HandleId) -> Result<Vec<BatchResult>, TransferError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Run(batch));

        inner.state_mut(batch, "run")?;
        let members = inner.batches.get(&batch).cloned().unwrap_or_default();

        let mut results = Vec::with_capacity(members.len());
        for member in members {
            let outcome = inner.perform_transfer(member)?;
            let diagnostics = match &outcome {
                TransferOutcome::Failed => inner
                    .handles
                    .get(&member)
                    .and_then(|state| state.last_diagnostics.clone()),
                TransferOutcome::Success(_) => None,
            };
            results.push(BatchResult {
                handle: member,
                outcome,
                diagnostics,
            });
        }

        Ok(results)
    }
}
