/// 选项集配置系统
///
/// 三种客户端变体共用同一套选项存储：键是封闭的枚举，值是少量标量类型，
/// 连接时按键序完整回放到引擎句柄上。键不存在即为逻辑上的"未设置"，
/// 存储中不会出现值为空的条目；`Bool(false)` 与 `Int(0)` 是真实存储的值，
/// 与未设置互不混淆。

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::HandleId;

/// 选项键
///
/// 传输行为的配置槽位。`SharePool` 是专用槽位：由共享资源池在
/// 纳入客户端时写入自己的句柄，客户端下一次连接时生效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionKey {
    /// 目标地址
    Url,
    /// 目标端口
    Port,
    /// 请求方法
    Method,
    /// 请求头列表
    Headers,
    /// 请求体
    Body,
    /// 是否跟随重定向
    FollowRedirects,
    /// 最大重定向次数
    MaxRedirects,
    /// 整体超时
    Timeout,
    /// 连接超时
    ConnectTimeout,
    /// User-Agent
    UserAgent,
    /// 代理地址
    Proxy,
    /// 引擎侧详细日志
    Verbose,
    /// 共享资源池句柄
    SharePool,
    /// 批次内最大并发传输数
    MaxConcurrency,
}

/// 选项值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionValue {
    /// 字符串
    Str(String),
    /// 整数
    Int(i64),
    /// 布尔
    Bool(bool),
    /// 时长
    Duration(Duration),
    /// 字符串列表（如请求头）
    List(Vec<String>),
    /// 请求体字节
    Body(Bytes),
    /// 引擎句柄引用
    Handle(HandleId),
}

impl OptionValue {
    /// 取字符串值
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(value) => Some(value),
            _ => None,
        }
    }

    /// 取整数值
    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// 取布尔值
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// 取句柄引用
    pub fn as_handle(&self) -> Option<HandleId> {
        match self {
            OptionValue::Handle(handle) => Some(*handle),
            _ => None,
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<Duration> for OptionValue {
    fn from(value: Duration) -> Self {
        OptionValue::Duration(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::List(value)
    }
}

impl From<Bytes> for OptionValue {
    fn from(value: Bytes) -> Self {
        OptionValue::Body(value)
    }
}

impl From<HandleId> for OptionValue {
    fn from(value: HandleId) -> Self {
        OptionValue::Handle(value)
    }
}

/// 选项合并来源
///
/// 合并操作接受几种形态的来源：地址简写（写入 `Url` 槽位）、
/// 单个键值对、键值对集合、以及另一份完整的选项存储。
#[derive(Debug, Clone)]
pub enum OptionSource {
    /// 地址简写
    Address(String),
    /// 单个键值对
    Entry(OptionKey, OptionValue),
    /// 键值对集合
    Map(BTreeMap<OptionKey, OptionValue>),
    /// 完整的选项存储
    Store(OptionStore),
}

impl From<&str> for OptionSource {
    fn from(address: &str) -> Self {
        OptionSource::Address(address.to_owned())
    }
}

impl From<String> for OptionSource {
    fn from(address: String) -> Self {
        OptionSource::Address(address)
    }
}

impl From<(OptionKey, OptionValue)> for OptionSource {
    fn from((key, value): (OptionKey, OptionValue)) -> Self {
        OptionSource::Entry(key, value)
    }
}

impl From<BTreeMap<OptionKey, OptionValue>> for OptionSource {
    fn from(map: BTreeMap<OptionKey, OptionValue>) -> Self {
        OptionSource::Map(map)
    }
}

impl From<OptionStore> for OptionSource {
    fn from(store: OptionStore) -> Self {
        OptionSource::Store(store)
    }
}

impl From<&OptionStore> for OptionSource {
    fn from(store: &OptionStore) -> Self {
        OptionSource::Store(store.clone())
    }
}

/// 选项存储
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionStore {
    entries: BTreeMap<OptionKey, OptionValue>,
}

impl OptionStore {
    /// 创建空的选项存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置选项，覆盖同键旧值
    pub fn set(&mut self, key: OptionKey, value: impl Into<OptionValue>) {
        self.entries.insert(key, value.into());
    }

    /// 读取选项，未设置返回 None
    pub fn get(&self, key: OptionKey) -> Option<&OptionValue> {
        self.entries.get(&key)
    }

    /// 删除选项，不存在时为空操作
    pub fn unset(&mut self, key: OptionKey) {
        self.entries.remove(&key);
    }

    /// 是否设置了某选项
    pub fn contains(&self, key: OptionKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// 已设置的选项数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按键序遍历全部条目
    ///
    /// 连接时按此顺序回放，回放顺序因此是确定的。
    pub fn iter(&self) -> impl Iterator<Item = (&OptionKey, &OptionValue)> {
        self.entries.iter()
    }

    /// 从来源合并选项
    ///
    /// 来源条目覆盖目标中的同键条目，目标独有的条目保持不变。
    /// 返回自身以支持链式调用。
    pub fn merge_from(&mut self, source: impl Into<OptionSource>) -> &mut Self {
        match source.into() {
            OptionSource::Address(address) => {
                self.set(OptionKey::Url, OptionValue::Str(address));
            }
            OptionSource::Entry(key, value) => {
                self.entries.insert(key, value);
            }
            OptionSource::Map(map) => {
                for (key, value) in map {
                    self.entries.insert(key, value);
                }
            }
            OptionSource::Store(store) => {
                for (key, value) in store.entries {
                    self.entries.insert(key, value);
                }
            }
        }

        self
    }
}
