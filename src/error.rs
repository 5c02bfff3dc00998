use std::io;

/// 引擎结果码
///
/// 原生引擎用数字结果码描述一次操作的结局，0 表示成功。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EngineCode(u32);

impl EngineCode {
    /// 成功
    pub const OK: EngineCode = EngineCode(0);
    /// 不支持的协议
    pub const UNSUPPORTED_PROTOCOL: EngineCode = EngineCode(1);
    /// 域名解析失败
    pub const COULD_NOT_RESOLVE: EngineCode = EngineCode(6);
    /// 连接失败
    pub const COULD_NOT_CONNECT: EngineCode = EngineCode(7);
    /// 操作超时
    pub const TIMED_OUT: EngineCode = EngineCode(28);
    /// TLS 握手失败
    pub const TLS_HANDSHAKE_FAILED: EngineCode = EngineCode(35);
    /// 非法的选项键值组合
    pub const BAD_OPTION: EngineCode = EngineCode(43);
    /// 发送数据失败
    pub const SEND_ERROR: EngineCode = EngineCode(55);
    /// 接收数据失败
    pub const RECV_ERROR: EngineCode = EngineCode(56);

    /// 从原始数值创建结果码
    pub fn new(code: u32) -> Self {
        Self(code)
    }

    /// 获取原始数值
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// 是否为成功
    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    /// 静态结果码描述表
    ///
    /// 暂停一类操作只返回结果码，不会填充句柄上的诊断缓冲区，
    /// 它们的错误消息只能从这张表查出。
    pub fn description(&self) -> &'static str {
        match *self {
            Self::OK => "no error",
            Self::UNSUPPORTED_PROTOCOL => "unsupported protocol",
            Self::COULD_NOT_RESOLVE => "could not resolve host",
            Self::COULD_NOT_CONNECT => "could not connect to server",
            Self::TIMED_OUT => "operation timed out",
            Self::TLS_HANDSHAKE_FAILED => "TLS handshake failed",
            Self::BAD_OPTION => "invalid option or value",
            Self::SEND_ERROR => "failed sending data",
            Self::RECV_ERROR => "failed receiving data",
            _ => "unknown engine error",
        }
    }
}

impl std::fmt::Display for EngineCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 统一传输错误类型
///
/// 所有失败都原样抛给直接调用方：没有重试、没有退避、没有部分恢复。
#[derive(Debug, thiserror::Error, Clone)]
pub enum TransferError {
    /// 传输执行失败
    ///
    /// 消息与结果码来自失败当时句柄上的诊断缓冲区。
    #[error("Transfer failed: {message} (code {code})")]
    Transfer {
        message: String,
        code: EngineCode,
    },

    /// 暂停/恢复失败
    ///
    /// 这类操作不会写入句柄的诊断缓冲区，消息来自静态描述表。
    #[error("Pause failed: {} (code {})", .code.description(), .code)]
    Pause {
        code: EngineCode,
    },

    /// 引擎管理操作失败（init / applyOption / close）
    #[error("Engine error during {operation}: {reason}")]
    Engine {
        operation: String,
        reason: String,
    },

    /// 句柄归属错误：重复编入批次、操作未登记的句柄等
    #[error("Membership error: {reason}")]
    Membership {
        reason: String,
    },
}

impl TransferError {
    /// 创建传输错误
    pub fn transfer_error(message: impl Into<String>, code: EngineCode) -> Self {
        Self::Transfer {
            message: message.into(),
            code,
        }
    }

    /// 创建暂停错误
    pub fn pause_error(code: EngineCode) -> Self {
        Self::Pause { code }
    }

    /// 创建引擎管理错误
    pub fn engine_error(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Engine {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// 创建句柄归属错误
    pub fn membership_error(reason: impl Into<String>) -> Self {
        Self::Membership {
            reason: reason.into(),
        }
    }

    /// 获取引擎结果码（若该错误携带）
    pub fn code(&self) -> Option<EngineCode> {
        match self {
            TransferError::Transfer { code, .. } => Some(*code),
            TransferError::Pause { code } => Some(*code),
            _ => None,
        }
    }

    /// 获取错误代码
    pub fn error_code(&self) -> &'static str {
        match self {
            TransferError::Transfer { .. } => "TRANSFER_ERROR",
            TransferError::Pause { .. } => "PAUSE_ERROR",
            TransferError::Engine { .. } => "ENGINE_ERROR",
            TransferError::Membership { .. } => "MEMBERSHIP_ERROR",
        }
    }
}

/// 兼容性转换 - 引擎实现可以把底层 IO 失败直接映射为传输错误
impl From<io::Error> for TransferError {
    fn from(error: io::Error) -> Self {
        let code = match error.kind() {
            io::ErrorKind::TimedOut => EngineCode::TIMED_OUT,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset => EngineCode::COULD_NOT_CONNECT,
            io::ErrorKind::BrokenPipe => EngineCode::SEND_ERROR,
            _ => EngineCode::RECV_ERROR,
        };

        TransferError::Transfer {
            message: format!("IO error: {}", error),
            code,
        }
    }
}
