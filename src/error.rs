//! 统一错误类型模块
//!
//! 提供 authcore 库中所有操作的错误类型定义。
//!
//! 认证失败（[`AuthError`]）是调用方需要逐个匹配处理的类型化结果，
//! 不属于进程级致命错误；任何操作都以 `Result` 返回而不是中止调用方。

use std::fmt;

/// authcore 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// authcore 库的错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// 认证/授权失败（对调用方可见的类型化结果）
    Auth(AuthError),

    /// 密码哈希错误
    PasswordHash(PasswordHashError),

    /// 存储错误
    Storage(StorageError),

    /// 加密错误
    Crypto(CryptoError),

    /// 配置错误
    Config(ConfigError),

    /// 内部错误
    Internal(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 创建一个配置错误
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config(ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        })
    }

    /// 如果是认证失败，返回其中的 [`AuthError`]
    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            Error::Auth(e) => Some(e),
            _ => None,
        }
    }
}

/// 认证失败的类型化结果
///
/// 不存在的账户和密码错误的已有账户都返回 [`AuthError::InvalidCredentials`]，
/// 以抵抗账户枚举；只有 [`AuthError::AccountLocked`] 允许暴露账户存在，
/// 因为用户必须知道需要等待多久。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// 用户名或密码错误（不区分账户是否存在）
    InvalidCredentials,

    /// 账户被锁定
    AccountLocked {
        /// 剩余锁定秒数
        remaining_seconds: i64,
    },

    /// Session 已过期
    SessionExpired,

    /// Session 已被撤销
    SessionRevoked,

    /// Session 不存在
    SessionNotFound,

    /// TOTP 验证码无效
    InvalidTotpCode,

    /// 备份码已被使用
    CodeAlreadyUsed,

    /// 新密码与最近使用过的密码重复
    PasswordReused,

    /// 密码不满足强度策略
    PasswordTooWeak(Vec<String>),
}

/// 密码哈希相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordHashError {
    /// 哈希生成失败
    HashFailed(String),
    /// 无效的哈希格式
    InvalidFormat(String),
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 记录未找到
    NotFound(String),
    /// 记录已存在
    AlreadyExists(String),
    /// 操作失败
    OperationFailed(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 随机数生成失败
    RngFailed(String),
    /// 密钥无效
    InvalidKey(String),
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 无效的配置值
    InvalidValue { key: String, message: String },
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Auth(e) => write!(f, "Authentication error: {}", e),
            Error::PasswordHash(e) => write!(f, "Password hash error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Crypto(e) => write!(f, "Crypto error: {}", e),
            Error::Config(e) => write!(f, "Config error: {}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "invalid username or password"),
            AuthError::AccountLocked { remaining_seconds } => {
                write!(f, "account locked, retry in {} seconds", remaining_seconds)
            }
            AuthError::SessionExpired => write!(f, "session has expired"),
            AuthError::SessionRevoked => write!(f, "session has been revoked"),
            AuthError::SessionNotFound => write!(f, "session not found"),
            AuthError::InvalidTotpCode => write!(f, "invalid one-time code"),
            AuthError::CodeAlreadyUsed => write!(f, "backup code already used"),
            AuthError::PasswordReused => {
                write!(f, "password matches a recently used password")
            }
            AuthError::PasswordTooWeak(reasons) => {
                write!(f, "password too weak: {}", reasons.join("; "))
            }
        }
    }
}

impl fmt::Display for PasswordHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordHashError::HashFailed(msg) => write!(f, "hash generation failed: {}", msg),
            PasswordHashError::InvalidFormat(msg) => write!(f, "invalid hash format: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(item) => write!(f, "not found: {}", item),
            StorageError::AlreadyExists(item) => write!(f, "already exists: {}", item),
            StorageError::OperationFailed(msg) => write!(f, "storage operation failed: {}", msg),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::RngFailed(msg) => write!(f, "random number generation failed: {}", msg),
            CryptoError::InvalidKey(msg) => write!(f, "invalid key: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid configuration value for '{}': {}", key, message)
            }
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::error::Error for AuthError {}
impl std::error::Error for PasswordHashError {}
impl std::error::Error for StorageError {}
impl std::error::Error for CryptoError {}
impl std::error::Error for ConfigError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        Error::Auth(err)
    }
}

impl From<PasswordHashError> for Error {
    fn from(err: PasswordHashError) -> Self {
        Error::PasswordHash(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}
