//! 账户实体模块
//!
//! 定义安全核心的根实体 [`Account`] 及其存储抽象。
//! 其余实体（登录尝试、Session、安全事件、密码历史）都通过
//! 账户标识引用它。
//!
//! 并发模型：[`InMemoryAccountStore`] 为每个账户持有独立的互斥锁，
//! [`AccountStore::mutate`] 在持锁状态下执行整个读-改-写，
//! 这是失败计数器和锁定时间戳唯一合法的修改路径。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{Error, Result, StorageError};

/// 账户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    /// 学生
    #[default]
    Student,
    /// 教师
    Teacher,
    /// 家长
    Parent,
    /// 管理员
    Admin,
}

impl Role {
    /// 获取角色名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
            Role::Parent => "PARENT",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 存储的备份码
///
/// 只保存加盐哈希；明文仅在注册时返回给调用方一次。
/// 已使用的码保留 `used` 标记而不是删除，使重放能区分
/// "码无效" 和 "码已被使用"。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBackupCode {
    /// 备份码的加盐哈希
    pub hash: String,
    /// 是否已被消费
    pub used: bool,
}

/// 账户实体
///
/// 不变量：`locked_until` 要么不存在，要么在账户处于锁定状态时
/// 严格位于未来；账户回到活跃状态时被清除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// 账户标识（用户名）
    pub identity: String,

    /// 角色
    pub role: Role,

    /// 凭证哈希（PHC 字符串）
    pub credential_hash: String,

    /// 连续失败尝试次数
    pub failed_attempts: u32,

    /// 锁定截止时间
    pub locked_until: Option<DateTime<Utc>>,

    /// TOTP 共享密钥（Base32），未注册双因素时为空
    pub totp_secret: Option<String>,

    /// 双因素认证是否已启用
    pub totp_enabled: bool,

    /// 备份码（加盐哈希）
    pub backup_codes: Vec<StoredBackupCode>,

    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// 创建新账户
    ///
    /// 创建时间由调用方显式传入，与本库其余时间参数保持一致。
    pub fn new(
        identity: impl Into<String>,
        role: Role,
        credential_hash: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity: identity.into(),
            role,
            credential_hash: credential_hash.into(),
            failed_attempts: 0,
            locked_until: None,
            totp_secret: None,
            totp_enabled: false,
            backup_codes: Vec::new(),
            created_at,
        }
    }

    /// 检查账户在给定时刻是否被锁定
    ///
    /// 锁定采用惰性过期：`now >= locked_until` 时账户在逻辑上已恢复活跃，
    /// 即使尚未有任何写操作清理 `locked_until` 字段。
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        match self.locked_until {
            Some(until) => now < until,
            None => false,
        }
    }

    /// 获取剩余锁定时间
    pub fn remaining_lockout(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.locked_until.and_then(|until| {
            if now < until {
                Some(until - now)
            } else {
                None
            }
        })
    }

    /// 未使用的备份码数量
    pub fn unused_backup_codes(&self) -> usize {
        self.backup_codes.iter().filter(|c| !c.used).count()
    }
}

/// 账户存储 trait
///
/// [`AccountStore::mutate`] 是对账户状态唯一的写入路径：
/// 实现必须保证闭包在该账户的独占临界区内执行，
/// 使 "读计数-递增-比较阈值-写锁定" 构成单个原子单元。
pub trait AccountStore: Send + Sync {
    /// 插入新账户
    fn insert(&self, account: Account) -> Result<()>;

    /// 获取账户快照
    fn get(&self, identity: &str) -> Result<Option<Account>>;

    /// 在账户的独占临界区内执行修改
    ///
    /// 账户不存在时返回 [`StorageError::NotFound`]。
    fn mutate(&self, identity: &str, f: &mut dyn FnMut(&mut Account)) -> Result<()>;

    /// 账户总数
    fn count(&self) -> Result<usize>;
}

/// 内存账户存储
///
/// 以账户标识为键的表，每个账户由独立的互斥锁保护，
/// 不同账户的并发修改互不阻塞。
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, Arc<Mutex<Account>>>>,
}

impl InMemoryAccountStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, identity: &str) -> Result<Option<Arc<Mutex<Account>>>> {
        let map = self
            .accounts
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(map.get(identity).cloned())
    }
}

impl AccountStore for InMemoryAccountStore {
    fn insert(&self, account: Account) -> Result<()> {
        let mut map = self
            .accounts
            .write()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        if map.contains_key(&account.identity) {
            return Err(Error::Storage(StorageError::AlreadyExists(
                account.identity.clone(),
            )));
        }
        map.insert(account.identity.clone(), Arc::new(Mutex::new(account)));
        Ok(())
    }

    fn get(&self, identity: &str) -> Result<Option<Account>> {
        match self.entry(identity)? {
            Some(cell) => {
                let account = cell.lock().map_err(|_| {
                    Error::Storage(StorageError::OperationFailed("lock poisoned".into()))
                })?;
                Ok(Some(account.clone()))
            }
            None => Ok(None),
        }
    }

    fn mutate(&self, identity: &str, f: &mut dyn FnMut(&mut Account)) -> Result<()> {
        let cell = self
            .entry(identity)?
            .ok_or_else(|| Error::Storage(StorageError::NotFound(identity.to_string())))?;
        let mut account = cell
            .lock()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        f(&mut account);
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let map = self
            .accounts
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(map.len())
    }
}
