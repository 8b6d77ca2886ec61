//! 密码历史模块
//!
//! 记录每个账户最近 N 次使用过的密码哈希，并在修改密码时
//! 拒绝与历史记录重复的候选密码。
//!
//! 守卫永远接触不到历史明文：重复检测通过将候选密码逐个
//! 与存储的加盐哈希做验证完成（加盐哈希无法按字节比较）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{AuthError, Error, Result, StorageError};
use crate::password::hasher::CredentialHasher;

/// 密码历史配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// 每个账户保留的历史条目数
    pub depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { depth: 5 }
    }
}

impl HistoryConfig {
    /// 设置保留深度
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

/// 密码历史条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordHistoryEntry {
    /// 账户标识
    pub identity: String,

    /// 密码哈希（PHC 字符串）
    pub hash: String,

    /// 记录时间
    pub created_at: DateTime<Utc>,
}

/// 密码历史存储 trait
pub trait PasswordHistoryStore: Send + Sync {
    /// 追加一条历史记录，并将该账户的记录裁剪到 `depth` 条（最旧的先淘汰）
    fn push(&self, entry: PasswordHistoryEntry, depth: usize) -> Result<()>;

    /// 获取账户最近的历史记录（新的在前）
    fn entries(&self, identity: &str) -> Result<Vec<PasswordHistoryEntry>>;
}

/// 内存密码历史存储
#[derive(Debug, Default)]
pub struct InMemoryPasswordHistoryStore {
    entries: RwLock<HashMap<String, Vec<PasswordHistoryEntry>>>,
}

impl InMemoryPasswordHistoryStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHistoryStore for InMemoryPasswordHistoryStore {
    fn push(&self, entry: PasswordHistoryEntry, depth: usize) -> Result<()> {
        let mut map = self
            .entries
            .write()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        let list = map.entry(entry.identity.clone()).or_default();
        list.insert(0, entry);
        list.truncate(depth);
        Ok(())
    }

    fn entries(&self, identity: &str) -> Result<Vec<PasswordHistoryEntry>> {
        let map = self
            .entries
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(map.get(identity).cloned().unwrap_or_default())
    }
}

/// 密码历史守卫
///
/// # Example
///
/// ```rust
/// use authcore::password::{HistoryConfig, PasswordHistoryGuard, hash_password};
/// use chrono::Utc;
///
/// let guard = PasswordHistoryGuard::new(HistoryConfig::default());
///
/// let old_hash = hash_password("Old&Secret1Pw!x").unwrap();
/// guard.record_change("crenz", old_hash, Utc::now()).unwrap();
///
/// // 重复使用旧密码被拒绝
/// assert!(guard.check_reuse("crenz", "Old&Secret1Pw!x").is_err());
/// // 新密码通过
/// assert!(guard.check_reuse("crenz", "New&Secret2Pw!y").is_ok());
/// ```
pub struct PasswordHistoryGuard {
    store: Box<dyn PasswordHistoryStore>,
    hasher: CredentialHasher,
    config: HistoryConfig,
}

impl PasswordHistoryGuard {
    /// 使用默认内存存储创建守卫
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            store: Box::new(InMemoryPasswordHistoryStore::new()),
            hasher: CredentialHasher::new(),
            config,
        }
    }

    /// 使用自定义存储创建守卫
    pub fn with_store(config: HistoryConfig, store: Box<dyn PasswordHistoryStore>) -> Self {
        Self {
            store,
            hasher: CredentialHasher::new(),
            config,
        }
    }

    /// 获取配置引用
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// 检查候选密码是否与最近 N 个历史密码重复
    ///
    /// 重复时返回 [`AuthError::PasswordReused`]。
    pub fn check_reuse(&self, identity: &str, candidate: &str) -> Result<()> {
        let entries = self.store.entries(identity)?;
        for entry in entries.iter().take(self.config.depth) {
            if self.hasher.verify(candidate, &entry.hash)? {
                return Err(Error::Auth(AuthError::PasswordReused));
            }
        }
        Ok(())
    }

    /// 记录一次已批准的密码修改
    ///
    /// 新哈希成为历史的第 0 条；超出深度的最旧条目被裁剪。
    pub fn record_change(
        &self,
        identity: &str,
        new_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.store.push(
            PasswordHistoryEntry {
                identity: identity.to_string(),
                hash: new_hash.into(),
                created_at: now,
            },
            self.config.depth,
        )
    }

    /// 获取账户的历史记录（新的在前）
    pub fn history(&self, identity: &str) -> Result<Vec<PasswordHistoryEntry>> {
        self.store.entries(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::hasher::hash_password;

    #[test]
    fn test_reuse_detected() {
        let guard = PasswordHistoryGuard::new(HistoryConfig::default());
        let hash = hash_password("Used&Before1!x").unwrap();
        guard.record_change("crenz", hash, Utc::now()).unwrap();

        let result = guard.check_reuse("crenz", "Used&Before1!x");
        assert!(matches!(
            result,
            Err(Error::Auth(AuthError::PasswordReused))
        ));
    }

    #[test]
    fn test_new_password_accepted() {
        let guard = PasswordHistoryGuard::new(HistoryConfig::default());
        let hash = hash_password("Used&Before1!x").unwrap();
        guard.record_change("crenz", hash, Utc::now()).unwrap();

        assert!(guard.check_reuse("crenz", "Fresh&Value2!y").is_ok());
    }

    #[test]
    fn test_no_history_means_no_reuse() {
        let guard = PasswordHistoryGuard::new(HistoryConfig::default());
        assert!(guard.check_reuse("nobody", "Whatever1&Pwd!").is_ok());
    }

    #[test]
    fn test_pruning_beyond_depth() {
        let guard = PasswordHistoryGuard::new(HistoryConfig::default().with_depth(3));

        for i in 0..4 {
            let hash = hash_password(&format!("Rotation&Pw{}!x", i)).unwrap();
            guard.record_change("crenz", hash, Utc::now()).unwrap();
        }

        // 只保留最近 3 条
        assert_eq!(guard.history("crenz").unwrap().len(), 3);

        // 最旧的密码（第 0 次）已被淘汰，可以重用
        assert!(guard.check_reuse("crenz", "Rotation&Pw0!x").is_ok());
        // 仍在窗口内的密码被拒绝
        assert!(guard.check_reuse("crenz", "Rotation&Pw3!x").is_err());
        assert!(guard.check_reuse("crenz", "Rotation&Pw1!x").is_err());
    }

    #[test]
    fn test_newest_entry_first() {
        let guard = PasswordHistoryGuard::new(HistoryConfig::default());

        let first = hash_password("First&Secret1!").unwrap();
        let second = hash_password("Second&Secret2!").unwrap();
        guard.record_change("crenz", first, Utc::now()).unwrap();
        guard.record_change("crenz", second.clone(), Utc::now()).unwrap();

        let history = guard.history("crenz").unwrap();
        assert_eq!(history[0].hash, second);
    }

    #[test]
    fn test_histories_are_per_account() {
        let guard = PasswordHistoryGuard::new(HistoryConfig::default());
        let hash = hash_password("Shared&Secret1!").unwrap();
        guard.record_change("crenz", hash, Utc::now()).unwrap();

        // 其他账户不受影响
        assert!(guard.check_reuse("other", "Shared&Secret1!").is_ok());
    }
}
