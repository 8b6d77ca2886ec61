//! Session 管理模块
//!
//! 提供 Session 的创建、验证、撤销与存储，包括：
//!
//! - 安全的不透明 Session 令牌生成
//! - 滑动空闲过期：每次成功验证将空闲窗口从当前时刻重新开始
//! - 可选的绝对上限：无论多么活跃，Session 自创建起不超过该时长
//! - 强一致的撤销：撤销返回后任何验证都不会再接受该令牌
//! - 可插拔的存储后端（内存、自定义实现）
//!
//! 时间以参数显式传入，便于确定性测试。
//!
//! ## 示例
//!
//! ```rust
//! use authcore::session::{SessionConfig, SessionManager};
//! use chrono::Utc;
//!
//! let manager = SessionManager::new(SessionConfig::default());
//! let now = Utc::now();
//!
//! let session = manager.create("crenz", now).unwrap();
//! let validated = manager.validate(&session.token, now).unwrap();
//! assert_eq!(validated.identity, "crenz");
//!
//! manager.revoke(&session.token).unwrap();
//! assert!(manager.validate(&session.token, now).is_err());
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{AuthError, Error, Result, StorageError};
use crate::random::generate_random_base64_url;

/// 默认空闲超时（秒）
pub const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 1800;

/// 默认令牌长度（字节）
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// Session 数据结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// 不透明令牌（唯一标识符）
    pub token: String,

    /// 关联的账户标识
    pub identity: String,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 最后一次成功验证的时间
    pub last_activity_at: DateTime<Utc>,

    /// 是否已被撤销
    pub revoked: bool,
}

impl Session {
    fn new(identity: impl Into<String>, token: String, now: DateTime<Utc>) -> Self {
        Self {
            token,
            identity: identity.into(),
            created_at: now,
            last_activity_at: now,
            revoked: false,
        }
    }

    /// 在给定配置下计算过期时间
    ///
    /// 取空闲过期与绝对上限中较早者。
    pub fn expires_at(&self, config: &SessionConfig) -> DateTime<Utc> {
        let idle_deadline = self.last_activity_at + config.idle_timeout;
        match config.absolute_cap {
            Some(cap) => idle_deadline.min(self.created_at + cap),
            None => idle_deadline,
        }
    }

    /// 检查 Session 在给定时刻是否已过期
    pub fn is_expired(&self, config: &SessionConfig, now: DateTime<Utc>) -> bool {
        now >= self.expires_at(config)
    }
}

/// Session 配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 空闲超时：距最后一次活动超过此时长后过期
    pub idle_timeout: Duration,

    /// 绝对上限：自创建起的最大存活时长，`None` 表示不限制
    pub absolute_cap: Option<Duration>,

    /// 令牌长度（字节数）
    pub token_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::seconds(DEFAULT_IDLE_TIMEOUT_SECS),
            absolute_cap: None,
            token_length: DEFAULT_TOKEN_LENGTH,
        }
    }
}

impl SessionConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置空闲超时
    pub fn with_idle_timeout(mut self, duration: Duration) -> Self {
        self.idle_timeout = duration;
        self
    }

    /// 设置绝对上限
    pub fn with_absolute_cap(mut self, cap: Duration) -> Self {
        self.absolute_cap = Some(cap);
        self
    }

    /// 设置令牌长度
    pub fn with_token_length(mut self, length: usize) -> Self {
        self.token_length = length;
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout <= Duration::zero() {
            return Err(Error::config("idle_timeout", "must be positive"));
        }
        if let Some(cap) = self.absolute_cap {
            if cap < self.idle_timeout {
                return Err(Error::config(
                    "absolute_cap",
                    "must be at least the idle timeout",
                ));
            }
        }
        if self.token_length < 16 {
            return Err(Error::config("token_length", "must be at least 16 bytes"));
        }
        Ok(())
    }
}

/// Session 存储 trait
///
/// 实现此 trait 可以自定义 Session 的存储后端。
///
/// [`SessionStore::mutate`] 是对已存在 Session 唯一的写入路径：
/// 实现必须保证闭包在该令牌的独占临界区内执行，验证的
/// "检查-刷新" 与撤销的标记写入不会交错，已写入的撤销标记
/// 不可能被并发验证的刷新覆盖回去。
pub trait SessionStore: Send + Sync {
    /// 保存 Session
    fn save(&self, session: &Session) -> Result<()>;

    /// 获取 Session 快照
    fn get(&self, token: &str) -> Result<Option<Session>>;

    /// 在令牌的独占临界区内执行修改
    ///
    /// 令牌不存在时返回 [`StorageError::NotFound`]。
    fn mutate(&self, token: &str, f: &mut dyn FnMut(&mut Session)) -> Result<()>;

    /// 删除 Session
    fn delete(&self, token: &str) -> Result<()>;

    /// 获取账户的所有 Session
    fn get_by_identity(&self, identity: &str) -> Result<Vec<Session>>;

    /// 获取所有 Session 的快照
    fn all(&self) -> Result<Vec<Session>>;

    /// 获取 Session 总数
    fn count(&self) -> Result<usize>;
}

/// 内存 Session 存储
///
/// 用于开发和测试，生产环境建议使用 Redis 等持久化存储。
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    fn get(&self, token: &str) -> Result<Option<Session>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(sessions.get(token).cloned())
    }

    fn mutate(&self, token: &str, f: &mut dyn FnMut(&mut Session)) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        match sessions.get_mut(token) {
            Some(session) => {
                f(session);
                Ok(())
            }
            None => Err(Error::Storage(StorageError::NotFound(token.to_string()))),
        }
    }

    fn delete(&self, token: &str) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        sessions.remove(token);
        Ok(())
    }

    fn get_by_identity(&self, identity: &str) -> Result<Vec<Session>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(sessions
            .values()
            .filter(|s| s.identity == identity)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<Session>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(sessions.values().cloned().collect())
    }

    fn count(&self) -> Result<usize> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(sessions.len())
    }
}

/// Session 管理器
///
/// 在存储之上实现滑动过期与撤销语义。
pub struct SessionManager {
    config: SessionConfig,
    store: Box<dyn SessionStore>,
}

impl SessionManager {
    /// 使用默认内存存储创建管理器
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            store: Box::new(InMemorySessionStore::new()),
        }
    }

    /// 使用自定义存储创建管理器
    pub fn with_store(config: SessionConfig, store: Box<dyn SessionStore>) -> Self {
        Self { config, store }
    }

    /// 获取配置
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 为账户创建新 Session
    pub fn create(&self, identity: &str, now: DateTime<Utc>) -> Result<Session> {
        let token = generate_random_base64_url(self.config.token_length)?;
        let session = Session::new(identity, token, now);
        self.store.save(&session)?;
        Ok(session)
    }

    /// 验证令牌
    ///
    /// 成功时刷新空闲窗口并返回更新后的 Session。撤销与过期
    /// 返回不同的错误，便于调用方区分展示；未知令牌返回
    /// [`AuthError::SessionNotFound`]。
    ///
    /// 检查与刷新在令牌的独占临界区内完成：与 [`revoke`] 并发
    /// 执行时，撤销标记一旦写入就不可能被本方法的刷新覆盖。
    ///
    /// [`revoke`]: SessionManager::revoke
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Session> {
        let mut outcome: Result<Session> = Err(Error::Auth(AuthError::SessionNotFound));
        let mutated = self.store.mutate(token, &mut |session| {
            outcome = if session.revoked {
                Err(Error::Auth(AuthError::SessionRevoked))
            } else if session.is_expired(&self.config, now) {
                Err(Error::Auth(AuthError::SessionExpired))
            } else {
                session.last_activity_at = now;
                Ok(session.clone())
            };
        });
        match mutated {
            Ok(()) => {}
            Err(Error::Storage(StorageError::NotFound(_))) => {
                return Err(Error::Auth(AuthError::SessionNotFound));
            }
            Err(e) => return Err(e),
        }

        // 惰性清理：过期的 Session 在下次验证时删除
        if let Err(Error::Auth(AuthError::SessionExpired)) = &outcome {
            self.store.delete(token)?;
        }
        outcome
    }

    /// 撤销一个 Session
    ///
    /// 撤销是立即生效的：本方法返回后任何 [`validate`] 调用都
    /// 不会再接受该令牌。撤销未知令牌不报错。
    ///
    /// [`validate`]: SessionManager::validate
    pub fn revoke(&self, token: &str) -> Result<()> {
        match self.store.mutate(token, &mut |session| session.revoked = true) {
            Ok(()) | Err(Error::Storage(StorageError::NotFound(_))) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// 撤销账户的所有 Session
    ///
    /// 返回被撤销的数量。用于密码更改和管理员强制下线。
    pub fn revoke_all_for(&self, identity: &str) -> Result<usize> {
        let mut revoked = 0;
        for session in self.store.get_by_identity(identity)? {
            let mut newly_revoked = false;
            match self.store.mutate(&session.token, &mut |s| {
                if !s.revoked {
                    s.revoked = true;
                    newly_revoked = true;
                }
            }) {
                Ok(()) => {}
                Err(Error::Storage(StorageError::NotFound(_))) => {}
                Err(e) => return Err(e),
            }
            if newly_revoked {
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    /// 清理过期与已撤销的 Session
    ///
    /// 返回删除的数量。
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut purged = 0;
        for session in self.store.all()? {
            if session.revoked || session.is_expired(&self.config, now) {
                self.store.delete(&session.token)?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// 获取账户当前活跃的 Session
    pub fn active_sessions_for(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        Ok(self
            .store
            .get_by_identity(identity)?
            .into_iter()
            .filter(|s| !s.revoked && !s.is_expired(&self.config, now))
            .collect())
    }

    /// Session 总数（含过期未清理的）
    pub fn session_count(&self) -> Result<usize> {
        self.store.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(SessionConfig::default())
    }

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.idle_timeout, Duration::seconds(1800));
        assert!(config.absolute_cap.is_none());
        assert_eq!(config.token_length, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let bad = SessionConfig::new().with_idle_timeout(Duration::zero());
        assert!(bad.validate().is_err());

        let bad = SessionConfig::new()
            .with_idle_timeout(Duration::minutes(30))
            .with_absolute_cap(Duration::minutes(10));
        assert!(bad.validate().is_err());

        let bad = SessionConfig::new().with_token_length(8);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_create_and_validate() {
        let manager = manager();
        let now = Utc::now();

        let session = manager.create("crenz", now).unwrap();
        assert_eq!(session.identity, "crenz");
        assert!(session.token.len() >= 43);

        let validated = manager.validate(&session.token, now).unwrap();
        assert_eq!(validated.identity, "crenz");
    }

    #[test]
    fn test_unknown_token() {
        let manager = manager();
        let err = manager.validate("bogus", Utc::now()).unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::SessionNotFound));
    }

    #[test]
    fn test_idle_expiry() {
        let manager = manager();
        let now = Utc::now();
        let session = manager.create("crenz", now).unwrap();

        // 29 分钟后仍有效
        manager
            .validate(&session.token, now + Duration::minutes(29))
            .unwrap();
        // 再过 31 分钟空闲窗口耗尽
        let err = manager
            .validate(&session.token, now + Duration::minutes(60))
            .unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::SessionExpired));
    }

    #[test]
    fn test_sliding_window_keeps_session_alive() {
        let manager = manager();
        let now = Utc::now();
        let session = manager.create("crenz", now).unwrap();

        // 每 20 分钟活动一次，远超单个空闲窗口仍然存活
        let mut t = now;
        for _ in 0..6 {
            t += Duration::minutes(20);
            manager.validate(&session.token, t).unwrap();
        }
        assert_eq!(t, now + Duration::minutes(120));
    }

    #[test]
    fn test_absolute_cap_terminates_active_session() {
        let config = SessionConfig::default().with_absolute_cap(Duration::hours(1));
        let manager = SessionManager::new(config);
        let now = Utc::now();
        let session = manager.create("crenz", now).unwrap();

        // 持续活动无法越过绝对上限
        manager
            .validate(&session.token, now + Duration::minutes(25))
            .unwrap();
        manager
            .validate(&session.token, now + Duration::minutes(50))
            .unwrap();
        let err = manager
            .validate(&session.token, now + Duration::minutes(61))
            .unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::SessionExpired));
    }

    #[test]
    fn test_revocation_is_immediate_and_distinct() {
        let manager = manager();
        let now = Utc::now();
        let session = manager.create("crenz", now).unwrap();

        manager.revoke(&session.token).unwrap();
        let err = manager.validate(&session.token, now).unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::SessionRevoked));
    }

    #[test]
    fn test_revoke_unknown_token_is_noop() {
        let manager = manager();
        assert!(manager.revoke("bogus").is_ok());
    }

    #[test]
    fn test_revoke_all_for_identity() {
        let manager = manager();
        let now = Utc::now();
        let a = manager.create("crenz", now).unwrap();
        let b = manager.create("crenz", now).unwrap();
        let other = manager.create("other", now).unwrap();

        let revoked = manager.revoke_all_for("crenz").unwrap();
        assert_eq!(revoked, 2);
        assert!(manager.validate(&a.token, now).is_err());
        assert!(manager.validate(&b.token, now).is_err());
        manager.validate(&other.token, now).unwrap();
    }

    #[test]
    fn test_purge_expired() {
        let manager = manager();
        let now = Utc::now();
        let stale = manager.create("crenz", now).unwrap();
        let fresh = manager.create("crenz", now + Duration::minutes(45)).unwrap();
        manager.revoke(&stale.token).unwrap();

        let purged = manager.purge_expired(now + Duration::minutes(50)).unwrap();
        assert_eq!(purged, 1);
        assert_eq!(manager.session_count().unwrap(), 1);
        manager
            .validate(&fresh.token, now + Duration::minutes(50))
            .unwrap();
    }

    #[test]
    fn test_expired_session_deleted_lazily() {
        let manager = manager();
        let now = Utc::now();
        let session = manager.create("crenz", now).unwrap();

        assert_eq!(manager.session_count().unwrap(), 1);
        let _ = manager.validate(&session.token, now + Duration::hours(2));
        assert_eq!(manager.session_count().unwrap(), 0);
    }

    #[test]
    fn test_active_sessions_for() {
        let manager = manager();
        let now = Utc::now();
        let a = manager.create("crenz", now).unwrap();
        let _b = manager.create("crenz", now - Duration::hours(2)).unwrap();

        let active = manager.active_sessions_for("crenz", now).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].token, a.token);
    }

    #[test]
    fn test_revocation_survives_in_flight_validation() {
        use std::sync::Arc;
        use std::thread;

        let manager = Arc::new(manager());
        let now = Utc::now();
        let session = manager.create("crenz", now).unwrap();
        let token = session.token.clone();

        // 后台持续验证刷新活动时间，主线程在中途撤销
        let background = {
            let manager = Arc::clone(&manager);
            let token = token.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let _ = manager.validate(&token, Utc::now());
                }
            })
        };
        manager.revoke(&token).unwrap();
        background.join().unwrap();

        // 撤销标记不会被并发验证的刷新写回
        let err = manager.validate(&token, Utc::now()).unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::SessionRevoked));
    }

    #[test]
    fn test_store_mutate_missing_token() {
        let store = InMemorySessionStore::new();
        let result = store.mutate("bogus", &mut |_| {});
        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::NotFound(_)))
        ));
    }

    #[test]
    fn test_tokens_are_unique() {
        let manager = manager();
        let now = Utc::now();
        let a = manager.create("crenz", now).unwrap();
        let b = manager.create("crenz", now).unwrap();
        assert_ne!(a.token, b.token);
    }
}
