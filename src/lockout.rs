//! 登录失败跟踪与账户锁定模块
//!
//! 提供登录尝试计数与自动锁定策略，包括：
//!
//! - **尝试跟踪器**: 记录每次登录尝试并维护连续失败计数
//! - **锁定策略**: 连续失败达到阈值时锁定账户一段时间
//! - **惰性过期**: 锁定到期后无需后台任务，下次检查时自动解除
//!
//! 计数与锁定的判定在账户级互斥锁内完成，并发的失败尝试
//! 不会绕过阈值。
//!
//! ## 使用示例
//!
//! ```rust
//! use authcore::account::{Account, AccountStore, InMemoryAccountStore, Role};
//! use authcore::lockout::{AttemptTracker, FailureReason, LockoutConfig};
//! use chrono::Utc;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryAccountStore::new());
//! store.insert(Account::new("crenz", Role::Student, "hash", Utc::now())).unwrap();
//!
//! let tracker = AttemptTracker::new(LockoutConfig::default(), store);
//! let now = Utc::now();
//!
//! for _ in 0..5 {
//!     tracker.record_failure("crenz", None, FailureReason::InvalidPassword, now).unwrap();
//! }
//! assert!(tracker.is_locked("crenz", now).unwrap());
//! ```

use crate::account::AccountStore;
use crate::error::{Error, Result, StorageError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

/// 默认连续失败阈值
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

/// 默认锁定时长（秒）
pub const DEFAULT_LOCKOUT_DURATION_SECS: i64 = 1800;

/// 锁定策略配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// 触发锁定的连续失败次数
    pub max_failed_attempts: u32,
    /// 锁定时长
    pub lockout_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_duration: Duration::seconds(DEFAULT_LOCKOUT_DURATION_SECS),
        }
    }
}

impl LockoutConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置失败阈值
    pub fn with_max_failed_attempts(mut self, max: u32) -> Self {
        self.max_failed_attempts = max;
        self
    }

    /// 设置锁定时长
    pub fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.max_failed_attempts == 0 {
            return Err(Error::config(
                "max_failed_attempts",
                "must be greater than zero",
            ));
        }
        if self.lockout_duration <= Duration::zero() {
            return Err(Error::config("lockout_duration", "must be positive"));
        }
        Ok(())
    }
}

/// 登录失败的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// 密码错误
    InvalidPassword,
    /// 账户不存在（日志仍然记录原始用户名）
    UnknownAccount,
    /// 账户处于锁定状态
    AccountLocked,
    /// 第二因素缺失或无效（密码已校验通过）
    InvalidSecondFactor,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::InvalidPassword => write!(f, "invalid password"),
            FailureReason::UnknownAccount => write!(f, "unknown account"),
            FailureReason::AccountLocked => write!(f, "account is locked"),
            FailureReason::InvalidSecondFactor => write!(f, "invalid second factor"),
        }
    }
}

/// 单次登录尝试记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    /// 提交的用户名（原样保留，未知账户也会入日志）
    pub identity: String,
    /// 来源 IP（如果已知）
    pub ip_address: Option<IpAddr>,
    /// 尝试时间
    pub timestamp: DateTime<Utc>,
    /// 是否成功
    pub success: bool,
    /// 失败原因（失败时）
    pub failure_reason: Option<FailureReason>,
}

/// 账户当前的锁定状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// 未锁定
    Active,
    /// 锁定至指定时间
    Locked {
        /// 锁定解除时间
        until: DateTime<Utc>,
    },
}

/// 记录一次尝试后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 已记录，账户仍然可用
    Recorded {
        /// 当前连续失败计数
        failed_attempts: u32,
    },
    /// 本次失败触发了锁定
    LockedOut {
        /// 锁定解除时间
        until: DateTime<Utc>,
    },
}

/// 登录尝试跟踪器
///
/// 在账户存储之上维护连续失败计数与锁定状态，并保留
/// 只追加的尝试日志。计数的递增与阈值比较在同一次
/// 原子修改内完成。
pub struct AttemptTracker {
    config: LockoutConfig,
    store: Arc<dyn AccountStore>,
    attempts: RwLock<Vec<LoginAttempt>>,
}

impl AttemptTracker {
    /// 创建新的跟踪器
    pub fn new(config: LockoutConfig, store: Arc<dyn AccountStore>) -> Self {
        Self {
            config,
            store,
            attempts: RwLock::new(Vec::new()),
        }
    }

    /// 获取配置
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// 记录一次失败尝试
    ///
    /// 尝试日志始终追加一行，未知账户也不例外。对存在的账户，
    /// 递增连续失败计数；达到阈值时锁定账户并将计数归零，返回
    /// [`AttemptOutcome::LockedOut`]。递增与比较在同一账户锁内
    /// 完成，并发失败不会越过阈值而不触发锁定。
    pub fn record_failure(
        &self,
        identity: &str,
        ip_address: Option<IpAddr>,
        reason: FailureReason,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome> {
        let threshold = self.config.max_failed_attempts;
        let duration = self.config.lockout_duration;

        let mut outcome = AttemptOutcome::Recorded { failed_attempts: 0 };
        let mutated = self.store.mutate(identity, &mut |account| {
            // 已处于锁定期内的失败不再累计
            if account.is_locked(now) {
                let until = account.locked_until.unwrap_or(now);
                outcome = AttemptOutcome::LockedOut { until };
                return;
            }
            account.failed_attempts += 1;
            if account.failed_attempts >= threshold {
                let until = now + duration;
                account.locked_until = Some(until);
                account.failed_attempts = 0;
                outcome = AttemptOutcome::LockedOut { until };
            } else {
                outcome = AttemptOutcome::Recorded {
                    failed_attempts: account.failed_attempts,
                };
            }
        });
        match mutated {
            Ok(()) => {}
            // 未知账户：不维护计数，但日志照记
            Err(Error::Storage(StorageError::NotFound(_))) => {}
            Err(e) => return Err(e),
        }

        self.append_attempt(LoginAttempt {
            identity: identity.to_string(),
            ip_address,
            timestamp: now,
            success: false,
            failure_reason: Some(reason),
        });

        Ok(outcome)
    }

    /// 记录一次成功尝试
    ///
    /// 将连续失败计数归零并清除已过期的锁定标记。返回是否
    /// 清除了一个（已过期的）锁定。
    pub fn record_success(
        &self,
        identity: &str,
        ip_address: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut lifted = false;
        self.store.mutate(identity, &mut |account| {
            account.failed_attempts = 0;
            lifted = account.locked_until.take().is_some();
        })?;

        self.append_attempt(LoginAttempt {
            identity: identity.to_string(),
            ip_address,
            timestamp: now,
            success: true,
            failure_reason: None,
        });

        Ok(lifted)
    }

    /// 检查账户是否处于锁定状态
    ///
    /// 锁定到期视为未锁定（惰性过期）。
    pub fn is_locked(&self, identity: &str, now: DateTime<Utc>) -> Result<bool> {
        Ok(matches!(
            self.lock_state(identity, now)?,
            LockState::Locked { .. }
        ))
    }

    /// 获取账户的锁定状态
    pub fn lock_state(&self, identity: &str, now: DateTime<Utc>) -> Result<LockState> {
        let account = self
            .store
            .get(identity)?
            .ok_or_else(|| Error::Storage(StorageError::NotFound(identity.to_string())))?;
        match account.locked_until {
            Some(until) if until > now => Ok(LockState::Locked { until }),
            _ => Ok(LockState::Active),
        }
    }

    /// 管理员解锁账户
    ///
    /// 清除锁定时间并将失败计数归零。
    pub fn reset(&self, identity: &str) -> Result<()> {
        self.store.mutate(identity, &mut |account| {
            account.locked_until = None;
            account.failed_attempts = 0;
        })
    }

    /// 获取账户的尝试历史
    pub fn attempts_for(&self, identity: &str) -> Vec<LoginAttempt> {
        self.attempts
            .read()
            .unwrap()
            .iter()
            .filter(|a| a.identity == identity)
            .cloned()
            .collect()
    }

    /// 获取最近 N 次尝试（新的在前）
    pub fn recent_attempts(&self, count: usize) -> Vec<LoginAttempt> {
        self.attempts
            .read()
            .unwrap()
            .iter()
            .rev()
            .take(count)
            .cloned()
            .collect()
    }

    /// 获取尝试总数
    pub fn attempt_count(&self) -> usize {
        self.attempts.read().unwrap().len()
    }

    fn append_attempt(&self, attempt: LoginAttempt) {
        self.attempts.write().unwrap().push(attempt);
    }
}
