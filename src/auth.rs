//! 认证编排模块
//!
//! [`Authenticator`] 将凭证校验、锁定策略、第二因素、Session
//! 管理、密码策略与审计日志组合成完整的登录与密码管理流程。
//!
//! 登录按固定顺序推进：锁定预检查 → 凭证校验 → 第二因素 →
//! 记录结果 → 建立 Session，每一步失败立即终止并写入审计。
//! 不存在的账户与密码错误的账户走同一条失败路径（包括一次
//! 代价相同的哈希校验），对外不可区分。
//!
//! ## 示例
//!
//! ```rust
//! use authcore::account::Role;
//! use authcore::auth::Authenticator;
//! use authcore::config::SecurityConfig;
//! use chrono::Utc;
//!
//! let auth = Authenticator::new(SecurityConfig::default()).unwrap();
//! let now = Utc::now();
//!
//! auth.register("crenz", Role::Student, "Str0ng&Secret!Pass", now).unwrap();
//! let session = auth.login("crenz", "Str0ng&Secret!Pass", None, None, now).unwrap();
//! assert_eq!(session.identity, "crenz");
//! ```

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;

use crate::account::{Account, AccountStore, InMemoryAccountStore, Role};
use crate::audit::{AuditLog, InMemoryAuditLog, SecurityEvent};
use crate::config::SecurityConfig;
use crate::error::{AuthError, Error, Result, StorageError};
use crate::lockout::{AttemptOutcome, AttemptTracker, FailureReason};
use crate::mfa::{Enrollment, SecondFactorVerifier};
use crate::password::{CredentialHasher, PasswordHistoryGuard, PasswordPolicy};
use crate::session::{Session, SessionManager};

/// 认证编排器
///
/// 持有所有子组件并对外提供注册、登录、登出、密码更改与
/// 管理操作。内部组件共享同一个账户存储与审计日志。
pub struct Authenticator {
    store: Arc<dyn AccountStore>,
    hasher: CredentialHasher,
    policy: PasswordPolicy,
    history: PasswordHistoryGuard,
    tracker: AttemptTracker,
    second_factor: SecondFactorVerifier,
    sessions: SessionManager,
    audit: Arc<InMemoryAuditLog>,
    // 账户不存在时用于校验的占位哈希，使两条失败路径代价相同
    dummy_hash: String,
}

impl Authenticator {
    /// 使用内存存储创建编排器
    pub fn new(config: SecurityConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(InMemoryAccountStore::new()))
    }

    /// 使用自定义账户存储创建编排器
    pub fn with_store(config: SecurityConfig, store: Arc<dyn AccountStore>) -> Result<Self> {
        config.validate()?;
        let hasher = CredentialHasher::default();
        let dummy_hash = hasher.hash("authcore-dummy-credential")?;

        Ok(Self {
            hasher,
            policy: config.password_policy.clone(),
            history: PasswordHistoryGuard::new(config.password_history.clone()),
            tracker: AttemptTracker::new(config.lockout.clone(), store.clone()),
            second_factor: SecondFactorVerifier::new(
                config.totp.clone(),
                config.backup_codes.clone(),
                store.clone(),
            ),
            sessions: SessionManager::new(config.session.clone()),
            audit: Arc::new(InMemoryAuditLog::new()),
            dummy_hash,
            store,
        })
    }

    /// 审计日志
    pub fn audit_log(&self) -> &InMemoryAuditLog {
        &self.audit
    }

    /// Session 管理器
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// 第二因素验证器
    pub fn second_factor(&self) -> &SecondFactorVerifier {
        &self.second_factor
    }

    /// 锁定跟踪器
    pub fn lockout(&self) -> &AttemptTracker {
        &self.tracker
    }

    /// 账户存储
    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    // ========================================================================
    // 账户生命周期
    // ========================================================================

    /// 注册新账户
    ///
    /// 密码须通过强度策略校验；初始密码计入历史。
    pub fn register(
        &self,
        identity: &str,
        role: Role,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        self.policy.validate(password)?;
        let hash = self.hasher.hash(password)?;
        let account = Account::new(identity, role, hash.clone(), now);
        self.store.insert(account.clone())?;
        self.history.record_change(identity, &hash, now)?;
        Ok(account)
    }

    // ========================================================================
    // 登录与登出
    // ========================================================================

    /// 登录
    ///
    /// `second_factor` 在账户启用双因素时必须提供（时间码或备用码）。
    /// 返回新建立的 [`Session`]。
    ///
    /// 失败语义：
    /// - 账户不存在或密码错误 → [`AuthError::InvalidCredentials`]
    /// - 账户锁定中 → [`AuthError::AccountLocked`]（带剩余秒数）
    /// - 第二因素缺失或无效 → [`AuthError::InvalidTotpCode`] /
    ///   [`AuthError::CodeAlreadyUsed`]，与密码错误一样计入
    ///   连续失败计数
    pub fn login(
        &self,
        identity: &str,
        password: &str,
        second_factor: Option<&str>,
        ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let account = match self.store.get(identity)? {
            Some(account) => account,
            None => {
                // 与密码错误的路径付出同样的哈希代价
                let _ = self.hasher.verify(password, &self.dummy_hash);
                self.tracker
                    .record_failure(identity, ip, FailureReason::UnknownAccount, now)?;
                self.audit.record(
                    SecurityEvent::login_failed(identity, "unknown account").at(now),
                );
                return Err(Error::Auth(AuthError::InvalidCredentials));
            }
        };

        // 1. 锁定预检查（不推进计数，但尝试日志照记）
        if let Some(remaining) = account.remaining_lockout(now) {
            self.tracker
                .record_failure(identity, ip, FailureReason::AccountLocked, now)?;
            self.audit.record(
                SecurityEvent::login_failed(identity, "account is locked").at(now),
            );
            return Err(Error::Auth(AuthError::AccountLocked {
                remaining_seconds: remaining.num_seconds(),
            }));
        }

        // 2. 凭证校验
        if !self.hasher.verify(password, &account.credential_hash)? {
            return self.fail_login(identity, ip, FailureReason::InvalidPassword, now);
        }

        // 3. 第二因素（失败与密码错误一样推进锁定计数）
        if account.totp_enabled {
            let code = match second_factor {
                Some(code) => code,
                None => {
                    self.audit.record(
                        SecurityEvent::two_factor_failed(identity, "second factor required")
                            .at(now),
                    );
                    self.record_login_failure(identity, ip, FailureReason::InvalidSecondFactor, now)?;
                    return Err(Error::Auth(AuthError::InvalidTotpCode));
                }
            };
            match self
                .second_factor
                .verify_any(identity, code, now.timestamp() as u64)
            {
                Ok(method) => {
                    self.audit.record(
                        SecurityEvent::two_factor_verified(identity, format!("{:?}", method))
                            .at(now),
                    );
                }
                Err(e) => {
                    let reason = match e.as_auth() {
                        Some(AuthError::CodeAlreadyUsed) => "backup code already used",
                        _ => "invalid second factor code",
                    };
                    self.audit
                        .record(SecurityEvent::two_factor_failed(identity, reason).at(now));
                    self.record_login_failure(identity, ip, FailureReason::InvalidSecondFactor, now)?;
                    return Err(e);
                }
            }
        }

        // 4. 记录成功，计数归零；清除过期遗留的锁定标记
        let lifted = self.tracker.record_success(identity, ip, now)?;
        if lifted {
            self.audit
                .record(SecurityEvent::account_unlocked(identity).at(now));
        }

        // 5. 建立 Session
        let session = self.sessions.create(identity, now)?;
        let ip_text = ip.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string());
        self.audit
            .record(SecurityEvent::login_success(identity, ip_text).at(now));
        self.audit
            .record(SecurityEvent::session_created(identity).at(now));
        Ok(session)
    }

    /// 登出
    ///
    /// 撤销令牌对应的 Session；未知令牌静默成功。
    pub fn logout(&self, token: &str, now: DateTime<Utc>) -> Result<()> {
        if let Ok(session) = self.sessions.validate(token, now) {
            self.audit
                .record(SecurityEvent::session_revoked(&session.identity).at(now));
        }
        self.sessions.revoke(token)
    }

    /// 验证 Session 令牌
    pub fn validate_session(&self, token: &str, now: DateTime<Utc>) -> Result<Session> {
        self.sessions.validate(token, now)
    }

    // ========================================================================
    // 第二因素
    // ========================================================================

    /// 注册第二因素
    ///
    /// 生成密钥与备用码并写入账户；返回的明文只出现这一次。
    /// 需调用 [`confirm_second_factor`] 后才生效。
    ///
    /// [`confirm_second_factor`]: Authenticator::confirm_second_factor
    pub fn enroll_second_factor(&self, identity: &str, now: DateTime<Utc>) -> Result<Enrollment> {
        let enrollment = self.second_factor.enroll(identity)?;
        self.audit
            .record(SecurityEvent::two_factor_enrolled(identity).at(now));
        Ok(enrollment)
    }

    /// 确认第二因素注册
    ///
    /// 校验用户提交的首个验证码，通过后启用双因素。
    pub fn confirm_second_factor(
        &self,
        identity: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match self
            .second_factor
            .confirm(identity, code, now.timestamp() as u64)
        {
            Ok(()) => {
                self.audit.record(
                    SecurityEvent::two_factor_verified(identity, "Totp").at(now),
                );
                Ok(())
            }
            Err(e) => {
                self.audit.record(
                    SecurityEvent::two_factor_failed(identity, "enrollment confirmation failed")
                        .at(now),
                );
                Err(e)
            }
        }
    }

    // ========================================================================
    // 密码管理
    // ========================================================================

    /// 更改密码
    ///
    /// 要求提供当前密码；新密码须通过强度策略且不得与最近使用
    /// 的密码重复。成功后撤销该账户的所有 Session。
    pub fn change_password(
        &self,
        identity: &str,
        current_password: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let account = self
            .store
            .get(identity)?
            .ok_or_else(|| Error::Storage(StorageError::NotFound(identity.to_string())))?;

        if !self.hasher.verify(current_password, &account.credential_hash)? {
            self.audit.record(
                SecurityEvent::login_failed(identity, "password change: wrong current password")
                    .at(now),
            );
            return Err(Error::Auth(AuthError::InvalidCredentials));
        }

        self.policy.validate(new_password)?;
        self.history.check_reuse(identity, new_password)?;

        let new_hash = self.hasher.hash(new_password)?;
        let hash_for_store = new_hash.clone();
        self.store.mutate(identity, &mut |account| {
            account.credential_hash = hash_for_store.clone();
        })?;
        self.history.record_change(identity, &new_hash, now)?;

        // 旧凭证建立的 Session 全部失效
        let revoked = self.sessions.revoke_all_for(identity)?;
        self.audit
            .record(SecurityEvent::password_changed(identity).at(now));
        if revoked > 0 {
            self.audit
                .record(SecurityEvent::session_revoked(identity).at(now));
        }
        Ok(())
    }

    // ========================================================================
    // 管理操作
    // ========================================================================

    /// 管理员解锁账户
    pub fn unlock_account(&self, identity: &str, actor: &str, now: DateTime<Utc>) -> Result<()> {
        self.tracker.reset(identity)?;
        self.audit
            .record(SecurityEvent::account_unlocked(identity).at(now));
        self.audit.record(
            SecurityEvent::admin_action(actor, format!("unlocked account {}", identity)).at(now),
        );
        Ok(())
    }

    /// 管理员强制下线
    ///
    /// 撤销账户的所有 Session，返回撤销数量。
    pub fn force_logout(&self, identity: &str, actor: &str, now: DateTime<Utc>) -> Result<usize> {
        let revoked = self.sessions.revoke_all_for(identity)?;
        self.audit.record(
            SecurityEvent::admin_action(actor, format!("forced logout of {}", identity)).at(now),
        );
        if revoked > 0 {
            self.audit
                .record(SecurityEvent::session_revoked(identity).at(now));
        }
        Ok(revoked)
    }

    // ========================================================================
    // 内部方法
    // ========================================================================

    /// 统一的登录失败路径
    fn fail_login(
        &self,
        identity: &str,
        ip: Option<IpAddr>,
        reason: FailureReason,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        self.record_login_failure(identity, ip, reason, now)?;
        // 即使本次失败触发锁定，对外仍然报告凭证无效；
        // 锁定状态在下一次尝试的预检查中暴露
        Err(Error::Auth(AuthError::InvalidCredentials))
    }

    /// 推进失败计数、追加尝试日志，并在触发锁定时写入锁定事件
    fn record_login_failure(
        &self,
        identity: &str,
        ip: Option<IpAddr>,
        reason: FailureReason,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let outcome = self.tracker.record_failure(identity, ip, reason, now)?;
        self.audit
            .record(SecurityEvent::login_failed(identity, reason.to_string()).at(now));

        if let AttemptOutcome::LockedOut { until } = outcome {
            self.audit.record(
                SecurityEvent::account_locked(identity, (until - now).num_seconds()).at(now),
            );
        }
        Ok(())
    }
}
