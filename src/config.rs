//! 全局安全配置模块
//!
//! 将各组件的配置聚合为一个 [`SecurityConfig`]，通过 builder
//! 方法定制，并在交给 [`Authenticator`] 之前统一校验。
//!
//! [`Authenticator`]: crate::auth::Authenticator
//!
//! ## 示例
//!
//! ```rust
//! use authcore::config::SecurityConfig;
//! use chrono::Duration;
//!
//! let config = SecurityConfig::new()
//!     .with_lockout(|l| l.with_max_failed_attempts(3))
//!     .with_session(|s| s.with_absolute_cap(Duration::hours(12)));
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.lockout.max_failed_attempts, 3);
//! ```

use crate::error::Result;
use crate::lockout::LockoutConfig;
use crate::mfa::{BackupCodeConfig, TotpConfig};
use crate::password::{HistoryConfig, PasswordPolicy};
use crate::session::SessionConfig;

/// 聚合的安全配置
///
/// 各字段的默认值即生产推荐值：5 次失败锁定 30 分钟、
/// 30 分钟空闲超时、6 位 TOTP 码 ±1 步偏差、10 个备用码、
/// 密码至少 12 位且不得与最近 5 个重复。
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// 锁定策略
    pub lockout: LockoutConfig,
    /// Session 策略
    pub session: SessionConfig,
    /// TOTP 参数
    pub totp: TotpConfig,
    /// 备用码参数
    pub backup_codes: BackupCodeConfig,
    /// 密码强度策略
    pub password_policy: PasswordPolicy,
    /// 密码历史策略
    pub password_history: HistoryConfig,
}

impl SecurityConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 定制锁定策略
    pub fn with_lockout(mut self, f: impl FnOnce(LockoutConfig) -> LockoutConfig) -> Self {
        self.lockout = f(self.lockout);
        self
    }

    /// 定制 Session 策略
    pub fn with_session(mut self, f: impl FnOnce(SessionConfig) -> SessionConfig) -> Self {
        self.session = f(self.session);
        self
    }

    /// 定制 TOTP 参数
    pub fn with_totp(mut self, f: impl FnOnce(TotpConfig) -> TotpConfig) -> Self {
        self.totp = f(self.totp);
        self
    }

    /// 定制备用码参数
    pub fn with_backup_codes(
        mut self,
        f: impl FnOnce(BackupCodeConfig) -> BackupCodeConfig,
    ) -> Self {
        self.backup_codes = f(self.backup_codes);
        self
    }

    /// 定制密码强度策略
    pub fn with_password_policy(
        mut self,
        f: impl FnOnce(PasswordPolicy) -> PasswordPolicy,
    ) -> Self {
        self.password_policy = f(self.password_policy);
        self
    }

    /// 定制密码历史策略
    pub fn with_password_history(
        mut self,
        f: impl FnOnce(HistoryConfig) -> HistoryConfig,
    ) -> Self {
        self.password_history = f(self.password_history);
        self
    }

    /// 校验所有子配置
    pub fn validate(&self) -> Result<()> {
        self.lockout.validate()?;
        self.session.validate()?;
        self.totp.validate()?;
        self.backup_codes.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SecurityConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder_customization() {
        let config = SecurityConfig::new()
            .with_lockout(|l| l.with_max_failed_attempts(3))
            .with_session(|s| s.with_idle_timeout(Duration::minutes(10)))
            .with_totp(|t| t.with_digits(8))
            .with_backup_codes(|b| b.with_code_count(12))
            .with_password_policy(|p| p.with_min_length(16))
            .with_password_history(|h| h.with_depth(10));

        assert_eq!(config.lockout.max_failed_attempts, 3);
        assert_eq!(config.session.idle_timeout, Duration::minutes(10));
        assert_eq!(config.totp.digits, 8);
        assert_eq!(config.backup_codes.code_count, 12);
        assert_eq!(config.password_policy.min_length, 16);
        assert_eq!(config.password_history.depth, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_subconfig_rejected() {
        let config = SecurityConfig::new().with_lockout(|l| l.with_max_failed_attempts(0));
        assert!(config.validate().is_err());
    }
}
