//! 多因素认证 (MFA) 模块
//!
//! 提供账户级的第二因素注册与验证，包括：
//!
//! - **TOTP**: 基于时间的一次性密码 (RFC 6238)
//! - **备用恢复码**: 一次性使用的应急验证码
//!
//! [`SecondFactorVerifier`] 将两者组合到账户存储之上：注册时
//! 生成 TOTP 密钥与一批备用码并写入账户，验证时从账户读取
//! 密钥进行校验。注册需要用户提交一个有效的验证码确认后才
//! 生效，避免用户扫码失败就被锁在账户之外。
//!
//! ## 使用示例
//!
//! ```rust
//! use authcore::account::{Account, AccountStore, InMemoryAccountStore, Role};
//! use authcore::mfa::SecondFactorVerifier;
//! use chrono::Utc;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryAccountStore::new());
//! store.insert(Account::new("crenz", Role::Student, "hash", Utc::now())).unwrap();
//!
//! let verifier = SecondFactorVerifier::with_defaults(store);
//! let enrollment = verifier.enroll("crenz").unwrap();
//!
//! assert_eq!(enrollment.backup_codes.len(), 10);
//! assert!(enrollment.otpauth_uri.starts_with("otpauth://totp/"));
//! ```

pub mod backup;
pub mod totp;

pub use backup::{BackupCodeConfig, BackupCodeIssuer, IssuedBackupCodes};
pub use totp::{TotpAlgorithm, TotpConfig, TotpSecret, TotpVerifier};

use crate::account::AccountStore;
use crate::error::{AuthError, Error, Result, StorageError};
use std::sync::Arc;

/// 注册结果
///
/// `secret` 与 `backup_codes` 以明文返回一次，供展示给用户；
/// 账户中只保存密钥与备用码哈希。
#[derive(Debug, Clone)]
pub struct Enrollment {
    /// TOTP 密钥（Base32 编码）
    pub secret: TotpSecret,
    /// otpauth:// URI，用于二维码
    pub otpauth_uri: String,
    /// 备用码明文
    pub backup_codes: Vec<String>,
}

/// 第二因素使用的验证方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondFactorMethod {
    /// 认证器应用生成的时间码
    Totp,
    /// 备用恢复码
    BackupCode,
}

/// 账户级第二因素验证器
pub struct SecondFactorVerifier {
    totp: TotpVerifier,
    backup: BackupCodeIssuer,
    store: Arc<dyn AccountStore>,
}

impl SecondFactorVerifier {
    /// 创建新的验证器
    pub fn new(
        totp_config: TotpConfig,
        backup_config: BackupCodeConfig,
        store: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            totp: TotpVerifier::new(totp_config),
            backup: BackupCodeIssuer::new(backup_config),
            store,
        }
    }

    /// 使用默认配置创建验证器
    pub fn with_defaults(store: Arc<dyn AccountStore>) -> Self {
        Self::new(TotpConfig::default(), BackupCodeConfig::default(), store)
    }

    /// 获取 TOTP 配置
    pub fn totp_config(&self) -> &TotpConfig {
        self.totp.config()
    }

    /// 为账户注册第二因素
    ///
    /// 生成新的 TOTP 密钥与一批备用码并写入账户。此时
    /// `totp_enabled` 仍为 `false`，需调用 [`confirm`] 提交一个
    /// 有效验证码后才启用。重复注册会覆盖之前未确认的密钥。
    ///
    /// [`confirm`]: SecondFactorVerifier::confirm
    pub fn enroll(&self, identity: &str) -> Result<Enrollment> {
        let secret = self.totp.generate_secret()?;
        let uri = self.totp.provisioning_uri(&secret, identity);
        let issued = self.backup.issue()?;

        let secret_b32 = secret.base32.clone();
        let stored_codes = issued.stored.clone();
        self.store.mutate(identity, &mut |account| {
            account.totp_secret = Some(secret_b32.clone());
            account.totp_enabled = false;
            account.backup_codes = stored_codes.clone();
        })?;

        Ok(Enrollment {
            secret,
            otpauth_uri: uri,
            backup_codes: issued.plaintext,
        })
    }

    /// 确认注册
    ///
    /// 用户提交认证器应用显示的验证码，校验通过后启用第二因素。
    pub fn confirm(&self, identity: &str, code: &str, timestamp: u64) -> Result<()> {
        let secret = self.enrolled_secret(identity)?;
        if !self.totp.verify_at(&secret, code, timestamp)? {
            return Err(Error::Auth(AuthError::InvalidTotpCode));
        }
        self.store.mutate(identity, &mut |account| {
            account.totp_enabled = true;
        })
    }

    /// 检查账户是否已启用第二因素
    pub fn is_enabled(&self, identity: &str) -> Result<bool> {
        let account = self
            .store
            .get(identity)?
            .ok_or_else(|| Error::Storage(StorageError::NotFound(identity.to_string())))?;
        Ok(account.totp_enabled)
    }

    /// 验证时间码
    pub fn verify_time_code(&self, identity: &str, code: &str, timestamp: u64) -> Result<()> {
        let secret = self.enrolled_secret(identity)?;
        if self.totp.verify_at(&secret, code, timestamp)? {
            Ok(())
        } else {
            Err(Error::Auth(AuthError::InvalidTotpCode))
        }
    }

    /// 验证并消费一个备用码
    ///
    /// 已使用过的码返回 [`AuthError::CodeAlreadyUsed`]。
    pub fn verify_backup_code(&self, identity: &str, code: &str) -> Result<()> {
        // 消费在账户锁内完成，并发提交同一个码只有一次成功
        let backup = &self.backup;
        let mut outcome: Result<()> = Err(Error::Auth(AuthError::InvalidTotpCode));
        self.store.mutate(identity, &mut |account| {
            outcome = backup.consume(code, &mut account.backup_codes);
        })?;
        outcome
    }

    /// 验证第二因素（时间码或备用码）
    ///
    /// 返回实际匹配的验证方式。
    pub fn verify_any(&self, identity: &str, code: &str, timestamp: u64) -> Result<SecondFactorMethod> {
        match self.verify_time_code(identity, code, timestamp) {
            Ok(()) => Ok(SecondFactorMethod::Totp),
            Err(Error::Auth(AuthError::InvalidTotpCode)) => {
                self.verify_backup_code(identity, code)?;
                Ok(SecondFactorMethod::BackupCode)
            }
            Err(e) => Err(e),
        }
    }

    /// 剩余可用备用码数量
    pub fn remaining_backup_codes(&self, identity: &str) -> Result<usize> {
        let account = self
            .store
            .get(identity)?
            .ok_or_else(|| Error::Storage(StorageError::NotFound(identity.to_string())))?;
        Ok(self.backup.remaining(&account.backup_codes))
    }

    /// 重新签发备用码
    ///
    /// 作废所有旧码，写入新的一批。
    pub fn reissue_backup_codes(&self, identity: &str) -> Result<Vec<String>> {
        let issued = self.backup.issue()?;
        let stored = issued.stored;
        self.store.mutate(identity, &mut |account| {
            account.backup_codes = stored.clone();
        })?;
        Ok(issued.plaintext)
    }

    /// 禁用账户的第二因素
    ///
    /// 清除密钥与所有备用码。
    pub fn disable(&self, identity: &str) -> Result<()> {
        self.store.mutate(identity, &mut |account| {
            account.totp_secret = None;
            account.totp_enabled = false;
            account.backup_codes.clear();
        })
    }

    fn enrolled_secret(&self, identity: &str) -> Result<TotpSecret> {
        let account = self
            .store
            .get(identity)?
            .ok_or_else(|| Error::Storage(StorageError::NotFound(identity.to_string())))?;
        let base32 = account
            .totp_secret
            .ok_or(Error::Auth(AuthError::InvalidTotpCode))?;
        TotpSecret::from_base32(&base32)
    }
}
