//! 备用恢复码模块
//!
//! 提供一次性备用码的签发与消费，供用户在无法使用认证器应用时
//! 完成第二因素验证。
//!
//! - 明文码只在签发时返回一次，存储的是加盐哈希
//! - 每个码只能使用一次；已消费的码保留 `used` 标记，
//!   重放会得到 [`AuthError::CodeAlreadyUsed`] 而不是普通的无效码错误
//!
//! ## 示例
//!
//! ```rust
//! use authcore::mfa::backup::{BackupCodeConfig, BackupCodeIssuer};
//!
//! let issuer = BackupCodeIssuer::new(BackupCodeConfig::default());
//! let issued = issuer.issue().unwrap();
//! assert_eq!(issued.plaintext.len(), 10);
//!
//! let mut stored = issued.stored;
//! issuer.consume(&issued.plaintext[0], &mut stored).unwrap();
//! // 第二次使用同一个码会失败
//! assert!(issuer.consume(&issued.plaintext[0], &mut stored).is_err());
//! ```

use crate::account::StoredBackupCode;
use crate::error::{AuthError, Error, Result};
use crate::password::{hash_password, verify_password};
use crate::random::generate_backup_codes;
use serde::{Deserialize, Serialize};

/// 默认备用码数量
pub const DEFAULT_CODE_COUNT: usize = 10;

/// 默认备用码随机字节数（编码为两倍长度的十六进制字符）
pub const DEFAULT_CODE_BYTES: usize = 4;

/// 备用码配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupCodeConfig {
    /// 每次签发的备用码数量
    pub code_count: usize,
    /// 每个码的随机字节数
    pub code_bytes: usize,
}

impl Default for BackupCodeConfig {
    fn default() -> Self {
        Self {
            code_count: DEFAULT_CODE_COUNT,
            code_bytes: DEFAULT_CODE_BYTES,
        }
    }
}

impl BackupCodeConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置备用码数量
    pub fn with_code_count(mut self, count: usize) -> Self {
        self.code_count = count;
        self
    }

    /// 设置每个码的随机字节数
    pub fn with_code_bytes(mut self, bytes: usize) -> Self {
        self.code_bytes = bytes;
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.code_count == 0 {
            return Err(Error::config("code_count", "must be greater than zero"));
        }
        if self.code_bytes < 4 {
            return Err(Error::config("code_bytes", "must be at least 4 bytes"));
        }
        Ok(())
    }
}

/// 一次签发的备用码
#[derive(Debug, Clone)]
pub struct IssuedBackupCodes {
    /// 明文码（只在此处出现一次，调用方展示给用户后即丢弃）
    pub plaintext: Vec<String>,
    /// 哈希后的存储形式
    pub stored: Vec<StoredBackupCode>,
}

/// 备用码签发器
#[derive(Debug, Clone, Default)]
pub struct BackupCodeIssuer {
    config: BackupCodeConfig,
}

impl BackupCodeIssuer {
    /// 创建新的签发器
    pub fn new(config: BackupCodeConfig) -> Self {
        Self { config }
    }

    /// 获取配置
    pub fn config(&self) -> &BackupCodeConfig {
        &self.config
    }

    /// 签发一批新的备用码
    ///
    /// 生成的明文码为大写十六进制字符串，存储形式为加盐哈希。
    pub fn issue(&self) -> Result<IssuedBackupCodes> {
        let plaintext = generate_backup_codes(self.config.code_count, self.config.code_bytes)?;
        let stored = plaintext
            .iter()
            .map(|code| {
                Ok(StoredBackupCode {
                    hash: hash_password(code)?,
                    used: false,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(IssuedBackupCodes { plaintext, stored })
    }

    /// 消费一个备用码
    ///
    /// 输入在比较前会去除空格、连字符并转为大写。匹配到未使用
    /// 的码时将其标记为已使用并返回 `Ok(())`；匹配到已使用的码
    /// 返回 [`AuthError::CodeAlreadyUsed`]；没有匹配返回
    /// [`AuthError::InvalidTotpCode`]。
    pub fn consume(&self, code: &str, stored: &mut [StoredBackupCode]) -> Result<()> {
        let normalized = code.replace([' ', '-'], "").to_uppercase();

        for entry in stored.iter_mut() {
            if verify_password(&normalized, &entry.hash)? {
                if entry.used {
                    return Err(Error::Auth(AuthError::CodeAlreadyUsed));
                }
                entry.used = true;
                return Ok(());
            }
        }

        Err(Error::Auth(AuthError::InvalidTotpCode))
    }

    /// 统计剩余可用的备用码数量
    pub fn remaining(&self, stored: &[StoredBackupCode]) -> usize {
        stored.iter().filter(|c| !c.used).count()
    }
}
