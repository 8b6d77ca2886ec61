//! 密码哈希实现
//!
//! 提供凭证哈希和验证的核心功能，使用 Argon2id 加盐哈希。
//! 验证通过 PHC 字符串中的盐重新计算摘要并进行定长比较，
//! 失败延迟不随不匹配位置变化。

use argon2::Argon2;
use password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};

use crate::error::{Error, PasswordHashError, Result};

/// 密码哈希器
///
/// # Example
///
/// ```rust
/// use authcore::password::CredentialHasher;
///
/// let hasher = CredentialHasher::default();
/// let hash = hasher.hash("my_secure_password").unwrap();
/// assert!(hash.starts_with("$argon2id"));
///
/// assert!(hasher.verify("my_secure_password", &hash).unwrap());
/// assert!(!hasher.verify("wrong_password", &hash).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CredentialHasher {
    _private: (),
}

impl CredentialHasher {
    /// 创建新的哈希器
    pub fn new() -> Self {
        Self::default()
    }

    /// 哈希密码
    ///
    /// 每次调用生成新的 16 字节随机盐，同一密码两次哈希结果不同。
    pub fn hash(&self, secret: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::fill(&mut salt_bytes).map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "failed to generate random salt: {}",
                e
            )))
        })?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| {
            Error::PasswordHash(PasswordHashError::HashFailed(format!(
                "failed to encode salt: {}",
                e
            )))
        })?;

        Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| {
                Error::PasswordHash(PasswordHashError::HashFailed(format!(
                    "argon2 hash failed: {}",
                    e
                )))
            })
    }

    /// 验证密码
    ///
    /// 密码正确返回 `Ok(true)`，错误返回 `Ok(false)`；
    /// 不泄露输入的哪一部分不匹配。
    pub fn verify(&self, secret: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            Error::PasswordHash(PasswordHashError::InvalidFormat(format!(
                "invalid argon2 hash: {}",
                e
            )))
        })?;

        Ok(Argon2::default()
            .verify_password(secret.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

// ============================================================================
// 便捷函数
// ============================================================================

/// 使用默认配置哈希密码
pub fn hash_password(secret: &str) -> Result<String> {
    CredentialHasher::default().hash(secret)
}

/// 验证密码是否匹配哈希
pub fn verify_password(secret: &str, hash: &str) -> Result<bool> {
    CredentialHasher::default().verify(secret, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = CredentialHasher::new();
        let hash = hasher.hash("test_password_123").unwrap();
        assert!(hash.starts_with("$argon2id"));

        assert!(hasher.verify("test_password_123", &hash).unwrap());
        assert!(!hasher.verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_convenience_functions() {
        let hash = hash_password("my_secure_password").unwrap();
        assert!(verify_password("my_secure_password", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_different_hashes_same_password() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();

        // 盐不同，哈希不同
        assert_ne!(hash1, hash2);
        assert!(verify_password("same_password", &hash1).unwrap());
        assert!(verify_password("same_password", &hash2).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let hasher = CredentialHasher::new();
        let result = hasher.verify("test", "not_a_phc_string");
        assert!(result.is_err());
    }

    #[test]
    fn test_unicode_password() {
        let hash = hash_password("密码测试🔐émoji").unwrap();
        assert!(verify_password("密码测试🔐émoji", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_empty_password() {
        let hash = hash_password("").unwrap();
        assert!(verify_password("", &hash).unwrap());
        assert!(!verify_password("not_empty", &hash).unwrap());
    }
}
