//! 安全随机数生成模块
//!
//! 提供密码学安全的随机数生成功能，用于生成 session token、
//! TOTP 密钥、备份码等敏感数据。

use rand::{TryRngCore, rngs::OsRng};

use crate::error::{CryptoError, Error, Result};

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Example
///
/// ```rust
/// use authcore::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(32).unwrap();
/// assert_eq!(bytes.len(), 32);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;
    Ok(bytes)
}

/// 生成指定字节数的十六进制随机字符串
///
/// 最终字符串长度为字节数的两倍。
pub fn generate_random_hex(byte_length: usize) -> Result<String> {
    let bytes = generate_random_bytes(byte_length)?;
    Ok(hex_encode(&bytes))
}

/// 生成 Base64 URL 安全编码的随机字符串（不含填充）
///
/// # Example
///
/// ```rust
/// use authcore::random::generate_random_base64_url;
///
/// let token = generate_random_base64_url(32).unwrap();
/// assert!(!token.contains('+'));
/// assert!(!token.contains('/'));
/// ```
pub fn generate_random_base64_url(byte_length: usize) -> Result<String> {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    let bytes = generate_random_bytes(byte_length)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// 生成安全的 session token
///
/// 使用 32 字节（256 位）的随机数据，远超 128 位熵的下限要求。
pub fn generate_session_token() -> Result<String> {
    generate_random_base64_url(32)
}

/// 生成一组备份码
///
/// 每个备份码为大写十六进制字符串（如 `AB12CD34`），
/// 便于打印和人工输入。
///
/// # Arguments
///
/// * `count` - 要生成的备份码数量
/// * `byte_length` - 每个备份码的随机字节数（字符数为其两倍）
///
/// # Example
///
/// ```rust
/// use authcore::random::generate_backup_codes;
///
/// let codes = generate_backup_codes(10, 4).unwrap();
/// assert_eq!(codes.len(), 10);
/// assert_eq!(codes[0].len(), 8);
/// ```
pub fn generate_backup_codes(count: usize, byte_length: usize) -> Result<Vec<String>> {
    (0..count)
        .map(|_| Ok(generate_random_hex(byte_length)?.to_uppercase()))
        .collect()
}

/// 常量时间字节比较
///
/// 比较时间只取决于输入长度，不泄露首个不同字节的位置。
/// 用于 token、验证码等敏感值的比较。
///
/// # Example
///
/// ```rust
/// use authcore::random::constant_time_compare;
///
/// assert!(constant_time_compare(b"123456", b"123456"));
/// assert!(!constant_time_compare(b"123456", b"123457"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// 常量时间字符串比较
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}

/// 字节数组转十六进制字符串
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_bytes() {
        let bytes = generate_random_bytes(32).unwrap();
        assert_eq!(bytes.len(), 32);

        // 两次生成应该不同
        let other = generate_random_bytes(32).unwrap();
        assert_ne!(bytes, other);
    }

    #[test]
    fn test_generate_random_hex() {
        let hex = generate_random_hex(16).unwrap();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_random_base64_url() {
        let token = generate_random_base64_url(32).unwrap();
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert!(!token.contains('='));
    }

    #[test]
    fn test_generate_session_token() {
        let a = generate_session_token().unwrap();
        let b = generate_session_token().unwrap();
        assert_ne!(a, b);
        // 32 bytes => 43 base64url chars
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn test_generate_backup_codes() {
        let codes = generate_backup_codes(10, 4).unwrap();
        assert_eq!(codes.len(), 10);
        for code in &codes {
            assert_eq!(code.len(), 8);
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"abcdef", b"abcdef"));
        assert!(!constant_time_compare(b"abcdef", b"abcdeg"));
        assert!(!constant_time_compare(b"abc", b"abcdef"));
        assert!(constant_time_compare(b"", b""));
    }

    #[test]
    fn test_constant_time_compare_str() {
        assert!(constant_time_compare_str("654321", "654321"));
        assert!(!constant_time_compare_str("654321", "654322"));
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x00, 0xff, 0x12]), "00ff12");
    }
}
