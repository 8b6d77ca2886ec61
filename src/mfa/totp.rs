//! TOTP (基于时间的一次性密码) 实现模块
//!
//! 提供 TOTP 密钥生成、验证码计算与校验，兼容 Google Authenticator、
//! Authy 等应用。
//!
//! ## 特性
//!
//! - 符合 RFC 6238 标准
//! - 支持自定义时间步长、位数与偏差窗口
//! - 校验时间以参数显式传入，便于确定性测试
//! - 生成 otpauth:// URI 供认证器应用扫描
//!
//! ## 示例
//!
//! ```rust
//! use authcore::mfa::totp::{TotpConfig, TotpVerifier};
//!
//! let verifier = TotpVerifier::new(TotpConfig::default());
//! let secret = verifier.generate_secret().unwrap();
//!
//! let timestamp = 1_700_000_000;
//! let code = verifier.code_at(&secret, timestamp).unwrap();
//! assert!(verifier.verify_at(&secret, &code, timestamp).unwrap());
//! ```

use base32::{decode as base32_decode, encode as base32_encode, Alphabet};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::error::{CryptoError, Error, Result};
use crate::random::{constant_time_compare, generate_random_bytes};

/// TOTP 哈希算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotpAlgorithm {
    /// SHA-1（默认，最广泛支持）
    #[default]
    Sha1,
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
}

impl TotpAlgorithm {
    /// 获取算法名称（用于 otpauth URI）
    pub fn as_str(&self) -> &'static str {
        match self {
            TotpAlgorithm::Sha1 => "SHA1",
            TotpAlgorithm::Sha256 => "SHA256",
            TotpAlgorithm::Sha512 => "SHA512",
        }
    }
}

/// TOTP 配置
#[derive(Debug, Clone)]
pub struct TotpConfig {
    /// 时间步长（秒），默认 30 秒
    pub time_step: u64,

    /// 验证码位数，默认 6 位
    pub digits: u32,

    /// 哈希算法
    pub algorithm: TotpAlgorithm,

    /// 允许的时间偏差窗口（前后各多少个时间步）
    /// 默认为 1，即允许前后各 30 秒的误差
    pub skew: u64,

    /// 密钥长度（字节），默认 20 字节（160 位）
    pub secret_length: usize,

    /// 签发者名称（显示在认证器应用中）
    pub issuer: Option<String>,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            time_step: 30,
            digits: 6,
            algorithm: TotpAlgorithm::Sha1,
            skew: 1,
            secret_length: 20,
            issuer: None,
        }
    }
}

impl TotpConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置时间步长
    pub fn with_time_step(mut self, seconds: u64) -> Self {
        self.time_step = seconds;
        self
    }

    /// 设置验证码位数
    pub fn with_digits(mut self, digits: u32) -> Self {
        assert!((6..=8).contains(&digits), "digits must be between 6 and 8");
        self.digits = digits;
        self
    }

    /// 设置哈希算法
    pub fn with_algorithm(mut self, algorithm: TotpAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// 设置时间偏差窗口
    pub fn with_skew(mut self, skew: u64) -> Self {
        self.skew = skew;
        self
    }

    /// 设置签发者
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// 设置密钥长度
    pub fn with_secret_length(mut self, length: usize) -> Self {
        assert!(length >= 16, "secret length must be at least 16 bytes");
        self.secret_length = length;
        self
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.time_step == 0 {
            return Err(Error::config("time_step", "must be greater than zero"));
        }
        if !(6..=8).contains(&self.digits) {
            return Err(Error::config("digits", "must be between 6 and 8"));
        }
        if self.secret_length < 16 {
            return Err(Error::config("secret_length", "must be at least 16 bytes"));
        }
        Ok(())
    }
}

/// TOTP 密钥信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpSecret {
    /// 原始密钥字节
    pub raw: Vec<u8>,

    /// Base32 编码的密钥（用于显示和 URI）
    pub base32: String,
}

impl TotpSecret {
    /// 从原始字节创建
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let base32 = base32_encode(Alphabet::Rfc4648 { padding: false }, &bytes);
        Self { raw: bytes, base32 }
    }

    /// 从 Base32 字符串创建
    pub fn from_base32(base32: &str) -> Result<Self> {
        let clean = base32.replace([' ', '-'], "").to_uppercase();
        let raw = base32_decode(Alphabet::Rfc4648 { padding: false }, &clean)
            .ok_or_else(|| Error::Crypto(CryptoError::InvalidKey("invalid base32 secret".to_string())))?;
        Ok(Self { raw, base32: clean })
    }
}

/// TOTP 验证结果
#[derive(Debug, Clone)]
pub struct TotpMatch {
    /// 是否验证成功
    pub valid: bool,

    /// 匹配的时间步偏移量（0 表示当前步，负数表示过去，正数表示未来）
    pub time_step_offset: i64,
}

/// TOTP 验证器
#[derive(Debug, Clone)]
pub struct TotpVerifier {
    config: TotpConfig,
}

impl TotpVerifier {
    /// 创建新的验证器
    pub fn new(config: TotpConfig) -> Self {
        Self { config }
    }

    /// 生成新的 TOTP 密钥
    pub fn generate_secret(&self) -> Result<TotpSecret> {
        let bytes = generate_random_bytes(self.config.secret_length)?;
        Ok(TotpSecret::from_bytes(bytes))
    }

    /// 计算指定 Unix 时间戳的验证码
    pub fn code_at(&self, secret: &TotpSecret, timestamp: u64) -> Result<String> {
        let counter = timestamp / self.config.time_step;
        self.generate_hotp(&secret.raw, counter)
    }

    /// 在指定时间戳验证验证码
    ///
    /// 在 `[-skew, +skew]` 个时间步范围内逐一比较，比较使用
    /// 常量时间算法。
    pub fn verify_at(&self, secret: &TotpSecret, code: &str, timestamp: u64) -> Result<bool> {
        Ok(self.match_at(secret, code, timestamp)?.valid)
    }

    /// 在指定时间戳验证验证码并返回匹配详情
    pub fn match_at(&self, secret: &TotpSecret, code: &str, timestamp: u64) -> Result<TotpMatch> {
        let current_counter = timestamp / self.config.time_step;
        let normalized = code.replace([' ', '-'], "");

        if normalized.len() != self.config.digits as usize
            || !normalized.bytes().all(|b| b.is_ascii_digit())
        {
            return Ok(TotpMatch {
                valid: false,
                time_step_offset: 0,
            });
        }

        for offset in -(self.config.skew as i64)..=(self.config.skew as i64) {
            let check_counter = current_counter as i64 + offset;
            if check_counter < 0 {
                continue;
            }
            let expected = self.generate_hotp(&secret.raw, check_counter as u64)?;
            if constant_time_compare(normalized.as_bytes(), expected.as_bytes()) {
                return Ok(TotpMatch {
                    valid: true,
                    time_step_offset: offset,
                });
            }
        }

        Ok(TotpMatch {
            valid: false,
            time_step_offset: 0,
        })
    }

    /// 生成 otpauth:// URI
    ///
    /// 此 URI 可用于生成二维码，供认证器应用扫描。
    pub fn provisioning_uri(&self, secret: &TotpSecret, account: &str) -> String {
        let label = match self.config.issuer {
            Some(ref issuer) => format!("{}:{}", issuer, account),
            None => account.to_string(),
        };
        let mut uri = format!(
            "otpauth://totp/{}?secret={}&digits={}&period={}&algorithm={}",
            urlencoding::encode(&label),
            secret.base32,
            self.config.digits,
            self.config.time_step,
            self.config.algorithm.as_str()
        );

        if let Some(ref issuer) = self.config.issuer {
            uri.push_str(&format!("&issuer={}", urlencoding::encode(issuer)));
        }

        uri
    }

    /// 获取指定时间戳下当前验证码的剩余有效时间（秒）
    pub fn time_remaining_at(&self, timestamp: u64) -> u64 {
        self.config.time_step - (timestamp % self.config.time_step)
    }

    /// 获取配置
    pub fn config(&self) -> &TotpConfig {
        &self.config
    }

    // ========================================================================
    // 内部方法
    // ========================================================================

    /// 生成 HOTP 验证码（RFC 4226 动态截断）
    fn generate_hotp(&self, secret: &[u8], counter: u64) -> Result<String> {
        let counter_bytes = counter.to_be_bytes();

        let hash = match self.config.algorithm {
            TotpAlgorithm::Sha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(secret)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKey("invalid secret key".to_string())))?;
                mac.update(&counter_bytes);
                mac.finalize().into_bytes().to_vec()
            }
            TotpAlgorithm::Sha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(secret)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKey("invalid secret key".to_string())))?;
                mac.update(&counter_bytes);
                mac.finalize().into_bytes().to_vec()
            }
            TotpAlgorithm::Sha512 => {
                let mut mac = Hmac::<Sha512>::new_from_slice(secret)
                    .map_err(|_| Error::Crypto(CryptoError::InvalidKey("invalid secret key".to_string())))?;
                mac.update(&counter_bytes);
                mac.finalize().into_bytes().to_vec()
            }
        };

        let offset = (hash.last().copied().unwrap_or(0) & 0x0f) as usize;
        let binary = ((hash[offset] & 0x7f) as u32) << 24
            | (hash[offset + 1] as u32) << 16
            | (hash[offset + 2] as u32) << 8
            | (hash[offset + 3] as u32);

        let modulo = 10u32.pow(self.config.digits);
        let code = binary % modulo;

        Ok(format!(
            "{:0width$}",
            code,
            width = self.config.digits as usize
        ))
    }
}
