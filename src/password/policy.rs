//! 密码策略模块
//!
//! 提供密码复杂度策略的定义与校验。校验失败时返回
//! [`AuthError::PasswordTooWeak`]，其中包含所有未满足的规则，
//! 而不是只报告第一条。

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Error, Result};

/// 密码复杂度策略
///
/// 默认值：最短 12 个字符，必须同时包含大写字母、小写字母、
/// 数字和特殊字符，并拒绝连续重复字符和顺序字符。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// 最小长度
    pub min_length: usize,

    /// 最大长度
    pub max_length: usize,

    /// 是否要求大写字母
    pub require_uppercase: bool,

    /// 是否要求小写字母
    pub require_lowercase: bool,

    /// 是否要求数字
    pub require_digit: bool,

    /// 是否要求特殊字符
    pub require_special: bool,

    /// 是否拒绝 3 个及以上连续相同字符（如 aaa）
    pub reject_repeated_chars: bool,

    /// 是否拒绝 3 个及以上顺序字符（如 abc、123）
    pub reject_sequential_chars: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 12,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            reject_repeated_chars: true,
            reject_sequential_chars: true,
        }
    }
}

impl PasswordPolicy {
    /// 创建默认策略
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建宽松策略（适用于开发环境）
    pub fn relaxed() -> Self {
        Self {
            min_length: 8,
            max_length: 256,
            require_uppercase: false,
            require_lowercase: true,
            require_digit: true,
            require_special: false,
            reject_repeated_chars: false,
            reject_sequential_chars: false,
        }
    }

    /// 设置最小长度
    pub fn with_min_length(mut self, length: usize) -> Self {
        self.min_length = length;
        self
    }

    /// 设置最大长度
    pub fn with_max_length(mut self, length: usize) -> Self {
        self.max_length = length;
        self
    }

    /// 设置是否要求特殊字符
    pub fn with_special(mut self, required: bool) -> Self {
        self.require_special = required;
        self
    }

    /// 校验候选密码
    ///
    /// 收集所有未满足的规则后一次性返回
    /// [`AuthError::PasswordTooWeak`]。
    ///
    /// # Example
    ///
    /// ```rust
    /// use authcore::password::PasswordPolicy;
    ///
    /// let policy = PasswordPolicy::default();
    /// assert!(policy.validate("Str0ng&Secure!Pw").is_ok());
    /// assert!(policy.validate("weak").is_err());
    /// ```
    pub fn validate(&self, candidate: &str) -> Result<()> {
        let mut reasons = Vec::new();
        let length = candidate.chars().count();

        if length < self.min_length {
            reasons.push(format!(
                "must be at least {} characters long",
                self.min_length
            ));
        }
        if length > self.max_length {
            reasons.push(format!(
                "must be at most {} characters long",
                self.max_length
            ));
        }
        if self.require_uppercase && !candidate.chars().any(|c| c.is_uppercase()) {
            reasons.push("must contain at least one uppercase letter".to_string());
        }
        if self.require_lowercase && !candidate.chars().any(|c| c.is_lowercase()) {
            reasons.push("must contain at least one lowercase letter".to_string());
        }
        if self.require_digit && !candidate.chars().any(|c| c.is_ascii_digit()) {
            reasons.push("must contain at least one digit".to_string());
        }
        if self.require_special && !candidate.chars().any(is_special_char) {
            reasons.push("must contain at least one special character".to_string());
        }
        if self.reject_repeated_chars && has_repeated_run(candidate) {
            reasons.push(
                "must not contain more than 2 consecutive identical characters".to_string(),
            );
        }
        if self.reject_sequential_chars && has_sequential_run(candidate) {
            reasons.push("must not contain sequential characters (abc, 123)".to_string());
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(Error::Auth(AuthError::PasswordTooWeak(reasons)))
        }
    }
}

/// 检查字符是否为特殊字符
fn is_special_char(c: char) -> bool {
    c.is_ascii_punctuation() || (c.is_ascii() && !c.is_alphanumeric() && !c.is_whitespace())
}

/// 检查是否存在 3 个及以上连续相同字符
fn has_repeated_run(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars
        .windows(3)
        .any(|w| w[0] == w[1] && w[1] == w[2])
}

/// 检查是否存在 3 个及以上顺序字符（升序或降序）
fn has_sequential_run(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| {
        let (a, b, c) = (w[0] as i32, w[1] as i32, w[2] as i32);
        (b - a == 1 && c - b == 1) || (a - b == 1 && b - c == 1)
    })
}
