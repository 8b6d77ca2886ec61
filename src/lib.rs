//! # AuthCore
//!
//! 一个面向校园门户等多角色系统的身份与访问安全核心库。
//!
//! ## 功能特性
//!
//! - **密码哈希**: 使用 Argon2id 进行安全的密码哈希
//! - **密码策略**: 长度、字符类别与重复/顺序字符检查
//! - **密码历史**: 阻止重复使用最近的密码
//! - **登录锁定**: 连续失败达到阈值后自动锁定账户
//! - **MFA**: TOTP (RFC 6238) 与一次性备用恢复码
//! - **Session 管理**: 滑动空闲过期、可选绝对上限、强一致撤销
//! - **审计日志**: 所有安全相关状态迁移的只追加记录
//! - **安全随机数**: 密码学安全的令牌与验证码生成
//!
//! ## 登录示例
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
//!
//! let session = auth.login("crenz", "Str0ng&Secret!Pass", None, None, now).unwrap();
//! let validated = auth.validate_session(&session.token, now).unwrap();
//! assert_eq!(validated.identity, "crenz");
//! ```
//!
//! ## 密码哈希示例
//!
//! ```rust
//! use authcore::password::{hash_password, verify_password};
//!
//! let hash = hash_password("my_secure_password").unwrap();
//! let is_valid = verify_password("my_secure_password", &hash).unwrap();
//! assert!(is_valid);
//! ```
//!
//! ## TOTP 示例
//!
//! ```rust
//! use authcore::mfa::{TotpConfig, TotpVerifier};
//!
//! let verifier = TotpVerifier::new(TotpConfig::default());
//! let secret = verifier.generate_secret().unwrap();
//!
//! let timestamp = 1_700_000_000;
//! let code = verifier.code_at(&secret, timestamp).unwrap();
//! assert!(verifier.verify_at(&secret, &code, timestamp).unwrap());
//! ```

pub mod account;
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod lockout;
pub mod mfa;
pub mod password;
pub mod random;
pub mod session;

pub use error::{AuthError, Error, Result};

// ============================================================================
// 账户与认证相关导出
// ============================================================================

pub use account::{Account, AccountStore, InMemoryAccountStore, Role, StoredBackupCode};
pub use auth::Authenticator;
pub use config::SecurityConfig;

// ============================================================================
// 密码相关导出
// ============================================================================

pub use password::{
    CredentialHasher, HistoryConfig, PasswordHistoryGuard, PasswordPolicy, hash_password,
    verify_password,
};

// ============================================================================
// 锁定与 Session 相关导出
// ============================================================================

pub use lockout::{
    AttemptOutcome, AttemptTracker, FailureReason, LockState, LockoutConfig, LoginAttempt,
};
pub use session::{Session, SessionConfig, SessionManager, SessionStore};

// ============================================================================
// MFA 相关导出
// ============================================================================

pub use mfa::{
    BackupCodeConfig, BackupCodeIssuer, Enrollment, SecondFactorVerifier, TotpConfig, TotpSecret,
    TotpVerifier,
};

// ============================================================================
// 审计相关导出
// ============================================================================

pub use audit::{AuditLog, EventSeverity, EventType, InMemoryAuditLog, SecurityEvent};

// ============================================================================
// 随机数生成函数导出
// ============================================================================

pub use random::{
    constant_time_compare, constant_time_compare_str, generate_backup_codes,
    generate_random_base64_url, generate_random_bytes, generate_random_hex,
    generate_session_token,
};
