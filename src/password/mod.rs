//! 密码模块
//!
//! 提供凭证哈希、密码复杂度策略与密码历史守卫。
//!
//! ## 子模块
//!
//! - **hasher**: Argon2id 加盐哈希与验证
//! - **policy**: 密码复杂度策略（最短长度、字符类别等）
//! - **history**: 防止重用最近 N 个密码
//!
//! ## 密码哈希示例
//!
//! ```rust
//! use authcore::password::{hash_password, verify_password};
//!
//! let hash = hash_password("my_secure_password").unwrap();
//! assert!(verify_password("my_secure_password", &hash).unwrap());
//! ```
//!
//! ## 密码修改流程示例
//!
//! ```rust
//! use authcore::password::{
//!     HistoryConfig, PasswordHistoryGuard, PasswordPolicy, hash_password,
//! };
//! use chrono::Utc;
//!
//! let policy = PasswordPolicy::default();
//! let guard = PasswordHistoryGuard::new(HistoryConfig::default());
//!
//! let candidate = "Br4nd&New!Secret";
//!
//! // 1. 策略检查
//! policy.validate(candidate).unwrap();
//! // 2. 重用检查
//! guard.check_reuse("crenz", candidate).unwrap();
//! // 3. 存储新哈希并写入历史
//! let hash = hash_password(candidate).unwrap();
//! guard.record_change("crenz", hash, Utc::now()).unwrap();
//! ```

pub mod hasher;
pub mod history;
pub mod policy;

pub use hasher::{CredentialHasher, hash_password, verify_password};
pub use history::{
    HistoryConfig, InMemoryPasswordHistoryStore, PasswordHistoryEntry, PasswordHistoryGuard,
    PasswordHistoryStore,
};
pub use policy::PasswordPolicy;
