//! 审计日志模块
//!
//! 提供安全事件的只追加记录与查询，包括：
//!
//! - **安全事件枚举**: 定义各种安全相关事件
//! - **审计日志 Trait**: 定义日志记录接口
//! - **内存实现**: 按账户、类型、时间范围查询
//!
//! 日志是只追加的：本核心的任何组件都不修改或删除已记录的事件。
//! 每个与安全相关的状态迁移恰好产生一条事件，
//! 不存在一条事件对应两次迁移的情况。
//!
//! ## 使用示例
//!
//! ```rust
//! use authcore::audit::{AuditLog, InMemoryAuditLog, SecurityEvent};
//!
//! let log = InMemoryAuditLog::new();
//!
//! log.record(SecurityEvent::login_success("crenz", "192.168.1.1"));
//! log.record(SecurityEvent::login_failed("crenz", "invalid password"));
//!
//! assert_eq!(log.events_for_account("crenz").len(), 2);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// 事件严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventSeverity {
    /// 一般信息
    #[default]
    Info,
    /// 警告
    Warning,
    /// 严重/危险
    Critical,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Info => write!(f, "INFO"),
            EventSeverity::Warning => write!(f, "WARNING"),
            EventSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// 安全事件类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// 登录成功
    LoginSuccess,
    /// 登录失败
    LoginFailed,
    /// 账户锁定
    AccountLocked,
    /// 账户解锁
    AccountUnlocked,
    /// 密码更改
    PasswordChanged,
    /// 双因素认证注册
    TwoFactorEnrolled,
    /// 双因素认证验证成功
    TwoFactorVerified,
    /// 双因素认证验证失败
    TwoFactorFailed,
    /// Session 创建
    SessionCreated,
    /// Session 撤销
    SessionRevoked,
    /// 可疑活动
    SuspiciousActivity,
    /// 管理员操作
    AdminAction,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::LoginSuccess => write!(f, "login_success"),
            EventType::LoginFailed => write!(f, "login_failed"),
            EventType::AccountLocked => write!(f, "account_locked"),
            EventType::AccountUnlocked => write!(f, "account_unlocked"),
            EventType::PasswordChanged => write!(f, "password_changed"),
            EventType::TwoFactorEnrolled => write!(f, "two_factor_enrolled"),
            EventType::TwoFactorVerified => write!(f, "two_factor_verified"),
            EventType::TwoFactorFailed => write!(f, "two_factor_failed"),
            EventType::SessionCreated => write!(f, "session_created"),
            EventType::SessionRevoked => write!(f, "session_revoked"),
            EventType::SuspiciousActivity => write!(f, "suspicious_activity"),
            EventType::AdminAction => write!(f, "admin_action"),
        }
    }
}

/// 安全事件
///
/// 表示一条不可变的安全事件记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// 事件 ID
    pub id: String,
    /// 事件类型
    pub event_type: EventType,
    /// 严重程度
    pub severity: EventSeverity,
    /// 账户标识（如果适用）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// IP 地址（如果适用）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// 事件消息/描述
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 额外元数据
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    /// 创建新的安全事件
    pub fn new(event_type: EventType, severity: EventSeverity) -> Self {
        Self {
            id: generate_event_id(),
            event_type,
            severity,
            identity: None,
            ip_address: None,
            message: None,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    // ========================================================================
    // 便捷构造方法
    // ========================================================================

    /// 创建登录成功事件
    pub fn login_success(identity: impl Into<String>, ip: impl Into<String>) -> Self {
        Self::new(EventType::LoginSuccess, EventSeverity::Info)
            .with_identity(identity)
            .with_ip(ip)
            .with_message("User logged in successfully")
    }

    /// 创建登录失败事件
    pub fn login_failed(identity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EventType::LoginFailed, EventSeverity::Warning)
            .with_identity(identity)
            .with_message(reason)
    }

    /// 创建账户锁定事件
    pub fn account_locked(identity: impl Into<String>, lockout_seconds: i64) -> Self {
        Self::new(EventType::AccountLocked, EventSeverity::Warning)
            .with_identity(identity)
            .with_detail("lockout_seconds", lockout_seconds.to_string())
            .with_message("Account locked after repeated failures")
    }

    /// 创建账户解锁事件
    pub fn account_unlocked(identity: impl Into<String>) -> Self {
        Self::new(EventType::AccountUnlocked, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Account unlocked")
    }

    /// 创建密码更改事件
    pub fn password_changed(identity: impl Into<String>) -> Self {
        Self::new(EventType::PasswordChanged, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Password changed successfully")
    }

    /// 创建双因素认证注册事件
    pub fn two_factor_enrolled(identity: impl Into<String>) -> Self {
        Self::new(EventType::TwoFactorEnrolled, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Two-factor authentication enrolled")
    }

    /// 创建双因素认证验证成功事件
    pub fn two_factor_verified(identity: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(EventType::TwoFactorVerified, EventSeverity::Info)
            .with_identity(identity)
            .with_detail("method", method.into())
            .with_message("Two-factor verification succeeded")
    }

    /// 创建双因素认证验证失败事件
    pub fn two_factor_failed(identity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EventType::TwoFactorFailed, EventSeverity::Warning)
            .with_identity(identity)
            .with_message(reason)
    }

    /// 创建 Session 创建事件
    pub fn session_created(identity: impl Into<String>) -> Self {
        Self::new(EventType::SessionCreated, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Session created")
    }

    /// 创建 Session 撤销事件
    pub fn session_revoked(identity: impl Into<String>) -> Self {
        Self::new(EventType::SessionRevoked, EventSeverity::Info)
            .with_identity(identity)
            .with_message("Session revoked")
    }

    /// 创建管理员操作事件
    pub fn admin_action(identity: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(EventType::AdminAction, EventSeverity::Info)
            .with_identity(identity)
            .with_message(description)
    }

    // ========================================================================
    // Builder 方法
    // ========================================================================

    /// 设置账户标识
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// 设置 IP 地址
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// 设置消息
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// 添加元数据
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 设置事件时间
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// 检查是否是高严重程度事件
    pub fn is_high_severity(&self) -> bool {
        matches!(self.severity, EventSeverity::Critical)
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::error::Error::internal(e.to_string()))
    }
}

/// 生成事件 ID
fn generate_event_id() -> String {
    use crate::random::generate_random_hex;
    format!(
        "evt_{}",
        generate_random_hex(16).unwrap_or_else(|_| "unknown".to_string())
    )
}

// ============================================================================
// AuditLog Trait
// ============================================================================

/// 审计日志记录器 trait
///
/// 只追加接口：实现不提供修改或删除已记录事件的途径。
pub trait AuditLog: Send + Sync {
    /// 记录安全事件
    fn record(&self, event: SecurityEvent);
}

// ============================================================================
// InMemoryAuditLog
// ============================================================================

/// 内存审计日志
///
/// 将事件按追加顺序存储在内存中，支持按账户、事件类型、
/// 时间范围查询。
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    events: Arc<RwLock<Vec<SecurityEvent>>>,
}

impl InMemoryAuditLog {
    /// 创建新的内存日志
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// 获取所有事件
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.read().unwrap().clone()
    }

    /// 获取事件数量
    pub fn event_count(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// 按账户获取事件
    pub fn events_for_account(&self, identity: &str) -> Vec<SecurityEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.identity.as_deref() == Some(identity))
            .cloned()
            .collect()
    }

    /// 按事件类型获取事件
    pub fn events_by_type(&self, event_type: &EventType) -> Vec<SecurityEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| &e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// 获取时间范围内的事件
    pub fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<SecurityEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect()
    }

    /// 获取最近 N 个事件
    pub fn recent_events(&self, count: usize) -> Vec<SecurityEvent> {
        let events = self.events.read().unwrap();
        events.iter().rev().take(count).cloned().collect()
    }

    /// 将全部事件导出为 JSON Lines
    pub fn export_json_lines(&self) -> crate::error::Result<String> {
        let events = self.events.read().unwrap();
        let mut out = String::new();
        for event in events.iter() {
            out.push_str(&event.to_json()?);
            out.push('\n');
        }
        Ok(out)
    }
}

impl AuditLog for InMemoryAuditLog {
    fn record(&self, event: SecurityEvent) {
        self.events.write().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_record_and_query() {
        let log = InMemoryAuditLog::new();
        log.record(SecurityEvent::login_success("crenz", "10.0.0.1"));
        log.record(SecurityEvent::login_failed("crenz", "invalid password"));
        log.record(SecurityEvent::password_changed("other"));

        assert_eq!(log.event_count(), 3);
        assert_eq!(log.events_for_account("crenz").len(), 2);
        assert_eq!(log.events_for_account("other").len(), 1);
    }

    #[test]
    fn test_query_by_type() {
        let log = InMemoryAuditLog::new();
        log.record(SecurityEvent::login_failed("crenz", "invalid password"));
        log.record(SecurityEvent::login_failed("crenz", "invalid password"));
        log.record(SecurityEvent::account_locked("crenz", 1800));

        assert_eq!(log.events_by_type(&EventType::LoginFailed).len(), 2);
        assert_eq!(log.events_by_type(&EventType::AccountLocked).len(), 1);
        assert_eq!(log.events_by_type(&EventType::LoginSuccess).len(), 0);
    }

    #[test]
    fn test_query_by_time_range() {
        let log = InMemoryAuditLog::new();
        let now = Utc::now();

        log.record(SecurityEvent::login_success("crenz", "10.0.0.1").at(now - Duration::hours(2)));
        log.record(SecurityEvent::login_success("crenz", "10.0.0.1").at(now));

        let recent = log.events_in_range(now - Duration::hours(1), now + Duration::hours(1));
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn test_recent_events_newest_first() {
        let log = InMemoryAuditLog::new();
        log.record(SecurityEvent::login_failed("a", "x"));
        log.record(SecurityEvent::login_success("b", "10.0.0.1"));

        let recent = log.recent_events(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].identity.as_deref(), Some("b"));
    }

    #[test]
    fn test_event_metadata() {
        let event = SecurityEvent::account_locked("crenz", 1800);
        assert_eq!(
            event.metadata.get("lockout_seconds"),
            Some(&"1800".to_string())
        );
        assert_eq!(event.severity, EventSeverity::Warning);
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::LoginSuccess.to_string(), "login_success");
        assert_eq!(EventType::TwoFactorFailed.to_string(), "two_factor_failed");
        assert_eq!(EventType::SessionRevoked.to_string(), "session_revoked");
    }

    #[test]
    fn test_event_json_round_trip() {
        let event = SecurityEvent::login_success("crenz", "10.0.0.1");
        let json = event.to_json().unwrap();
        let deserialized: SecurityEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.event_type, EventType::LoginSuccess);
        assert_eq!(deserialized.identity.as_deref(), Some("crenz"));
        assert_eq!(deserialized.ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_export_json_lines() {
        let log = InMemoryAuditLog::new();
        log.record(SecurityEvent::login_success("crenz", "10.0.0.1"));
        log.record(SecurityEvent::password_changed("crenz"));

        let export = log.export_json_lines().unwrap();
        assert_eq!(export.lines().count(), 2);
    }

    #[test]
    fn test_event_ids_unique() {
        let a = SecurityEvent::login_success("crenz", "10.0.0.1");
        let b = SecurityEvent::login_success("crenz", "10.0.0.1");
        assert_ne!(a.id, b.id);
    }
}
