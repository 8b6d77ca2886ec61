//! 登录流程集成测试
//!
//! 覆盖完整的登录管道：凭证校验、失败计数、自动锁定、
//! 锁定过期与审计记录。

use authcore::account::Role;
use authcore::audit::EventType;
use authcore::auth::Authenticator;
use authcore::config::SecurityConfig;
use authcore::error::AuthError;
use chrono::{Duration, Utc};

const PASSWORD: &str = "Gr4de&Book!Secret";
const WRONG: &str = "Wr0ng&Password!!";

fn setup() -> Authenticator {
    let auth = Authenticator::new(SecurityConfig::default()).unwrap();
    auth.register("crenz", Role::Student, PASSWORD, Utc::now())
        .unwrap();
    auth
}

#[test]
fn full_lockout_cycle() {
    let auth = setup();
    let now = Utc::now();

    // 4 次失败：仍然可以尝试
    for _ in 0..4 {
        let err = auth.login("crenz", WRONG, None, None, now).unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::InvalidCredentials));
    }

    // 第 5 次失败触发锁定，但本次仍报告凭证无效
    let err = auth.login("crenz", WRONG, None, None, now).unwrap_err();
    assert_eq!(err.as_auth(), Some(&AuthError::InvalidCredentials));

    // 此后即使密码正确也被预检查拒绝，且带剩余秒数
    let err = auth.login("crenz", PASSWORD, None, None, now).unwrap_err();
    match err.as_auth() {
        Some(AuthError::AccountLocked { remaining_seconds }) => {
            assert!(*remaining_seconds > 0);
            assert!(*remaining_seconds <= 1800);
        }
        other => panic!("expected AccountLocked, got {:?}", other),
    }

    // 锁定期满后恢复，成功登录并重置计数
    let later = now + Duration::seconds(1801);
    let session = auth.login("crenz", PASSWORD, None, None, later).unwrap();
    assert_eq!(session.identity, "crenz");
}

#[test]
fn lockout_produces_exactly_one_audit_event() {
    let auth = setup();
    let now = Utc::now();

    for _ in 0..5 {
        let _ = auth.login("crenz", WRONG, None, None, now);
    }
    // 锁定期内继续尝试不会重复产生锁定事件
    let _ = auth.login("crenz", WRONG, None, None, now);
    let _ = auth.login("crenz", PASSWORD, None, None, now);

    let locked = auth.audit_log().events_by_type(&EventType::AccountLocked);
    assert_eq!(locked.len(), 1);
    let failed = auth.audit_log().events_by_type(&EventType::LoginFailed);
    assert_eq!(failed.len(), 7);
}

#[test]
fn unknown_account_and_wrong_password_are_indistinguishable() {
    let auth = setup();
    let now = Utc::now();

    let a = auth.login("nobody", PASSWORD, None, None, now).unwrap_err();
    let b = auth.login("crenz", WRONG, None, None, now).unwrap_err();

    assert_eq!(a.as_auth(), Some(&AuthError::InvalidCredentials));
    assert_eq!(b.as_auth(), Some(&AuthError::InvalidCredentials));
    // 错误消息也不区分两种情况
    assert_eq!(a.to_string(), b.to_string());
}

#[test]
fn successful_login_resets_failure_counter() {
    let auth = setup();
    let now = Utc::now();

    for _ in 0..4 {
        let _ = auth.login("crenz", WRONG, None, None, now);
    }
    auth.login("crenz", PASSWORD, None, None, now).unwrap();

    // 窗口从零重新开始
    for _ in 0..4 {
        let _ = auth.login("crenz", WRONG, None, None, now);
    }
    auth.login("crenz", PASSWORD, None, None, now).unwrap();
}

#[test]
fn admin_unlock_restores_access_immediately() {
    let auth = setup();
    let now = Utc::now();

    for _ in 0..5 {
        let _ = auth.login("crenz", WRONG, None, None, now);
    }
    assert!(auth.login("crenz", PASSWORD, None, None, now).is_err());

    auth.unlock_account("crenz", "principal", now).unwrap();
    auth.login("crenz", PASSWORD, None, None, now).unwrap();

    let unlocked = auth.audit_log().events_by_type(&EventType::AccountUnlocked);
    assert_eq!(unlocked.len(), 1);
    let admin = auth.audit_log().events_by_type(&EventType::AdminAction);
    assert_eq!(admin.len(), 1);
}

#[test]
fn login_records_success_and_session_events() {
    let auth = setup();
    let now = Utc::now();

    let ip = "192.168.1.10".parse().ok();
    auth.login("crenz", PASSWORD, None, ip, now).unwrap();

    let success = auth.audit_log().events_by_type(&EventType::LoginSuccess);
    assert_eq!(success.len(), 1);
    assert_eq!(success[0].ip_address.as_deref(), Some("192.168.1.10"));
    let created = auth.audit_log().events_by_type(&EventType::SessionCreated);
    assert_eq!(created.len(), 1);
}

#[test]
fn lockout_threshold_is_configurable() {
    let config = SecurityConfig::new().with_lockout(|l| l.with_max_failed_attempts(3));
    let auth = Authenticator::with_store(
        config,
        std::sync::Arc::new(authcore::account::InMemoryAccountStore::new()),
    )
    .unwrap();
    let now = Utc::now();
    auth.register("crenz", Role::Student, PASSWORD, now).unwrap();

    for _ in 0..3 {
        let _ = auth.login("crenz", WRONG, None, None, now);
    }
    let err = auth.login("crenz", PASSWORD, None, None, now).unwrap_err();
    assert!(matches!(
        err.as_auth(),
        Some(AuthError::AccountLocked { .. })
    ));
}
