use super::*;

// =============================================================================
// env_parse — unique keys avoid races with parallel tests.
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: u64 = env_parse("__TEST_CFG_MISSING_4410__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__TEST_CFG_VALID_4411__", "99") };
    let val: u32 = env_parse("__TEST_CFG_VALID_4411__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__TEST_CFG_VALID_4411__") };
}

#[test]
fn env_parse_invalid_returns_default() {
    unsafe { std::env::set_var("__TEST_CFG_INVALID_4412__", "soon") };
    let val: u16 = env_parse("__TEST_CFG_INVALID_4412__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__TEST_CFG_INVALID_4412__") };
}

// =============================================================================
// env_bool
// =============================================================================

#[test]
fn env_bool_true_variants() {
    for (i, val) in ["1", "true", "YES", " on "].iter().enumerate() {
        let key = format!("__TEST_CFG_TRUE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(true), "expected true for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_false_variants() {
    for (i, val) in ["0", "false", "No", "off"].iter().enumerate() {
        let key = format!("__TEST_CFG_FALSE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(false), "expected false for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_garbage_is_none() {
    let key = "__TEST_CFG_GARBAGE_4413__";
    unsafe { std::env::set_var(key, "maybe") };
    assert_eq!(env_bool(key), None);
    unsafe { std::env::remove_var(key) };
    assert_eq!(env_bool("__TEST_CFG_UNSET_4414__"), None);
}

// =============================================================================
// AppConfig
// =============================================================================

#[test]
fn with_database_url_uses_defaults() {
    let config = AppConfig::with_database_url("postgres://x");
    assert_eq!(config.database_url, "postgres://x");
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.autosave_debounce, Duration::from_millis(DEFAULT_AUTOSAVE_DEBOUNCE_MS));
    assert_eq!(config.session_idle_timeout, Duration::from_secs(1800));
    assert!(config.bootstrap_admin.is_none());
    assert!(!config.cookie_secure);
}
