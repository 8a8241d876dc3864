use piot_auth::{hash_password, verify_password};

#[test]
fn argon2_hash_verifies() {
    let hash = hash_password("admin123").expect("hash");
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password(&hash, "admin123").expect("check"));
}

#[test]
fn wrong_password_rejected() {
    let hash = hash_password("admin123").expect("hash");
    assert!(!verify_password(&hash, "bad").expect("check"));
}

#[test]
fn plaintext_store_value_never_verifies() {
    assert!(!verify_password("admin123", "admin123").expect("check"));
}
