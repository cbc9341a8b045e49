use std::path::PathBuf;
use std::sync::Arc;
use toolbench::services::logger::Logger;
use toolbench::services::secrets::SecretService;
use toolbench::services::security::Security;
use toolbench::stores::SecretStore;

fn tmp_key_path() -> PathBuf {
    std::env::temp_dir().join(format!("toolbench-test-key-{}", uuid::Uuid::new_v4()))
}

fn service(security: Security) -> (SecretService, Arc<SecretStore>) {
    let store = Arc::new(SecretStore::in_memory().expect("store"));
    let service = SecretService::new(
        &Logger::new("test"),
        Arc::clone(&store),
        Arc::new(security),
    );
    (service, store)
}

#[test]
fn store_and_resolve_round_trip() {
    let (service, _) = service(Security::with_key_file(&tmp_key_path()));
    assert!(service.encryption_available());
    service.store("api_key", "tok-123").expect("store");
    assert_eq!(service.resolve("api_key").as_deref(), Some("tok-123"));
}

#[test]
fn ciphertext_at_rest_never_contains_the_plaintext() {
    let (service, store) = service(Security::with_key_file(&tmp_key_path()));
    service.store("api_key", "tok-123").expect("store");
    let at_rest = store.get("api_key").expect("get").expect("present");
    assert!(!at_rest.contains("tok-123"));
}

#[test]
fn degraded_mode_still_round_trips_with_a_marker() {
    let (service, store) = service(Security::degraded());
    assert!(!service.encryption_available());
    service.store("api_key", "tok-123").expect("store");
    assert_eq!(service.resolve("api_key").as_deref(), Some("tok-123"));
    let at_rest = store.get("api_key").expect("get").expect("present");
    assert!(at_rest.starts_with("plain:"));
    assert!(!at_rest.contains("tok-123"));
}

#[test]
fn resolve_miss_returns_none_and_literal_fallback_applies() {
    let (service, _) = service(Security::degraded());
    assert_eq!(service.resolve("missing"), None);
    assert_eq!(service.resolve_or_literal("missing"), "missing");
}

#[test]
fn undecryptable_payload_resolves_to_none() {
    let (service, store) = service(Security::with_key_file(&tmp_key_path()));
    service.store("api_key", "tok-123").expect("store");
    let ciphertext = store.get("api_key").expect("get").expect("present");

    // Same ciphertext under a different key.
    let (other, other_store) = service_with_ciphertext(&ciphertext);
    assert_eq!(other.resolve("api_key"), None);
    drop(other_store);
}

fn service_with_ciphertext(ciphertext: &str) -> (SecretService, Arc<SecretStore>) {
    let (service, store) = service(Security::with_key_file(&tmp_key_path()));
    store.put("api_key", ciphertext).expect("put");
    (service, store)
}

#[test]
fn delete_is_idempotent_and_list_is_sorted() {
    let (service, _) = service(Security::degraded());
    service.store("zeta", "1").expect("store");
    service.store("alpha", "2").expect("store");
    assert_eq!(service.list().expect("list"), vec!["alpha", "zeta"]);

    assert!(service.delete("zeta").expect("delete"));
    assert!(!service.delete("zeta").expect("repeat delete"));
    assert_eq!(service.list().expect("list"), vec!["alpha"]);
}

#[test]
fn is_reference_distinguishes_names_from_literals() {
    let (service, _) = service(Security::degraded());
    service.store("api_key", "tok").expect("store");
    assert!(service.is_reference("api_key"));
    assert!(!service.is_reference("tok"));
}
