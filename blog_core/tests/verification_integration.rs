//! Integration tests for email verification codes.

use async_trait::async_trait;
use blog_core::ErrorKind;
use blog_core::store::{KvStore, MemoryStore, StoreResult};
use blog_core::verification::{
    CODE_TTL, VerificationError, VerificationService, verification_key,
};
use std::sync::Arc;
use std::time::Duration;

const EMAIL: &str = "reader@example.com";

fn setup() -> (Arc<MemoryStore>, VerificationService) {
    let store = Arc::new(MemoryStore::new());
    (store.clone(), VerificationService::new(store))
}

/// Memory store whose reads stall, widening the gap between reading a
/// code and consuming it
struct SlowReadStore {
    inner: MemoryStore,
    read_delay: Duration,
}

#[async_trait]
impl KvStore for SlowReadStore {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.inner.set_ex(key, value, ttl).await
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        self.inner.set_nx_ex(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self.inner.get(key).await;
        tokio::time::sleep(self.read_delay).await;
        value
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        self.inner.compare_and_delete(key, expected).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key).await
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        self.inner.ttl(key).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

#[tokio::test]
async fn test_code_is_single_use() {
    let (store, service) = setup();
    let code = service.generate(EMAIL).await.unwrap();

    assert_eq!(code.len(), 10);
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));

    assert!(service.verify(EMAIL, &code).await.unwrap());
    assert!(!store.exists(&verification_key(EMAIL)).await.unwrap());
    assert!(
        !service.verify(EMAIL, &code).await.unwrap(),
        "A consumed code must not verify twice"
    );
}

#[tokio::test]
async fn test_wrong_code_keeps_outstanding_code() {
    let (_, service) = setup();
    let code = service.generate(EMAIL).await.unwrap();

    assert!(!service.verify(EMAIL, "0000000000").await.unwrap());
    assert!(!service.verify("other@example.com", &code).await.unwrap());
    assert!(service.verify(EMAIL, &code).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_request_leaves_code_and_expiry_unchanged() {
    let (store, service) = setup();
    let key = verification_key(EMAIL);

    let code = service.generate(EMAIL).await.unwrap();
    let ttl_before = store.ttl(&key).await.unwrap().unwrap();

    let second = service.generate(EMAIL).await;
    let Err(err) = second else {
        panic!("second request within the window must be rejected");
    };
    assert_eq!(err.kind(), ErrorKind::Conflict);
    match err {
        VerificationError::AlreadyPending { wait } => {
            assert!(wait <= CODE_TTL);
            assert!(wait > Duration::ZERO);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(store.get(&key).await.unwrap(), Some(code.clone()));
    let ttl_after = store.ttl(&key).await.unwrap().unwrap();
    assert!(ttl_after <= ttl_before, "expiry must not be pushed back");
    assert!(service.verify(EMAIL, &code).await.unwrap());
}

#[tokio::test]
async fn test_new_code_after_consumption() {
    let (_, service) = setup();
    let first = service.generate(EMAIL).await.unwrap();
    assert!(service.verify(EMAIL, &first).await.unwrap());

    let second = service.generate(EMAIL).await.unwrap();
    assert!(service.verify(EMAIL, &second).await.unwrap());
}

#[tokio::test]
async fn test_addresses_are_independent() {
    let (_, service) = setup();
    service.generate(EMAIL).await.unwrap();

    assert!(service.generate("writer@example.com").await.is_ok());
}

#[tokio::test]
async fn test_concurrent_requests_issue_one_code() {
    let (_, service) = setup();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.generate(EMAIL).await })
        })
        .collect();

    let mut issued = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            issued += 1;
        }
    }
    assert_eq!(issued, 1);
}

#[tokio::test]
async fn test_invalid_email_is_rejected() {
    let (_, service) = setup();

    let result = service.generate("not-an-email").await;
    assert!(matches!(result, Err(VerificationError::InvalidEmail)));
}

#[tokio::test]
async fn test_concurrent_checks_consume_code_once() {
    let service = VerificationService::new(Arc::new(SlowReadStore {
        inner: MemoryStore::new(),
        read_delay: Duration::from_millis(50),
    }));
    let code = service.generate(EMAIL).await.unwrap();

    let (first, second) = tokio::join!(service.verify(EMAIL, &code), service.verify(EMAIL, &code));
    let accepted = [first.unwrap(), second.unwrap()]
        .into_iter()
        .filter(|ok| *ok)
        .count();

    assert_eq!(accepted, 1, "A code must be accepted by exactly one check");
    assert!(service.ttl_remaining(EMAIL).await.unwrap().is_none());
}
