//! End-to-end scenarios that need real key pairs.
//!
//! RSA-4096 generation is slow, so the pairs are generated once and shared
//! by every test in this file.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use once_cell::sync::Lazy;
use pgp::ArmorOptions;

use nocontact_core::crypto::{
    decrypt, decrypt_message, encrypt, encrypt_to_many, parse_public_key, HashingConfig,
    KeyGenConfig, KeyPair,
};
use nocontact_core::{
    extract_identity, ChatService, Database, Error, HashedIdentity, MessageStatus,
    RegistrationState, Registry, RegistryConfig, Session, Store, UserIdentity, ERROR_SENTINEL,
};

const ALICE_PASS: &str = "correct horse battery staple";
const BOB_PASS: &str = "hunter2 but longer";

static ALICE: Lazy<KeyPair> = Lazy::new(|| {
    KeyPair::generate(
        "Alice",
        "alice@example.com",
        ALICE_PASS,
        &KeyGenConfig::default(),
    )
    .expect("generate Alice")
});

static BOB: Lazy<KeyPair> = Lazy::new(|| {
    KeyPair::generate("Bob", "bob@example.com", BOB_PASS, &KeyGenConfig::default())
        .expect("generate Bob")
});

/// Bob's public key re-armored with only the RSA primary key left
fn bob_primary_only() -> String {
    let mut key = parse_public_key(&BOB.public_key).unwrap();
    key.public_subkeys.clear();
    key.to_armored_string(ArmorOptions::default()).unwrap()
}

fn fast_hashing() -> HashingConfig {
    HashingConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
        ..Default::default()
    }
}

async fn setup(require_key_possession: bool) -> (Registry, ChatService, Arc<Database>) {
    let db = Arc::new(Database::open(None).await.unwrap());
    let store: Arc<dyn Store> = db.clone();
    let registry = Registry::new(
        store.clone(),
        RegistryConfig {
            hashing: fast_hashing(),
            require_key_possession,
            ..Default::default()
        },
    );
    (registry, ChatService::new(store), db)
}

async fn both_logged_in(registry: &Registry) -> (Session, Session) {
    registry.enroll("Alice", "alice@example.com").await.unwrap();
    registry.enroll("Bob", "bob@example.com").await.unwrap();

    let alice = registry
        .login(&ALICE.public_key, &ALICE.private_key, ALICE_PASS)
        .await
        .unwrap();
    let bob = registry
        .login(&BOB.public_key, &BOB.private_key, BOB_PASS)
        .await
        .unwrap();
    (alice, bob)
}

// ============================================================================
// CIPHER
// ============================================================================

#[tokio::test]
async fn test_encrypt_decrypt_round_trip() {
    let plaintext = "Meet at the café at 9pm. Bring the 🗝️.";
    let ciphertext = encrypt(&BOB.public_key, plaintext).await.unwrap();

    assert!(ciphertext.contains("BEGIN PGP MESSAGE"));
    assert!(!ciphertext.contains("café"));

    let decrypted = decrypt(&BOB.private_key, BOB_PASS, &ciphertext)
        .await
        .unwrap();
    assert_eq!(decrypted, plaintext);
}

#[tokio::test]
async fn test_wrong_passphrase() {
    let ciphertext = encrypt(&BOB.public_key, "secret").await.unwrap();

    let err = decrypt(&BOB.private_key, "not bob's passphrase", &ciphertext)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WrongPassphrase), "got {:?}", err);
}

#[tokio::test]
async fn test_wrong_key() {
    let ciphertext = encrypt(&BOB.public_key, "for bob only").await.unwrap();

    let err = decrypt(&ALICE.private_key, ALICE_PASS, &ciphertext)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DecryptionFailed(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_garbage_private_key() {
    let ciphertext = encrypt(&BOB.public_key, "hello").await.unwrap();

    let err = decrypt("not a key", BOB_PASS, &ciphertext).await.unwrap_err();
    assert!(matches!(err, Error::InvalidKey(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_encrypt_to_many() {
    let recipients = vec![ALICE.public_key.clone(), BOB.public_key.clone()];
    let ciphertext = encrypt_to_many(&recipients, "for both of you").await.unwrap();

    assert_eq!(
        decrypt_message(&ALICE.private_key, ALICE_PASS, &ciphertext).unwrap(),
        "for both of you"
    );
    assert_eq!(
        decrypt_message(&BOB.private_key, BOB_PASS, &ciphertext).unwrap(),
        "for both of you"
    );
}

#[tokio::test]
async fn test_encrypt_to_primary_key_without_subkeys() {
    let ciphertext = encrypt(&bob_primary_only(), "no subkey here").await.unwrap();

    let decrypted = decrypt(&BOB.private_key, BOB_PASS, &ciphertext)
        .await
        .unwrap();
    assert_eq!(decrypted, "no subkey here");
}

#[tokio::test]
async fn test_encrypt_to_primary_and_subkey_recipients() {
    let recipients = vec![bob_primary_only(), ALICE.public_key.clone()];
    let ciphertext = encrypt_to_many(&recipients, "mixed").await.unwrap();

    assert_eq!(
        decrypt_message(&BOB.private_key, BOB_PASS, &ciphertext).unwrap(),
        "mixed"
    );
    assert_eq!(
        decrypt_message(&ALICE.private_key, ALICE_PASS, &ciphertext).unwrap(),
        "mixed"
    );
}

// ============================================================================
// IDENTITY
// ============================================================================

#[test]
fn test_extract_identity_from_generated_key() {
    let identity = extract_identity(&BOB.public_key).unwrap();
    assert_eq!(identity, UserIdentity::new("Bob", "bob@example.com"));
}

#[test]
fn test_key_without_user_ids_is_unknown_identity() {
    let mut key = parse_public_key(&BOB.public_key).unwrap();
    key.details.users.clear();
    let armored = key.to_armored_string(ArmorOptions::default()).unwrap();

    assert!(parse_public_key(&armored).is_ok());
    assert_eq!(extract_identity(&armored), None);
}

#[test]
fn test_key_pair_is_armored() {
    assert!(ALICE.public_key.contains("BEGIN PGP PUBLIC KEY BLOCK"));
    assert!(ALICE.private_key.contains("BEGIN PGP PRIVATE KEY BLOCK"));
}

#[test]
fn test_session_open_is_unverified() {
    let session = Session::open(&ALICE.public_key, &ALICE.private_key, ALICE_PASS).unwrap();
    assert_eq!(session.identity().name, "Alice");
    assert!(!session.is_verified());
}

// ============================================================================
// REGISTRATION & LOGIN
// ============================================================================

#[tokio::test]
async fn test_login_matches_registered_identity() {
    let (registry, _chat, _db) = setup(false).await;
    registry.enroll("Alice", "alice@example.com").await.unwrap();

    let session = registry
        .login(&ALICE.public_key, &ALICE.private_key, ALICE_PASS)
        .await
        .unwrap();
    assert!(session.is_verified());
    assert_eq!(session.identity().id, "alice@example.com");
}

#[tokio::test]
async fn test_login_with_unregistered_identity_fails() {
    let (registry, _chat, _db) = setup(false).await;
    registry.enroll("Alice", "alice@example.com").await.unwrap();

    let err = registry
        .login(&BOB.public_key, &BOB.private_key, BOB_PASS)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials));
}

#[tokio::test]
async fn test_login_same_name_other_email_fails() {
    let (registry, _chat, _db) = setup(false).await;
    registry.enroll("Alice", "alice@elsewhere.org").await.unwrap();

    let err = registry
        .login(&ALICE.public_key, &ALICE.private_key, ALICE_PASS)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCredentials));
}

#[tokio::test]
async fn test_login_does_not_check_private_key_by_default() {
    let (registry, _chat, _db) = setup(false).await;
    registry.enroll("Alice", "alice@example.com").await.unwrap();

    // Alice's public key with Bob's private key still passes.
    let session = registry
        .login(&ALICE.public_key, &BOB.private_key, BOB_PASS)
        .await
        .unwrap();
    assert_eq!(session.identity().name, "Alice");
}

#[tokio::test]
async fn test_key_possession_check() {
    let (registry, _chat, _db) = setup(true).await;
    registry.enroll("Alice", "alice@example.com").await.unwrap();

    let mismatched = registry
        .login(&ALICE.public_key, &BOB.private_key, BOB_PASS)
        .await;
    assert!(matches!(mismatched, Err(Error::InvalidCredentials)));

    let wrong_pass = registry
        .login(&ALICE.public_key, &ALICE.private_key, "guess")
        .await;
    assert!(matches!(wrong_pass, Err(Error::InvalidCredentials)));

    let ok = registry
        .login(&ALICE.public_key, &ALICE.private_key, ALICE_PASS)
        .await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn test_register_then_login() {
    let (registry, _chat, _db) = setup(true).await;

    let keys = registry
        .register("Carol", "carol@example.com", "carol's passphrase")
        .await
        .unwrap();
    assert_eq!(
        registry.state().await.unwrap(),
        RegistrationState::Open { remaining: 1 }
    );
    assert_eq!(
        extract_identity(&keys.public_key).unwrap(),
        UserIdentity::new("Carol", "carol@example.com")
    );

    let session = registry
        .login(&keys.public_key, &keys.private_key, "carol's passphrase")
        .await
        .unwrap();
    assert_eq!(session.identity().name, "Carol");
}

#[tokio::test]
async fn test_third_registration_generates_nothing() {
    let (registry, _chat, db) = setup(false).await;
    registry.enroll("Alice", "alice@example.com").await.unwrap();
    registry.enroll("Bob", "bob@example.com").await.unwrap();

    let err = registry
        .register("Mallory", "mallory@example.com", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RegistrationFull));
    assert_eq!(db.hashed_identity_count().unwrap(), 2);
}

#[tokio::test]
async fn test_failed_staging_keeps_the_seat_free() {
    let (registry, _chat, _db) = setup(false).await;

    let err = registry
        .register_staged("Carol", "carol@example.com", "carol's passphrase", |_| {
            Err::<(), _>(Error::Io("disk full".into()))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)), "got {:?}", err);
    assert_eq!(
        registry.state().await.unwrap(),
        RegistrationState::Open { remaining: 2 }
    );
}

/// Sets its flag when dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_seat_lost_after_staging_drops_the_staged_value() {
    let (registry, _chat, db) = setup(false).await;
    registry.enroll("Alice", "alice@example.com").await.unwrap();
    let dropped = Arc::new(AtomicBool::new(false));

    let result = registry
        .register_staged("Carol", "carol@example.com", "carol's passphrase", |keys| {
            assert!(keys.public_key.contains("BEGIN PGP PUBLIC KEY BLOCK"));
            // Someone else takes the last seat while the files are staged
            let bob = HashedIdentity::new("Bob", "bob@example.com", &fast_hashing())?;
            db.add_hashed_identity(&bob, 2)?;
            Ok(DropFlag(dropped.clone()))
        })
        .await;

    assert!(matches!(result, Err(Error::RegistrationFull)));
    assert!(dropped.load(Ordering::SeqCst));
    assert_eq!(registry.state().await.unwrap(), RegistrationState::Full);
}

// ============================================================================
// CHAT
// ============================================================================

#[tokio::test]
async fn test_both_parties_read_the_history() {
    let (registry, chat, _db) = setup(false).await;
    let (alice, bob) = both_logged_in(&registry).await;

    chat.send(&alice, &BOB.public_key, "hi Bob").await.unwrap();
    chat.send(&bob, &ALICE.public_key, "hi Alice").await.unwrap();

    for session in [&alice, &bob] {
        let rendered = chat.conversation(session).await.unwrap();
        let bodies: Vec<_> = rendered.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["hi Bob", "hi Alice"]);
        assert!(rendered.iter().all(|m| m.status == MessageStatus::Decrypted));
    }

    let for_alice = chat.conversation(&alice).await.unwrap();
    assert!(for_alice[0].is_own);
    assert!(!for_alice[1].is_own);
}

#[tokio::test]
async fn test_stored_message_is_not_plaintext() {
    let (registry, chat, db) = setup(false).await;
    let (alice, _bob) = both_logged_in(&registry).await;

    chat.send(&alice, &BOB.public_key, "the eagle lands at dawn")
        .await
        .unwrap();

    let stored = db.get_messages().unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].text.contains("eagle"));
    assert!(!stored[0].scrambled.contains("eagle"));
    assert_eq!(stored[0].scrambled.len(), "the eagle lands at dawn".len());

    let observed = chat.observer_view().await.unwrap();
    assert_eq!(observed[0].status, MessageStatus::Scrambled);
    assert_eq!(observed[0].body, stored[0].scrambled);
}

#[tokio::test]
async fn test_unreadable_message_shows_error_sentinel() {
    let (registry, chat, _db) = setup(false).await;
    let (alice, bob) = both_logged_in(&registry).await;

    chat.send(&bob, &ALICE.public_key, "between us").await.unwrap();

    let locked_out = Session::open(&BOB.public_key, &BOB.private_key, "wrong").unwrap();
    let rendered = chat.conversation(&locked_out).await.unwrap();
    assert_eq!(rendered[0].body, ERROR_SENTINEL);
    assert_eq!(rendered[0].status, MessageStatus::Failed);

    let rendered = chat.conversation(&alice).await.unwrap();
    assert_eq!(rendered[0].body, "between us");
}

#[tokio::test]
async fn test_concurrent_sends_while_reading() {
    let (registry, chat, _db) = setup(false).await;
    let (alice, bob) = both_logged_in(&registry).await;

    let sends = join_all((0..6).map(|i| {
        let (from, to) = if i % 2 == 0 {
            (&alice, &BOB.public_key)
        } else {
            (&bob, &ALICE.public_key)
        };
        let chat = &chat;
        async move {
            let text = format!("{} #{}", from.identity().name, i);
            chat.send(from, to, &text).await
        }
    }));

    let (sent, during) = tokio::join!(sends, chat.conversation(&bob));
    assert!(sent.iter().all(|r| r.is_ok()));
    assert!(during
        .unwrap()
        .iter()
        .all(|m| m.status == MessageStatus::Decrypted));

    let rendered = chat.conversation(&bob).await.unwrap();
    assert_eq!(rendered.len(), 6);
    for message in &rendered {
        assert_eq!(message.status, MessageStatus::Decrypted);
        assert!(
            message.body.starts_with(&message.user.name),
            "{} attributed to {}",
            message.body,
            message.user.name
        );
    }
}
