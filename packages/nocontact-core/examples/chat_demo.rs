//! # Chat Demo
//!
//! This example walks through a full NoContact session in memory:
//! 1. Alice and Bob register and receive key pairs
//! 2. A third registration is turned away
//! 3. Both log in with their keys
//! 4. Alice sends Bob an encrypted message
//! 5. Bob reads it, and an onlooker sees only scrambled text
//!
//! Key generation is RSA-4096, so expect this to take a little while.
//!
//! ## Run
//!
//! ```bash
//! cargo run --release --example chat_demo
//! ```

use nocontact_core::{CoreConfig, Error, NoContact};

#[tokio::main]
async fn main() {
    println!("=================================================");
    println!("            NOCONTACT CHAT DEMO");
    println!("=================================================\n");

    let core = NoContact::open(CoreConfig::default())
        .await
        .expect("Failed to open in-memory core");

    // =========================================================================
    // STEP 1: Register Alice and Bob
    // =========================================================================
    println!("1. Registering Alice and Bob (generating keys)...\n");

    let alice_keys = core
        .registry()
        .register("Alice", "alice@example.com", "alice-passphrase")
        .await
        .expect("Failed to register Alice");
    let bob_keys = core
        .registry()
        .register("Bob", "bob@example.com", "bob-passphrase")
        .await
        .expect("Failed to register Bob");

    println!("   Alice's public key: {} bytes", alice_keys.public_key.len());
    println!("   Bob's public key:   {} bytes", bob_keys.public_key.len());
    println!(
        "   Registration state: {:?}",
        core.registration_state().await.expect("state")
    );
    println!();

    // =========================================================================
    // STEP 2: A third user is turned away
    // =========================================================================
    println!("2. Mallory tries to register...\n");

    match core
        .registry()
        .register("Mallory", "mallory@example.com", "mallory-passphrase")
        .await
    {
        Err(Error::RegistrationFull) => println!("   Rejected: {}", Error::RegistrationFull),
        other => panic!("expected RegistrationFull, got {:?}", other),
    }
    println!();

    // =========================================================================
    // STEP 3: Log in
    // =========================================================================
    println!("3. Logging in...\n");

    let alice = core
        .registry()
        .login(
            &alice_keys.public_key,
            &alice_keys.private_key,
            "alice-passphrase",
        )
        .await
        .expect("Alice failed to log in");
    let bob = core
        .registry()
        .login(&bob_keys.public_key, &bob_keys.private_key, "bob-passphrase")
        .await
        .expect("Bob failed to log in");

    println!("   Logged in: {}", alice.identity());
    println!("   Logged in: {}", bob.identity());
    println!();

    // =========================================================================
    // STEP 4: Alice sends a message
    // =========================================================================
    println!("4. Alice sends a message to Bob...\n");

    let sent = core
        .chat()
        .send(&alice, &bob_keys.public_key, "Meet me at the usual place, 9pm.")
        .await
        .expect("Failed to send");

    let preview: String = sent.text.lines().take(3).collect::<Vec<_>>().join("\n   ");
    println!("   Stored ciphertext:\n   {}\n   ...", preview);
    println!("   Stored scrambled: {}", sent.scrambled);
    println!();

    // =========================================================================
    // STEP 5: Read it back
    // =========================================================================
    println!("5. Reading the conversation...\n");

    for view in core.chat().conversation(&bob).await.expect("Bob's view") {
        println!("   [Bob sees]      {}: {}", view.user.name, view.body);
    }
    for view in core.chat().conversation(&alice).await.expect("Alice's view") {
        println!("   [Alice sees]    {}: {}", view.user.name, view.body);
    }
    for view in core.chat().observer_view().await.expect("observer view") {
        println!("   [Onlooker sees] {}: {}", view.user.name, view.body);
    }

    println!("\n=================================================");
    println!("                 DEMO COMPLETE");
    println!("=================================================");
}
