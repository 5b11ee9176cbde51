use std::path::PathBuf;

use mindguard::{Mindguard, MindguardConfig, Profile, UserId};

/// Example demonstrating a complete two-user messaging workflow
///
/// This shows the recommended pattern for initializing the engine,
/// registering directory profiles, and driving conversations through
/// per-user sessions.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize Mindguard
    let config = MindguardConfig::new(
        &PathBuf::from("./demo_data"),
        &PathBuf::from("./demo_logs"),
    );
    let mindguard = Mindguard::initialize(config).await?;

    // Register two directory profiles
    let alice = UserId::new();
    let bob = UserId::new();
    mindguard
        .upsert_profile(&Profile::new(
            alice,
            "alice@example.com",
            Some("Alice Lidell".to_string()),
        ))
        .await?;
    mindguard
        .upsert_profile(&Profile::new(
            bob,
            "bob@example.com",
            Some("Bob Stone".to_string()),
        ))
        .await?;

    println!("🔑 Registered users {alice} and {bob}");

    // Step 1: Alice looks Bob up in the directory
    let mut alice_session = mindguard.open_session(alice);
    let matches = alice_session.search_directory("bob").await?;
    println!("🔍 Directory matches for \"bob\": {}", matches.len());

    // Step 2: Alice starts the conversation with the default greeting
    let (conversation, created) = alice_session.start_conversation(bob, None).await?;
    println!(
        "✉️  Conversation with {} created: {created}",
        conversation.counterpart_name
    );

    // Step 3: Bob replies from his own session
    let mut bob_session = mindguard.open_session(bob);
    bob_session.refresh().await?;
    bob_session
        .send_message(alice, "Good to hear from you!")
        .await?;
    println!("💬 Bob replied");

    // Step 4: Alice refreshes and sees the unread reply
    alice_session.refresh().await?;
    for convo in alice_session.conversations() {
        println!(
            "📥 {}: last message {:?} ({} unread)",
            convo.counterpart_name, convo.last_message.content, convo.unread_count
        );
    }

    // Step 5: Opening the thread marks Bob's messages read
    let thread = alice_session.open_conversation(bob).await?;
    println!("📖 Thread holds {} messages, oldest first", thread.len());
    let unread: u64 = alice_session
        .conversations()
        .iter()
        .map(|convo| convo.unread_count)
        .sum();
    println!("✅ Unread after opening: {unread}");

    println!("\n✨ Messaging workflow demonstration complete!");

    Ok(())
}
