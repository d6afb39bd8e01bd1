//! Example usage of the bucket store.
//!
//! This example demonstrates single and batch writes, prefix scans over
//! segmented keys, TTL entries and a full key-space walk.

use std::sync::Arc;
use std::time::Duration;

use redb_buckets::{BucketStore, EngineConfig, LogTracer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Create a file-backed database for this example
    let mut store =
        BucketStore::open(EngineConfig::new("example.redb"))?.with_tracer(Arc::new(LogTracer));

    // Single writes and reads
    store.set(b"users", b"1", b"alice")?;
    let value = store.get(b"users", b"1")?;
    println!("users/1 = {}", String::from_utf8_lossy(&value));

    // Batch write, applied atomically
    store.multi_set(
        b"cluster",
        &["broker@eu@1", "broker@eu@2", "broker@us@1"],
        &["10.0.0.1", "10.0.0.2", "10.1.0.1"],
    )?;

    println!("EU brokers:");
    for (key, value) in store.scan_prefix(b"cluster", &["broker", "eu"])? {
        println!(
            "  {} -> {}",
            String::from_utf8_lossy(&key),
            String::from_utf8_lossy(&value)
        );
    }

    // A bucket named "user" never sees entries of "users"
    store.set(b"user", b"admin", b"root")?;
    let users = store.scan_prefix_keys::<&[u8]>(b"users", &[])?;
    println!("keys in 'users': {}", users.len());

    // Entries with a TTL vanish once it elapses
    store.set_with_ttl(b"session", b"abc", b"token", Duration::from_secs(60))?;

    // Missing keys are reported distinctly
    match store.get(b"users", b"404") {
        Err(err) if err.is_not_found() => println!("users/404 not found"),
        other => println!("unexpected: {:?}", other),
    }

    println!("All keys:");
    for status in store.scan_all(None)? {
        let status = status?;
        println!(
            "  {} (deleted or expired: {})",
            String::from_utf8_lossy(&status.key),
            status.deleted_or_expired
        );
    }

    store.close()?;

    // Clean up the example file
    std::fs::remove_file("example.redb")?;
    println!("Example completed successfully!");

    Ok(())
}
