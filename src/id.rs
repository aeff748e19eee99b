//! ID generation utilities for warpsim
//!
//! Provides functions for generating unique identifiers for work items and artifacts.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Generate a unique work item ID
///
/// Format: `item-{timestamp_ms}-{random_hex}`
/// Example: `item-1738300800123-a1b2`
pub fn generate_item_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("item-{}-{:04x}", timestamp, random)
}

/// Generate an artifact ID tied to the item it responds to
///
/// Format: `resp-{item_id}-{random_hex}`
pub fn generate_artifact_id(item_id: &str) -> String {
    let random: u16 = rand::rng().random();
    format!("resp-{}-{:04x}", item_id, random)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        // Should be after 2020-01-01 and before 2100-01-01
        assert!(ts > 1577836800000); // 2020-01-01
        assert!(ts < 4102444800000); // 2100-01-01
    }

    #[test]
    fn test_generate_item_id_format() {
        let id = generate_item_id();
        assert!(id.starts_with("item-"));
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_item_id_uniqueness() {
        let id1 = generate_item_id();
        let id2 = generate_item_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_generate_artifact_id_includes_item() {
        let id = generate_artifact_id("item-123-abcd");
        assert!(id.starts_with("resp-item-123-abcd-"));
    }
}
