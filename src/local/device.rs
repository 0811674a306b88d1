use rand::Rng;

use super::KvStore;

pub const DEVICE_ID_KEY: &str = "device_id";

/// Returned when there is no persistent storage to hold an identity.
pub const SERVER_SENTINEL: &str = "server";

/// Stable identifier for this device profile.
///
/// The first call with storage generates and saves an id; later calls return it
/// unchanged. Without storage the sentinel `"server"` is returned and nothing is
/// written, so callers must accept it as a real id.
pub fn device_id(kv: Option<&dyn KvStore>) -> String {
    let Some(kv) = kv else {
        return SERVER_SENTINEL.to_string();
    };

    if let Some(existing) = kv.get(DEVICE_ID_KEY).filter(|id| !id.is_empty()) {
        return existing;
    }

    let id = uuid::Uuid::new_v4().to_string();
    match kv.set(DEVICE_ID_KEY, &id) {
        Ok(()) => {
            tracing::info!("Created new device id: {}", id);
            id
        }
        Err(e) => {
            // Still hand out an id, just not the UUID form a stored one would have
            tracing::warn!("Could not persist device id: {}", e);
            fallback_id()
        }
    }
}

/// `dev-<base36 random><unix millis>`
fn fallback_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let random: String = (0..11)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("dev-{}{}", random, chrono::Utc::now().timestamp_millis())
}
