// Pseudo-anonymous visitor identity. Only scopes likes; it is not a credential.

use chrono::Utc;
use rand::Rng;

use crate::error::AppResult;
use crate::storage::LocalStorage;

pub const SESSION_KEY: &str = "toka_session_id";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Returns the stored session id, generating and persisting one on first use.
pub fn session_id(storage: &mut LocalStorage) -> AppResult<String> {
    if let Some(existing) = storage.get_item(SESSION_KEY) {
        return Ok(existing.to_owned());
    }

    let session_id = generate_session_id();
    storage.set_item(SESSION_KEY, &session_id)?;
    tracing::info!("Created session id {}", session_id);
    Ok(session_id)
}

/// `session_<epoch-ms>_<random base36>`
pub fn generate_session_id() -> String {
    format!(
        "session_{}_{}",
        Utc::now().timestamp_millis(),
        random_base36(9)
    )
}

pub(crate) fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}
