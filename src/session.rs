//! Session cookie codec: JSON -> AES-CFB encrypt -> base64, and back.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto;
use crate::state::UserInfo;

#[derive(Serialize, Deserialize)]
struct Session {
    user: UserInfo,
    version: i64,
}

/// Encodes a session cookie value for `user` at the current process epoch.
pub(crate) fn encode(key: &[u8; 32], version: i64, user: &UserInfo) -> String {
    let session = Session {
        user: user.clone(),
        version,
    };
    // Serialization of a well-formed struct cannot fail.
    let json = serde_json::to_vec(&session).expect("session serializes to JSON");
    let ciphertext = crypto::encrypt(key, &json);
    BASE64.encode(ciphertext)
}

/// Decodes a cookie value back into a [`UserInfo`]. Any failure (base64,
/// decrypt, JSON, or version mismatch when `check_version` is set) is
/// treated as an absent session and logged, never surfaced as an error.
pub(crate) fn decode(
    key: &[u8; 32],
    cookie_value: &str,
    current_version: i64,
    check_version: bool,
) -> Option<UserInfo> {
    let ciphertext = match BASE64.decode(cookie_value) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(%err, "session cookie is not valid base64");
            return None;
        }
    };
    let plaintext = match crypto::decrypt(key, &ciphertext) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(%err, "session cookie failed to decrypt");
            return None;
        }
    };
    let session: Session = match serde_json::from_slice(&plaintext) {
        Ok(session) => session,
        Err(err) => {
            debug!(%err, "session cookie decrypted but did not parse as JSON");
            return None;
        }
    };
    if check_version && session.version != current_version {
        debug!(
            user = %session.user.name,
            expected = current_version,
            got = session.version,
            "session cookie has stale version"
        );
        return None;
    }
    debug!(user = %session.user.name, "session decoded");
    Some(session.user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive_key;
    use secrecy::SecretString;

    fn key() -> [u8; 32] {
        derive_key(&SecretString::from("test-secret")).unwrap()
    }

    fn alice() -> UserInfo {
        UserInfo {
            name: "alice".to_owned(),
            email: "a@x".to_owned(),
        }
    }

    #[test]
    fn round_trip_same_version() {
        let key = key();
        let cookie = encode(&key, 42, &alice());
        let decoded = decode(&key, &cookie, 42, true).unwrap();
        assert_eq!(decoded, alice());
    }

    #[test]
    fn version_mismatch_is_absence_not_error() {
        let key = key();
        let cookie = encode(&key, 1, &alice());
        assert!(decode(&key, &cookie, 2, true).is_none());
    }

    #[test]
    fn version_check_disabled_ignores_mismatch() {
        let key = key();
        let cookie = encode(&key, 1, &alice());
        assert!(decode(&key, &cookie, 2, false).is_some());
    }

    #[test]
    fn malformed_base64_is_absence() {
        let key = key();
        assert!(decode(&key, "not base64!!", 1, true).is_none());
    }

    #[test]
    fn tampered_cookie_is_absence() {
        let key = key();
        let mut cookie_bytes = BASE64.decode(encode(&key, 1, &alice())).unwrap();
        let last = cookie_bytes.len() - 1;
        cookie_bytes[last] ^= 0xFF;
        let tampered = BASE64.encode(cookie_bytes);
        assert!(decode(&key, &tampered, 1, true).is_none());
    }
}
