//! Master key management.
//!
//! Key is either:
//! - Loaded from TRELLIS_MASTER_KEY env var (persistent mode)
//! - Generated randomly at startup (ephemeral mode)

use std::sync::OnceLock;

use tracing::warn;

static MASTER_KEY: OnceLock<MasterKeyState> = OnceLock::new();

/// Represents the master key state, including whether it's persistent.
#[derive(Debug, Clone)]
pub struct MasterKeyState {
    key: [u8; 32],
    persistent: bool,
}

impl MasterKeyState {
    /// Get the master key bytes.
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// Whether the key is persistent (from env var).
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }
}

/// Initialize the master key.
///
/// Must be called once at startup. Returns the key state.
///
/// The key is loaded from the `TRELLIS_MASTER_KEY` environment variable
/// if set. If the env var is not set or contains an invalid key, a
/// random ephemeral key is generated instead - encrypted credentials
/// then do not survive a restart.
pub fn init() -> &'static MasterKeyState {
    MASTER_KEY.get_or_init(|| match std::env::var("TRELLIS_MASTER_KEY") {
        Ok(encoded) => match super::decode_key(&encoded) {
            Ok(key) => MasterKeyState {
                key,
                persistent: true,
            },
            Err(err) => {
                warn!(error = %err, "invalid TRELLIS_MASTER_KEY, using ephemeral key");
                MasterKeyState {
                    key: super::generate_master_key(),
                    persistent: false,
                }
            }
        },
        Err(_) => MasterKeyState {
            key: super::generate_master_key(),
            persistent: false,
        },
    })
}

/// Get the current master key state.
///
/// # Panics
///
/// Panics if `init()` was not called.
pub fn get() -> &'static MasterKeyState {
    MASTER_KEY
        .get()
        .expect("master key not initialized, call crypto::master_key::init() at startup")
}
