//! CLI command implementations.

pub mod clean;
pub mod compact;
pub mod index;
pub mod kv;
pub mod search;

use rand::RngCore;
use std::path::Path;
use std::sync::Arc;
use vapor_core::{ConcatMergeOperator, Config, LogMedium, Store};
use vapor_storage::EncryptionKey;

/// Name of the file holding the key derivation salt.
pub const SALT_FILE: &str = "SALT";

const SALT_SIZE: usize = 16;

/// Opens the store at `path`, deriving its key from `passphrase`.
///
/// A new store gets a fresh random salt; an existing one reuses the salt it
/// was created with.
pub fn open_store(
    path: &Path,
    passphrase: &str,
    paged: bool,
) -> Result<Store, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(path)?;
    let salt = load_or_create_salt(path)?;
    let key = EncryptionKey::derive_from_passphrase(passphrase.as_bytes(), &salt)?;

    let medium = if paged {
        LogMedium::Paged
    } else {
        LogMedium::Plain
    };
    let config = Config::builder()
        .key(key)
        .path(path)
        .log_medium(medium)
        .build()?;

    Ok(Store::open(config, Arc::new(ConcatMergeOperator))?)
}

fn load_or_create_salt(dir: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let salt_path = dir.join(SALT_FILE);
    if salt_path.exists() {
        let salt = std::fs::read(&salt_path)?;
        if salt.len() != SALT_SIZE {
            return Err(format!("Corrupt salt file {:?}", salt_path).into());
        }
        return Ok(salt);
    }

    let mut salt = vec![0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    std::fs::write(&salt_path, &salt)?;
    tracing::debug!(path = %salt_path.display(), "created salt");
    Ok(salt)
}
