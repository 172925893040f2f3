use std::fs::{self, OpenOptions};
use std::path::Path;
use russh_keys::key::KeyPair;
use crate::error::{ServerError, ServerResult};

/// Reads the server's private host key (OpenSSH or PKCS#8 PEM, unencrypted).
pub fn load_host_key(path: &Path) -> ServerResult<KeyPair> {
    russh_keys::load_secret_key(path, None).map_err(|source| ServerError::HostKey {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`load_host_key`], but writes a fresh Ed25519 key first when
/// `create_missing` is set and nothing exists at `path`.
pub fn load_or_create_host_key(path: &Path, create_missing: bool) -> ServerResult<KeyPair> {
    if create_missing && !path.exists() {
        return create_host_key(path);
    }
    load_host_key(path)
}

/// Generates an Ed25519 key and stores it at `path`. Never overwrites.
pub fn create_host_key(path: &Path) -> ServerResult<KeyPair> {
    let key = KeyPair::generate_ed25519().ok_or_else(|| ServerError::HostKeyGenerate {
        path: path.to_path_buf(),
    })?;
    let write_err = |source| ServerError::HostKeyWrite { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let file = options.open(path).map_err(write_err)?;

    russh_keys::encode_pkcs8_pem(&key, file).map_err(|source| ServerError::HostKey {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), "generated new Ed25519 host key");
    Ok(key)
}
