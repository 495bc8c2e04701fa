use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;

/// A 32-byte, reboot-persistent identifier for this server, used as the
/// `managed_by` value on PlayerKey rows. Derived from a machine-local secret
/// and never rotated — mirrors `sd_id128_get_machine_app_specific()`, which
/// the original implementation leans on via `/etc/machine-id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerIdentity([u8; 32]);

impl ServerIdentity {
    /// Read the machine-local secret at `path` and hash it. Fails if the
    /// secret is absent, per the startup contract in spec.md §4.1.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read machine identity at {path}: {e}"))?;
        let mut hasher = Sha256::new();
        hasher.update(raw.trim().as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Ok(ServerIdentity(bytes))
    }

    pub fn as_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_hashes_file_contents() {
        let mut file = tempfile_like("test-machine-id-contents\n");
        let path = file.path_string();
        write!(file.handle, "test-machine-id-contents\n").unwrap();
        let id = ServerIdentity::load(&path).unwrap();
        assert_eq!(id.as_hex().len(), 64);
    }

    #[test]
    fn missing_file_fails() {
        assert!(ServerIdentity::load("/nonexistent/path/to/machine-id").is_err());
    }

    // minimal helper to avoid pulling in a tempfile crate dependency solely
    // for this one test
    struct TempFile {
        handle: std::fs::File,
        path: std::path::PathBuf,
    }

    impl TempFile {
        fn path_string(&self) -> String {
            self.path.to_string_lossy().into_owned()
        }
    }

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn tempfile_like(_seed: &str) -> TempFile {
        let path = std::env::temp_dir().join(format!(
            "igo-server-test-machine-id-{}",
            std::process::id()
        ));
        let handle = std::fs::File::create(&path).unwrap();
        TempFile { handle, path }
    }
}
