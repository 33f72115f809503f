//! Profile persistence.
//!
//! Profiles are written to a temporary file next to the destination and then
//! renamed over it, so readers see either the old profile or the new one.

use std::fmt;
use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{ProfileError, Result};
use crate::profile::Profile;

/// SHA-256 hex digest of the exact bytes written for a profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProfileDigest(String);

impl ProfileDigest {
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ProfileDigest(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for ProfileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serialize `profile` canonically and replace whatever is at `path`.
///
/// The parent directory must already exist.
pub fn save_profile(profile: &Profile, path: &Path) -> Result<ProfileDigest> {
    let text = profile.to_canonical_json()?;
    let bytes = text.as_bytes();

    let write_err = |source: std::io::Error| ProfileError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    // NamedTempFile starts out 0600; profiles are read by the container runtime.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(write_err)?;
    }

    tmp.persist(path).map_err(|e| write_err(e.error))?;

    let digest = ProfileDigest::from_bytes(bytes);
    info!(
        path = %path.display(),
        syscalls = profile.allowed_names().len(),
        digest = %digest.short(),
        "profile written"
    );
    Ok(digest)
}
