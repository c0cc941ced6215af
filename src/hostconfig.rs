//! Host-vs-chroot context and the host-level store-root configuration.
//!
//! `/etc/sysroots.conf`'s presence marks the host context; `/etc/sysroot.conf`
//! marks a chrooted sysroot. Exactly one of the two exists on any given
//! invocation, which is what `is_chrooted()` disambiguates.

use std::path::{Path, PathBuf};

pub const HOST_SENTINEL: &str = "/etc/sysroots.conf";
pub const CHILD_SENTINEL: &str = "/etc/sysroot.conf";
pub const DEFAULT_STORE_ROOT: &str = "/usr/sysroots";

/// True if the current process is running inside a chrooted sysroot.
pub fn is_chrooted() -> bool {
    is_chrooted_at(Path::new(CHILD_SENTINEL), Path::new(HOST_SENTINEL))
}

fn is_chrooted_at(child_sentinel: &Path, host_sentinel: &Path) -> bool {
    child_sentinel.exists() && !host_sentinel.exists()
}

/// Reads the store-root directory from the host config file at `path`,
/// conservatively (this is a single `sysroots: <path>` key, never parsed
/// with a YAML library). Falls back to [`DEFAULT_STORE_ROOT`] if the file
/// is absent or doesn't set the key.
pub fn read_store_root(path: &Path) -> PathBuf {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return PathBuf::from(DEFAULT_STORE_ROOT);
    };

    for line in contents.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim() == "sysroots" {
            let value = value.trim();
            if !value.is_empty() {
                return PathBuf::from(value);
            }
        }
    }

    PathBuf::from(DEFAULT_STORE_ROOT)
}
