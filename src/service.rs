//! The boot-time oneshot systemd unit: `sysroot-manager.service`, enabled
//! via a symlink in `multi-user.target.wants`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SysrootError};

const UNIT_NAME: &str = "sysroot-manager.service";

fn render_unit(arch: &str, pkgman: &str) -> String {
    format!(
        "[Unit]\n\
         Description={arch} arch activation via {pkgman}\n\
         \n\
         [Service]\n\
         Type=oneshot\n\
         ExecStart=/usr/bin/{pkgman}-sysroot sysroot --init\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n"
    )
}

pub struct ServiceUnit {
    systemd_dir: PathBuf,
}

impl Default for ServiceUnit {
    fn default() -> Self {
        Self::new("/etc/systemd/system")
    }
}

impl ServiceUnit {
    pub fn new(systemd_dir: impl Into<PathBuf>) -> Self {
        Self {
            systemd_dir: systemd_dir.into(),
        }
    }

    fn unit_path(&self) -> PathBuf {
        self.systemd_dir.join(UNIT_NAME)
    }

    fn wants_link(&self) -> PathBuf {
        self.systemd_dir
            .join("multi-user.target.wants")
            .join(UNIT_NAME)
    }

    /// Disables and removes any prior unit, then writes a fresh one bound
    /// to `arch`/`pkgman`'s CLI entry point. Write is atomic (temp file +
    /// rename) within the same directory.
    pub fn create(&self, arch: &str, pkgman: &str) -> Result<()> {
        if let Err(e) = self.disable() {
            debug!(error = %e, "disable during create found no prior state");
        }
        if let Err(e) = self.remove() {
            debug!(error = %e, "remove during create found no prior state");
        }

        std::fs::create_dir_all(&self.systemd_dir)
            .map_err(|e| SysrootError::io(&self.systemd_dir, e))?;

        let contents = render_unit(arch, pkgman);
        let unit_path = self.unit_path();
        let tmp_path = self.systemd_dir.join(format!(".{UNIT_NAME}.tmp"));
        std::fs::write(&tmp_path, contents).map_err(|e| SysrootError::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &unit_path).map_err(|e| SysrootError::io(&unit_path, e))?;
        Ok(())
    }

    /// Creates the `multi-user.target.wants` symlink if it doesn't exist.
    pub fn enable(&self) -> Result<()> {
        let link = self.wants_link();
        if link.exists() || link.is_symlink() {
            return Ok(());
        }
        if let Some(parent) = link.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SysrootError::io(parent, e))?;
        }
        std::os::unix::fs::symlink(self.unit_path(), &link)
            .map_err(|e| SysrootError::io(&link, e))?;
        Ok(())
    }

    /// Removes the wants symlink. Idempotent.
    pub fn disable(&self) -> Result<()> {
        remove_if_present(&self.wants_link())
    }

    /// Removes the unit file itself. Idempotent.
    pub fn remove(&self) -> Result<()> {
        remove_if_present(&self.unit_path())
    }

    pub fn exists(&self) -> bool {
        self.unit_path().exists()
    }

    pub fn is_enabled(&self) -> bool {
        self.wants_link().exists() || is_dangling_symlink(&self.wants_link())
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SysrootError::io(path, e)),
    }
}

fn is_dangling_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}
