//! Bind-mount helpers used by `SysRoot::activate()`/`unmount_binds()`.
//!
//! Non-recursive `MS_BIND` only. The kernel virtual filesystems
//! (`/proc`, `/sys`, `/dev`, `/run`) don't need `rbind`.

use std::path::Path;

use nix::mount::{mount, umount2, MntFlags, MsFlags};
use tracing::{debug, warn};

use crate::error::{Result, SysrootError};

/// The four runtime directories bind-mounted from the host into an active
/// sysroot.
pub const RUNTIME_DIRS: &[&str] = &["/proc", "/sys", "/dev", "/run"];

/// Bind-mounts `host_src` onto `target`. Treats an already-mounted target
/// as success (idempotent), matching the activation contract.
pub fn bind_mount(host_src: &Path, target: &Path) -> Result<()> {
    debug!(src = %host_src.display(), dst = %target.display(), "bind mounting");
    match mount(
        Some(host_src),
        target,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    ) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::EBUSY) => Ok(()),
        Err(e) => Err(SysrootError::ActivationFailed(format!(
            "{} ({})",
            target.display(),
            e
        ))),
    }
}

/// Lazily detaches `target`. Missing or already-unmounted targets are not
/// an error; the caller checks the post-condition (directory empty)
/// separately.
pub fn lazy_unmount(target: &Path) -> Result<()> {
    debug!(dst = %target.display(), "unmounting");
    let flags = MntFlags::MNT_DETACH | MntFlags::MNT_FORCE | MntFlags::UMOUNT_NOFOLLOW;
    match umount2(target, flags) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::EINVAL) | Err(nix::errno::Errno::ENOENT) => Ok(()),
        Err(e) => {
            warn!(dst = %target.display(), error = %e, "unmount reported an error, checking post-state");
            Ok(())
        }
    }
}

/// True if `dir` contains no entries, per the emptiness contract used by
/// both `activate()` and `unmount_binds()`.
pub fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut entries = std::fs::read_dir(dir).map_err(|e| SysrootError::io(dir, e))?;
    Ok(entries.next().is_none())
}
