//! Distribution-specific strategies that populate a freshly created sysroot.
//!
//! A provisioner exposes three phases (`before_populate`, `on_populate`,
//! `after_populate`); the surrounding bookkeeping (directory layout, config
//! write, binary replication) is performed by [`populate`], not by the
//! provisioner itself. Trait dispatch replaces a base/subclass callback
//! cycle with a straight three-call protocol.

mod debian;
mod zypper;

pub use debian::DebianProvisioner;
pub use zypper::ZypperProvisioner;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::arch::Arch;
use crate::error::{Result, SysrootError};

/// Everything a provisioner needs to populate one sysroot.
pub struct ProvisionContext {
    pub sysroot_path: PathBuf,
    pub name: String,
    pub arch: Arch,
    pub host_codename: String,
    pub host_platform: String,
    pub host_kernel_arch: String,
}

pub trait Provisioner {
    fn before_populate(&self, ctx: &ProvisionContext) -> Result<()>;
    fn on_populate(&self, ctx: &ProvisionContext) -> Result<()>;
    fn after_populate(&self, ctx: &ProvisionContext) -> Result<()>;
}

/// Selects a provisioner by the host platform identifier, the same key
/// the package-manager factory uses.
pub fn for_platform(platform: &str) -> Result<Box<dyn Provisioner>> {
    match platform {
        "ubuntu" | "debian" => Ok(Box::new(DebianProvisioner::new(platform))),
        "opensuse-leap" => Ok(Box::new(ZypperProvisioner::new())),
        other => Err(SysrootError::UnsupportedArch(format!(
            "no provisioner for platform '{other}'"
        ))),
    }
}

/// Runs the three-phase protocol, then replicates the manager binary and
/// the target-arch static emulator into the sysroot.
pub fn populate(provisioner: &dyn Provisioner, ctx: &ProvisionContext) -> Result<()> {
    provisioner.before_populate(ctx)?;
    provisioner.on_populate(ctx)?;
    provisioner.after_populate(ctx)?;
    replicate_binaries(ctx)?;
    Ok(())
}

fn replicate_binaries(ctx: &ProvisionContext) -> Result<()> {
    let bin_dir = ctx.sysroot_path.join("usr/bin");
    std::fs::create_dir_all(&bin_dir).map_err(|e| SysrootError::io(&bin_dir, e))?;

    let manager_bin = std::env::current_exe().map_err(|e| SysrootError::io("/proc/self/exe", e))?;
    copy_executable(&manager_bin, &bin_dir.join("sysroot-manager"))?;

    let emulator_name = format!("qemu-{}-static", ctx.arch.name);
    if let Ok(emulator_path) = which::which(&emulator_name) {
        copy_executable(&emulator_path, &bin_dir.join(&emulator_name))?;
    }

    debug!(sysroot = %ctx.sysroot_path.display(), "replicated manager and emulator binaries");
    Ok(())
}

fn copy_executable(src: &Path, dst: &Path) -> Result<()> {
    std::fs::copy(src, dst).map_err(|e| SysrootError::io(dst, e))?;
    std::fs::set_permissions(dst, std::os::unix::fs::PermissionsExt::from_mode(0o755))
        .map_err(|e| SysrootError::io(dst, e))?;
    Ok(())
}

/// Maps a target architecture name to the Debian/Ubuntu architecture name
/// used in `sources.list` and passed to `debootstrap --arch`.
pub fn debian_arch_name(target: &str) -> &str {
    match target {
        "x86_64" => "amd64",
        "i586" => "i386",
        "aarch64" => "arm64",
        other => other,
    }
}

/// Maps a target architecture name per the Zypper Adapter's fix map.
pub fn zypper_arch_name(target: &str) -> &str {
    match target {
        "arm" => "armv7hl",
        other => other,
    }
}
