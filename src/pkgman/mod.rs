//! Package-manager adapter: retargets the host's package manager at a
//! sysroot, either by root-override flags or by chrooting into it.

mod apt;
mod zypper;

pub use apt::Apt;
pub use zypper::Zypper;

use std::path::PathBuf;

use crate::error::Result;
use crate::process::CommandResult;

/// One subcommand a package-manager adapter advertises through `--help`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmCommand {
    pub name: &'static str,
    pub description: &'static str,
}

/// Retargets an installed package manager at a given sysroot path.
pub trait PackageManager {
    fn name(&self) -> &'static str;

    fn set_sysroot(&mut self, path: PathBuf);

    /// One-time setup performed after a sysroot is populated. A no-op for
    /// adapters that need no extra configuration.
    fn setup(&self) -> Result<()>;

    /// Dispatches `args` against the bound sysroot.
    fn call(&self, args: &[String]) -> Result<CommandResult>;

    fn help_commands(&self) -> Vec<PmCommand>;
}

/// Selects a package-manager adapter by the host platform identifier, the
/// same key the provisioner factory uses. `arch` is the sysroot's target
/// architecture; only the Zypper adapter's `setup()` needs it (for the
/// `zypp.conf` arch-fix map), but the factory takes it uniformly so callers
/// don't need to know which adapter cares.
pub fn for_platform(platform: &str, arch: &str) -> Result<Box<dyn PackageManager>> {
    match platform {
        "ubuntu" | "debian" => Ok(Box::new(Apt::new())),
        "opensuse-leap" => Ok(Box::new(Zypper::with_arch(arch))),
        other => Err(crate::error::SysrootError::UnsupportedArch(format!(
            "no package manager adapter for platform '{other}'"
        ))),
    }
}

fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_platform_threads_arch_into_zypper() {
        let mut pm = for_platform("opensuse-leap", "arm").unwrap();
        let dir = tempfile::tempdir().unwrap();
        pm.set_sysroot(dir.path().to_path_buf());
        pm.setup().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("etc/zypp/zypp.conf")).unwrap();
        assert!(contents.contains("arch = armv7hl"));
    }

    #[test]
    fn for_platform_rejects_unknown_platform() {
        let err = for_platform("fedora", "x86_64").unwrap_err();
        assert!(matches!(err, crate::error::SysrootError::UnsupportedArch(_)));
    }
}
