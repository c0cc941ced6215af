//! Sequences operations across every other component for the seven
//! user-level actions. Holds no global state: everything it needs is
//! passed in or owned as a value at construction.

use tracing::info;

use crate::arch;
use crate::binfmt::BinFmtRegistrar;
use crate::error::{Result, SysrootError};
use crate::pkgman;
use crate::process::CommandResult;
use crate::provisioner::{self, ProvisionContext};
use crate::service::ServiceUnit;
use crate::store::Store;
use crate::sysroot::SysRoot;

/// True if the effective UID is 0. Preferred over the real UID per the
/// resolved open question: effective UID reflects what the process can
/// actually do, which is what every mutating action depends on.
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

pub fn require_root() -> Result<()> {
    if is_root() {
        Ok(())
    } else {
        Err(SysrootError::PermissionDenied)
    }
}

pub struct Orchestrator {
    pub store: Store,
    pub binfmt: BinFmtRegistrar,
    pub service: ServiceUnit,
    /// The host platform identifier (`ubuntu`, `debian`, `opensuse-leap`)
    /// that selects both the provisioner and the package-manager adapter.
    pub host_platform: String,
    /// The host's current kernel architecture name, used by the Debian
    /// provisioner to decide whether repository lines need an `arch=`
    /// filter.
    pub host_kernel_arch: String,
    /// The host's release codename (e.g. `jammy`, `bookworm`).
    pub host_codename: String,
}

impl Orchestrator {
    pub fn new(
        store: Store,
        binfmt: BinFmtRegistrar,
        service: ServiceUnit,
        host_platform: impl Into<String>,
        host_kernel_arch: impl Into<String>,
        host_codename: impl Into<String>,
    ) -> Self {
        Self {
            store,
            binfmt,
            service,
            host_platform: host_platform.into(),
            host_kernel_arch: host_kernel_arch.into(),
            host_codename: host_codename.into(),
        }
    }

    fn pkgman_name(&self) -> Result<&'static str> {
        Ok(match self.host_platform.as_str() {
            "ubuntu" | "debian" => "apt",
            "opensuse-leap" => "zypper",
            other => {
                return Err(SysrootError::UnsupportedArch(format!(
                    "no package manager for platform '{other}'"
                )))
            }
        })
    }

    pub fn list(&self) -> Result<Vec<SysRoot>> {
        self.store.list()
    }

    /// Formats the listing exactly as the CLI prints it: a header line
    /// followed by one `N. name (arch)` line per sysroot, `*` marking the
    /// default.
    pub fn format_list(roots: &[SysRoot]) -> String {
        let mut out = format!("Found {} system roots:\n", roots.len());
        for (i, sr) in roots.iter().enumerate() {
            let marker = if sr.default { "*" } else { " " };
            out.push_str(&format!("{marker} {:>2}. {} ({})\n", i + 1, sr.name, sr.arch));
        }
        out
    }

    pub fn path(&self) -> Result<Option<std::path::PathBuf>> {
        Ok(self.store.default()?.map(|sr| sr.path))
    }

    /// Creates a sysroot: allocates it, provisions it, configures its
    /// package manager, and (if this is the first sysroot in the store)
    /// promotes it to default via the same sequence `set_default` uses.
    pub fn create(&self, name: &str, arch_name: &str) -> Result<SysRoot> {
        require_root()?;
        let was_empty = self.store.list()?.is_empty();

        let sysroot = self.store.create(name, arch_name)?;
        let arch = arch::lookup(arch_name)?;

        let provisioner = provisioner::for_platform(&self.host_platform)?;
        let ctx = ProvisionContext {
            sysroot_path: sysroot.path.clone(),
            name: sysroot.name.clone(),
            arch,
            host_codename: self.host_codename.clone(),
            host_platform: self.host_platform.clone(),
            host_kernel_arch: self.host_kernel_arch.clone(),
        };
        provisioner::populate(provisioner.as_ref(), &ctx)?;

        let mut pm = pkgman::for_platform(&self.host_platform, arch.name)?;
        pm.set_sysroot(sysroot.path.clone());
        pm.setup()?;

        if was_empty {
            self.set_default(name, arch_name)?;
        }

        info!(name, arch = arch_name, "sysroot created");
        SysRoot::from_path(sysroot.path)
    }

    /// Forbids deletion while cwd is inside the target, via `Store::delete`.
    /// If this removes the last sysroot in the store, also tears down the
    /// kernel route and the boot-time service.
    pub fn delete(&self, name: &str, arch_name: &str) -> Result<()> {
        require_root()?;
        self.store.delete(name, arch_name)?;

        if self.store.list()?.is_empty() {
            self.binfmt.unregister(arch_name)?;
            self.service.disable()?;
            self.service.remove()?;
        }

        info!(name, arch = arch_name, "sysroot deleted");
        Ok(())
    }

    /// The coupled set-default sequence: unmount the current default,
    /// switch the flag, reinstall the kernel route, recreate and
    /// re-enable the service unit, then reactivate the new default.
    pub fn set_default(&self, name: &str, arch_name: &str) -> Result<SysRoot> {
        require_root()?;

        let previous = self.store.default()?;
        if let Some(current) = &previous {
            current.unmount_binds()?;
        }

        self.store.set_default(name, arch_name)?;
        self.binfmt.register(arch_name)?;
        if let Some(previous) = previous {
            if previous.arch != arch_name {
                self.binfmt.unregister(&previous.arch)?;
            }
        }

        let new_default = self
            .store
            .default()?
            .ok_or_else(|| SysrootError::NotFound(format!("{name}.{arch_name}")))?;

        self.service.remove()?;
        self.service.create(&new_default.arch, self.pkgman_name()?)?;
        self.service.enable()?;

        new_default.activate()?;
        info!(name, arch = arch_name, "default sysroot switched");
        Ok(new_default)
    }

    /// Boot-time reconciliation: reinstalls the kernel route, ensures the
    /// service is installed and enabled, and reactivates the default
    /// sysroot. A no-op (not an error) when the store has no default yet.
    pub fn init(&self) -> Result<()> {
        require_root()?;
        let Some(default) = self.store.default()? else {
            return Ok(());
        };
        self.binfmt.register(&default.arch)?;
        self.service.create(&default.arch, self.pkgman_name()?)?;
        self.service.enable()?;
        default.activate()?;
        info!(name = default.name, arch = default.arch, "sysroot reactivated");
        Ok(())
    }

    /// Forwards `args` to the package manager bound to the current
    /// default sysroot.
    pub fn pkgman_call(&self, args: &[String]) -> Result<CommandResult> {
        let default = self.store.default()?.ok_or(SysrootError::NoDefault)?;
        let mut pm = pkgman::for_platform(&self.host_platform, &default.arch)?;
        pm.set_sysroot(default.path);
        pm.call(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_list_matches_documented_layout() {
        let store_root = std::path::Path::new("/usr/sysroots");
        let mut a = SysRoot::placeholder(store_root, "a", "arm");
        a.default = true;
        let b = SysRoot::placeholder(store_root, "b", "x86_64");

        let out = Orchestrator::format_list(&[a, b]);
        assert_eq!(out, "Found 2 system roots:\n*  1. a (arm)\n   2. b (x86_64)\n");
    }

    #[test]
    fn format_list_on_empty_store() {
        let out = Orchestrator::format_list(&[]);
        assert_eq!(out, "Found 0 system roots:\n");
    }
}
