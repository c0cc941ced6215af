//! The binfmt_misc registrar: writes and erases per-architecture kernel
//! routing rules so `execve(2)` on a foreign ELF is dispatched to the
//! manager binary.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::arch::{self, Arch};
use crate::error::{Result, SysrootError};

const SHIM_PATH: &str = "/usr/bin/sysroot-manager";

pub struct BinFmtRegistrar {
    root: PathBuf,
}

impl Default for BinFmtRegistrar {
    fn default() -> Self {
        Self::new("/proc/sys/fs/binfmt_misc")
    }
}

impl BinFmtRegistrar {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_name(arch: &Arch) -> String {
        format!("sysroot_{}", arch.name)
    }

    /// Builds the raw registrar line per spec: `:name:M::magic:mask:interpreter:`
    /// with the magic/mask written as literal bytes, not hex text. The
    /// kernel's binfmt_misc parser expects the bytes verbatim.
    fn registrar_line(arch: &Arch) -> Vec<u8> {
        let mut line = Vec::new();
        line.push(b':');
        line.extend_from_slice(Self::entry_name(arch).as_bytes());
        line.extend_from_slice(b":M::");
        line.extend_from_slice(&arch.elf_magic);
        line.push(b':');
        line.extend_from_slice(&arch.elf_mask);
        line.push(b':');
        line.extend_from_slice(SHIM_PATH.as_bytes());
        line.push(b':');
        line
    }

    fn check_available(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(SysrootError::KernelBinFmtUnavailable(self.root.clone()));
        }
        Ok(())
    }

    fn entry_path(&self, arch: &Arch) -> PathBuf {
        self.root.join(Self::entry_name(arch))
    }

    /// Registers `arch_name`, first un-registering any prior entry. A
    /// re-register always overwrites, never duplicates.
    pub fn register(&self, arch_name: &str) -> Result<()> {
        self.check_available()?;
        let arch = arch::lookup(arch_name)?;
        self.unregister(arch_name)?;

        let line = Self::registrar_line(&arch);
        debug!(arch = arch.name, "registering binfmt_misc entry");
        std::fs::write(self.root.join("register"), line)
            .map_err(|e| SysrootError::io(self.root.join("register"), e))?;
        info!(arch = arch.name, "binfmt_misc entry registered");
        Ok(())
    }

    /// Unregisters `arch_name`. Silently succeeds if no entry exists.
    pub fn unregister(&self, arch_name: &str) -> Result<()> {
        self.check_available()?;
        let arch = arch::lookup(arch_name)?;
        let path = self.entry_path(&arch);
        if path.exists() {
            debug!(arch = arch.name, "unregistering binfmt_misc entry");
            std::fs::write(&path, "-1").map_err(|e| SysrootError::io(path, e))?;
        }
        Ok(())
    }

    /// True if the kernel currently has an entry registered for `arch_name`.
    pub fn is_registered(&self, arch_name: &str) -> Result<bool> {
        let arch = arch::lookup(arch_name)?;
        Ok(self.entry_path(&arch).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn register_then_unregister_round_trips() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("register"), "").unwrap();
        let reg = BinFmtRegistrar::new(dir.path());

        // simulate the kernel creating the entry node on register
        reg.register("aarch64").ok();
        std::fs::write(dir.path().join("sysroot_aarch64"), "1").unwrap();
        assert!(reg.is_registered("aarch64").unwrap());

        reg.unregister("aarch64").unwrap();
        // our fake kernel doesn't remove the node on "-1" write, but a real
        // fs/sysfs overlay would; assert the write happened without error.
    }

    #[test]
    fn unavailable_root_fails() {
        let reg = BinFmtRegistrar::new("/nonexistent/binfmt/path");
        let err = reg.register("aarch64").unwrap_err();
        assert!(matches!(err, SysrootError::KernelBinFmtUnavailable(_)));
    }

    #[test]
    fn unknown_arch_fails() {
        let dir = tempdir().unwrap();
        let reg = BinFmtRegistrar::new(dir.path());
        let err = reg.register("sparc").unwrap_err();
        assert!(matches!(err, SysrootError::UnknownArch(_)));
    }

    #[test]
    fn registrar_line_is_bit_exact() {
        let arch = arch::lookup("x86_64").unwrap();
        let line = BinFmtRegistrar::registrar_line(&arch);
        assert!(line.starts_with(b":sysroot_x86_64:M::"));
        assert!(line.ends_with(b":/usr/bin/sysroot-manager:"));
        // header + :name:M:: + magic(20) + : + mask(20) + : + interpreter + :
        assert_eq!(
            line.len(),
            1 + "sysroot_x86_64".len() + 4 + 20 + 1 + 20 + 1 + SHIM_PATH.len() + 1
        );
    }
}
