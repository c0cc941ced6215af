use std::path::PathBuf;

use crate::error::{Result, SysrootError};
use crate::process::{Cmd, CommandResult};

use super::{PackageManager, PmCommand};

fn fix_arch(arch: &str) -> &str {
    match arch {
        "arm" => "armv7hl",
        other => other,
    }
}

/// Retargets `zypper` at an openSUSE sysroot via `--root`.
pub struct Zypper {
    sysroot: PathBuf,
    arch: String,
}

impl Zypper {
    pub fn new() -> Self {
        Self {
            sysroot: PathBuf::new(),
            arch: String::new(),
        }
    }

    pub fn with_arch(arch: impl Into<String>) -> Self {
        Self {
            sysroot: PathBuf::new(),
            arch: arch.into(),
        }
    }

    fn zypp_conf_path(&self) -> PathBuf {
        self.sysroot.join("etc/zypp/zypp.conf")
    }
}

impl Default for Zypper {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageManager for Zypper {
    fn name(&self) -> &'static str {
        "zypper"
    }

    fn set_sysroot(&mut self, path: PathBuf) {
        self.sysroot = path;
    }

    fn setup(&self) -> Result<()> {
        let zypp_dir = self.sysroot.join("etc/zypp");
        std::fs::create_dir_all(&zypp_dir).map_err(|e| SysrootError::io(&zypp_dir, e))?;

        let arch = fix_arch(&self.arch);
        let contents = format!(
            "[main]\narch = {arch}\nmultiversion = provides:multiversion(kernel)\nmultiversion.kernels = latest,latest-1,running\n"
        );
        let conf_path = self.zypp_conf_path();
        std::fs::write(&conf_path, contents).map_err(|e| SysrootError::io(&conf_path, e))?;
        std::env::set_var("ZYPP_CONF", &conf_path);
        Ok(())
    }

    fn call(&self, args: &[String]) -> Result<CommandResult> {
        Cmd::new("zypper")
            .arg("--root")
            .arg(self.sysroot.to_string_lossy())
            .args(args)
            .run()
    }

    fn help_commands(&self) -> Vec<PmCommand> {
        vec![
            PmCommand {
                name: "install",
                description: "install a package inside the sysroot",
            },
            PmCommand {
                name: "remove",
                description: "remove a package from the sysroot",
            },
            PmCommand {
                name: "refresh",
                description: "refresh the sysroot's repository metadata",
            },
            PmCommand {
                name: "update",
                description: "update packages inside the sysroot",
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fix_arch_maps_arm_to_armv7hl() {
        assert_eq!(fix_arch("arm"), "armv7hl");
        assert_eq!(fix_arch("aarch64"), "aarch64");
    }

    #[test]
    fn setup_writes_zypp_conf() {
        let dir = tempdir().unwrap();
        let mut zypper = Zypper::with_arch("arm");
        zypper.set_sysroot(dir.path().to_path_buf());
        zypper.setup().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("etc/zypp/zypp.conf")).unwrap();
        assert!(contents.contains("arch = armv7hl"));
        assert!(contents.contains("multiversion.kernels = latest,latest-1,running"));
    }
}
