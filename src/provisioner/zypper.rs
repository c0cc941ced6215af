use crate::error::Result;

use super::{ProvisionContext, Provisioner};

/// All phases are no-ops inside the sysroot. The actual zypper
/// configuration is emitted by the Zypper package-manager adapter's
/// `setup()`, once the sysroot directory tree exists.
pub struct ZypperProvisioner;

impl ZypperProvisioner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ZypperProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Provisioner for ZypperProvisioner {
    fn before_populate(&self, _ctx: &ProvisionContext) -> Result<()> {
        Ok(())
    }

    fn on_populate(&self, _ctx: &ProvisionContext) -> Result<()> {
        Ok(())
    }

    fn after_populate(&self, _ctx: &ProvisionContext) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch;

    #[test]
    fn all_phases_are_noops() {
        let provisioner = ZypperProvisioner::new();
        let ctx = ProvisionContext {
            sysroot_path: "/tmp/doesnotmatter".into(),
            name: "suse".into(),
            arch: arch::lookup("arm").unwrap(),
            host_codename: "leap".into(),
            host_platform: "opensuse-leap".into(),
            host_kernel_arch: "x86_64".into(),
        };
        provisioner.before_populate(&ctx).unwrap();
        provisioner.on_populate(&ctx).unwrap();
        provisioner.after_populate(&ctx).unwrap();
    }
}
