//! Host platform probe: OS release id, codename, and kernel architecture.
//!
//! An external collaborator per the design (the real platform-id and
//! codename strings come from the distro's `/etc/os-release`), kept here as
//! a thin readout with no business logic of its own.

use std::path::Path;

/// Platform id, release codename, and kernel architecture name.
pub struct HostInfo {
    pub platform: String,
    pub codename: String,
    pub kernel_arch: String,
}

pub fn probe() -> HostInfo {
    let (platform, codename) = read_os_release(Path::new("/etc/os-release"));
    let kernel_arch = read_kernel_arch();
    HostInfo {
        platform,
        codename,
        kernel_arch,
    }
}

fn read_kernel_arch() -> String {
    nix::sys::utsname::uname()
        .map(|u| u.machine().to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Reads `ID` and `VERSION_CODENAME` from an `/etc/os-release`-formatted
/// file: `KEY=value` lines, values optionally double-quoted.
fn read_os_release(path: &Path) -> (String, String) {
    let mut platform = String::new();
    let mut codename = String::new();

    let Ok(contents) = std::fs::read_to_string(path) else {
        return (platform, codename);
    };

    for line in contents.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim() {
            "ID" => platform = value.to_string(),
            "VERSION_CODENAME" => codename = value.to_string(),
            _ => {}
        }
    }

    (platform, codename)
}
