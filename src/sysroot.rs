//! The `SysRoot` entity: one on-disk sysroot, its config file, its bind
//! mounts, and its activation state.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, SysrootError};
use crate::mounts::{self, RUNTIME_DIRS};

pub const CONFIG_RELATIVE_PATH: &str = "etc/sysroot.conf";

/// In-memory view of `<sysroot>/etc/sysroot.conf`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfigData {
    name: String,
    arch: String,
    default: bool,
}

fn parse_config(contents: &str) -> Option<ConfigData> {
    let mut name = None;
    let mut arch = None;
    let mut default = false;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "name" => name = Some(value.trim().to_string()),
            "arch" => arch = Some(value.trim().to_string()),
            "default" => default = value.trim() == "true",
            _ => {}
        }
    }

    Some(ConfigData {
        name: name?,
        arch: arch?,
        default,
    })
}

fn render_config(name: &str, arch: &str, default: bool) -> String {
    format!("name: {name}\narch: {arch}\ndefault: {default}\n")
}

/// One sysroot, either store-rooted (`<store>/<name>.<arch>`) or
/// synthesized at `/` for the chrooted case.
#[derive(Debug, Clone)]
pub struct SysRoot {
    pub name: String,
    pub arch: String,
    pub path: PathBuf,
    pub default: bool,
    pub config_path: PathBuf,
}

impl SysRoot {
    /// Builds the `SysRoot` for `name.arch` under `store_root`, without
    /// touching disk. Used by `Store::create`/`Store::list` before the
    /// on-disk config is known to exist.
    pub fn placeholder(store_root: &Path, name: &str, arch: &str) -> Self {
        let path = store_root.join(format!("{name}.{arch}"));
        let config_path = path.join(CONFIG_RELATIVE_PATH);
        Self {
            name: name.to_string(),
            arch: arch.to_string(),
            path,
            default: false,
            config_path,
        }
    }

    /// Synthesizes the sysroot rooted at `/`, used when the current
    /// process is already chrooted into one.
    pub fn at_root() -> Result<Self> {
        Self::from_path(PathBuf::from("/"))
    }

    /// Reads a sysroot's identity from its config file at `path/etc/sysroot.conf`.
    pub fn from_path(path: PathBuf) -> Result<Self> {
        let config_path = path.join(CONFIG_RELATIVE_PATH);
        if !config_path.exists() {
            return Err(SysrootError::MissingConfig(config_path));
        }
        let contents = std::fs::read_to_string(&config_path)
            .map_err(|e| SysrootError::io(&config_path, e))?;
        let data = parse_config(&contents).ok_or_else(|| {
            SysrootError::MalformedConfig(
                config_path.clone(),
                "missing required key 'name' or 'arch'".to_string(),
            )
        })?;

        Ok(Self {
            name: data.name,
            arch: data.arch,
            path,
            default: data.default,
            config_path,
        })
    }

    /// Re-reads this sysroot's config from disk.
    pub fn reload(&mut self) -> Result<()> {
        let fresh = Self::from_path(self.path.clone())?;
        *self = fresh;
        Ok(())
    }

    /// Writes a fresh `default: false` config for a newly created sysroot.
    pub fn write_initial_config(&self) -> Result<()> {
        let contents = render_config(&self.name, &self.arch, false);
        std::fs::write(&self.config_path, contents)
            .map_err(|e| SysrootError::io(&self.config_path, e))?;
        Ok(())
    }

    /// Rewrites the config with a new default flag, preserving name/arch.
    pub fn set_default(&mut self, flag: bool) -> Result<()> {
        let contents = render_config(&self.name, &self.arch, flag);
        std::fs::write(&self.config_path, contents)
            .map_err(|e| SysrootError::io(&self.config_path, e))?;
        self.default = flag;
        Ok(())
    }

    /// Bind-mounts `/proc`, `/sys`, `/dev`, `/run` from the host into this
    /// sysroot. Idempotent: already-mounted sources succeed silently.
    pub fn activate(&self) -> Result<()> {
        for rel in RUNTIME_DIRS {
            let target = join_relative(&self.path, rel);
            mounts::bind_mount(Path::new(rel), &target)?;
        }
        info!(sysroot = %self.path.display(), "activated");
        Ok(())
    }

    /// Lazily detaches the four runtime bind mounts, then verifies each
    /// directory is empty. Returns `StillMounted` naming the first
    /// directory that's still non-empty so the caller can retry.
    pub fn unmount_binds(&self) -> Result<()> {
        for rel in RUNTIME_DIRS {
            let target = join_relative(&self.path, rel);
            mounts::lazy_unmount(&target)?;
        }
        for rel in RUNTIME_DIRS {
            let target = join_relative(&self.path, rel);
            if !mounts::is_empty_dir(&target)? {
                return Err(SysrootError::StillMounted(rel.to_string()));
            }
        }
        debug!(sysroot = %self.path.display(), "unmounted runtime binds");
        Ok(())
    }
}

fn join_relative(base: &Path, rel: &str) -> PathBuf {
    base.join(rel.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_sysroot(dir: &Path, name: &str, arch: &str, default: bool) -> PathBuf {
        let root = dir.join(format!("{name}.{arch}"));
        std::fs::create_dir_all(root.join("etc")).unwrap();
        std::fs::write(
            root.join(CONFIG_RELATIVE_PATH),
            render_config(name, arch, default),
        )
        .unwrap();
        root
    }

    #[test]
    fn config_round_trip_preserves_fields() {
        let dir = tempdir().unwrap();
        let root = make_sysroot(dir.path(), "deb", "aarch64", true);
        let sr = SysRoot::from_path(root).unwrap();
        assert_eq!(sr.name, "deb");
        assert_eq!(sr.arch, "aarch64");
        assert!(sr.default);
    }

    #[test]
    fn missing_config_fails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nope.arm");
        std::fs::create_dir_all(&root).unwrap();
        let err = SysRoot::from_path(root).unwrap_err();
        assert!(matches!(err, SysrootError::MissingConfig(_)));
    }

    #[test]
    fn malformed_config_missing_arch_fails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("deb.arm");
        std::fs::create_dir_all(root.join("etc")).unwrap();
        std::fs::write(root.join(CONFIG_RELATIVE_PATH), "name: deb\n").unwrap();
        let err = SysRoot::from_path(root).unwrap_err();
        assert!(matches!(err, SysrootError::MalformedConfig(_, _)));
    }

    #[test]
    fn set_default_preserves_name_and_arch() {
        let dir = tempdir().unwrap();
        let root = make_sysroot(dir.path(), "deb", "aarch64", false);
        let mut sr = SysRoot::from_path(root).unwrap();
        sr.set_default(true).unwrap();

        let reloaded = SysRoot::from_path(sr.path.clone()).unwrap();
        assert_eq!(reloaded.name, "deb");
        assert_eq!(reloaded.arch, "aarch64");
        assert!(reloaded.default);
    }

    #[test]
    fn parse_config_ignores_key_order() {
        let a = parse_config("name: x\narch: y\ndefault: true\n").unwrap();
        let b = parse_config("default: true\narch: y\nname: x\n").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unmount_binds_reports_still_mounted_dir_not_empty() {
        let dir = tempdir().unwrap();
        let root = make_sysroot(dir.path(), "deb", "aarch64", false);
        for rel in RUNTIME_DIRS {
            let target = join_relative(&root, rel);
            std::fs::create_dir_all(&target).unwrap();
            std::fs::write(target.join("leftover"), "x").unwrap();
        }
        let sr = SysRoot::from_path(root).unwrap();
        let err = sr.unmount_binds().unwrap_err();
        assert!(matches!(err, SysrootError::StillMounted(_)));
    }

    #[test]
    fn unmount_binds_succeeds_when_dirs_empty() {
        let dir = tempdir().unwrap();
        let root = make_sysroot(dir.path(), "deb", "aarch64", false);
        for rel in RUNTIME_DIRS {
            let target = join_relative(&root, rel);
            std::fs::create_dir_all(&target).unwrap();
        }
        let sr = SysRoot::from_path(root).unwrap();
        sr.unmount_binds().unwrap();
    }
}
