//! The sysroot store: the singleton directory rooted at `store_root` that
//! owns every sysroot on the host.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::fcntl::{flock, FlockArg};
use tracing::debug;

use crate::arch;
use crate::error::{Result, SysrootError};
use crate::hostconfig;
use crate::sysroot::SysRoot;

/// An exclusive advisory lock on `<store_root>/.lock`, held for the
/// duration of a mutating store action. Released when dropped.
pub struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn acquire(store_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(store_root).map_err(|e| SysrootError::io(store_root, e))?;
        let path = store_root.join(".lock");
        let file = File::create(&path).map_err(|e| SysrootError::io(&path, e))?;
        flock(file.as_raw_fd(), FlockArg::LockExclusive)
            .map_err(|e| SysrootError::IoFailure(path.clone(), e.to_string()))?;
        Ok(Self { _file: file })
    }
}

pub struct Store {
    root: PathBuf,
    architectures: Vec<String>,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            architectures: arch::names().into_iter().map(str::to_string).collect(),
        }
    }

    /// Builds a store rooted at the directory named in the host config
    /// file, falling back to the documented default.
    pub fn from_host_config(host_config_path: &Path) -> Self {
        Self::new(hostconfig::read_store_root(host_config_path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_arch(&self, arch: &str) -> Result<()> {
        if !self.architectures.iter().any(|a| a == arch) {
            return Err(SysrootError::UnsupportedArch(arch.to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(&self.root)
    }

    /// Enumerates every sysroot under the store root, stable-sorted by
    /// `(name, arch)`. A directory entry that doesn't match `<name>.<arch>`
    /// with a known architecture is a hard failure (`MalformedStore`), which
    /// surfaces operator mistakes rather than silently skipping them.
    pub fn list(&self) -> Result<Vec<SysRoot>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.root).map_err(|e| SysrootError::io(&self.root, e))?;
        let mut roots = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| SysrootError::io(&self.root, e))?;
            if !entry.file_type().map_err(|e| SysrootError::io(&self.root, e))?.is_dir() {
                continue;
            }
            let fname = entry.file_name();
            let fname = fname.to_string_lossy();
            if fname.starts_with('.') {
                continue;
            }

            let Some((name, arch_name)) = fname.rsplit_once('.') else {
                return Err(SysrootError::MalformedStore(
                    entry.path(),
                    format!("directory name '{fname}' is not of the form <name>.<arch>"),
                ));
            };

            if arch::lookup(arch_name).is_err() {
                return Err(SysrootError::MalformedStore(
                    entry.path(),
                    format!("'{arch_name}' is not a known architecture"),
                ));
            }

            let sysroot = SysRoot::from_path(entry.path()).map_err(|e| match e {
                SysrootError::MissingConfig(p) => {
                    SysrootError::MalformedStore(p, "sysroot configuration missing".to_string())
                }
                other => other,
            })?;

            if sysroot.name != name || sysroot.arch != arch_name {
                return Err(SysrootError::MalformedStore(
                    entry.path(),
                    "directory name disagrees with config contents".to_string(),
                ));
            }

            roots.push(sysroot);
        }

        roots.sort_by(|a, b| (&a.name, &a.arch).cmp(&(&b.name, &b.arch)));
        Ok(roots)
    }

    /// Allocates a new sysroot placeholder: creates the standard
    /// directories and writes a `default: false` config. Population (by a
    /// provisioner) and replication happen afterward, driven by the
    /// orchestrator. This method only establishes the empty skeleton.
    pub fn create(&self, name: &str, arch: &str) -> Result<SysRoot> {
        self.check_arch(arch)?;
        let _lock = self.lock()?;

        let sysroot = SysRoot::placeholder(&self.root, name, arch);
        if sysroot.path.exists() {
            return Err(SysrootError::AlreadyExists(sysroot.path));
        }

        for rel in ["etc", "proc", "dev", "sys", "run", "tmp"] {
            let dir = sysroot.path.join(rel);
            std::fs::create_dir_all(&dir).map_err(|e| SysrootError::io(&dir, e))?;
            std::fs::set_permissions(&dir, std::os::unix::fs::PermissionsExt::from_mode(0o755))
                .map_err(|e| SysrootError::io(&dir, e))?;
        }

        sysroot.write_initial_config()?;
        debug!(name, arch, path = %sysroot.path.display(), "allocated sysroot");
        Ok(sysroot)
    }

    /// Forbids deletion if the current working directory is under
    /// `sysroot.path`, then unmounts bind mounts, verifies the runtime
    /// directories are empty, and recursively removes the tree.
    pub fn delete(&self, name: &str, arch: &str) -> Result<()> {
        self.check_arch(arch)?;
        let _lock = self.lock()?;

        let path = self.root.join(format!("{name}.{arch}"));
        if !path.exists() {
            return Err(SysrootError::NotFound(format!("{name}.{arch}")));
        }
        let sysroot = SysRoot::from_path(path)?;
        self.check_not_in_use(&sysroot)?;

        sysroot.unmount_binds()?;

        std::fs::remove_dir_all(&sysroot.path).map_err(|e| SysrootError::io(&sysroot.path, e))?;
        Ok(())
    }

    fn check_not_in_use(&self, sysroot: &SysRoot) -> Result<()> {
        let cwd = std::env::current_dir().map_err(|e| SysrootError::io(".", e))?;
        if cwd.starts_with(&sysroot.path) {
            return Err(SysrootError::SysrootInUse(sysroot.path.clone()));
        }
        Ok(())
    }

    /// Marks `name.arch` as the default sysroot and every other sysroot as
    /// non-default.
    pub fn set_default(&self, name: &str, arch: &str) -> Result<SysRoot> {
        self.check_arch(arch)?;
        let _lock = self.lock()?;

        let roots = self.list()?;
        let target = roots
            .iter()
            .find(|sr| sr.name == name && sr.arch == arch)
            .cloned();

        let Some(mut target) = target else {
            return Err(SysrootError::NotFound(format!("{name}.{arch}")));
        };

        for mut sr in roots {
            let should_be_default = sr.name == name && sr.arch == arch;
            if sr.default != should_be_default {
                sr.set_default(should_be_default)?;
            }
        }
        target.default = true;
        Ok(target)
    }

    /// Returns the default sysroot: if the current context is chrooted,
    /// synthesizes one at `/`; otherwise the one with `default: true`, or
    /// `None` if the store has no sysroots at all.
    pub fn default(&self) -> Result<Option<SysRoot>> {
        if self.is_chrooted() {
            return Ok(Some(SysRoot::at_root()?));
        }

        for sr in self.list()? {
            if sr.default {
                return Ok(Some(sr));
            }
        }
        Ok(None)
    }

    pub fn is_chrooted(&self) -> bool {
        hostconfig::is_chrooted()
    }

    pub fn supported_architectures(&self) -> &[String] {
        &self.architectures
    }
}
