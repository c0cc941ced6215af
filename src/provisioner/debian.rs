use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SysrootError};
use crate::process::Cmd;
use crate::sysroot::CONFIG_RELATIVE_PATH;

use super::{debian_arch_name, ProvisionContext, Provisioner};

const HOST_SOURCES_LIST: &str = "/etc/apt/sources.list";

/// Populates a sysroot via `debootstrap` from the host's APT repositories.
pub struct DebianProvisioner {
    host_platform: String,
    sources_list_path: PathBuf,
}

impl DebianProvisioner {
    pub fn new(host_platform: impl Into<String>) -> Self {
        Self {
            host_platform: host_platform.into(),
            sources_list_path: PathBuf::from(HOST_SOURCES_LIST),
        }
    }

    /// Overrides the sources.list path. Used by tests.
    pub fn with_sources_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources_list_path = path.into();
        self
    }

    fn select(&self, ctx: &ProvisionContext) -> Result<RepoSelection> {
        let contents = std::fs::read_to_string(&self.sources_list_path)
            .map_err(|e| SysrootError::io(&self.sources_list_path, e))?;

        let debian_arch = if ctx.arch.name != ctx.host_kernel_arch {
            Some(debian_arch_name(&ctx.arch.name))
        } else {
            None
        };

        select_repo(&contents, &ctx.host_codename, debian_arch).ok_or_else(|| {
            SysrootError::MalformedConfig(
                self.sources_list_path.clone(),
                "no matching repository line for codename or 'sid'".to_string(),
            )
        })
    }
}

impl Provisioner for DebianProvisioner {
    fn before_populate(&self, ctx: &ProvisionContext) -> Result<()> {
        let emulator = format!("qemu-{}-static", ctx.arch.name);
        which::which(&emulator)
            .map(|_| ())
            .map_err(|_| SysrootError::MissingEmulator(ctx.arch.name.to_string()))
    }

    fn on_populate(&self, ctx: &ProvisionContext) -> Result<()> {
        let selection = self.select(ctx)?;
        let debian_arch = debian_arch_name(&ctx.arch.name);
        let components = selection.components.join(",");

        debug!(
            arch = debian_arch,
            components, url = %selection.url, "running debootstrap"
        );
        Cmd::new("debootstrap")
            .arg("--arch")
            .arg(debian_arch)
            .arg("--no-check-gpg")
            .arg("--variant=minbase")
            .arg(format!("--components={components}"))
            .arg(&ctx.host_codename)
            .arg(ctx.sysroot_path.to_string_lossy())
            .arg(&selection.url)
            .run_interactive()?;

        Cmd::new("chroot")
            .arg(ctx.sysroot_path.to_string_lossy())
            .arg("apt")
            .arg("--fix-broken")
            .arg("install")
            .run_interactive()?;

        Ok(())
    }

    fn after_populate(&self, ctx: &ProvisionContext) -> Result<()> {
        for rel in ["etc", "proc", "dev", "sys", "run", "tmp"] {
            let dir = ctx.sysroot_path.join(rel);
            std::fs::create_dir_all(&dir).map_err(|e| SysrootError::io(&dir, e))?;
        }

        let config_path = ctx.sysroot_path.join(CONFIG_RELATIVE_PATH);
        let config = format!("name: {}\narch: {}\ndefault: false\n", ctx.name, ctx.arch.name);
        std::fs::write(&config_path, config).map_err(|e| SysrootError::io(&config_path, e))?;

        if self.host_platform == "ubuntu" {
            let selection = self.select(ctx)?;
            append_ubuntu_sources(
                &ctx.sysroot_path,
                &selection.url,
                &ctx.host_codename,
                &selection.components.join(" "),
            )?;
        }

        Cmd::new("chroot")
            .arg(ctx.sysroot_path.to_string_lossy())
            .arg("apt-get")
            .arg("update")
            .run_interactive()?;
        Cmd::new("chroot")
            .arg(ctx.sysroot_path.to_string_lossy())
            .arg("apt-get")
            .arg("upgrade")
            .arg("--yes")
            .run_interactive()?;

        Ok(())
    }
}

fn append_ubuntu_sources(
    sysroot_path: &Path,
    url: &str,
    codename: &str,
    components: &str,
) -> Result<()> {
    let sources_list = sysroot_path.join("etc/apt/sources.list");
    let mut extra = String::new();
    for suffix in ["updates", "backports", "security"] {
        extra.push_str(&format!("deb {url} {codename}-{suffix} {components}\n"));
    }
    let mut existing = std::fs::read_to_string(&sources_list).unwrap_or_default();
    existing.push_str(&extra);
    std::fs::write(&sources_list, existing).map_err(|e| SysrootError::io(&sources_list, e))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DebLine {
    opts: Vec<String>,
    url: String,
    suite: String,
    components: Vec<String>,
}

fn parse_line(line: &str) -> Option<DebLine> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (kind, rest) = tokens.split_first()?;
    if *kind != "deb" {
        return None;
    }

    let mut rest = rest.to_vec();
    let mut opts = Vec::new();
    if let Some(first) = rest.first() {
        if first.starts_with('[') {
            let mut consumed = 0;
            let mut opt_str = String::new();
            for tok in &rest {
                opt_str.push_str(tok);
                consumed += 1;
                if tok.ends_with(']') {
                    break;
                }
                opt_str.push(' ');
            }
            let trimmed = opt_str.trim_start_matches('[').trim_end_matches(']');
            opts = trimmed.split_whitespace().map(str::to_string).collect();
            rest = rest.split_off(consumed);
        }
    }

    if rest.len() < 2 {
        return None;
    }
    let url = rest[0].to_string();
    let suite = rest[1].to_string();
    let components = rest[2..].iter().map(|s| s.to_string()).collect();
    Some(DebLine {
        opts,
        url,
        suite,
        components,
    })
}

struct RepoSelection {
    url: String,
    components: Vec<String>,
}

fn try_select(lines: &[DebLine], suite: &str, target_debian_arch: Option<&str>) -> Option<RepoSelection> {
    let candidates: Vec<&DebLine> = lines
        .iter()
        .filter(|l| l.suite == suite)
        .filter(|l| l.components.iter().any(|c| c == "main"))
        .filter(|l| match target_debian_arch {
            Some(arch) => l.opts.iter().any(|o| o == &format!("arch={arch}")),
            None => true,
        })
        .collect();

    if candidates.is_empty() {
        return None;
    }

    let url = candidates[0].url.clone();
    let mut components: Vec<String> = candidates.iter().flat_map(|l| l.components.clone()).collect();
    components.sort();
    components.dedup();
    Some(RepoSelection { url, components })
}

fn select_repo(contents: &str, codename: &str, target_debian_arch: Option<&str>) -> Option<RepoSelection> {
    let lines: Vec<DebLine> = contents.lines().filter_map(parse_line).collect();
    try_select(&lines, codename, target_debian_arch).or_else(|| try_select(&lines, "sid", target_debian_arch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_line() {
        let line = parse_line("deb http://archive.ubuntu.com/ubuntu jammy main restricted").unwrap();
        assert_eq!(line.url, "http://archive.ubuntu.com/ubuntu");
        assert_eq!(line.suite, "jammy");
        assert_eq!(line.components, vec!["main", "restricted"]);
        assert!(line.opts.is_empty());
    }

    #[test]
    fn parses_line_with_arch_option() {
        let line = parse_line("deb [arch=arm64] http://ports.ubuntu.com/ubuntu-ports jammy main").unwrap();
        assert_eq!(line.opts, vec!["arch=arm64"]);
        assert_eq!(line.url, "http://ports.ubuntu.com/ubuntu-ports");
    }

    #[test]
    fn ignores_deb_src_and_comments() {
        assert!(parse_line("deb-src http://example.com jammy main").is_none());
        assert!(parse_line("# deb http://example.com jammy main").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn select_repo_picks_matching_codename_and_unions_components() {
        let sources = "\
deb http://archive.ubuntu.com/ubuntu jammy main restricted
deb http://archive.ubuntu.com/ubuntu jammy-updates main universe
deb http://archive.ubuntu.com/ubuntu focal main
";
        let selection = select_repo(sources, "jammy", None).unwrap();
        assert_eq!(selection.url, "http://archive.ubuntu.com/ubuntu");
        assert_eq!(selection.components, vec!["main", "restricted"]);
    }

    #[test]
    fn select_repo_falls_back_to_sid() {
        let sources = "deb http://deb.debian.org/debian sid main\n";
        let selection = select_repo(sources, "bookworm", None).unwrap();
        assert_eq!(selection.components, vec!["main"]);
    }

    #[test]
    fn select_repo_filters_by_arch_option_when_given() {
        let sources = "\
deb http://archive.ubuntu.com/ubuntu jammy main
deb [arch=arm64] http://ports.ubuntu.com/ubuntu-ports jammy main
";
        let selection = select_repo(sources, "jammy", Some("arm64")).unwrap();
        assert_eq!(selection.url, "http://ports.ubuntu.com/ubuntu-ports");
    }

    #[test]
    fn select_repo_returns_none_when_nothing_matches() {
        let sources = "deb http://archive.ubuntu.com/ubuntu jammy contrib\n";
        assert!(select_repo(sources, "jammy", None).is_none());
    }

    #[test]
    fn debian_arch_name_maps_known_targets() {
        assert_eq!(debian_arch_name("x86_64"), "amd64");
        assert_eq!(debian_arch_name("i586"), "i386");
        assert_eq!(debian_arch_name("aarch64"), "arm64");
        assert_eq!(debian_arch_name("mips"), "mips");
    }
}
