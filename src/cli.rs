//! The `sysroot` subcommand surface: `<pkgman>-sysroot sysroot [flags]`.

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "sysroot",
    group(ArgGroup::new("mode").args(["list", "create", "delete", "set", "path", "init"]).required(true))
)]
pub struct SysrootArgs {
    /// List every sysroot in the store.
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Create a new sysroot (requires --name and --arch).
    #[arg(short = 'c', long)]
    pub create: bool,

    /// Delete a sysroot (requires --name and --arch).
    #[arg(short = 'd', long)]
    pub delete: bool,

    /// Switch the default sysroot (requires --name and --arch).
    #[arg(short = 's', long)]
    pub set: bool,

    /// Print the default sysroot's path.
    #[arg(short = 'p', long)]
    pub path: bool,

    /// Boot-time reconciliation: reinstall the kernel route and reactivate
    /// the default sysroot.
    #[arg(short = 'i', long)]
    pub init: bool,

    #[arg(short = 'n', long)]
    pub name: Option<String>,

    #[arg(short = 'a', long)]
    pub arch: Option<String>,

    #[arg(long)]
    pub verbose: bool,
}

impl SysrootArgs {
    /// `--create`/`--delete`/`--set` all require both `--name` and
    /// `--arch`; this resolves them together so every caller gets the
    /// same error message.
    pub fn name_and_arch(&self) -> crate::error::Result<(&str, &str)> {
        match (&self.name, &self.arch) {
            (Some(n), Some(a)) => Ok((n.as_str(), a.as_str())),
            _ => Err(crate::error::SysrootError::MalformedConfig(
                std::path::PathBuf::from("<command line>"),
                "--name and --arch are both required for this action".to_string(),
            )),
        }
    }
}
