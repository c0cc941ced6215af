//! The Arch Gate Shim: the code path taken when the kernel substitutes the
//! manager binary for a foreign ELF matching a registered `binfmt_misc`
//! entry. Kept as a pure function of `(argv, Store)` so the dispatch logic
//! is testable without an actual `execve`.

use std::path::{Path, PathBuf};

use crate::arch::Arch;
use crate::error::{Result, SysrootError};
use crate::store::Store;

pub enum ShimOutcome {
    /// No arguments, or `-h`/`--help` alone. Print a hint and exit 0.
    Help,
    /// Replace the current process image with `program`, passing `args`.
    Exec { program: PathBuf, args: Vec<String> },
}

pub const HELP_TEXT: &str = "sysroot-manager: kernel-invoked architecture gateway shim\n\
usage: sysroot-manager <program> [args...]\n";

/// Decides what the shim should do, given the kernel-supplied argv and the
/// current sysroot store. `argv[0]` is the shim's own path; `argv[1]` is
/// the foreign program the kernel wanted to execute.
pub fn plan(argv: &[String], store: &Store) -> Result<ShimOutcome> {
    if argv.len() <= 1 || (argv.len() == 2 && is_help_flag(&argv[1])) {
        return Ok(ShimOutcome::Help);
    }

    let Some(default) = store.default()? else {
        return Err(SysrootError::NoDefault);
    };
    let arch = crate::arch::lookup(&default.arch)?;
    let forwarded = &argv[1..];
    let qemu = PathBuf::from(format!("/usr/bin/qemu-{}-static", arch.name));

    if store.is_chrooted() {
        return Ok(ShimOutcome::Exec {
            program: qemu,
            args: forwarded.to_vec(),
        });
    }

    let linker = find_linker(&default.path)?;
    let libpath = library_path(&default.path, &arch);

    let mut args = vec![
        default.path.join(&linker).to_string_lossy().into_owned(),
        "--library-path".to_string(),
        libpath,
    ];
    args.extend(forwarded.iter().cloned());

    Ok(ShimOutcome::Exec {
        program: qemu,
        args,
    })
}

fn is_help_flag(arg: &str) -> bool {
    arg == "-h" || arg == "--help"
}

fn library_path(sysroot_path: &Path, arch: &Arch) -> String {
    let p = sysroot_path.display();
    let mut libpath = format!("{p}/usr/lib:{p}/lib");
    if arch.cpu_bits == 64 {
        libpath.push_str(&format!(":{p}/usr/lib64:{p}/lib64"));
    }
    libpath
}

/// Scans `<sysroot>/lib64` then `<sysroot>/lib` for the first regular file
/// (symlinks resolved) whose name starts with `ld-linux`, returning its
/// path relative to the sysroot.
fn find_linker(sysroot_path: &Path) -> Result<PathBuf> {
    for dir in ["lib64", "lib"] {
        let full = sysroot_path.join(dir);
        let Ok(entries) = std::fs::read_dir(&full) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with("ld-linux") {
                continue;
            }
            let resolved = std::fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path());
            let rel = resolved
                .strip_prefix(sysroot_path)
                .map(Path::to_path_buf)
                .unwrap_or(resolved);
            return Ok(rel);
        }
    }
    Err(SysrootError::ActivationFailed(
        "no dynamic linker found under sysroot lib64/ or lib/".to_string(),
    ))
}
