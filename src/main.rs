//! Entry point. Dispatches between the kernel-invoked shim role and the
//! user-facing CLI role based on `argv[0]`'s basename. The manager ships
//! both names via hard link.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sysroot_manager::binfmt::BinFmtRegistrar;
use sysroot_manager::cli::SysrootArgs;
use sysroot_manager::error::{Result, SysrootError};
use sysroot_manager::hostconfig::HOST_SENTINEL;
use sysroot_manager::hostinfo;
use sysroot_manager::orchestrator::Orchestrator;
use sysroot_manager::service::ServiceUnit;
use sysroot_manager::shim::{self, ShimOutcome};
use sysroot_manager::store::Store;

const SHIM_BASENAME: &str = "sysroot-manager";

fn main() {
    let argv: Vec<String> = std::env::args().collect();
    let verbose = argv.iter().any(|a| a == "--verbose");
    init_tracing(verbose);

    let basename = Path::new(&argv[0])
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result = if basename == SHIM_BASENAME {
        run_shim(&argv)
    } else {
        run_cli(&argv)
    };

    if let Err(e) = result {
        eprintln!("sysroot-manager: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_orchestrator() -> Orchestrator {
    let store = Store::from_host_config(Path::new(HOST_SENTINEL));
    let binfmt = BinFmtRegistrar::default();
    let service = ServiceUnit::default();
    let info = hostinfo::probe();
    Orchestrator::new(
        store,
        binfmt,
        service,
        info.platform,
        info.kernel_arch,
        info.codename,
    )
}

fn run_shim(argv: &[String]) -> Result<()> {
    let store = Store::from_host_config(Path::new(HOST_SENTINEL));
    match shim::plan(argv, &store)? {
        ShimOutcome::Help => {
            print!("{}", shim::HELP_TEXT);
            Ok(())
        }
        ShimOutcome::Exec { program, args } => exec_replace(&program, &args),
    }
}

/// Replaces the current process image with `program`, inheriting stdio and
/// propagating the eventual exit status by construction (`execv` never
/// returns on success).
fn exec_replace(program: &Path, args: &[String]) -> Result<()> {
    let to_cstring = |s: &[u8]| {
        CString::new(s)
            .map_err(|_| SysrootError::ActivationFailed("argument contains a NUL byte".to_string()))
    };

    let program_c = to_cstring(program.as_os_str().as_bytes())?;
    let mut argv_c = vec![program_c.clone()];
    for arg in args {
        argv_c.push(to_cstring(arg.as_bytes())?);
    }

    let err = nix::unistd::execv(&program_c, &argv_c).unwrap_err();
    Err(SysrootError::ExternalToolFailed(
        program.display().to_string(),
        err as i32,
    ))
}

fn run_cli(argv: &[String]) -> Result<()> {
    let rest = &argv[1..];

    if rest.first().map(String::as_str) == Some("sysroot") {
        let parsed = SysrootArgs::try_parse_from(
            std::iter::once("sysroot".to_string()).chain(rest[1..].iter().cloned()),
        );
        let parsed = match parsed {
            Ok(p) => p,
            Err(e) => {
                let _ = e.print();
                std::process::exit(1);
            }
        };
        return run_sysroot_action(&parsed);
    }

    let orchestrator = build_orchestrator();
    let result = orchestrator.pkgman_call(rest)?;
    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    if !result.success() {
        std::process::exit(result.code());
    }
    Ok(())
}

fn run_sysroot_action(args: &SysrootArgs) -> Result<()> {
    let orchestrator = build_orchestrator();

    if args.list {
        let roots = orchestrator.list()?;
        print!("{}", Orchestrator::format_list(&roots));
        return Ok(());
    }
    if args.create {
        let (name, arch) = args.name_and_arch()?;
        orchestrator.create(name, arch)?;
        return Ok(());
    }
    if args.delete {
        let (name, arch) = args.name_and_arch()?;
        orchestrator.delete(name, arch)?;
        return Ok(());
    }
    if args.set {
        let (name, arch) = args.name_and_arch()?;
        orchestrator.set_default(name, arch)?;
        return Ok(());
    }
    if args.path {
        if let Some(path) = orchestrator.path()? {
            println!("{}", path.display());
        }
        return Ok(());
    }
    if args.init {
        orchestrator.init()?;
        return Ok(());
    }
    unreachable!("clap's mode ArgGroup guarantees exactly one flag is set")
}
