//! End-to-end tests driving the orchestrator against fake store,
//! binfmt_misc, and systemd roots. No real kernel or systemd interaction
//! is needed for the read-only paths; the mutating paths are gated behind
//! `#[ignore]` since they require both effective UID 0 and, for the ones
//! that call `activate()`, a kernel that will actually honor `MS_BIND`
//! against a scratch directory. Run those with `sudo cargo test --
//! --ignored` on a real Linux host.

use sysroot_manager::binfmt::BinFmtRegistrar;
use sysroot_manager::error::SysrootError;
use sysroot_manager::orchestrator::Orchestrator;
use sysroot_manager::service::ServiceUnit;
use sysroot_manager::store::Store;
use tempfile::{tempdir, TempDir};

struct Fixture {
    store_dir: TempDir,
    binfmt_dir: TempDir,
    systemd_dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let binfmt_dir = tempdir().unwrap();
        std::fs::write(binfmt_dir.path().join("register"), "").unwrap();
        Self {
            store_dir: tempdir().unwrap(),
            binfmt_dir,
            systemd_dir: tempdir().unwrap(),
        }
    }

    fn orchestrator(&self, platform: &str) -> Orchestrator {
        Orchestrator::new(
            Store::new(self.store_dir.path()),
            BinFmtRegistrar::new(self.binfmt_dir.path()),
            ServiceUnit::new(self.systemd_dir.path()),
            platform,
            "x86_64",
            "jammy",
        )
    }

    fn setup_store(&self) -> Store {
        Store::new(self.store_dir.path())
    }
}

#[test]
fn list_and_path_reflect_store_contents() {
    let fx = Fixture::new();
    let setup = fx.setup_store();
    setup.create("a", "arm").unwrap();
    setup.create("b", "x86_64").unwrap();
    setup.set_default("a", "arm").unwrap();

    let orch = fx.orchestrator("ubuntu");

    let roots = orch.list().unwrap();
    assert_eq!(roots.len(), 2);
    let rendered = Orchestrator::format_list(&roots);
    assert_eq!(
        rendered,
        "Found 2 system roots:\n*  1. a (arm)\n   2. b (x86_64)\n"
    );

    let path = orch.path().unwrap().unwrap();
    assert!(path.ends_with("a.arm"));
}

#[test]
fn path_is_none_on_empty_store() {
    let fx = Fixture::new();
    let orch = fx.orchestrator("ubuntu");
    assert!(orch.path().unwrap().is_none());
    assert_eq!(orch.list().unwrap().len(), 0);
}

#[test]
fn list_propagates_malformed_store_to_orchestrator_caller() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.store_dir.path().join("not-a-valid-entry")).unwrap();

    let orch = fx.orchestrator("ubuntu");
    let err = orch.list().unwrap_err();
    assert!(matches!(err, SysrootError::MalformedStore(_, _)));
}

#[test]
#[ignore = "requires effective UID 0: Orchestrator::delete enforces require_root()"]
fn delete_last_sysroot_tears_down_binfmt_and_service() {
    let fx = Fixture::new();
    let setup = fx.setup_store();
    setup.create("deb", "arm").unwrap();
    setup.set_default("deb", "arm").unwrap();

    let binfmt = BinFmtRegistrar::new(fx.binfmt_dir.path());
    binfmt.register("arm").unwrap();
    // Simulate the kernel materializing the entry node that a real
    // `register` write would create under `/proc/sys/fs/binfmt_misc`.
    std::fs::write(fx.binfmt_dir.path().join("sysroot_arm"), "1").unwrap();

    let service = ServiceUnit::new(fx.systemd_dir.path());
    service.create("arm", "apt").unwrap();
    service.enable().unwrap();

    let orch = Orchestrator::new(
        Store::new(fx.store_dir.path()),
        binfmt,
        service,
        "ubuntu",
        "x86_64",
        "jammy",
    );

    orch.delete("deb", "arm").unwrap();

    assert!(!fx.store_dir.path().join("deb.arm").exists());
    assert!(!fx.binfmt_dir.path().join("sysroot_arm").exists());
    assert!(!fx
        .systemd_dir
        .path()
        .join("sysroot-manager.service")
        .exists());
}

#[test]
#[ignore = "requires effective UID 0 and real MS_BIND support: exercises activate()"]
fn set_default_sequences_unmount_register_service_activate() {
    let fx = Fixture::new();
    let setup = fx.setup_store();
    setup.create("a", "arm").unwrap();
    setup.create("b", "x86_64").unwrap();
    setup.set_default("a", "arm").unwrap();

    let orch = fx.orchestrator("ubuntu");
    let new_default = orch.set_default("b", "x86_64").unwrap();

    assert_eq!(new_default.name, "b");
    assert!(fx.binfmt_dir.path().join("sysroot_x86_64").exists());
    assert!(!fx.binfmt_dir.path().join("sysroot_arm").exists());
    let unit = std::fs::read_to_string(fx.systemd_dir.path().join("sysroot-manager.service"))
        .unwrap();
    assert!(unit.contains("Description=x86_64 arch activation via apt"));
}

#[test]
#[ignore = "requires effective UID 0 and real MS_BIND support: exercises activate()"]
fn init_is_a_noop_with_no_default_and_reactivates_when_one_exists() {
    let fx = Fixture::new();
    let orch = fx.orchestrator("ubuntu");
    orch.init().unwrap();

    let setup = fx.setup_store();
    setup.create("deb", "arm").unwrap();
    setup.set_default("deb", "arm").unwrap();

    let orch = fx.orchestrator("ubuntu");
    orch.init().unwrap();
    assert!(fx.binfmt_dir.path().join("sysroot_arm").exists());
    assert!(fx
        .systemd_dir
        .path()
        .join("sysroot-manager.service")
        .exists());
}

#[test]
fn pkgman_call_fails_without_a_default_sysroot() {
    let fx = Fixture::new();
    let orch = fx.orchestrator("ubuntu");
    let err = orch
        .pkgman_call(&["update".to_string()])
        .unwrap_err();
    assert!(matches!(err, SysrootError::NoDefault));
}
