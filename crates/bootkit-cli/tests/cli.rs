use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Test context with a private bootkit home
struct TestContext {
    temp_dir: TempDir,
    home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join(".bootkit");
        Self { temp_dir, home }
    }

    fn bootkit(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bootkit"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("BOOTKIT_HOME", &self.home);
        cmd.env_remove("BOOTKIT_CATALOG");
        // Nothing listens on port 1; any sync attempt fails fast.
        cmd.env("BOOTKIT_SERVER_URL", "http://127.0.0.1:1");
        cmd
    }

    fn out_dir(&self) -> PathBuf {
        self.temp_dir.path().join("out")
    }
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.bootkit().arg("--help").output().expect("failed to run bootkit");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("bootstrap"));
    assert!(stdout.contains("refresh"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx.bootkit().arg("--version").output().expect("failed to run bootkit");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_release_exits_one() {
    let ctx = TestContext::new();
    let output = ctx
        .bootkit()
        .args(["bootstrap", "STABLE@0.0.1"])
        .arg(ctx.out_dir())
        .output()
        .expect("failed to run bootkit");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Release unknown: STABLE@0.0.1"), "{stderr}");
    assert!(ctx.home.join("packages.data.db").exists());
    assert!(!ctx.out_dir().exists());
}

#[test]
fn test_malformed_release_exits_one() {
    let ctx = TestContext::new();
    let output = ctx
        .bootkit()
        .args(["bootstrap", "STABLE@"])
        .arg(ctx.out_dir())
        .output()
        .expect("failed to run bootkit");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("TRACK@VERSION"));
}

#[test]
fn test_non_os_target_arch_exits_one() {
    let ctx = TestContext::new();
    let output = ctx
        .bootkit()
        .args(["bootstrap", "STABLE@1.0"])
        .arg(ctx.out_dir())
        .args(["--target-arch", "linux"])
        .output()
        .expect("failed to run bootkit");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not an os architecture"));
    assert!(!ctx.out_dir().exists());
}

#[test]
fn test_unknown_flag_exits_one() {
    let ctx = TestContext::new();
    let output = ctx
        .bootkit()
        .args(["refresh", "--no-such-flag"])
        .output()
        .expect("failed to run bootkit");

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_refresh_unreachable_server_exits_two() {
    let ctx = TestContext::new();
    let output = ctx
        .bootkit()
        .arg("refresh")
        .output()
        .expect("failed to run bootkit");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Could not connect"), "{stderr}");
}

#[test]
fn test_catalog_flag_overrides_home() {
    let ctx = TestContext::new();
    let catalog = ctx.temp_dir.path().join("elsewhere/catalog.db");
    let output = ctx
        .bootkit()
        .arg("--catalog")
        .arg(&catalog)
        .args(["--quiet", "bootstrap", "1.0"])
        .arg(ctx.out_dir())
        .output()
        .expect("failed to run bootkit");

    assert_eq!(output.status.code(), Some(1));
    assert!(catalog.exists());
    assert!(!ctx.home.join("packages.data.db").exists());
}
