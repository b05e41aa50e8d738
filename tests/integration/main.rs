//! Integration tests for Replica

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Binary isolated from any user configuration
    fn replica(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("replica");
        cmd.current_dir(dir)
            .env_remove("RUST_LOG")
            .env("REPLICA_CONFIG", dir.join("config.toml"));
        cmd
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        replica(dir.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("concurrent file copy engine"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        replica(dir.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("replica"));
    }

    #[test]
    fn copy_into_two_targets() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("foo")).unwrap();
        fs::write(dir.path().join("foo/a"), b"foo").unwrap();
        fs::write(dir.path().join("foo/b"), vec![9u8; 4096]).unwrap();

        // Defaults to foo -> bar1, bar2 in the working directory
        replica(dir.path())
            .args(["copy", "--no-progress", "-m", "1024", "-d", "2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Copied 2 files into 2 targets"));

        for target in ["bar1", "bar2"] {
            assert_eq!(fs::read(dir.path().join(target).join("a")).unwrap(), b"foo");
            assert_eq!(
                fs::read(dir.path().join(target).join("b")).unwrap(),
                vec![9u8; 4096]
            );
        }
    }

    #[test]
    fn copy_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        replica(dir.path())
            .args(["copy", "--no-progress", "missing", "out"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("File not found"));
    }

    #[test]
    fn copy_rejects_zero_disk_ops() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("foo")).unwrap();
        replica(dir.path())
            .args(["copy", "-d", "0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid limit disk_ops"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        replica(dir.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        replica(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[limits]"));
    }

    #[test]
    fn config_init_then_copy_uses_file() {
        let dir = TempDir::new().unwrap();
        replica(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(dir.path().join("config.toml").exists());

        fs::write(
            dir.path().join("config.toml"),
            "[limits]\ndisk_ops = 0\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join("foo")).unwrap();
        replica(dir.path())
            .args(["copy"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid limit"));
    }
}
