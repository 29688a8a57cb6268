//! Integration tests for shellcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn shellcache() -> Command {
        let mut cmd = cargo_bin_cmd!("shellcache");
        cmd.arg("--no-local").env_remove("SHELLCACHE_CONFIG");
        cmd
    }

    /// Config file pointing the disk cache into the temp dir
    fn write_config(dir: &Path, extra: &str) -> PathBuf {
        let path = dir.join("config.toml");
        let cache_dir = dir.join("caches");
        std::fs::write(
            &path,
            format!(
                "[cache]\ndir = {:?}\nstatic_name = \"it-static-v1\"\nruntime_name = \"it-runtime-v1\"\n{}",
                cache_dir.display().to_string(),
                extra
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn help_displays() {
        shellcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("offline app-shell cache"));
    }

    #[test]
    fn version_displays() {
        shellcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shellcache"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("it-static-v1"));
    }

    #[test]
    fn config_set_persists() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["config", "set", "proxy.port", "9911"])
            .assert()
            .success();

        let written = std::fs::read_to_string(&config).unwrap();
        assert!(written.contains("9911"));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn invalid_config_reports_hint() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        std::fs::write(&config, "[cache\n").unwrap();
        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["cache", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache generations found"));
    }

    #[test]
    fn cache_list_json_empty() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn cache_clear_nothing_to_do() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        shellcache()
            .arg("--config")
            .arg(&config)
            .args(["cache", "clear", "--stale", "-y"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No stale cache generations"));
    }

    #[test]
    fn install_unreachable_origin_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "[site]\norigin = \"http://127.0.0.1:1\"\n");
        shellcache()
            .arg("--config")
            .arg(&config)
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Install failed"));

        // nothing half-written
        assert!(!temp.path().join("caches").join("it-static-v1").exists());
    }

    #[test]
    fn activate_without_install_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "");
        shellcache()
            .arg("--config")
            .arg(&config)
            .arg("activate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Run: shellcache install"));
    }

    #[test]
    fn unknown_subcommand_fails() {
        shellcache().arg("precache-everything").assert().failure();
    }
}
