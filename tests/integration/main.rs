//! Integration tests for dockstash

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    const COMPOSE: &str = "\
services:
  web:
    image: nginx:latest
  worker:
    image: nginx:latest
    platform: linux/arm64
  builder:
    build: .
";

    /// Command isolated from the caller's config and CI environment
    fn dockstash(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("dockstash");
        cmd.current_dir(home.path())
            .env("DOCKSTASH_CONFIG", home.path().join("config.toml"))
            .env_remove("GITHUB_OUTPUT")
            .arg("--no-local");
        cmd
    }

    fn write_compose(dir: &TempDir) -> String {
        let path = dir.path().join("compose.yml");
        fs::write(&path, COMPOSE).unwrap();
        path.display().to_string()
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("dockstash")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("container image cache for CI"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("dockstash")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("dockstash"));
    }

    #[test]
    fn run_without_manifests_fails() {
        let home = TempDir::new().unwrap();
        dockstash(&home)
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No manifest files given"));
    }

    #[test]
    fn run_with_missing_manifest_fails() {
        let home = TempDir::new().unwrap();
        dockstash(&home)
            .args(["run", "-f", "missing-compose.yml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Manifest not found"));
    }

    #[test]
    fn run_with_invalid_manifest_fails() {
        let home = TempDir::new().unwrap();
        let path = home.path().join("compose.yml");
        fs::write(&path, "services: [unclosed").unwrap();

        dockstash(&home)
            .args(["run", "-f"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid manifest"));
    }

    #[test]
    fn run_all_excluded_short_circuits() {
        let home = TempDir::new().unwrap();
        let compose = write_compose(&home);
        let outputs = home.path().join("github_output");

        // No engine or inspector is needed when nothing is left to process
        dockstash(&home)
            .args(["run", "-f", &compose, "--exclude", "nginx:latest"])
            .env("GITHUB_OUTPUT", &outputs)
            .assert()
            .success()
            .stdout(predicate::str::contains("No images to process"));

        let written = fs::read_to_string(&outputs).unwrap();
        assert!(written.contains("cache-hit=false"));
        assert!(written.contains("image-list=[]"));
    }

    #[test]
    fn run_all_excluded_json() {
        let home = TempDir::new().unwrap();
        let compose = write_compose(&home);

        let output = dockstash(&home)
            .args(["run", "-f", &compose, "-e", "nginx:latest", "--format", "json"])
            .output()
            .unwrap();

        assert!(output.status.success());
        let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(report["cache_hit"], false);
        assert_eq!(report["total_count"], 0);
    }

    #[test]
    fn plan_all_excluded_is_empty() {
        let home = TempDir::new().unwrap();
        let compose = write_compose(&home);

        dockstash(&home)
            .args(["plan", "-f", &compose, "--exclude", "nginx:latest"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No images to process"));
    }

    #[test]
    fn config_path_honours_env() {
        let home = TempDir::new().unwrap();
        dockstash(&home)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_init_then_show() {
        let home = TempDir::new().unwrap();
        dockstash(&home).args(["config", "init"]).assert().success();
        assert!(home.path().join("config.toml").exists());

        dockstash(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]").and(predicate::str::contains("skopeo")));
    }

    #[test]
    fn invalid_config_fails() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join("config.toml"), "[cache\nprefix=").unwrap();

        dockstash(&home)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn local_config_is_merged() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join(".dockstash.toml"), "[cache]\nprefix = \"project\"\n").unwrap();

        cargo_bin_cmd!("dockstash")
            .current_dir(home.path())
            .env("DOCKSTASH_CONFIG", home.path().join("config.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("prefix = \"project\""));
    }

    #[test]
    fn cache_list_empty_store() {
        let home = TempDir::new().unwrap();
        let config = format!(
            "[cache]\ndir = \"{}\"\n",
            home.path().join("store").display()
        );
        fs::write(home.path().join("config.toml"), config).unwrap();

        dockstash(&home)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached images"));
    }
}
