//! CLI end-to-end tests.
//!
//! Each test runs the `rrdp` binary against its own temp data directory with
//! the config search isolated from the host.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    fn data_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("rrd")
    }

    fn rrdp(&self) -> Command {
        let mut cmd = Command::cargo_bin("rrdp").expect("rrdp binary should exist");
        cmd.env_remove("RRDP_CONFIG")
            .env_remove("RRDP_DATA_DIR")
            .env_remove("RRDP_LOG")
            .env_remove("RUST_LOG")
            .env("XDG_CONFIG_HOME", self.dir.path().join("xdg"))
            .arg("--data-dir")
            .arg(self.data_dir());
        cmd
    }

    fn store(&self, name: &str, value: &str, at: u64) -> Value {
        let output = self
            .rrdp()
            .args(["store", name, value, "--at", &at.to_string()])
            .output()
            .expect("run rrdp store");
        assert!(output.status.success(), "store failed: {:?}", output);
        serde_json::from_slice(&output.stdout).expect("store output is JSON")
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.rrdp().args(args).output().expect("run rrdp");
        serde_json::from_slice(&output.stdout).expect("output is JSON")
    }
}

// ============================================================================
// Store and query
// ============================================================================

mod store_and_query {
    use super::*;

    #[test]
    fn first_write_creates_store() {
        let env = Env::new();
        let out = env.store("temp", "20.5", 100);
        assert_eq!(out["entity"], "temp");
        assert_eq!(out["recorded_at"], 100);
        assert_eq!(out["created"], true);
        assert!(out["interpolated_at"].is_null());
        assert!(env.data_dir().join("temp.rrd").is_file());
    }

    #[test]
    fn late_write_moves_forward() {
        let env = Env::new();
        env.store("temp", "20", 100);
        let out = env.store("temp", "22", 50);
        assert_eq!(out["recorded_at"], 101);
        assert_eq!(out["created"], false);
    }

    #[test]
    fn negative_values_are_accepted() {
        let env = Env::new();
        let out = env.store("temp", "-3.5", 100);
        assert_eq!(out["value"], -3.5);
    }

    #[test]
    fn latest_query_returns_one_record() {
        let env = Env::new();
        env.store("temp", "20", 100);
        env.store("temp", "22", 101);

        let records = env.json(&["query", "temp"]);
        let records = records.as_array().expect("array");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["entity_name"], "temp");
        assert_eq!(records[0]["value"], 22.0);
        assert_eq!(records[0]["timestamp"], 101);
    }

    #[test]
    fn ranged_query_pages() {
        let env = Env::new();
        for (i, v) in ["10", "20", "30", "40", "50"].iter().enumerate() {
            env.store("temp", v, 101 + i as u64);
        }

        let asc = env.json(&[
            "query", "temp", "--begin", "101", "--end", "105", "--size", "2", "--order", "asc",
        ]);
        let times: Vec<u64> = asc
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["timestamp"].as_u64().unwrap())
            .collect();
        assert_eq!(times, vec![101, 102]);

        let desc = env.json(&[
            "query", "temp", "--begin", "101", "--end", "105", "--size", "2", "--page", "1",
        ]);
        let times: Vec<u64> = desc
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["timestamp"].as_u64().unwrap())
            .collect();
        assert_eq!(times, vec![103, 102]);
    }

    #[test]
    fn text_query_prints_rfc3339() {
        let env = Env::new();
        env.store("temp", "20", 100);
        env.rrdp()
            .args(["-f", "text", "query", "temp"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1970-01-01T00:01:40+00:00\t20"));
    }
}

// ============================================================================
// Inventory, transfer, delete
// ============================================================================

mod inventory_and_transfer {
    use super::*;

    #[test]
    fn info_lists_stores() {
        let env = Env::new();
        env.store("zeta", "1", 5_000);
        env.store("alpha", "1", 6_000);

        let info = env.json(&["info"]);
        let info = info.as_array().unwrap();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0]["name"], "alpha");
        assert_eq!(info[0]["count"], 600);
        assert_eq!(info[0]["latest"], 6_000);
        assert_eq!(info[1]["name"], "zeta");
    }

    #[test]
    fn export_delete_import_one() {
        let env = Env::new();
        env.store("temp", "20", 100);
        env.store("temp", "21", 101);
        let before = env.json(&["query", "temp", "--begin", "90", "--end", "110", "--size", "30"]);

        let blob = env.dir.path().join("temp.bin");
        env.rrdp()
            .args(["export", "temp", "-o"])
            .arg(&blob)
            .assert()
            .success();
        env.rrdp()
            .args(["delete", "temp"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"deleted\": 1"));
        env.rrdp().args(["query", "temp"]).assert().code(1);

        env.rrdp()
            .args(["import", "temp"])
            .arg(&blob)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"temp\""));
        let after = env.json(&["query", "temp", "--begin", "90", "--end", "110", "--size", "30"]);
        assert_eq!(before, after);
    }

    #[test]
    fn base64_bundle_through_stdin() {
        let env = Env::new();
        env.store("temp", "20", 100);
        env.store("humidity", "55", 100);

        let exported = env
            .rrdp()
            .args(["export", "--base64"])
            .output()
            .expect("run export");
        assert!(exported.status.success());

        env.rrdp()
            .args(["delete", "--all"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"deleted\": 2"));
        env.rrdp().arg("info").assert().code(1);

        let imported = {
            let output = env
                .rrdp()
                .args(["import", "--base64", "-"])
                .write_stdin(exported.stdout)
                .output()
                .expect("run import");
            assert!(output.status.success());
            serde_json::from_slice::<Value>(&output.stdout).unwrap()
        };
        assert_eq!(imported["imported"], serde_json::json!(["humidity", "temp"]));
        assert_eq!(env.json(&["info"]).as_array().unwrap().len(), 2);
    }
}

// ============================================================================
// Exit codes
// ============================================================================

mod exit_codes {
    use super::*;

    #[test]
    fn unknown_entity_is_no_data() {
        let env = Env::new();
        env.rrdp()
            .args(["query", "ghost"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn paged_query_without_begin_is_unsupported() {
        let env = Env::new();
        env.store("temp", "20", 100);
        env.rrdp()
            .args(["query", "temp", "--order", "asc"])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("ERR_UNSUPPORTED_QUERY"));
    }

    #[test]
    fn deleting_missing_store_is_not_found() {
        let env = Env::new();
        env.rrdp()
            .args(["delete", "ghost"])
            .assert()
            .code(13)
            .stderr(predicate::str::contains("\"status\": \"error\""));
    }

    #[test]
    fn bad_entity_name_is_args_error() {
        let env = Env::new();
        env.rrdp()
            .args(["store", "../escape", "1", "--at", "100"])
            .assert()
            .code(10);
    }

    #[test]
    fn corrupt_import_is_rejected() {
        let env = Env::new();
        let junk = env.dir.path().join("junk.bin");
        std::fs::write(&junk, b"not a store").unwrap();
        env.rrdp()
            .args(["import", "temp"])
            .arg(&junk)
            .assert()
            .code(22);
        assert!(!env.data_dir().join("temp.rrd").exists());
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let env = Env::new();
        env.rrdp()
            .args(["--config"])
            .arg(env.dir.path().join("nope.json"))
            .arg("info")
            .assert()
            .code(12)
            .stderr(predicate::str::contains("ERR_CONFIG"));
    }

    #[test]
    fn missing_subcommand_fails() {
        let env = Env::new();
        env.rrdp().assert().failure();
    }
}

// ============================================================================
// Config
// ============================================================================

mod config {
    use super::*;

    #[test]
    fn config_reports_data_dir_override() {
        let env = Env::new();
        let config = env.json(&["config"]);
        assert_eq!(
            config["config"]["data_dir"],
            env.data_dir().display().to_string()
        );
        assert!(config["config_path"].is_null());
    }

    #[test]
    fn xdg_config_file_is_read() {
        let env = Env::new();
        let xdg = env.dir.path().join("xdg").join("rrdp");
        std::fs::create_dir_all(&xdg).unwrap();
        std::fs::write(
            xdg.join("config.json"),
            r#"{"consolidation": "MAX", "cleanup": {"delay_secs": 0}}"#,
        )
        .unwrap();

        let config = env.json(&["config"]);
        assert_eq!(config["config"]["consolidation"], "MAX");
        assert_eq!(config["config"]["cleanup"]["delay_secs"], 60);
        assert_eq!(config["warnings"].as_array().unwrap().len(), 1);
    }
}
