#![allow(deprecated)]
//! CLI contract: exit codes, JSON shapes and the lease flow end to end.
//! Asserts on stable fields rather than full output.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("leases.db")
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("leasekeep.yaml")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("leasekeep").unwrap();
        cmd.env_remove("LEASEKEEP_CONFIG")
            .env_remove("LEASEKEEP_DB")
            .env("RUST_LOG", "warn")
            .arg("--config")
            .arg(self.config())
            .arg("--db")
            .arg(self.db());
        cmd
    }

    /// Run with `--format json`; returns (exit code, parsed stdout).
    fn json(&self, args: &[&str]) -> (i32, Value) {
        let output = self
            .cmd()
            .args(args)
            .args(["--format", "json"])
            .output()
            .unwrap();
        let code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let value = serde_json::from_str(&stdout).unwrap_or_else(|e| {
            panic!(
                "stdout is not JSON ({e}) for {args:?}\n--- stdout ---\n{stdout}\n--- stderr ---\n{}",
                String::from_utf8_lossy(&output.stderr)
            )
        });
        (code, value)
    }
}

fn add_resource(ws: &Workspace, category: &str, name: &str) -> i64 {
    let (code, r) = ws.json(&["resource", "add", category, name]);
    assert_eq!(code, 0);
    r["id"].as_i64().unwrap()
}

#[test]
fn init_creates_database_and_sample_config() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["init", "--write-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized lease store"));

    assert!(ws.db().exists());
    let written = std::fs::read_to_string(ws.config()).unwrap();
    assert!(written.contains("interval_secs: 60"));

    // Refuses to clobber without --force.
    ws.cmd()
        .args(["init", "--write-config"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));
    ws.cmd()
        .args(["init", "--write-config", "--force"])
        .assert()
        .success();
}

#[test]
fn invalid_config_exits_with_internal_error() {
    let ws = Workspace::new();
    std::fs::write(ws.config(), "version: 7\n").unwrap();
    ws.cmd()
        .args(["resource", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unsupported config version"));
}

#[test]
fn second_allocation_is_denied_until_release() {
    let ws = Workspace::new();
    let id = add_resource(&ws, "Dota 2", "acc_one");
    let id_arg = id.to_string();

    let (code, granted) = ws.json(&["lease", "allocate", &id_arg, "u1", "--hours", "2"]);
    assert_eq!(code, 0);
    assert_eq!(granted["outcome"], "granted");
    assert_eq!(granted["lease"]["status"], "active");
    let lease_id = granted["lease"]["id"].as_i64().unwrap().to_string();

    let (code, denied) = ws.json(&["lease", "allocate", &id_arg, "u2"]);
    assert_eq!(code, 1);
    assert_eq!(denied["outcome"], "denied");
    assert_eq!(denied["reason"], "already_leased");

    let (_, count) = ws.json(&["resource", "count", "--category", "Dota 2"]);
    assert_eq!(count["count"], 0);

    let (code, released) = ws.json(&["lease", "release", &lease_id]);
    assert_eq!(code, 0);
    assert_eq!(released["released"], true);
    assert_eq!(released["lease"]["status"], "expired");

    let (_, again) = ws.json(&["lease", "release", &lease_id]);
    assert_eq!(again["released"], false);

    let (code, _) = ws.json(&["lease", "allocate", &id_arg, "u2", "--hours", "1"]);
    assert_eq!(code, 0);

    let (_, trail) = ws.json(&["audit", "lease", &lease_id]);
    let kinds: Vec<_> = trail
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["lease_start", "lease_end"]);
}

#[test]
fn active_and_remaining_report_the_lease() {
    let ws = Workspace::new();
    let id = add_resource(&ws, "cs2", "acc").to_string();

    ws.cmd()
        .args(["lease", "active", "u1"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("no active lease"));

    ws.cmd()
        .args(["lease", "allocate", &id, "u1", "--hours", "3"])
        .assert()
        .success();

    let (code, active) = ws.json(&["lease", "active", "u1"]);
    assert_eq!(code, 0);
    assert_eq!(active["lease"]["requester_id"], "u1");
    assert_eq!(active["lapsed"], false);

    ws.cmd()
        .args(["lease", "remaining", "u1"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^2h 5\dm\n$").unwrap());
}

#[test]
fn credits_flow_through_allocation() {
    let ws = Workspace::new();
    let id = add_resource(&ws, "dota", "acc").to_string();

    ws.cmd()
        .args(["credit", "grant", "u1", "10", "--reason", "review"])
        .assert()
        .success();
    ws.cmd()
        .args(["credit", "grant", "u1", "5"])
        .assert()
        .success();

    let (code, short) = ws.json(&["credit", "consume", "u1", "20"]);
    assert_eq!(code, 1);
    assert_eq!(short["outcome"], "insufficient_credit");
    assert_eq!(short["shortfall"], 5);

    let (code, granted) = ws.json(&[
        "lease",
        "allocate",
        &id,
        "u1",
        "--hours",
        "1",
        "--bonus-minutes",
        "12",
        "--use-credit",
    ]);
    assert_eq!(code, 0);
    assert_eq!(granted["lease"]["bonus_minutes"], 12);

    let (_, balance) = ws.json(&["credit", "balance", "u1"]);
    assert_eq!(balance["available_minutes"], 3);

    let (_, notes) = ws.json(&["notify", "list", "u1", "--unread"]);
    assert_eq!(notes.as_array().unwrap().len(), 2);
    let note_id = notes[0]["id"].as_i64().unwrap().to_string();
    ws.cmd().args(["notify", "read", &note_id]).assert().success();
    let (_, notes) = ws.json(&["notify", "list", "u1", "--unread"]);
    assert_eq!(notes.as_array().unwrap().len(), 1);
}

#[test]
fn missing_entities_exit_with_denied() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["resource", "get", "42"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
    ws.cmd()
        .args(["lease", "release", "7"])
        .assert()
        .code(1);
    ws.cmd().args(["notify", "read", "3"]).assert().code(1);
}

#[test]
fn invalid_arguments_exit_with_denied() {
    let ws = Workspace::new();
    let id = add_resource(&ws, "dota", "acc").to_string();
    ws.cmd()
        .args(["lease", "allocate", &id, "u1", "--hours", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid argument"));
    ws.cmd()
        .args(["credit", "grant", "u1", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("at least one minute"));

    // Nothing was written by the refused requests.
    let (_, count) = ws.json(&["resource", "count"]);
    assert_eq!(count["count"], 1);
    let (_, balance) = ws.json(&["credit", "balance", "u1"]);
    assert_eq!(balance["available_minutes"], 0);
}

#[test]
fn listings_and_stats() {
    let ws = Workspace::new();
    let a = add_resource(&ws, "Dota 2", "a").to_string();
    add_resource(&ws, "Dota 2", "b");
    add_resource(&ws, "Counter-Strike 2", "c");
    ws.cmd()
        .args(["lease", "allocate", &a, "u1", "--hours", "1"])
        .assert()
        .success();

    let (_, categories) = ws.json(&["resource", "categories"]);
    assert_eq!(categories, serde_json::json!(["Counter-Strike 2", "Dota 2"]));

    let (_, found) = ws.json(&["resource", "search", "dota"]);
    assert_eq!(found.as_array().unwrap().len(), 1);

    let (_, sys) = ws.json(&["stats"]);
    assert_eq!(sys["total_resources"], 3);
    assert_eq!(sys["active_leases"], 1);
    assert_eq!(sys["top_categories"][0]["category"], "Dota 2");

    assert_eq!(sys["requesters_today"], 1);
    assert_eq!(sys["ended_today"], 0);

    let (_, mine) = ws.json(&["stats", "--requester", "u1"]);
    assert_eq!(mine["total_leases"], 1);

    // Nothing has lapsed on the system clock yet.
    let (code, report) = ws.json(&["sweep", "once"]);
    assert_eq!(code, 0);
    assert_eq!(report["reclaimed"], 0);

    let (_, feed) = ws.json(&["notify", "lapsed"]);
    assert!(feed.as_array().unwrap().is_empty());

    let (_, recent) = ws.json(&["audit", "recent", "--limit", "2"]);
    assert_eq!(recent.as_array().unwrap().len(), 2);
}

#[test]
fn stats_count_todays_activity_and_list_requesters() {
    let ws = Workspace::new();
    let a = add_resource(&ws, "dota", "a").to_string();
    let b = add_resource(&ws, "dota", "b").to_string();

    let (_, first) = ws.json(&["lease", "allocate", &a, "u1", "--hours", "1"]);
    let lease_id = first["lease"]["id"].as_i64().unwrap().to_string();
    ws.cmd().args(["lease", "release", &lease_id]).assert().success();
    ws.cmd()
        .args(["lease", "allocate", &a, "u1", "--hours", "1"])
        .assert()
        .success();
    ws.cmd()
        .args(["lease", "allocate", &b, "u2", "--hours", "1"])
        .assert()
        .success();

    let (_, sys) = ws.json(&["stats"]);
    assert_eq!(sys["ended_today"], 1);
    assert_eq!(sys["requesters_today"], 2);

    let (code, listed) = ws.json(&["stats", "--requesters"]);
    assert_eq!(code, 0);
    let rows = listed.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["requester_id"], "u1");
    assert_eq!(rows[0]["lease_count"], 2);
    assert_eq!(rows[1]["requester_id"], "u2");
    assert!(rows[1]["last_lease_start"].is_string());

    ws.cmd()
        .args(["stats", "--requesters"])
        .assert()
        .success()
        .stdout(predicate::str::contains("u1\t2 leases"));
    ws.cmd()
        .args(["stats", "--requesters", "--requester", "u1"])
        .assert()
        .code(2);
}

#[test]
fn text_output_lists_resources() {
    let ws = Workspace::new();
    add_resource(&ws, "dota", "acc_one");
    ws.cmd()
        .args(["resource", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dota] acc_one (available)"));
}
