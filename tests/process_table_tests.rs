//! Integration tests for the process table.
//!
//! These tests build a fake proc root in a temporary directory and exercise
//! the public API: rebuild, sort, filter, pins and kill.

use std::fs;
use std::path::Path;

use procpulse::error::KillError;
use procpulse::process::{ProcessTable, SortKey, SortSpec};
use procpulse::source::ProcFs;

fn write_proc(root: &Path, pid: u32, name: &str, ppid: u32, rss_kb: u64) {
    let dir = root.join(pid.to_string());
    fs::create_dir_all(&dir).expect("Failed to create pid dir");
    fs::write(
        dir.join("status"),
        format!(
            "Name:\t{}\nState:\tS (sleeping)\nPPid:\t{}\nVmRSS:\t{} kB\nThreads:\t1\n",
            name, ppid, rss_kb
        ),
    )
    .expect("Failed to write status");
    fs::write(
        dir.join("stat"),
        format!(
            "{} ({}) S {} 0 0 0 -1 0 0 0 0 0 100 50 0 0 20 0 1 0 500",
            pid, name, ppid
        ),
    )
    .expect("Failed to write stat");
    fs::write(dir.join("cmdline"), format!("{}\0", name)).expect("Failed to write cmdline");
}

fn fake_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path();
    fs::write(root.join("uptime"), "1000.00 500.00\n").expect("Failed to write uptime");
    write_proc(root, 1, "init", 0, 1000);
    write_proc(root, 20, "sshd", 1, 5000);
    write_proc(root, 30, "bash", 20, 3000);
    write_proc(root, 40, "vim", 30, 5000);
    // non-process entries are ignored
    fs::create_dir_all(root.join("sys")).expect("Failed to create sys");
    fs::write(root.join("meminfo"), "MemTotal: 1 kB\n").expect("Failed to write meminfo");
    dir
}

#[test]
fn test_rebuild_lists_every_process() {
    let dir = fake_root();
    let table = ProcessTable::new(ProcFs::new(dir.path()), None);
    let snapshot = table.rebuild().expect("rebuild failed");

    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot.skipped, 0);
    assert_eq!(table.query(SortSpec::default(), "").len(), 4);

    let vim = snapshot.by_pid(40).expect("vim missing");
    assert_eq!(vim.name, "vim");
    assert_eq!(vim.memory_kb, 5000);
    assert_eq!(vim.command, "vim");
    let vim_idx = snapshot.index_of(40).expect("vim missing");
    assert_eq!(snapshot.depth(vim_idx), 3);
}

#[test]
fn test_process_vanishing_mid_scan_is_skipped() {
    let dir = fake_root();
    fs::remove_file(dir.path().join("30/status")).expect("Failed to remove status");

    let table = ProcessTable::new(ProcFs::new(dir.path()), Some(2));
    let snapshot = table.rebuild().expect("rebuild must not fail for one vanished process");

    assert!(snapshot.by_pid(30).is_none());
    assert_eq!(snapshot.skipped, 1);
    // the orphaned child becomes a root
    let vim_idx = snapshot.index_of(40).expect("vim missing");
    assert!(snapshot.roots().contains(&vim_idx));
}

#[test]
fn test_missing_root_keeps_previous_snapshot() {
    let dir = fake_root();
    let root = dir.path().to_path_buf();
    let table = ProcessTable::new(ProcFs::new(&root), None);
    table.rebuild().expect("rebuild failed");

    drop(dir);
    assert!(table.rebuild().is_err());
    assert_eq!(table.snapshot().len(), 4);
    assert_eq!(table.stats().snapshot().failures, 1);
}

#[test]
fn test_memory_sort_with_pins() {
    let dir = fake_root();
    let table = ProcessTable::new(ProcFs::new(dir.path()), None);
    table.rebuild().expect("rebuild failed");

    table.pin(1);
    let pids: Vec<u32> = table
        .query(SortSpec::descending(SortKey::Memory), "")
        .iter()
        .map(|p| p.pid)
        .collect();
    // pinned first, then memory descending, ties in arena order
    assert_eq!(pids, vec![1, 20, 40, 30]);

    assert!(!table.toggle_pin(1));
    let first = table.query(SortSpec::descending(SortKey::Memory), "")[0].pid;
    assert_eq!(first, 20);
}

#[test]
fn test_pins_dropped_when_process_exits() {
    let dir = fake_root();
    let table = ProcessTable::new(ProcFs::new(dir.path()), None);
    table.rebuild().expect("rebuild failed");
    table.pin(40);
    table.pin(20);

    fs::remove_dir_all(dir.path().join("40")).expect("Failed to remove pid dir");
    table.rebuild().expect("rebuild failed");

    assert_eq!(table.pinned(), vec![20]);
}

#[test]
fn test_filter_matches_name_pid_and_command() {
    let dir = fake_root();
    let table = ProcessTable::new(ProcFs::new(dir.path()), None);
    table.rebuild().expect("rebuild failed");

    let by_name: Vec<u32> = table
        .query(SortSpec::default(), "sh")
        .iter()
        .map(|p| p.pid)
        .collect();
    assert_eq!(by_name, vec![20, 30]);

    let by_pid: Vec<u32> = table
        .query(SortSpec::default(), "4")
        .iter()
        .map(|p| p.pid)
        .collect();
    assert_eq!(by_pid, vec![40]);
}

#[test]
fn test_kill_rejects_invalid_targets() {
    let dir = fake_root();
    let table = ProcessTable::new(ProcFs::new(dir.path()), None);

    for target in ["abc", "", "-5", "0", "12abc"] {
        assert!(
            matches!(table.kill(target), Err(KillError::InvalidTarget(_))),
            "{:?} should be rejected",
            target
        );
    }
}

#[tokio::test]
async fn test_rebuild_async() {
    let dir = fake_root();
    let table = ProcessTable::new(ProcFs::new(dir.path()), None);
    let snapshot = table.rebuild_async().await.expect("rebuild failed");
    assert_eq!(snapshot.len(), 4);
    assert_eq!(table.snapshot().len(), 4);
}
