//! Pipeline behaviour over real git repositories.

#![allow(clippy::expect_used, clippy::unwrap_used, missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::process::Command;

use dstask_app::{GitTaskLog, NewTask, TaskStore, TaskWriter};
use dstask_core::{Filter, Status, TaskUid};
use git2::Repository;
use tempfile::TempDir;

fn configure_identity(path: &Path) {
    let repo = Repository::open(path).expect("open repository");
    let mut config = repo.config().expect("repository config");
    config.set_str("user.name", "tester").expect("set name");
    config
        .set_str("user.email", "tester@example.invalid")
        .expect("set email");
    config.set_bool("commit.gpgsign", false).expect("disable signing");
}

fn open_writer(path: &Path) -> TaskWriter<GitTaskLog> {
    let log = GitTaskLog::open(path).expect("open task repository");
    configure_identity(path);
    TaskWriter::new(TaskStore::new(log))
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .status()
        .expect("run git");
    assert!(status.success(), "git {args:?} failed");
}

fn add(writer: &TaskWriter<GitTaskLog>, summary: &str) -> TaskUid {
    writer
        .add(
            &Filter::default(),
            NewTask {
                summary: summary.to_owned(),
                ..NewTask::default()
            },
        )
        .expect("add task")
        .uid
}

fn numbering(writer: &TaskWriter<GitTaskLog>) -> BTreeMap<TaskUid, Option<u32>> {
    writer
        .store()
        .load(&Status::NON_RESOLVED)
        .expect("load")
        .iter()
        .map(|task| (task.uid, task.ephemeral_id))
        .collect()
}

#[test]
fn two_replicas_sync_without_conflict() {
    let dir = TempDir::new().expect("tempdir");
    let remote = dir.path().join("remote.git");
    Repository::init_bare(&remote).expect("init bare remote");
    let remote_url = remote.display().to_string();

    let first_path = dir.path().join("first");
    let first = open_writer(&first_path);
    let seed = add(&first, "Seed");
    let branch = first.store().log().git().current_branch();
    git(&first_path, &["remote", "add", "origin", &remote_url]);
    first
        .store()
        .log()
        .git()
        .push("origin", &branch)
        .expect("publish seed");

    let second_path = dir.path().join("second");
    git(
        dir.path(),
        &[
            "clone",
            "--branch",
            &branch,
            &remote_url,
            &second_path.display().to_string(),
        ],
    );
    let second = open_writer(&second_path);

    let from_first = add(&first, "Written on the laptop");
    let from_second = add(&second, "Written on the desktop");
    assert_ne!(from_first, from_second);

    first.sync().expect("first sync");
    second.sync().expect("second sync");
    first.sync().expect("first sync again");

    let on_first = numbering(&first);
    let on_second = numbering(&second);
    assert_eq!(on_first.len(), 3);
    for uid in [seed, from_first, from_second] {
        assert!(on_first.contains_key(&uid));
    }
    assert_eq!(on_first, on_second);
}

#[test]
fn undo_restores_previous_status_with_one_commit() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("tasks");
    let writer = open_writer(&path);
    add(&writer, "Fix bug");
    let target: BTreeSet<u32> = [1].into();
    writer.start(&target, "").expect("start");
    writer.stop(&target, "").expect("stop");
    writer.resolve(&target, "").expect("done");

    let count = |path: &Path| {
        let repo = Repository::open(path).expect("open");
        let mut walk = repo.revwalk().expect("revwalk");
        walk.push_head().expect("head");
        walk.count()
    };
    let before = count(&path);

    writer.undo().expect("undo");

    assert_eq!(count(&path), before + 1);
    let snapshot = writer.store().load(&Status::NON_RESOLVED).expect("load");
    assert_eq!(snapshot.lookup_by_id(1).expect("task 1").status, Status::Paused);
}

#[test]
fn failed_commit_is_rolled_back_before_the_next_change() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("tasks");
    let writer = open_writer(&path);
    add(&writer, "first");

    let set_signing = |enabled: bool| {
        let repo = Repository::open(&path).expect("open");
        let mut config = repo.config().expect("config");
        config.set_bool("commit.gpgsign", enabled).expect("gpgsign");
        config.set_str("gpg.program", "false").expect("gpg program");
    };
    set_signing(true);
    let failed = writer.add(
        &Filter::default(),
        NewTask {
            summary: "second".to_owned(),
            ..NewTask::default()
        },
    );
    assert!(failed.is_err());
    set_signing(false);

    assert_eq!(numbering(&writer).len(), 1);
    add(&writer, "third");

    let repo = Repository::open(&path).expect("open");
    let head = repo.head().expect("head").peel_to_commit().expect("commit");
    let parent = head.parent(0).expect("parent");
    let diff = repo
        .diff_tree_to_tree(Some(&parent.tree().expect("tree")), Some(&head.tree().expect("tree")), None)
        .expect("diff");
    assert_eq!(diff.deltas().len(), 1);

    writer.undo().expect("undo");
    assert_eq!(numbering(&writer).len(), 1);
}
