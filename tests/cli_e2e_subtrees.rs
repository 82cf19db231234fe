//! End-to-end tests for subtree pushes, nested discovery and `--tree`.
//!
//! Subtree content is committed directly under its prefix; `git subtree
//! split` only needs history touching that directory.

mod common;
use common::prelude::*;

use std::path::PathBuf;

struct Layout {
    fixture: TestFixture,
    origin: PathBuf,
}

fn layout() -> Layout {
    let fixture = TestFixture::new();
    let origin = fixture.bare_remote("origin");
    fixture.add_remote("origin", &origin);
    Layout { fixture, origin }
}

fn url(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_subtree_pushed_to_its_remote() {
    if should_skip_subtree_tests() {
        return;
    }
    let Layout { fixture, origin } = layout();
    let lib = fixture.bare_remote("lib");
    fixture.commit_file("lib/lib.txt", "lib content\n", "Add lib");
    fixture.configure_subtree("lib", &url(&lib), "main");

    let (code, report) = fixture.json_report(&[]);
    assert_eq!(code, 0, "{}", report);
    assert_eq!(
        outcomes(&report),
        vec![
            ("main".into(), "pushed".into()),
            ("lib".into(), "pushed".into())
        ]
    );
    assert!(fixture.ref_of(&origin, "refs/heads/main").is_some());
    assert!(fixture.ref_of(&lib, "refs/heads/main").is_some());

    // The subtree remote holds the directory's content at its root
    let listing = common::git(&lib, &["ls-tree", "--name-only", "main"]);
    assert_eq!(listing, "lib.txt");
}

#[test]
fn test_subtree_custom_branch() {
    if should_skip_subtree_tests() {
        return;
    }
    let Layout { fixture, .. } = layout();
    let lib = fixture.bare_remote("lib");
    fixture.commit_file("lib/lib.txt", "lib content\n", "Add lib");
    fixture.configure_subtree("lib", &url(&lib), "develop");

    fixture.command().assert().success();
    assert!(fixture.ref_of(&lib, "refs/heads/develop").is_some());
    assert_eq!(fixture.ref_of(&lib, "refs/heads/main"), None);
}

#[test]
fn test_unreachable_subtree_url_fails_run() {
    if should_skip_subtree_tests() {
        return;
    }
    let Layout { fixture, origin } = layout();
    fixture.commit_file("lib/lib.txt", "lib content\n", "Add lib");
    fixture.configure_subtree("lib", "/no/such/path", "main");

    fixture
        .command()
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failed"))
        .stdout(predicate::str::contains("2 target(s): 1 succeeded, 1 failed"));

    // The main push still happened
    assert!(fixture.ref_of(&origin, "refs/heads/main").is_some());
}

#[test]
fn test_missing_subtree_path_fails_but_others_continue() {
    if should_skip_subtree_tests() {
        return;
    }
    let Layout { fixture, .. } = layout();
    let gone = fixture.bare_remote("gone");
    let lib = fixture.bare_remote("lib");
    fixture.commit_file("lib/lib.txt", "lib content\n", "Add lib");
    fixture.configure_subtree("nonexistent", &url(&gone), "main");
    fixture.configure_subtree("lib", &url(&lib), "main");

    let (code, report) = fixture.json_report(&[]);
    assert_eq!(code, 1);
    let results = outcomes(&report);
    assert_eq!(results[1], ("nonexistent".into(), "failed".into()));
    assert_eq!(results[2], ("lib".into(), "pushed".into()));
    assert!(report["results"][1]["outcome"]["reason"]
        .as_str()
        .unwrap()
        .contains("does not exist"));
    assert_eq!(fixture.ref_of(&gone, "refs/heads/main"), None);
}

#[test]
fn test_nested_subtrees_pushed_innermost_first() {
    if should_skip_subtree_tests() {
        return;
    }
    let Layout { fixture, .. } = layout();
    let level1 = fixture.bare_remote("level1");
    let level2 = fixture.bare_remote("level2");
    let level3 = fixture.bare_remote("level3");

    fixture.commit_file("lib/lib.txt", "level 1\n", "Add lib");
    fixture.commit_file("lib/nested/nested.txt", "level 2\n", "Add nested");
    fixture.commit_file("lib/nested/deep/deep.txt", "level 3\n", "Add deep");
    fixture.commit_manifest("lib", &[("nested", &url(&level2))]);
    fixture.commit_manifest("lib/nested", &[("./deep", &url(&level3))]);
    fixture.configure_subtree("lib", &url(&level1), "main");

    let (code, report) = fixture.json_report(&[]);
    assert_eq!(code, 0, "{}", report);
    let labels: Vec<String> = outcomes(&report).into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, vec!["main", "lib/nested/deep", "lib/nested", "lib"]);
    assert_eq!(report["results"][1]["depth"], 2);

    for remote in [&level1, &level2, &level3] {
        assert!(fixture.ref_of(remote, "refs/heads/main").is_some());
    }
    assert_eq!(
        common::git(&level3, &["ls-tree", "--name-only", "main"]),
        "deep.txt"
    );
}

#[test]
fn test_dry_run_pushes_no_subtree() {
    if should_skip_subtree_tests() {
        return;
    }
    let Layout { fixture, origin } = layout();
    let lib = fixture.bare_remote("lib");
    fixture.commit_file("lib/lib.txt", "lib content\n", "Add lib");
    fixture.configure_subtree("lib", &url(&lib), "main");

    let (code, report) = fixture.json_report(&["--dry-run"]);
    assert_eq!(code, 0);
    assert_eq!(
        outcomes(&report),
        vec![
            ("main".into(), "skipped_dry_run".into()),
            ("lib".into(), "skipped_dry_run".into())
        ]
    );
    assert_eq!(fixture.ref_of(&origin, "refs/heads/main"), None);
    assert_eq!(fixture.ref_of(&lib, "refs/heads/main"), None);
}

#[test]
fn test_rerun_reports_subtrees_up_to_date() {
    if should_skip_subtree_tests() {
        return;
    }
    let Layout { fixture, .. } = layout();
    let lib = fixture.bare_remote("lib");
    fixture.commit_file("lib/lib.txt", "lib content\n", "Add lib");
    fixture.configure_subtree("lib", &url(&lib), "main");

    fixture.command().assert().success();
    let (code, report) = fixture.json_report(&[]);
    assert_eq!(code, 0);
    assert_eq!(
        outcomes(&report),
        vec![
            ("main".into(), "up_to_date".into()),
            ("lib".into(), "up_to_date".into())
        ]
    );
}

#[test]
fn test_diverged_subtree_rejected_then_forced() {
    if should_skip_subtree_tests() {
        return;
    }
    let Layout { fixture, .. } = layout();
    let lib = fixture.bare_remote("lib");
    fixture.commit_file("lib/lib.txt", "lib content\n", "Add lib");
    fixture.configure_subtree("lib", &url(&lib), "main");
    fixture.command().assert().success();
    let pushed = fixture.ref_of(&lib, "refs/heads/main");

    // Rewrite the only commit touching lib so its split history diverges
    std::fs::write(fixture.path().join("lib/lib.txt"), "rewritten\n").unwrap();
    common::git(&fixture.path(), &["add", "lib/lib.txt"]);
    fixture.amend("Add lib, rewritten");

    let (code, report) = fixture.json_report(&[]);
    assert_eq!(code, 1);
    assert_eq!(
        outcomes(&report),
        vec![
            ("main".into(), "rejected".into()),
            ("lib".into(), "rejected".into())
        ]
    );
    assert_eq!(fixture.ref_of(&lib, "refs/heads/main"), pushed);

    let (code, report) = fixture.json_report(&["--force"]);
    assert_eq!(code, 0, "{}", report);
    assert_eq!(
        outcomes(&report),
        vec![
            ("main".into(), "pushed".into()),
            ("lib".into(), "pushed".into())
        ]
    );
    assert_ne!(fixture.ref_of(&lib, "refs/heads/main"), pushed);
    assert_eq!(
        common::git(&lib, &["show", "main:lib.txt"]),
        "rewritten"
    );

    let (code, report) = fixture.json_report(&[]);
    assert_eq!(code, 0);
    assert_eq!(
        outcomes(&report),
        vec![
            ("main".into(), "up_to_date".into()),
            ("lib".into(), "up_to_date".into())
        ]
    );
}

#[test]
fn test_parallel_independent_subtrees() {
    if should_skip_subtree_tests() {
        return;
    }
    let Layout { fixture, .. } = layout();
    let mut remotes = Vec::new();
    for name in ["alpha", "beta", "gamma"] {
        let remote = fixture.bare_remote(name);
        fixture.commit_file(&format!("{}/file.txt", name), name, &format!("Add {}", name));
        fixture.configure_subtree(name, &url(&remote), "main");
        remotes.push(remote);
    }

    let (code, report) = fixture.json_report(&["--parallel"]);
    assert_eq!(code, 0, "{}", report);
    let labels: Vec<String> = outcomes(&report).into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, vec!["main", "alpha", "beta", "gamma"]);
    for remote in &remotes {
        assert!(fixture.ref_of(remote, "refs/heads/main").is_some());
    }
}

#[test]
fn test_tree_prints_hierarchy_without_pushing() {
    if should_skip_git_tests() {
        return;
    }
    let Layout { fixture, origin } = layout();
    fixture.commit_file("lib/nested/nested.txt", "level 2\n", "Add nested");
    fixture.commit_manifest("lib", &[("nested", "/srv/level2.git")]);
    fixture.configure_subtree("lib", "/srv/level1.git", "main");

    fixture
        .command()
        .arg("--tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("lib -> /srv/level1.git (main) [#2]"))
        .stdout(predicate::str::contains(
            "nested -> /srv/level2.git (main) [#1]",
        ));
    assert_eq!(fixture.ref_of(&origin, "refs/heads/main"), None);
}

#[test]
fn test_malformed_block_warns_and_is_skipped() {
    if should_skip_subtree_tests() {
        return;
    }
    let Layout { fixture, .. } = layout();
    let lib = fixture.bare_remote("lib");
    fixture.commit_file("lib/lib.txt", "lib content\n", "Add lib");
    fixture.configure_subtree("lib", &url(&lib), "main");
    // A block without a url
    common::git(&fixture.path(), &["config", "subtree.broken.branch", "main"]);

    let output = fixture
        .command()
        .arg("--json")
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("broken"), "stderr: {}", stderr);

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let labels: Vec<String> = outcomes(&report).into_iter().map(|(l, _)| l).collect();
    assert_eq!(labels, vec!["main", "lib"]);
}

#[test]
fn test_max_depth_limits_discovery() {
    if should_skip_git_tests() {
        return;
    }
    let Layout { fixture, .. } = layout();
    fixture.commit_file("lib/nested/nested.txt", "level 2\n", "Add nested");
    fixture.commit_manifest("lib", &[("nested", "/srv/level2.git")]);
    fixture.configure_subtree("lib", "/srv/level1.git", "main");

    fixture
        .command()
        .args(["--tree", "--max-depth", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lib -> /srv/level1.git"))
        .stdout(predicate::str::contains("nested ->").not())
        .stdout(predicate::str::contains("warning: lib"));
}
