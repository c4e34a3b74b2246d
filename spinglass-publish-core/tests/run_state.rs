use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tempfile::tempdir;

use spinglass_publish_core::run_state::RunStateTracker;

fn touch(root: &Path, relative: &str, modified: SystemTime) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "<h1>x</h1>").unwrap();
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(modified)
        .unwrap();
}

fn secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH).unwrap().as_secs_f64()
}

#[test]
fn test_missing_state_file_means_zero() {
    let dir = tempdir().unwrap();
    let tracker = RunStateTracker::new(dir.path(), dir.path().join(".atproto_last_run"));
    assert_eq!(tracker.load_cutoff(), 0.0);
}

#[test]
fn test_garbled_state_file_means_zero() {
    let dir = tempdir().unwrap();
    let state = dir.path().join(".atproto_last_run");
    for garbage in ["", "yesterday", "NaN", "12.5.3"] {
        fs::write(&state, garbage).unwrap();
        let tracker = RunStateTracker::new(dir.path(), &state);
        assert_eq!(tracker.load_cutoff(), 0.0, "content {garbage:?}");
    }
}

#[test]
fn test_reads_float_written_by_earlier_runs() {
    let dir = tempdir().unwrap();
    let state = dir.path().join(".atproto_last_run");
    fs::write(&state, "1712345678.25\n").unwrap();
    let tracker = RunStateTracker::new(dir.path(), &state);
    assert_eq!(tracker.load_cutoff(), 1712345678.25);
}

#[test]
fn test_advance_cutoff_is_monotonic() {
    let dir = tempdir().unwrap();
    let tracker = RunStateTracker::new(dir.path(), dir.path().join(".atproto_last_run"));

    let first = tracker.advance_cutoff().unwrap();
    let second = tracker.advance_cutoff().unwrap();
    assert!(second >= first);
    assert_eq!(tracker.load_cutoff(), second);

    // A clock that went backwards never lowers the stored cutoff.
    let earlier = tracker.advance_cutoff_to(first - 1000.0).unwrap();
    assert_eq!(earlier, second);
    assert_eq!(tracker.load_cutoff(), second);
}

#[test]
fn test_find_candidates_filters_by_convention_and_mtime() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let old = SystemTime::now() - Duration::from_secs(7200);
    let new = SystemTime::now() - Duration::from_secs(60);
    let cutoff = secs(SystemTime::now() - Duration::from_secs(3600));

    touch(root, "phaseβ/new.html", new);
    touch(root, "phaseα/new.html", new);
    touch(root, "phaseα/old.html", old);
    touch(root, "nested/PhaseGamma/new.HTML", new);
    touch(root, "drafts/new.html", new);
    touch(root, "phaseα/new.md", new);
    touch(root, ".git/phaseα/new.html", new);
    touch(root, "target/phaseα/new.html", new);

    let tracker = RunStateTracker::new(root, root.join(".atproto_last_run"));
    let found: Vec<String> = tracker
        .find_candidates(cutoff)
        .iter()
        .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(
        found,
        ["nested/PhaseGamma/new.HTML", "phaseα/new.html", "phaseβ/new.html"]
    );

    assert_eq!(tracker.all_documents().len(), 4);
}

#[test]
fn test_mtime_equal_to_cutoff_is_not_a_candidate() {
    let dir = tempdir().unwrap();
    let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    touch(dir.path(), "phaseα/a.html", at);

    let tracker = RunStateTracker::new(dir.path(), dir.path().join("state"));
    assert!(tracker.find_candidates(1_700_000_000.0).is_empty());
    assert_eq!(tracker.find_candidates(1_699_999_999.5).len(), 1);
}
