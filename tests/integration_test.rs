use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fanscan::hash::{digest_file, HashAlgorithm};
use fanscan::render::render_report;
use fanscan::{
    scan, CancelToken, DirSource, HashCompare, ListingSource, NameFilter, Outcome, PatternScan,
    Processor, ScanError, ScanResult, Source, Termination, WalkConfig, WorkItem,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create a temporary directory tree for testing.
///
/// Structure:
/// ```text
/// tmp/
///   a.txt          "hello\nfoo bar\nbaz\n"
///   b.txt          "foo" behind a NUL byte
///   .git/config    mentions foo, but is deny-listed
///   sub/
///     c.md         "nothing here\n"
///     d.txt        "FOO upper\n"
/// ```
fn setup_test_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::write(root.join("a.txt"), "hello\nfoo bar\nbaz\n").unwrap();
    fs::write(root.join("b.txt"), b"head foo\x00\x01\x02foo tail\n").unwrap();

    fs::create_dir(root.join(".git")).unwrap();
    fs::write(root.join(".git/config"), "[remote \"foo\"]\n").unwrap();

    let sub = root.join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("c.md"), "nothing here\n").unwrap();
    fs::write(sub.join("d.txt"), "FOO upper\n").unwrap();

    dir
}

/// A tree of `n` small files spread over a few subdirectories.
fn setup_wide_dir(n: usize) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..n {
        let sub = dir.path().join(format!("d{}", i % 7));
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join(format!("File{i:03}.txt")), format!("line one\nneedle {i}\n")).unwrap();
    }
    dir
}

fn relative(root: &Path, r: &ScanResult) -> String {
    r.path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/")
}

/// A walkdir-backed source, to check that custom sources plug in.
struct TestDirSource(PathBuf);

impl Source for TestDirSource {
    fn walk(&self, _config: &WalkConfig) -> Box<dyn Iterator<Item = Result<WorkItem, ScanError>> + '_> {
        let entries = walkdir::WalkDir::new(&self.0)
            .into_iter()
            .filter(|e| e.as_ref().map(|e| e.file_type().is_file()).unwrap_or(true))
            .map(|e| match e {
                Ok(e) => Ok(WorkItem::content(e.into_path())),
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    Err(ScanError::Io {
                        path,
                        source: e.into_io_error().unwrap_or_else(|| {
                            std::io::Error::new(std::io::ErrorKind::Other, "walk error")
                        }),
                    })
                }
            });
        Box::new(entries)
    }
}

// ---------------------------------------------------------------------------
// Pattern scans
// ---------------------------------------------------------------------------

#[test]
fn grep_skips_binary_and_deny_listed_files() {
    let dir = setup_test_dir();
    let report = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(PatternScan::new("foo", None, false).unwrap())
        .run()
        .unwrap();

    assert_eq!(report.results.len(), 1, "only a.txt should match");
    let hit = &report.results[0];
    assert_eq!(relative(dir.path(), hit), "a.txt");
    assert_eq!(hit.line, Some(2));
    assert_eq!(hit.detail, "foo bar");
    assert_eq!(report.stats.matches, 1);
    assert_eq!(report.stats.files_scanned, 4, "a, b, c, d; .git is never enqueued");
    assert!(report.is_complete());
}

#[test]
fn grep_ignore_case_and_exclude() {
    let dir = setup_test_dir();
    let report = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(PatternScan::new("foo", Some("bar"), true).unwrap())
        .run()
        .unwrap();

    let got: Vec<_> = report.results.iter().map(|r| relative(dir.path(), r)).collect();
    assert_eq!(got, vec!["sub/d.txt"]);
}

#[test]
fn name_filter_limits_enqueued_files() {
    let dir = setup_test_dir();
    let report = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(PatternScan::new(".", None, false).unwrap())
        .name_filter(NameFilter::glob("*.md").unwrap())
        .run()
        .unwrap();

    assert_eq!(report.stats.files_scanned, 1);
    assert_eq!(relative(dir.path(), &report.results[0]), "sub/c.md");
}

#[test]
fn output_is_identical_for_any_pool_size() {
    let dir = setup_wide_dir(120);
    let run_with = |workers: usize| {
        scan()
            .source(DirSource::new(dir.path()).unwrap())
            .processor(PatternScan::new("needle", None, false).unwrap())
            .workers(workers)
            .queue_capacity(2)
            .run()
            .unwrap()
    };

    let one = run_with(1);
    let many = run_with(16);
    assert_eq!(one.results.len(), 120);
    assert_eq!(one.results, many.results);
}

#[test]
fn every_enqueued_file_is_processed_exactly_once() {
    let dir = setup_wide_dir(75);
    let report = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(HashCompare::new(&"0".repeat(64)).unwrap())
        .workers(8)
        .queue_capacity(1)
        .run()
        .unwrap();

    assert_eq!(report.stats.files_scanned, 75);
    assert_eq!(report.results.len(), 75);

    let mut paths: Vec<_> = report.results.iter().map(|r| r.path.clone()).collect();
    paths.dedup();
    assert_eq!(paths.len(), 75, "no duplicates");
    assert!(report.results.iter().all(|r| r.outcome == Outcome::NotMatched));
}

#[test]
fn empty_directory_finishes_with_zero_counts() {
    let dir = tempfile::tempdir().unwrap();
    let report = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(PatternScan::new("x", None, false).unwrap())
        .run()
        .unwrap();

    assert!(report.results.is_empty());
    assert_eq!(report.stats.files_scanned, 0);
    assert_eq!(report.stats.matches, 0);
    assert_eq!(report.stats.errors, 0);
    assert!(report.is_complete());
}

#[test]
fn timeout_fires_while_every_file_is_filtered_out() {
    let dir = setup_wide_dir(300);
    let report = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(PatternScan::new("needle", None, false).unwrap())
        .name_filter(NameFilter::glob("*.none").unwrap())
        .timeout(Duration::from_nanos(1))
        .run()
        .unwrap();

    assert!(report.timed_out());
    assert_eq!(report.termination.exit_code(), 1);
    assert_eq!(report.stats.files_scanned, 0);
    assert!(report.results.is_empty());
}

#[test]
fn cancel_stops_a_walk_that_yields_nothing() {
    let dir = setup_wide_dir(50);
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(PatternScan::new("needle", None, false).unwrap())
        .skip_dirs(["d"])
        .cancel_token(cancel)
        .run()
        .unwrap();

    assert_eq!(report.termination, Termination::Cancelled);
    assert_eq!(report.stats.skipped, 0, "stopped before any subtree was pruned");
}

#[test]
fn completed_walk_with_no_matches_is_not_marked_early() {
    let dir = setup_wide_dir(20);
    let report = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(PatternScan::new("absent", None, false).unwrap())
        .name_filter(NameFilter::glob("*.none").unwrap())
        .timeout(Duration::from_secs(60))
        .run()
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.termination.exit_code(), 0);
    assert_eq!(report.stats.skipped, 20);
}

// ---------------------------------------------------------------------------
// Hash scans
// ---------------------------------------------------------------------------

#[test]
fn find_hash_reports_the_matching_file() {
    let dir = setup_test_dir();
    let target = dir.path().join("sub/d.txt");
    let expected = digest_file(&target, HashAlgorithm::Sha256).unwrap().to_uppercase();

    let report = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(HashCompare::new(&expected).unwrap())
        .run()
        .unwrap();

    let matched: Vec<_> = report.matches().map(|r| relative(dir.path(), r)).collect();
    assert_eq!(matched, vec!["sub/d.txt"]);
    assert_eq!(report.results.len(), 4);
    assert!(report.results.iter().all(|r| r.detail == "sha256"));
}

#[test]
fn verify_listing_reports_match_mismatch_and_missing() {
    let dir = setup_test_dir();
    let a_md5 = digest_file(&dir.path().join("a.txt"), HashAlgorithm::Md5).unwrap();
    let d_sha1 = digest_file(&dir.path().join("sub/d.txt"), HashAlgorithm::Sha1).unwrap();

    let listing = dir.path().join("SUMS");
    fs::write(
        &listing,
        format!(
            "# checksums\n\
             {a_md5}  a.txt\n\
             sub/d.txt {d_sha1}\n\
             {zero} *sub/c.md\n\
             {zero}  gone.txt\n\
             not a valid line\n",
            zero = "0".repeat(64),
        ),
    )
    .unwrap();

    let report = scan()
        .source(ListingSource::new(&listing).unwrap())
        .processor(HashCompare::per_item())
        .collect_walk_errors(true)
        .run()
        .unwrap();

    let got: Vec<_> = report
        .results
        .iter()
        .map(|r| (relative(dir.path(), r), r.outcome.clone()))
        .collect();
    assert_eq!(got.len(), 4);
    assert_eq!(got[0], ("a.txt".to_string(), Outcome::Matched));
    assert!(got[1].0 == "gone.txt" && got[1].1.is_error());
    assert_eq!(got[2], ("sub/c.md".to_string(), Outcome::NotMatched));
    assert_eq!(got[3], ("sub/d.txt".to_string(), Outcome::Matched));

    assert_eq!(report.stats.walk_errors, 1);
    assert!(matches!(report.walk_errors[0], ScanError::Listing { line: 6, .. }));
}

// ---------------------------------------------------------------------------
// Builder, custom sources, rendering
// ---------------------------------------------------------------------------

#[test]
fn custom_source_works() {
    let dir = setup_test_dir();
    let report = scan()
        .source(TestDirSource(dir.path().to_path_buf()))
        .processor(PatternScan::new("remote", None, false).unwrap())
        .run()
        .unwrap();

    // walkdir knows nothing about the deny-list
    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].path.ends_with(".git/config"));
}

#[test]
fn custom_processor_works() {
    struct Size;
    impl Processor for Size {
        fn process(&self, item: WorkItem) -> Vec<ScanResult> {
            match fs::metadata(&item.path) {
                Ok(m) => vec![ScanResult::new(item.path, Outcome::Matched, m.len().to_string())],
                Err(e) => vec![ScanResult::error(item.path, e.to_string())],
            }
        }
    }

    let dir = setup_test_dir();
    let report = scan()
        .source(DirSource::new(dir.path().join("a.txt")).unwrap())
        .processor(Size)
        .run()
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].detail, "18");
}

#[test]
fn builder_rejects_incomplete_or_invalid_setups() {
    let dir = setup_test_dir();

    let no_source = scan().processor(HashCompare::per_item()).run();
    assert!(matches!(no_source, Err(ScanError::InvalidSource(_))));

    let no_processor = scan().source(DirSource::new(dir.path()).unwrap()).run();
    assert!(matches!(no_processor, Err(ScanError::InvalidConfig(_))));

    let long_timeout = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(HashCompare::per_item())
        .timeout(Duration::from_secs(301))
        .run();
    assert!(matches!(long_timeout, Err(ScanError::InvalidConfig(_))));

    let huge_pool = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(HashCompare::per_item())
        .workers(10_000)
        .run();
    assert!(matches!(huge_pool, Err(ScanError::InvalidThreadCount(10_000))));
}

#[test]
fn rendered_output_ends_with_summary() {
    let dir = setup_test_dir();
    let report = scan()
        .source(DirSource::new(dir.path()).unwrap())
        .processor(PatternScan::new("foo", None, false).unwrap())
        .workers(3)
        .run()
        .unwrap();

    let mut buf = Vec::new();
    render_report(&mut buf, &report, false).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<_> = text.lines().collect();

    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("a.txt:2:foo bar"));
    assert!(lines[1].contains("3 workers"));
    assert!(lines[1].contains("4 files scanned"));
    assert!(lines[1].contains("1 matches"));
}
