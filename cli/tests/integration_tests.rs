use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

fn skinmatch(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_skinmatch"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run skinmatch")
}

fn write_png(path: &Path, width: u32, height: u32, pixel: [u8; 4]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    RgbaImage::from_pixel(width, height, Rgba(pixel))
        .save(path)
        .unwrap();
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Query tree with two icons and a candidate tree holding an exact copy of
/// one of them plus an unrelated, differently sized image.
fn fixture() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let query = dir.path().join("res");
    let candidates = dir.path().join("art");

    write_png(&query.join("drawable").join("icon.png"), 4, 4, [200, 10, 10, 255]);
    write_png(&query.join("drawable").join("badge.png"), 8, 8, [10, 200, 10, 255]);
    write_png(&candidates.join("icon.png"), 4, 4, [200, 10, 10, 255]);
    write_png(&candidates.join("banner.png"), 16, 2, [0, 0, 0, 255]);

    (dir, query, candidates)
}

#[test]
fn scan_lists_images_in_sorted_order() {
    let (_dir, query, _) = fixture();
    fs::write(query.join("drawable").join("notes.txt"), "not an image").unwrap();

    let output = skinmatch(&["scan", &path_arg(&query)]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("badge.png"));
    assert!(lines[1].ends_with("icon.png"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Found 2 image(s)."));
}

#[test]
fn scan_respects_extension_filter() {
    let (_dir, query, _) = fixture();
    let output = skinmatch(&["scan", &path_arg(&query), "--ext", "jpg"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).trim().is_empty());
}

#[test]
fn init_config_writes_defaults_and_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("skinmatch.yaml");

    let output = skinmatch(&["init-config", "--output", &path_arg(&path)]);
    assert!(output.status.success());
    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("capacity: 10"));
    assert!(raw.contains("kind: pixel"));

    let again = skinmatch(&["init-config", "--output", &path_arg(&path)]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("already exists"));

    let forced = skinmatch(&["init-config", "--output", &path_arg(&path), "--force"]);
    assert!(forced.status.success());
}

#[test]
fn run_reports_equal_and_mismatch_as_json() {
    let (_dir, query, candidates) = fixture();
    let output = skinmatch(&[
        "run",
        "--query",
        &path_arg(&query),
        "--candidates",
        &path_arg(&candidates),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total_queries"], 2);
    assert_eq!(report["unmatched"], 0);

    let groups = report["groups"].as_array().unwrap();
    let names: Vec<&str> = groups.iter().map(|g| g["tag"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["equal", "similar", "mismatch", "failure"]);

    let equal = &groups[0]["rows"];
    assert_eq!(equal.as_array().unwrap().len(), 1);
    assert!(equal[0]["query_path"].as_str().unwrap().ends_with("icon.png"));
    assert_eq!(equal[0]["trusted"], true);
    assert_eq!(equal[0]["highlighted"], false);

    // No candidate is 8x8, so badge.png only collects mismatches and the
    // first one found (banner.png) is reported.
    let mismatch = &groups[2]["rows"];
    assert_eq!(mismatch.as_array().unwrap().len(), 1);
    assert!(mismatch[0]["query_path"].as_str().unwrap().ends_with("badge.png"));
    assert!(mismatch[0]["candidate_path"].as_str().unwrap().ends_with("banner.png"));
    assert_eq!(mismatch[0]["trusted"], false);
    assert_eq!(groups[2]["conflicts"], 1);
}

#[test]
fn run_with_config_file_and_output_flag() {
    let (dir, query, candidates) = fixture();
    let config = dir.path().join("skinmatch.yaml");
    fs::write(
        &config,
        format!(
            "query_roots: ['{}']\ncandidate_roots: ['{}']\nmatching:\n  jobs: 2\nreport:\n  format: markdown\n",
            path_arg(&query),
            path_arg(&candidates)
        ),
    )
    .unwrap();
    let report_path = dir.path().join("out").join("report.md");

    let output = skinmatch(&[
        "run",
        "--config",
        &path_arg(&config),
        "--output",
        &path_arg(&report_path),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(output.stdout.is_empty());

    let md = fs::read_to_string(&report_path).unwrap();
    assert!(md.contains("# Skinmatch Report"));
    assert!(md.contains("## equal (1 rows, 0 conflicts)"));
    assert!(md.contains("## mismatch (1 rows, 1 conflicts)"));
}

#[test]
fn run_with_empty_candidate_tree_leaves_everything_unmatched() {
    let (dir, query, _) = fixture();
    let empty = dir.path().join("empty");
    fs::create_dir_all(&empty).unwrap();

    let output = skinmatch(&[
        "run",
        "--query",
        &path_arg(&query),
        "--candidates",
        &path_arg(&empty),
        "--format",
        "yaml",
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("total_queries: 2"));
    assert!(stdout.contains("unmatched: 2"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("2 unmatched"));
}

#[test]
fn run_with_missing_root_fails() {
    let (dir, query, _) = fixture();
    let output = skinmatch(&[
        "run",
        "--query",
        &path_arg(&query),
        "--candidates",
        &path_arg(&dir.path().join("missing")),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid root directory"));
}

#[test]
fn run_without_roots_fails() {
    let output = skinmatch(&["run"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no query roots"));
}

#[test]
fn replace_copies_promoted_singleton_over_query() {
    let dir = TempDir::new().unwrap();
    let query = dir.path().join("res");
    let candidates = dir.path().join("art");
    write_png(&query.join("logo.png"), 4, 4, [50, 50, 50, 255]);
    write_png(&candidates.join("logo_v2.png"), 4, 4, [60, 50, 50, 255]);

    let original = fs::read(query.join("logo.png")).unwrap();
    let replacement = fs::read(candidates.join("logo_v2.png")).unwrap();
    let (query_arg, candidates_arg) = (path_arg(&query), path_arg(&candidates));
    let base = [
        "run",
        "--query",
        query_arg.as_str(),
        "--candidates",
        candidates_arg.as_str(),
        "--replace",
    ];

    let mut dry_args = base.to_vec();
    dry_args.push("--dry-run");
    let dry = skinmatch(&dry_args);
    assert!(dry.status.success(), "{}", String::from_utf8_lossy(&dry.stderr));
    assert!(String::from_utf8_lossy(&dry.stderr).contains("Dry run: 1 file(s) would be replaced."));
    assert_eq!(fs::read(query.join("logo.png")).unwrap(), original);

    let run = skinmatch(&base);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    assert!(String::from_utf8_lossy(&run.stderr).contains("Replaced 1 file(s)."));
    assert_eq!(fs::read(query.join("logo.png")).unwrap(), replacement);
}

#[test]
fn replace_leaves_ambiguous_matches_alone() {
    let dir = TempDir::new().unwrap();
    let query = dir.path().join("res");
    let candidates = dir.path().join("art");
    write_png(&query.join("logo.png"), 4, 4, [50, 50, 50, 255]);
    write_png(&candidates.join("a.png"), 4, 4, [60, 50, 50, 255]);
    write_png(&candidates.join("b.png"), 4, 4, [70, 50, 50, 255]);

    let original = fs::read(query.join("logo.png")).unwrap();
    let run = skinmatch(&[
        "run",
        "--query",
        &path_arg(&query),
        "--candidates",
        &path_arg(&candidates),
        "--replace",
    ]);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    assert!(String::from_utf8_lossy(&run.stderr).contains("Replaced 0 file(s)."));
    assert_eq!(fs::read(query.join("logo.png")).unwrap(), original);
}

#[test]
fn run_discovers_query_roots_under_res_dir() {
    let dir = TempDir::new().unwrap();
    let res = dir.path().join("res");
    let candidates = dir.path().join("art");
    write_png(&res.join("drawable").join("icon.png"), 4, 4, [200, 10, 10, 255]);
    write_png(&res.join("mipmap-hdpi").join("ic_launcher.png"), 4, 4, [1, 2, 3, 255]);
    write_png(&res.join("layout").join("ignored.png"), 4, 4, [1, 2, 3, 255]);
    write_png(&candidates.join("icon.png"), 4, 4, [200, 10, 10, 255]);

    let output = skinmatch(&[
        "run",
        "--res-dir",
        &path_arg(&res),
        "--candidates",
        &path_arg(&candidates),
        "--oracle",
        "ssim",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total_queries"], 2);
    let equal = report["groups"][0]["rows"].as_array().unwrap();
    assert!(equal.iter().any(|row| row["query_path"].as_str().unwrap().ends_with("icon.png")));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("ignored.png"));
}
