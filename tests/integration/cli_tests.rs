//! End-to-end runs through `run_app` with real images.

use std::fs;
use std::path::Path;

use clap::Parser;
use mediadedupe::cli::Cli;
use mediadedupe::error::ExitCode;
use tempfile::tempdir;

use super::common::write_image;

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["mediadedupe", "--quiet"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    mediadedupe::run_app(cli)
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_delete_run_removes_reencoded_copy() {
    let lib = tempdir().unwrap();
    let dl = tempdir().unwrap();
    let db = tempdir().unwrap();
    let db_path = db.path().join("image.db");

    let original = lib.path().join("photo.png");
    let copy = dl.path().join("photo-copy.bmp");
    let unrelated = dl.path().join("other.png");
    write_image(&original, 10);
    write_image(&copy, 10);
    write_image(&unrelated, 99);

    let code = run(&[
        "run",
        "--media",
        "image",
        "--database",
        s(&db_path),
        "--reference",
        s(lib.path()),
        "--path",
        s(dl.path()),
        "--delete",
        "--output",
        "json",
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(original.exists());
    assert!(!copy.exists());
    assert!(unrelated.exists());
}

#[test]
fn test_dry_run_is_the_default() {
    let lib = tempdir().unwrap();
    let dl = tempdir().unwrap();
    let db = tempdir().unwrap();
    let db_path = db.path().join("image.db");

    let original = lib.path().join("a.png");
    let copy = dl.path().join("a.bmp");
    write_image(&original, 1);
    write_image(&copy, 1);

    let code = run(&[
        "run",
        "-m",
        "image",
        "--database",
        s(&db_path),
        "-r",
        s(lib.path()),
        "-p",
        s(dl.path()),
        "--output",
        "csv",
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(copy.exists());
}

#[test]
fn test_nothing_found_exits_with_no_duplicates() {
    let lib = tempdir().unwrap();
    let db = tempdir().unwrap();
    write_image(&lib.path().join("a.png"), 1);
    write_image(&lib.path().join("b.png"), 2);

    let code = run(&[
        "run",
        "-m",
        "image",
        "--database",
        s(&db.path().join("image.db")),
        "-r",
        s(lib.path()),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_broken_file_gives_partial_success() {
    let lib = tempdir().unwrap();
    let dl = tempdir().unwrap();
    let db = tempdir().unwrap();
    write_image(&lib.path().join("a.png"), 5);
    write_image(&dl.path().join("a.png"), 5);
    fs::write(dl.path().join("truncated.png"), b"\x89PNG\r\n\x1a\nnot really").unwrap();

    let code = run(&[
        "run",
        "-m",
        "image",
        "--database",
        s(&db.path().join("image.db")),
        "-r",
        s(lib.path()),
        "-p",
        s(dl.path()),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::PartialSuccess);
}

#[test]
fn test_missing_search_path_is_fatal() {
    let db = tempdir().unwrap();
    let result = run(&[
        "run",
        "-m",
        "image",
        "--database",
        s(&db.path().join("image.db")),
        "-r",
        "/non/existent/path/that/really/should/not/exist",
    ]);

    let err = result.unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
}

#[test]
fn test_missing_decoder_is_fatal() {
    let lib = tempdir().unwrap();
    let db = tempdir().unwrap();
    let result = run(&[
        "scan",
        "-m",
        "audio",
        "--database",
        s(&db.path().join("audio.db")),
        "-r",
        s(lib.path()),
        "--decoder",
        "/non/existent/decoder",
    ]);

    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("decoder"));
}

#[test]
fn test_scan_then_report_then_clear() {
    let lib = tempdir().unwrap();
    let db = tempdir().unwrap();
    let db_path = db.path().join("image.db");
    write_image(&lib.path().join("a.png"), 3);
    write_image(&lib.path().join("b.bmp"), 3);

    let scanned = run(&[
        "scan",
        "-m",
        "image",
        "--database",
        s(&db_path),
        "-r",
        s(lib.path()),
    ])
    .unwrap();
    assert_eq!(scanned, ExitCode::Success);

    // Two identical reference images are a collision.
    let reported = run(&["report", "-m", "image", "--database", s(&db_path)]).unwrap();
    assert_eq!(reported, ExitCode::Success);

    let cleared = run(&["clear", "-m", "image", "--database", s(&db_path)]).unwrap();
    assert_eq!(cleared, ExitCode::Success);

    let after = run(&["report", "-m", "image", "--database", s(&db_path)]).unwrap();
    assert_eq!(after, ExitCode::NoDuplicates);
}

#[test]
fn test_config_file_drives_the_run() {
    let lib = tempdir().unwrap();
    let dl = tempdir().unwrap();
    let work = tempdir().unwrap();
    let copy = dl.path().join("copy.png");
    write_image(&lib.path().join("orig.png"), 42);
    write_image(&copy, 42);

    let config_path = work.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"media = "image"
database = {db:?}
should_delete_files = true

[[search_paths]]
path = {lib:?}
is_reference = true

[[search_paths]]
path = {dl:?}
"#,
            db = s(&work.path().join("store.db")),
            lib = s(lib.path()),
            dl = s(dl.path()),
        ),
    )
    .unwrap();

    let code = run(&["run", "--config", s(&config_path)]).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(!copy.exists());
}

#[test]
fn test_init_config_refuses_to_overwrite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    assert_eq!(run(&["init-config", s(&path)]).unwrap(), ExitCode::Success);
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("[[search_paths]]"));

    assert!(run(&["init-config", s(&path)]).is_err());
    assert_eq!(
        run(&["init-config", s(&path), "--force"]).unwrap(),
        ExitCode::Success
    );
}
