use std::fs;

use gauge_core::corpus::{load, load_corpus, load_corpus_with, LoadOptions};
use tempfile::tempdir;

#[test]
fn loads_only_requested_extensions() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("main.js"), "console.log(1);").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    fs::create_dir_all(dir.path().join("src/nested")).unwrap();
    fs::write(dir.path().join("src/nested/App.TS"), "export {}").unwrap();

    let mut files = load(dir.path(), &["js", ".ts"]);
    files.sort_by(|a, b| a.name.cmp(&b.name));

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].name, "App.TS");
    assert_eq!(files[0].extension, "ts");
    assert_eq!(files[1].name, "main.js");
    assert_eq!(files[1].content, "console.log(1);");
}

#[test]
fn missing_root_gives_empty_corpus() {
    let dir = tempdir().expect("tempdir");
    let corpus = load_corpus(&dir.path().join("nope"), &["js"]);
    assert!(corpus.is_empty());
    assert!(corpus.entries.is_empty());
}

#[test]
fn vendored_and_build_directories_are_skipped() {
    let dir = tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
    fs::write(dir.path().join("node_modules/lib/index.js"), "eval(x)").unwrap();
    fs::create_dir_all(dir.path().join("build")).unwrap();
    fs::write(dir.path().join("build/out.js"), "eval(x)").unwrap();
    fs::write(dir.path().join("index.js"), "ok").unwrap();

    let corpus = load_corpus(dir.path(), &["js"]);
    assert_eq!(corpus.files.len(), 1);
    assert_eq!(corpus.files[0].name, "index.js");
    assert!(corpus.entries.iter().all(|e| !e.relative_path.starts_with("node_modules/")));
    // The ignored directory itself is still listed.
    assert!(corpus.entries.iter().any(|e| e.relative_path == "node_modules" && e.is_dir));
}

#[test]
fn oversized_files_are_skipped_but_listed() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("big.js"), "x".repeat(200)).unwrap();
    fs::write(dir.path().join("small.js"), "x").unwrap();

    let options = LoadOptions { max_file_bytes: 100, ..LoadOptions::default() };
    let corpus = load_corpus_with(dir.path(), &["js"], &options);
    assert_eq!(corpus.files.len(), 1);
    assert_eq!(corpus.files[0].name, "small.js");

    let big = corpus.entries.iter().find(|e| e.relative_path == "big.js").expect("big.js entry");
    assert_eq!(big.size, 200);
    assert!(!big.is_dir);
}

#[test]
fn entries_use_forward_slash_relative_paths() {
    let dir = tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("lib/models")).unwrap();
    fs::write(dir.path().join("lib/models/user.dart"), "class User {}").unwrap();

    let corpus = load_corpus(dir.path(), &["dart"]);
    let paths: Vec<&str> = corpus.entries.iter().map(|e| e.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["lib", "lib/models", "lib/models/user.dart"]);
    let user = &corpus.entries[2];
    assert_eq!(user.name(), "user.dart");
    assert_eq!(user.depth(), 3);
}

#[test]
fn fingerprint_tracks_content() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("a.js"), "one").unwrap();
    let first = load_corpus(dir.path(), &["js"]).fingerprint();
    let again = load_corpus(dir.path(), &["js"]).fingerprint();
    assert_eq!(first, again);

    fs::write(dir.path().join("a.js"), "two").unwrap();
    let changed = load_corpus(dir.path(), &["js"]).fingerprint();
    assert_ne!(first, changed);
}


#[test]
fn ignored_directories_are_listed_but_not_walked() {
    let dir = tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("Pods/Alamofire")).unwrap();
    fs::write(dir.path().join("Pods/Alamofire/Session.swift"), "class Session {}").unwrap();

    let corpus = load_corpus(dir.path(), &["swift"]);
    let paths: Vec<&str> = corpus.entries.iter().map(|e| e.relative_path.as_str()).collect();
    assert_eq!(paths, vec!["Pods"]);
    assert!(corpus.files.is_empty());
}

#[test]
fn non_utf8_files_are_skipped_without_failing_the_load() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("good.js"), "ok").unwrap();
    fs::write(dir.path().join("latin1.js"), [0x63, 0x61, 0x66, 0xe9, 0xff, 0xfe]).unwrap();

    let corpus = load_corpus(dir.path(), &["js"]);
    let names: Vec<&str> = corpus.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["good.js"]);
    // Still part of the tree listing.
    assert!(corpus.entries.iter().any(|e| e.relative_path == "latin1.js"));
}

#[cfg(unix)]
#[test]
fn unreadable_files_and_directories_are_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("good.js"), "ok").unwrap();
    let locked = dir.path().join("locked.js");
    fs::write(&locked, "eval(x)").unwrap();
    let sealed = dir.path().join("sealed");
    fs::create_dir(&sealed).unwrap();
    fs::write(sealed.join("inner.js"), "eval(y)").unwrap();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    fs::set_permissions(&sealed, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users read through file modes; expect whatever is actually readable.
    let mut expected = vec!["good.js"];
    if fs::read(&locked).is_ok() {
        expected.push("locked.js");
    }
    if fs::read_dir(&sealed).is_ok() {
        expected.push("inner.js");
    }

    let corpus = load_corpus(dir.path(), &["js"]);
    let names: Vec<&str> = corpus.files.iter().map(|f| f.name.as_str()).collect();

    fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(names, expected);
}
