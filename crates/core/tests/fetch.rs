use std::path::PathBuf;

use gauge_core::services::fetch::classify_git_failure;
use gauge_core::services::{FetchError, LocalFetcher, RepoRef, RoutingFetcher, SourceFetcher};
use tempfile::tempdir;

#[test]
fn remote_references_are_recognized() {
    for raw in [
        "https://github.com/acme/app.git",
        "http://git.local/app",
        "ssh://git@host/app.git",
        "git://host/app.git",
        "git@github.com:acme/app.git",
    ] {
        assert_eq!(RepoRef::parse(raw), Ok(RepoRef::Remote(raw.to_string())), "{raw}");
    }
}

#[test]
fn local_references_are_paths() {
    assert_eq!(RepoRef::parse("/srv/repos/app"), Ok(RepoRef::Local(PathBuf::from("/srv/repos/app"))));
    assert_eq!(RepoRef::parse("file:///srv/app"), Ok(RepoRef::Local(PathBuf::from("/srv/app"))));
    assert_eq!(RepoRef::parse("  ./relative "), Ok(RepoRef::Local(PathBuf::from("./relative"))));
}

#[test]
fn empty_and_unsupported_references_are_rejected() {
    assert!(RepoRef::parse("").is_err());
    assert!(RepoRef::parse("   ").is_err());
    let err = RepoRef::parse("ftp://host/app").unwrap_err();
    assert!(err.contains("ftp"), "{err}");
}

#[test]
fn git_errors_map_to_fetch_error_kinds() {
    let auth = classify_git_failure("fatal: Authentication failed for 'https://host/app.git/'");
    assert!(matches!(auth, FetchError::Auth(_)));
    assert!(auth.is_permanent());

    let missing = classify_git_failure("remote: Repository not found.\nfatal: repository 'x' not found");
    assert!(matches!(missing, FetchError::NotFound(_)));
    assert!(missing.is_permanent());

    let network = classify_git_failure("fatal: unable to access 'https://host/': Could not resolve host: host");
    assert!(matches!(network, FetchError::Network(_)));
    assert!(!network.is_permanent());

    assert!(matches!(classify_git_failure(""), FetchError::Network(ref m) if m == "git clone failed"));
}

#[tokio::test]
async fn local_fetcher_serves_directories_in_place() {
    let dir = tempdir().expect("tempdir");
    let checkout = LocalFetcher
        .fetch(&RepoRef::Local(dir.path().to_path_buf()))
        .await
        .expect("fetch local dir");
    assert_eq!(checkout.path(), dir.path());
    assert!(!checkout.is_temporary());
    drop(checkout);
    assert!(dir.path().is_dir(), "borrowed checkout must not delete the tree");

    let missing = LocalFetcher.fetch(&RepoRef::Local(dir.path().join("nope"))).await.unwrap_err();
    assert!(matches!(missing, FetchError::NotFound(_)));
}

#[tokio::test]
async fn routing_fetcher_sends_local_refs_to_the_local_fetcher() {
    let dir = tempdir().expect("tempdir");
    let fetcher = RoutingFetcher::standard(None);
    let checkout = fetcher.fetch(&RepoRef::Local(dir.path().to_path_buf())).await.expect("fetch");
    assert_eq!(checkout.path(), dir.path());
}
