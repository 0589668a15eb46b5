//! Configuration-driven tests over a directory-backed object store.
//!
//! These build the whole kernel from TOML with `Dav::from_config` and check
//! the results on disk.

use std::path::Path;
use std::sync::Arc;

use bucketdav_kernel::vfs::backends::MARKER_FILE;
use bucketdav_kernel::{Config, Dav, DavRequest, LocalObjectStore, Principal};
use http::StatusCode;
use tempfile::TempDir;

// ============================================================================
// Shared test setup
// ============================================================================

const CONFIG: &str = r#"
    base_path = "/dav"
    transfer_concurrency = 2
    list_page_size = 3

    [[backends]]
    id = "site"
    bucket = "site-bucket"
    root_prefix = "acme"

    [[mounts]]
    path = "/site"
    backend = "site"

    [[grants]]
    principal = "amy"
    mount = "*"
    capability = "operate"
"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("bucketdav_kernel=debug")
        .try_init();
}

async fn setup() -> (TempDir, Dav) {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let config: Config = CONFIG.parse().unwrap();
    let store = Arc::new(LocalObjectStore::new(temp.path()));
    let dav = Dav::from_config(&config, store).await.unwrap();
    (temp, dav)
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join("site-bucket").join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read(root: &Path, relative: &str) -> Option<String> {
    std::fs::read_to_string(root.join("site-bucket").join(relative)).ok()
}

fn has_marker(root: &Path, dir: &str) -> bool {
    let dir = root.join("site-bucket").join(dir);
    dir.join(MARKER_FILE).exists()
}

fn amy(method: &str, path: &str) -> DavRequest {
    DavRequest::named(method, path, Principal::named("amy")).unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn copy_tree_on_disk() {
    let (temp, dav) = setup().await;
    let root = temp.path();
    write(root, "acme/docs/readme.md", "hello");
    write(root, "acme/docs/guides/intro.md", "intro");

    let req = amy("COPY", "/site/docs/")
        .with_header("destination", "http://localhost/dav/site/backup/")
        .unwrap();
    let resp = dav.handle(&req).await;
    assert_eq!(resp.status, StatusCode::CREATED, "{:?}", resp.body);

    let readme = read(root, "acme/backup/readme.md");
    assert_eq!(readme.as_deref(), Some("hello"));
    let intro = read(root, "acme/backup/guides/intro.md");
    assert_eq!(intro.as_deref(), Some("intro"));
    assert!(has_marker(root, "acme/backup"));
    assert_eq!(read(root, "acme/docs/readme.md").as_deref(), Some("hello"));
}

#[tokio::test]
async fn destination_outside_base_path_is_rejected() {
    let (temp, dav) = setup().await;
    write(temp.path(), "acme/a.txt", "a");

    let req = amy("COPY", "/site/a.txt")
        .with_header("destination", "/site/b.txt")
        .unwrap();
    assert_eq!(dav.handle(&req).await.status, StatusCode::BAD_REQUEST);
    assert!(read(temp.path(), "acme/b.txt").is_none());
}

#[tokio::test]
async fn mkcol_move_delete_on_disk() {
    let (temp, dav) = setup().await;
    let root = temp.path();

    let resp = dav.handle(&amy("MKCOL", "/site/drafts/")).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert!(has_marker(root, "acme/drafts"));

    write(root, "acme/drafts/post.md", "draft");
    let req = amy("MOVE", "/site/drafts/post.md")
        .with_header("destination", "/dav/site/published/post.md")
        .unwrap();
    assert_eq!(dav.handle(&req).await.status, StatusCode::CREATED);
    assert!(read(root, "acme/drafts/post.md").is_none());
    let post = read(root, "acme/published/post.md");
    assert_eq!(post.as_deref(), Some("draft"));

    let resp = dav.handle(&amy("DELETE", "/site/published/")).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert!(read(root, "acme/published/post.md").is_none());
    assert!(!has_marker(root, "acme/published"));
}

#[tokio::test]
async fn propfind_on_disk() {
    let (temp, dav) = setup().await;
    write(temp.path(), "acme/notes/one.txt", "1");
    write(temp.path(), "acme/notes/two.txt", "22");

    let req = amy("PROPFIND", "/site/notes/")
        .with_header("depth", "1")
        .unwrap();
    let entries = dav.propfind(&req).await.unwrap();
    let hrefs: Vec<&str> = entries.iter().map(|e| e.href.as_str()).collect();
    let expected = ["/site/notes/", "/site/notes/one.txt", "/site/notes/two.txt"];
    assert_eq!(hrefs, expected);
    assert_eq!(entries[2].size, 2);

    let resp = dav.handle(&amy("PROPFIND", "/site/notes/")).await;
    assert_eq!(resp.status, StatusCode::MULTI_STATUS);
    let body = resp.body.unwrap();
    assert!(body.contains("<D:href>/dav/site/notes/one.txt</D:href>"));
}

#[tokio::test]
async fn paths_through_a_file_do_not_exist() {
    let (temp, dav) = setup().await;
    write(temp.path(), "acme/a", "plain file");

    let resp = dav.handle(&amy("PROPFIND", "/site/a/")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND, "{:?}", resp.body);

    let resp = dav.handle(&amy("MKCOL", "/site/a/b/")).await;
    assert_eq!(resp.status, StatusCode::CONFLICT, "{:?}", resp.body);

    let resp = dav.handle(&amy("DELETE", "/site/a/b.txt")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND, "{:?}", resp.body);
    assert_eq!(read(temp.path(), "acme/a").as_deref(), Some("plain file"));
}
