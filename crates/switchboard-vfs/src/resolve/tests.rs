//! Unit tests for virtual path resolution.

use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn resolver() -> Resolver {
    Resolver::new(
        Utf8PathBuf::from("/home/ada"),
        vec![
            MountEntry {
                name: String::from("docs"),
                path: Utf8PathBuf::from("/srv/docs"),
            },
            MountEntry {
                name: String::from("cache"),
                path: Utf8PathBuf::from("/var/cache/switchboard"),
            },
        ],
    )
}

#[rstest]
#[case::mounted("vfs:/docs/guide.md", None, "file:///srv/docs/guide.md")]
#[case::mounted_without_slash("vfs:docs/a/b.txt", None, "file:///srv/docs/a/b.txt")]
#[case::mount_root("vfs:/cache", None, "file:///var/cache/switchboard")]
#[case::unmounted_segment("vfs:/notes/todo.txt", None, "file:///home/ada/notes/todo.txt")]
#[case::marker_ignores_base("vfs:/docs/x", Some("/elsewhere"), "file:///srv/docs/x")]
#[case::absolute_uri("https://example.com/a?b=c", None, "https://example.com/a?b=c")]
#[case::file_uri("file:///etc/hosts", Some("/home"), "file:///etc/hosts")]
#[case::rooted("/projects/x.rs", Some("/tmp"), "file:///home/ada/projects/x.rs")]
#[case::relative_to_root("notes/a.txt", None, "file:///home/ada/notes/a.txt")]
#[case::relative_to_base("a.txt", Some("/projects"), "file:///home/ada/projects/a.txt")]
#[case::relative_to_url_base("b.txt", Some("file:///srv/data"), "file:///srv/data/b.txt")]
#[case::relative_to_http_base(
    "img.png",
    Some("https://example.com/assets"),
    "https://example.com/assets/img.png"
)]
#[case::dot_segments("./a/../b.txt", None, "file:///home/ada/b.txt")]
fn references_resolve_by_rule(
    resolver: Resolver,
    #[case] uri: &str,
    #[case] base: Option<&str>,
    #[case] expected: &str,
) {
    let resolved = resolver.resolve(uri, base).expect("resolve");
    assert_eq!(resolved.as_str(), expected);
}

#[rstest]
#[case::mounted("vfs:/docs/guide.md", None)]
#[case::relative("x/y.txt", Some("/base"))]
#[case::rooted("/a b/c.txt", None)]
#[case::remote("https://example.com/", None)]
fn resolution_is_idempotent(resolver: Resolver, #[case] uri: &str, #[case] base: Option<&str>) {
    let once = resolver.resolve(uri, base).expect("first resolve");
    let twice = resolver.resolve(once.as_str(), base).expect("second resolve");
    assert_eq!(once, twice);
}

#[rstest]
fn spaces_are_percent_encoded(resolver: Resolver) {
    let resolved = resolver.resolve("/a b.txt", None).expect("resolve");
    assert_eq!(resolved.as_str(), "file:///home/ada/a%20b.txt");
}

#[rstest]
#[case::inside_root("notes/a.txt", None)]
#[case::inside_mount("vfs:/docs/a.txt", None)]
fn contained_references_are_accepted(
    resolver: Resolver,
    #[case] uri: &str,
    #[case] base: Option<&str>,
) {
    assert!(resolver.resolve_contained(uri, base).is_ok());
}

#[rstest]
#[case::parent_of_root("../../etc/passwd", None)]
#[case::parent_of_mount("vfs:/docs/../../etc", None)]
#[case::foreign_file("file:///etc/hosts", None)]
#[case::remote("https://example.com/", None)]
fn escaping_references_are_rejected(
    resolver: Resolver,
    #[case] uri: &str,
    #[case] base: Option<&str>,
) {
    let error = resolver
        .resolve_contained(uri, base)
        .expect_err("should escape");
    assert!(matches!(error, VfsError::EscapesRoot { .. }), "{error:?}");
}

#[test]
fn relative_roots_are_rejected() {
    let error = resolve("a.txt", None, Utf8Path::new("relative"), &[]).expect_err("relative root");
    assert!(matches!(error, VfsError::NotAbsolute { .. }));
}

#[rstest]
#[case("https://x", true)]
#[case("git+ssh://host/repo", true)]
#[case("C:/Windows", false)]
#[case("notes/a:b", false)]
#[case("1abc:rest", false)]
fn scheme_detection(#[case] uri: &str, #[case] expected: bool) {
    assert_eq!(is_absolute_uri(uri), expected);
}
