use std::collections::BTreeMap;
use std::sync::Arc;

use boxr::boxes::{BoxFile, FileInfo, MemoryBox, ResourceBox};
use boxr::overlay::OverlayBox;
use boxr::{Error, PathPolicy, Resolver, Result};
use boxr_core::catchall::Catchall;
use boxr_core::path::RESERVED_MANIFEST_PATH;
use boxr_core::policy::StatusCode;

fn site() -> OverlayBox {
    let files = MemoryBox::from_files(
        "site",
        [
            ("/index.html", "home"),
            ("/404.html", "missing"),
            ("/api/users.json", "[]"),
            ("/docs/index.html", "docs home"),
            ("/secret/key.txt", "hunter2"),
            (RESERVED_MANIFEST_PATH, "{}"),
        ],
    )
    .expect("site box");
    OverlayBox::default().with(Arc::new(files))
}

fn policy_from_json(raw: &str) -> PathPolicy {
    serde_json::from_str(raw).expect("policy json")
}

fn body(resolved: boxr::Resolved) -> String {
    String::from_utf8(resolved.file.read_to_vec().expect("read")).expect("utf8")
}

/// A box whose `info` fails with an I/O error for every path.
struct UnreadableBox;

impl ResourceBox for UnreadableBox {
    fn open(&self, path: &str) -> Result<BoxFile> {
        Err(Error::Io(format!("permission denied: {path}")))
    }

    fn info(&self, path: &str) -> Result<FileInfo> {
        Err(Error::Io(format!("permission denied: {path}")))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[test]
fn validate_discovers_default_index() {
    let mut policy = PathPolicy::default();
    assert_eq!(policy.index(), "");
    assert!(policy.validate(&site()).is_empty());
    assert_eq!(policy.index(), "/index.html");
}

#[test]
fn validate_without_default_index_is_not_an_error() {
    let boxes = OverlayBox::default().with(Arc::new(
        MemoryBox::from_files("bare", [("/a.txt", "a")]).expect("box"),
    ));
    let mut policy = PathPolicy::default();
    assert!(policy.validate(&boxes).is_empty());
    assert_eq!(policy.index(), "");
}

#[test]
fn validate_collects_every_problem() {
    let mut policy = policy_from_json(
        r#"{
            "index": "/start.html",
            "statusCodes": {"404": "/404.html", "500": "/500.html"},
            "includes": ["("],
            "excludes": ["[", "ok"],
            "catchall": {"target": "/app.html"}
        }"#,
    );
    let errors = policy.validate(&site());
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    assert_eq!(errors.len(), 5, "{messages:#?}");
    assert!(messages[0].contains("paths.catchall.target = \"/app.html\""));
    assert!(messages[1].contains("paths.index = \"/start.html\" - path does not exist in box"));
    assert!(messages[2].contains("paths.statusCodes[500] = \"/500.html\""));
    assert!(messages[3].contains("paths.includes[0]"));
    assert!(messages[4].contains("paths.excludes[0]"));
}

#[test]
fn validate_distinguishes_read_errors_from_missing_paths() {
    let mut policy = policy_from_json(r#"{"index": "/x.html", "statusCodes": {"404": "/404.html"}}"#);
    let errors = policy.validate(&UnreadableBox);
    assert_eq!(errors.len(), 2);
    for err in &errors {
        assert_eq!(err.code(), "invalid_config");
        assert!(err.to_string().contains("cannot read path information"));
    }

    let mut unset = PathPolicy::default();
    let errors = unset.validate(&UnreadableBox);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("default index \"/index.html\""));
}

#[test]
fn resolver_serves_index_for_root_and_directories() {
    let resolver = Resolver::new(site(), PathPolicy::default()).expect("resolver");
    assert_eq!(resolver.policy().index(), "/index.html");
    let root = resolver.resolve("/").expect("root");
    assert_eq!((root.status, root.path.as_str()), (200, "/index.html"));

    let docs = resolver.resolve("/docs").expect("docs");
    assert_eq!(docs.path, "/docs/index.html");
    assert_eq!(body(docs), "docs home");
}

#[test]
fn resolver_never_serves_the_manifest_by_default() {
    let resolver = Resolver::new(site(), PathPolicy::default()).expect("resolver");
    assert!(resolver.resolve(RESERVED_MANIFEST_PATH).unwrap_err().is_not_found());
}

#[test]
fn denied_and_missing_paths_fall_back_to_status_page() {
    let policy = policy_from_json(
        r#"{"excludes": ["^/secret/"], "statusCodes": {"404": "/404.html"}}"#,
    );
    let resolver = Resolver::new(site(), policy).expect("resolver");

    let denied = resolver.resolve("/secret/key.txt").expect("fallback");
    assert_eq!((denied.status, denied.path.as_str()), (404, "/404.html"));
    assert_eq!(body(denied), "missing");

    let missing = resolver.resolve("/nope").expect("fallback");
    assert_eq!(missing.status, 404);
}

#[test]
fn catchall_wins_over_status_page() {
    let mut policy = policy_from_json(r#"{"statusCodes": {"404": "/404.html"}}"#);
    let mut catchall = Catchall::default();
    catchall.target = Some("/index.html".to_string());
    catchall.set_includes(Some(vec!["^/app/".to_string()]));
    policy.catchall = catchall;
    let resolver = Resolver::new(site(), policy).expect("resolver");

    let routed = resolver.resolve("/app/settings").expect("catchall");
    assert_eq!((routed.status, routed.path.as_str()), (200, "/index.html"));

    let other = resolver.resolve("/other").expect("status page");
    assert_eq!(other.status, 404);
}

#[test]
fn patterns_replaced_after_use_are_honored() {
    let mut policy = policy_from_json(r#"{"excludes": ["^/secret/"]}"#);
    assert!(!policy.path_allowed("/secret/key.txt").expect("allowed"));
    assert!(policy.path_allowed("/api/users.json").expect("allowed"));

    policy.set_excludes(Some(vec!["^/api/".to_string()]));
    let resolver = Resolver::new(site(), policy).expect("resolver");
    assert_eq!(body(resolver.resolve("/secret/key.txt").expect("secret")), "hunter2");
    assert!(resolver.resolve("/api/users.json").unwrap_err().is_not_found());
}

#[test]
fn resolver_rejects_invalid_configuration() {
    let policy = policy_from_json(r#"{"index": "/missing.html", "includes": ["("]}"#);
    let err = Resolver::new(site(), policy).unwrap_err();
    assert_eq!(err.code(), "aggregate");
    assert!(err.to_string().contains("\nAND "));
}

#[test]
fn layered_excludes_replace_base_list() {
    let base = policy_from_json(r#"{"excludes": ["^/secret/"]}"#);
    let layered = base.merge(&policy_from_json(r#"{"excludes": ["^/api/"]}"#));
    let resolver = Resolver::new(site(), layered).expect("resolver");

    assert_eq!(body(resolver.resolve("/secret/key.txt").expect("secret")), "hunter2");
    assert!(resolver.resolve("/api/users.json").unwrap_err().is_not_found());
}

#[test]
fn empty_override_keeps_base_behavior() {
    let mut base = PathPolicy::default();
    base.index = Some("/index.html".to_string());
    let not_found = StatusCode::new(404).expect("status code");
    base.status_codes = Some(BTreeMap::from([(not_found, "/404.html".to_string())]));
    base.set_includes(Some(vec!["^/(api|docs)/".to_string()]));
    base.set_excludes(Some(vec!["\\.txt$".to_string()]));
    let merged = base.merge(&PathPolicy::default());
    assert_eq!(merged.index(), base.index());
    assert_eq!(merged.find_status_code(404), base.find_status_code(404));
    for candidate in ["/api/users.json", "/docs/a.txt", "/static/app.js", "/"] {
        assert_eq!(
            merged.path_allowed(candidate).expect("merged"),
            base.path_allowed(candidate).expect("base"),
            "{candidate}"
        );
    }
}

#[test]
fn resolver_is_shareable_across_threads() {
    let policy = policy_from_json(r#"{"includes": ["^/api/", "^/index"]}"#);
    let resolver = Arc::new(Resolver::new(site(), policy).expect("resolver"));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let resolver = Arc::clone(&resolver);
            std::thread::spawn(move || {
                let path = if i % 2 == 0 { "/api/users.json" } else { "/docs/index.html" };
                resolver.resolve(path).map(|r| r.path)
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.join().expect("join");
        if i % 2 == 0 {
            assert_eq!(result.expect("allowed"), "/api/users.json");
        } else {
            assert!(result.unwrap_err().is_not_found());
        }
    }
}
