// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use super::lookup::RepositoryInspector;
use super::{Builder, Config, Directory};

use gitgate_type::{Change, Container, Rev};

use async_std::sync::Arc;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use tower::ServiceExt;

const DIRECTORY: &str = r#"
[[users]]
id = 1
username = "dev"
password = "dev-password"

[[users]]
id = 2
username = "guest"
password = "guest-password"

[[users]]
id = 3
username = "secure"
password = "secure-password"
two_factor_enabled = true

[[personal_access_tokens]]
id = 1
name = "profile"
user = "dev"
token = "glpat-profile"
scopes = ["read_user"]

[[keys]]
id = 11
user = "dev"

[[projects]]
id = 1
full_path = "group/private"

[[projects]]
id = 2
full_path = "group/public"
visibility = "public"

[[members]]
project_id = 1
user = "dev"
access_level = "developer"

[[members]]
project_id = 1
user = "guest"
access_level = "guest"

[[redirects]]
path = "group/old-name"
project_id = 1
"#;

struct Inspector;

#[axum::async_trait]
impl RepositoryInspector for Inspector {
    async fn count_files(&self, _: &Container, _: &Rev, _: usize) -> anyhow::Result<usize> {
        Ok(1)
    }

    async fn new_bytes(&self, _: &Container, _: &Change) -> anyhow::Result<u64> {
        Ok(0)
    }
}

fn router(f: impl FnOnce(&mut Config)) -> Router {
    let mut config = Config::default();
    f(&mut config);
    Builder::new(config)
        .directory(Arc::new(Directory::from_toml(DIRECTORY).unwrap()))
        .inspector(Arc::new(Inspector))
        .router()
        .unwrap()
}

fn basic(login: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{login}:{password}")))
}

async fn send(router: Router, req: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let res = router.oneshot(req).await.unwrap();
    let status = res.status();
    let challenge = res
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect::<Vec<_>>();
    let challenge = (!challenge.is_empty()).then(|| challenge.join(", "));
    let body = hyper::body::to_bytes(res.into_body()).await.unwrap();
    (status, challenge, body.to_vec())
}

fn get(uri: &str, auth: Option<String>) -> Request<Body> {
    let req = Request::builder().method(Method::GET).uri(uri);
    match auth {
        Some(auth) => req.header(AUTHORIZATION, auth),
        None => req,
    }
    .body(Body::empty())
    .unwrap()
}

const SHARED_SECRET: &str = "s3cret";

fn internal() -> Router {
    router(|c| c.shared_secret = Some(SHARED_SECRET.into()))
}

fn allowed(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/v4/internal/allowed")
        .header("content-type", "application/json")
        .header("gitlab-shared-secret", STANDARD.encode(SHARED_SECRET))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[async_std::test]
async fn info_refs() {
    let (status, _, body) = send(
        router(|_| {}),
        get("/group/public.git/info/refs?service=git-upload-pack", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["GL_ID"], Value::Null);
    assert_eq!(body["GL_REPOSITORY"], "project-2");
    assert_eq!(body["GL_PROTOCOL"], "http");

    let (status, _, body) = send(
        router(|_| {}),
        get(
            "/group/private.git/info/refs?service=git-receive-pack",
            Some(basic("dev", "dev-password")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["GL_ID"], "user-1");
    assert_eq!(body["GL_USERNAME"], "dev");

    let (status, _, body) = send(router(|_| {}), get("/group/public.git/info/refs", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body,
        b"The command you're trying to execute is not allowed.".to_vec()
    );
}

#[async_std::test]
async fn challenges() {
    let (status, challenge, body) = send(
        router(|_| {}),
        get("/group/private.git/info/refs?service=git-upload-pack", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(challenge.as_deref(), Some(r#"Basic realm="GitLab""#));
    assert_eq!(body, b"HTTP Basic: Access denied\n".to_vec());

    let (_, challenge, _) = send(
        router(|c| c.kerberos.enabled = true),
        get(
            "/group/private.git/info/refs?service=git-upload-pack",
            Some(basic("dev", "wrong")),
        ),
    )
    .await;
    assert_eq!(challenge.as_deref(), Some(r#"Basic realm="GitLab", Negotiate"#));

    let (status, challenge, body) = send(
        router(|_| {}),
        get(
            "/group/private.git/info/refs?service=git-upload-pack",
            Some(basic("secure", "secure-password")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(challenge, None);
    let body = String::from_utf8(body).unwrap();
    assert!(body.starts_with("HTTP Basic: Access denied\nYou must use a personal access token"));
    assert!(body.ends_with("http://localhost/-/profile/personal_access_tokens"));
}

#[async_std::test]
async fn git_denials() {
    let req = Request::builder()
        .method(Method::POST)
        .uri("/group/private.git/git-receive-pack")
        .header(AUTHORIZATION, basic("guest", "guest-password"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(router(|_| {}), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, b"You are not allowed to push code to this project.".to_vec());

    let (status, _, body) = send(
        router(|_| {}),
        get(
            "/group/old-name.git/info/refs?service=git-upload-pack",
            Some(basic("dev", "dev-password")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = String::from_utf8(body).unwrap();
    assert!(body.starts_with("Project 'group/old-name' was moved to 'group/private'."));
    assert!(body.contains("git remote set-url origin http://localhost/group/private.git"));

    let (status, _, _) = send(
        router(|c| c.git.protocols = [gitgate_type::Protocol::Ssh].into_iter().collect()),
        get(
            "/group/private.git/info/refs?service=git-upload-pack",
            Some(basic("dev", "dev-password")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[async_std::test]
async fn routes() {
    let (status, _, _) = send(router(|_| {}), get("/group/public", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(router(|_| {}), get("/group/public.git/git-upload-pack", None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _, _) = send(router(|_| {}), get("/api/v4/internal/allowed", None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _, _) = send(router(|_| {}), get("/-bad/path.git/info/refs", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[async_std::test]
async fn internal_allowed() {
    let (status, _, body) = send(
        internal(),
        allowed(json!({
            "action": "git-upload-pack",
            "key_id": 11,
            "project": "group/private",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], true);
    assert_eq!(body["gl_id"], "key-11");
    assert_eq!(body["gl_username"], "dev");
    assert_eq!(body["gl_repository"], "project-1");

    let (status, _, body) = send(
        internal(),
        allowed(json!({
            "action": "git-receive-pack",
            "username": "guest",
            "project": "group/private",
            "changes": format!("{} {} refs/heads/main", "0".repeat(40), "a".repeat(40)),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], false);
    assert_eq!(body["message"], "You are not allowed to push code to this project.");

    let (status, _, _) = send(
        internal(),
        allowed(json!({
            "action": "git-upload-pack",
            "user_id": 42,
            "project": "group/private",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = send(
        internal(),
        allowed(json!({
            "action": "git-upload-pack",
            "username": "guest",
            "project": "group/missing",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body["message"],
        "The project you were looking for could not be found or you don't have permission to view it."
    );
}

#[async_std::test]
async fn internal_shared_secret() {
    let body = json!({ "action": "git-upload-pack", "key_id": 11, "project": "group/private" });

    let (status, _, res) = send(router(|_| {}), allowed(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let res: Value = serde_json::from_slice(&res).unwrap();
    assert_eq!(res["message"], "401 Unauthorized");

    let mut req = allowed(body.clone());
    let _ = req.headers_mut().remove("gitlab-shared-secret");
    let (status, _, _) = send(internal(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut req = allowed(body.clone());
    let _ = req.headers_mut().insert(
        "gitlab-shared-secret",
        STANDARD.encode("wrong").parse().unwrap(),
    );
    let (status, _, _) = send(internal(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(internal(), allowed(body)).await;
    assert_eq!(status, StatusCode::OK);
}

#[async_std::test]
async fn current_user() {
    let req = Request::builder()
        .uri("/api/v4/user")
        .header("private-token", "glpat-profile")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(router(|_| {}), req).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["id"], 1);
    assert_eq!(body["username"], "dev");

    let (status, _, _) = send(router(|_| {}), get("/api/v4/user", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(router(|_| {}), get("/api/v4/user?private_token=unknown", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
