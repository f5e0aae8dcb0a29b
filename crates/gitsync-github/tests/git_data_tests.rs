use gitsync::{Credential, GitRemote, ObjectId, RemoteEntry, RepoTarget, TreeChange};
use gitsync_github::{GitHubClient, GitHubClientConfig};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HEAD: &str = "1111111111111111111111111111111111111111";
const TREE: &str = "2222222222222222222222222222222222222222";
const BLOB: &str = "ce013625030ba8dba906f756967f9e9ca394464a";
const NEW_COMMIT: &str = "3333333333333333333333333333333333333333";

fn client_for(server: &MockServer) -> GitHubClient {
    GitHubClient::new(GitHubClientConfig {
        api_base_url: Some(server.uri()),
        user_agent: "gitsync-tests".into(),
    })
}

fn target() -> RepoTarget {
    RepoTarget {
        owner: "octo".into(),
        repo: "notes".into(),
        credential: Credential::new("ghp_test"),
    }
}

fn id(hex: &str) -> ObjectId {
    ObjectId::parse(hex).unwrap()
}

#[tokio::test]
async fn requests_carry_github_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/notes"))
        .and(header("Authorization", "Bearer ghp_test"))
        .and(header("Accept", "application/vnd.github+json"))
        .and(header("X-GitHub-Api-Version", "2022-11-28"))
        .and(header("User-Agent", "gitsync-tests"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "default_branch": "trunk", "private": true })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let info = client_for(&server).repository(&target()).await.unwrap();

    assert_eq!(info.default_branch, "trunk");
    assert!(info.private);
}

#[tokio::test]
async fn rejected_credential_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/notes"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).repository(&target()).await.unwrap_err();

    assert!(err.is_auth());
    assert!(err.to_string().contains("Bad credentials"), "{err}");
}

#[tokio::test]
async fn branch_head_reads_ref() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/notes/git/ref/heads/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ref": "refs/heads/main",
            "object": { "sha": HEAD, "type": "commit" }
        })))
        .mount(&server)
        .await;

    let head = client_for(&server)
        .branch_head(&target(), "main")
        .await
        .unwrap();

    assert_eq!(head.as_str(), HEAD);
}

#[tokio::test]
async fn missing_branch_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/notes/git/ref/heads/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .branch_head(&target(), "gone")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn tree_lists_blobs_only() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/repos/octo/notes/git/trees/{HEAD}")))
        .and(query_param("recursive", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": TREE,
            "truncated": false,
            "tree": [
                { "path": "docs", "mode": "040000", "type": "tree", "sha": TREE },
                { "path": "docs/a.md", "mode": "100644", "type": "blob", "sha": BLOB,
                  "url": format!("{}/repos/octo/notes/git/blobs/{BLOB}", server.uri()) },
                { "path": "run.sh", "mode": "100755", "type": "blob", "sha": BLOB },
                { "path": "vendor/lib", "mode": "160000", "type": "commit", "sha": HEAD }
            ]
        })))
        .mount(&server)
        .await;

    let tree = client_for(&server).tree(&target(), &id(HEAD)).await.unwrap();

    assert_eq!(tree.id.as_ref().map(ObjectId::as_str), Some(TREE));
    assert_eq!(
        tree.entries.keys().collect::<Vec<_>>(),
        vec!["docs/a.md", "run.sh"]
    );
    assert_eq!(tree.get("run.sh").unwrap().mode, "100755");
    assert!(tree.get("run.sh").unwrap().url.is_empty());
    assert!(!tree.truncated);
}

#[tokio::test]
async fn truncated_tree_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/repos/octo/notes/git/trees/{HEAD}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": TREE,
            "truncated": true,
            "tree": [{ "path": "a.md", "mode": "100644", "type": "blob", "sha": BLOB }]
        })))
        .mount(&server)
        .await;

    let tree = client_for(&server).tree(&target(), &id(HEAD)).await.unwrap();

    assert!(tree.truncated);
    assert_eq!(tree.entries.len(), 1);
}

#[tokio::test]
async fn blob_follows_api_url() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/repos/octo/notes/git/blobs/{BLOB}")))
        .and(header("Authorization", "Bearer ghp_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": BLOB,
            "encoding": "base64",
            "content": "aGVs\nbG8K\n"
        })))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let listed = RemoteEntry {
        id: id(BLOB),
        mode: "100644".into(),
        url: format!("{}/repos/octo/notes/git/blobs/{BLOB}", server.uri()),
    };
    let foreign = RemoteEntry {
        url: "https://elsewhere.example/blob".into(),
        ..listed.clone()
    };
    let lookalike = RemoteEntry {
        url: format!("{}.elsewhere.example/blob", server.uri()),
        ..listed.clone()
    };

    assert_eq!(client.blob(&target(), &listed).await.unwrap(), b"hello\n");
    // A URL off the API host is never sent the credential.
    assert_eq!(client.blob(&target(), &foreign).await.unwrap(), b"hello\n");
    assert_eq!(client.blob(&target(), &lookalike).await.unwrap(), b"hello\n");
}

#[tokio::test]
async fn create_blob_posts_base64() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/octo/notes/git/blobs"))
        .and(body_json(json!({ "content": "aGVsbG8K", "encoding": "base64" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": BLOB })))
        .expect(1)
        .mount(&server)
        .await;

    let blob = client_for(&server)
        .create_blob(&target(), b"hello\n")
        .await
        .unwrap();

    assert_eq!(blob.as_str(), BLOB);
}

#[tokio::test]
async fn create_tree_sends_null_sha_for_deletions() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/octo/notes/git/trees"))
        .and(body_json(json!({
            "base_tree": TREE,
            "tree": [
                { "path": "a.md", "mode": "100644", "type": "blob", "sha": BLOB },
                { "path": "old.md", "mode": "100644", "type": "blob", "sha": null }
            ]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": TREE })))
        .expect(1)
        .mount(&server)
        .await;

    let changes = vec![
        TreeChange {
            path: "a.md".into(),
            mode: "100644".into(),
            id: Some(id(BLOB)),
        },
        TreeChange {
            path: "old.md".into(),
            mode: "100644".into(),
            id: None,
        },
    ];

    let tree = client_for(&server)
        .create_tree(&target(), Some(&id(TREE)), &changes)
        .await
        .unwrap();

    assert_eq!(tree.as_str(), TREE);
}

#[tokio::test]
async fn create_tree_without_base_omits_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/octo/notes/git/trees"))
        .and(body_json(json!({
            "tree": [{ "path": "a.md", "mode": "100644", "type": "blob", "sha": BLOB }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": TREE })))
        .expect(1)
        .mount(&server)
        .await;

    let changes = [TreeChange {
        path: "a.md".into(),
        mode: "100644".into(),
        id: Some(id(BLOB)),
    }];

    client_for(&server)
        .create_tree(&target(), None, &changes)
        .await
        .unwrap();
}

#[tokio::test]
async fn create_commit_names_tree_and_parent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/octo/notes/git/commits"))
        .and(body_json(json!({
            "message": "Update notes",
            "tree": TREE,
            "parents": [HEAD]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": NEW_COMMIT })))
        .expect(1)
        .mount(&server)
        .await;

    let commit = client_for(&server)
        .create_commit(&target(), "Update notes", &id(TREE), &[id(HEAD)])
        .await
        .unwrap();

    assert_eq!(commit.as_str(), NEW_COMMIT);
}

#[tokio::test]
async fn update_branch_never_forces() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/repos/octo/notes/git/refs/heads/main"))
        .and(body_json(json!({ "sha": NEW_COMMIT, "force": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ref": "refs/heads/main",
            "object": { "sha": NEW_COMMIT }
        })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .update_branch(&target(), "main", &id(NEW_COMMIT))
        .await
        .unwrap();
}

#[tokio::test]
async fn non_fast_forward_is_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/repos/octo/notes/git/refs/heads/main"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({ "message": "Update is not a fast forward" })),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .update_branch(&target(), "main", &id(NEW_COMMIT))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(err.status(), Some(422));
}

#[tokio::test]
async fn create_branch_posts_full_ref() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/octo/notes/git/refs"))
        .and(body_json(json!({ "ref": "refs/heads/drafts", "sha": NEW_COMMIT })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ref": "refs/heads/drafts",
            "object": { "sha": NEW_COMMIT }
        })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .create_branch(&target(), "drafts", &id(NEW_COMMIT))
        .await
        .unwrap();
}

#[tokio::test]
async fn compare_reads_counts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/repos/octo/notes/compare/{HEAD}...{NEW_COMMIT}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ahead",
            "ahead_by": 3,
            "behind_by": 0
        })))
        .mount(&server)
        .await;

    let comparison = client_for(&server)
        .compare(&target(), &id(HEAD), &id(NEW_COMMIT))
        .await
        .unwrap();

    assert_eq!(comparison.ahead_by, 3);
    assert_eq!(comparison.behind_by, 0);
}

#[tokio::test]
async fn garbage_sha_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/octo/notes/git/blobs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": "not-a-sha" })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_blob(&target(), b"x")
        .await
        .unwrap_err();

    assert!(matches!(err, gitsync::RemoteError::Parse(_)));
}
