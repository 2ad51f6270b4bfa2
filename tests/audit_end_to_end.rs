//! Full audit runs against a mock Azure DevOps server

use repo_acl_audit::config::{AppConfig, DevOpsConfig, ReportConfig, ReportFormat};
use repo_acl_audit::error::{AppError, DevOpsError};
use repo_acl_audit::permissions::GIT_REPOSITORIES_NAMESPACE;
use repo_acl_audit::run_audit;
use repo_acl_audit::util::SecretString;
use serde_json::{Value, json};
use std::fs;
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GROUP: &str = "Microsoft.TeamFoundation.Identity;S-1-9-1551374245-1";
const ALICE: &str = "Microsoft.IdentityModel.Claims.ClaimsIdentity;tenant\\alice@contoso.com";
const BOB: &str = "Microsoft.IdentityModel.Claims.ClaimsIdentity;tenant\\bob@contoso.com";

fn config_for(mock_server: &MockServer, output: &str, format: ReportFormat) -> AppConfig {
    AppConfig {
        devops: DevOpsConfig {
            organization_url: mock_server.uri(),
            project: "Fabrikam".to_string(),
            token: Some(SecretString::new("test-token")),
            directory_url: Some(mock_server.uri()),
            max_retries: 0,
            ..Default::default()
        },
        report: ReportConfig {
            output: output.to_string(),
            format,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn acl_response(token: &str, aces: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "count": 1,
        "value": [{ "inheritPermissions": true, "token": token, "acesDictionary": aces }]
    }))
}

async fn mount_project(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/_apis/projects/Fabrikam"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "proj-1",
            "name": "Fabrikam"
        })))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/proj-1/_apis/git/repositories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "value": [{ "id": "repo-1", "name": "web", "defaultBranch": "refs/heads/main" }]
        })))
        .mount(mock_server)
        .await;
}

async fn mount_acls(mock_server: &MockServer) {
    let acl_path = format!("/_apis/accesscontrollists/{}", GIT_REPOSITORIES_NAMESPACE);

    Mock::given(method("GET"))
        .and(path(acl_path.clone()))
        .and(query_param("token", "repoV2/proj-1/repo-1"))
        .respond_with(acl_response(
            "repoV2/proj-1/repo-1",
            json!({ ALICE: {
                "descriptor": ALICE,
                "allow": 6,
                "deny": 0,
                "extendedInfo": { "effectiveAllow": 6, "effectiveDeny": 2 }
            } }),
        ))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(acl_path))
        .and(query_param("token", "repoV2/proj-1"))
        .respond_with(acl_response(
            "repoV2/proj-1",
            json!({
                ALICE: { "descriptor": ALICE, "allow": 0, "deny": 2 },
                GROUP: { "descriptor": GROUP, "allow": 16384, "deny": 0 }
            }),
        ))
        .mount(mock_server)
        .await;
}

async fn mount_directory(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/_apis/identities"))
        .and(query_param("descriptors", GROUP))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "value": [{
                "id": "group-id-1",
                "descriptor": GROUP,
                "providerDisplayName": "[Fabrikam]\\Contributors",
                "isContainer": true
            }]
        })))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/_apis/identities"))
        .and(query_param("identityIds", "group-id-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "value": [{
                "id": "group-id-1",
                "descriptor": GROUP,
                "isContainer": true,
                "members": [BOB]
            }]
        })))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_audit_writes_csv() {
    let mock_server = MockServer::start().await;
    mount_project(&mock_server).await;
    mount_acls(&mock_server).await;
    mount_directory(&mock_server).await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("report.csv");
    let config = config_for(&mock_server, output.to_str().unwrap(), ReportFormat::Csv);

    let outcome = run_audit(&config).await.unwrap();

    assert_eq!(outcome.summary.resources_processed, 1);
    assert_eq!(outcome.summary.failed_scopes, 0);
    // alice: Read + Contribute (repository); group + bob: Contribute to pull requests
    assert_eq!(outcome.summary.records, 4);

    let csv = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("resource_name,resource_id,branch,"));
    assert!(csv.contains("alice@contoso.com,User,Read,Allow,6,0,6,2,Repository,true"));
    assert!(!csv.contains("Read,Deny"));
    assert!(csv.contains("bob@contoso.com (member of [Fabrikam]\\Contributors)"));
    // Project ACL carried no extended info
    assert!(csv.contains("Contribute to pull requests,Allow,16384,0,,,Project,false"));
}

#[tokio::test]
async fn test_audit_writes_json_with_branches() {
    let mock_server = MockServer::start().await;
    mount_project(&mock_server).await;
    mount_acls(&mock_server).await;
    mount_directory(&mock_server).await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("report.json");
    let mut config = config_for(&mock_server, output.to_str().unwrap(), ReportFormat::Json);
    config.report.include_branches = true;

    Mock::given(method("GET"))
        .and(path(format!(
            "/_apis/accesscontrollists/{}",
            GIT_REPOSITORIES_NAMESPACE
        )))
        .and(query_param(
            "token",
            "repoV2/proj-1/repo-1/refs/heads/6d00610069006e00",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 0, "value": [] })))
        .mount(&mock_server)
        .await;

    let outcome = run_audit(&config).await.unwrap();

    // The branch scope has no ACL of its own, so web@main repeats the
    // repository view with nothing direct
    assert_eq!(outcome.summary.resources_processed, 2);
    assert_eq!(outcome.summary.failed_scopes, 0);
    assert_eq!(outcome.summary.records, 8);

    let doc: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(doc["project"], "Fabrikam");
    let records = doc["records"].as_array().unwrap();
    let branch_records: Vec<&Value> = records
        .iter()
        .filter(|r| r["resource_name"] == "web@main")
        .collect();
    assert_eq!(branch_records.len(), 4);
    assert!(branch_records.iter().all(|r| r["is_direct"] == false));
    assert!(branch_records.iter().all(|r| r["branch"] == "main"));
}

#[tokio::test]
async fn test_audit_fails_on_rejected_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/_apis/projects/Fabrikam"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("report.csv");
    let config = config_for(&mock_server, output.to_str().unwrap(), ReportFormat::Csv);

    let result = run_audit(&config).await;

    assert!(matches!(
        result,
        Err(AppError::DevOps(DevOpsError::Unauthorized))
    ));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_audit_survives_unreadable_scope() {
    let mock_server = MockServer::start().await;
    mount_project(&mock_server).await;
    mount_directory(&mock_server).await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/_apis/accesscontrollists/{}",
            GIT_REPOSITORIES_NAMESPACE
        )))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("report.csv");
    let config = config_for(&mock_server, output.to_str().unwrap(), ReportFormat::Csv);

    let outcome = run_audit(&config).await.unwrap();

    assert_eq!(outcome.summary.records, 0);
    assert_eq!(outcome.summary.failed_scopes, 2);
    let csv = fs::read_to_string(&output).unwrap();
    assert_eq!(csv.lines().count(), 1);
}
