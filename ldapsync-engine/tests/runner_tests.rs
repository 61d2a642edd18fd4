use async_trait::async_trait;
use ldapsync_artifact::ArtifactShape;
use ldapsync_delivery::{
    DeliveryError, DeliveryPolicy, DeliveryResult, FileTransfer, HttpConfig, HttpCredentials,
    HttpDelivery, HttpDestination, OutcomeStatus, SftpDestination, SYNC_PATH, PROBE_PATH,
};
use ldapsync_directory::{DirectoryError, MemoryEntries, PagingMode};
use ldapsync_engine::{EngineError, Settings, SftpSettings, SyncRunner, WebSettings};
use ldapsync_types::DirectoryEntry;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records uploads in memory; hosts in `down` refuse the connection.
#[derive(Default)]
struct RecordingTransfer {
    down: HashSet<String>,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingTransfer {
    fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileTransfer for RecordingTransfer {
    async fn upload(&self, destination: &SftpDestination, local: &Path) -> DeliveryResult<String> {
        if self.down.contains(&destination.host) {
            return Err(DeliveryError::Connect {
                target: destination.target(),
                reason: "connection refused".to_string(),
            });
        }
        let remote = destination.remote_path_for(local)?;
        self.uploads
            .lock()
            .unwrap()
            .push((destination.host.clone(), fs::read(local)?));
        Ok(remote)
    }
}

fn user(n: usize) -> DirectoryEntry {
    DirectoryEntry::new(format!("CN=user{n},OU=Staff,DC=example,DC=com"))
        .with_attribute("sAMAccountName", format!("user{n}"))
        .with_attribute("mail", format!("user{n}@example.com"))
        .with_attribute("memberOf", vec!["staff", "vpn"])
}

fn users(count: usize) -> MemoryEntries {
    MemoryEntries::new((0..count).map(user))
}

fn settings(root: &Path) -> Settings {
    let mut settings = Settings {
        backup_dir: root.join("backup"),
        log_dir: root.join("logs"),
        sftp: SftpSettings {
            destinations: SftpDestination::from_hosts(["prod", "dev"], 22, "deploy", "pw", "/srv/ldap"),
            ..Default::default()
        },
        ..Default::default()
    };
    settings.directory.search_base = "DC=example,DC=com".to_string();
    settings.directory.attributes = ["sAMAccountName", "mail", "memberOf", "department"]
        .iter()
        .map(|a| a.to_string())
        .collect();
    settings
}

fn http() -> HttpDelivery {
    let config = HttpConfig {
        timeout_secs: 5,
        connect_timeout_secs: 2,
    };
    let credentials = HttpCredentials {
        username: "sync".to_string(),
        password: "pw".to_string(),
    };
    HttpDelivery::new(credentials, &config).unwrap()
}

fn web(settings: &mut Settings, servers: &[&MockServer]) {
    settings.web = WebSettings {
        destinations: servers.iter().map(|s| HttpDestination::new(s.uri())).collect(),
        ..Default::default()
    };
}

async fn page_sizes(server: &MockServer) -> Vec<usize> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == SYNC_PATH)
        .map(|r| serde_json::from_slice::<Vec<Value>>(&r.body).unwrap().len())
        .collect()
}

// ── File sync ───────────────────────────────────────────────────

#[tokio::test]
async fn sync_files_writes_formatted_artifact_and_uploads_it() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());
    let transfer = RecordingTransfer::default();

    let summary = SyncRunner::new(&settings)
        .sync_files(&mut users(3), &transfer)
        .await
        .unwrap();

    assert_eq!(summary.artifact.records, 3);
    assert!(summary.report.is_success());

    let text = fs::read_to_string(&summary.artifact.path).unwrap();
    let parsed: Vec<Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(
        parsed[0],
        json!({
            "sAMAccountName": "user0",
            "mail": "user0@example.com",
            "memberOf": "staff|vpn",
            "department": null
        })
    );
    assert!(text.find("\"sAMAccountName\"").unwrap() < text.find("\"department\"").unwrap());

    let uploads = transfer.uploads();
    let hosts: Vec<&str> = uploads.iter().map(|(h, _)| h.as_str()).collect();
    assert_eq!(hosts, vec!["prod", "dev"]);
    assert!(uploads.iter().all(|(_, bytes)| bytes == text.as_bytes()));
}

#[tokio::test]
async fn sync_files_clears_previous_backups() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());
    fs::create_dir_all(&settings.backup_dir).unwrap();
    fs::write(settings.backup_dir.join("20200101_000000_000.json"), "[]").unwrap();

    let summary = SyncRunner::new(&settings)
        .sync_files(&mut users(1), &RecordingTransfer::default())
        .await
        .unwrap();

    let remaining: Vec<_> = fs::read_dir(&settings.backup_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(remaining, vec![summary.artifact.path]);
}

#[tokio::test]
async fn sync_files_with_no_entries_uploads_empty_array() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());
    let transfer = RecordingTransfer::default();

    let summary = SyncRunner::new(&settings)
        .sync_files(&mut users(0), &transfer)
        .await
        .unwrap();

    let parsed: Vec<Value> = serde_json::from_slice(&fs::read(&summary.artifact.path).unwrap()).unwrap();
    assert!(parsed.is_empty());
    assert_eq!(transfer.uploads().len(), 2);
}

#[tokio::test]
async fn sync_files_raw_shape_keeps_attribute_values() {
    let tmp = tempfile::tempdir().unwrap();
    let mut settings = settings(tmp.path());
    settings.shape = ArtifactShape::Raw;

    let summary = SyncRunner::new(&settings)
        .sync_files(&mut users(1), &RecordingTransfer::default())
        .await
        .unwrap();

    let parsed: Vec<Value> = serde_json::from_slice(&fs::read(&summary.artifact.path).unwrap()).unwrap();
    assert_eq!(
        parsed[0],
        json!({
            "sAMAccountName": "user0",
            "mail": "user0@example.com",
            "memberOf": ["staff", "vpn"]
        })
    );
}

#[tokio::test]
async fn search_failure_aborts_before_delivery() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());
    let transfer = RecordingTransfer::default();
    let mut entries = MemoryEntries::failing_after((0..2).map(user), "size limit exceeded");

    let err = SyncRunner::new(&settings)
        .sync_files(&mut entries, &transfer)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Directory(DirectoryError::SearchFailed(_))
    ));
    assert!(transfer.uploads().is_empty());
    assert_eq!(fs::read_dir(&settings.backup_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn fail_fast_summary_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mut settings = settings(tmp.path());
    settings.sftp.policy = DeliveryPolicy::FailFast;
    let transfer = RecordingTransfer {
        down: HashSet::from(["prod".to_string()]),
        ..Default::default()
    };

    let summary = SyncRunner::new(&settings)
        .sync_files(&mut users(1), &transfer)
        .await
        .unwrap();

    assert_eq!(summary.report.outcomes()[1].status, OutcomeStatus::Skipped);
    assert!(transfer.uploads().is_empty());
    assert!(matches!(
        summary.into_result(),
        Err(EngineError::Delivery(DeliveryError::Incomplete { failed: 2, total: 2 }))
    ));
}

#[tokio::test]
async fn best_effort_uploads_to_healthy_destinations() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());
    let transfer = RecordingTransfer {
        down: HashSet::from(["prod".to_string()]),
        ..Default::default()
    };

    let summary = SyncRunner::new(&settings)
        .sync_files(&mut users(1), &transfer)
        .await
        .unwrap();

    assert_eq!(summary.report.attempted(), 2);
    assert_eq!(transfer.uploads().len(), 1);
    assert!(summary.into_result().is_err());
}

// ── Web sync ────────────────────────────────────────────────────

#[tokio::test]
async fn sync_web_pages_every_destination_despite_failures() {
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SYNC_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&failing)
        .await;
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SYNC_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&healthy)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut settings = settings(tmp.path());
    settings.directory.page_size = 1000;
    web(&mut settings, &[&failing, &healthy]);

    let summary = SyncRunner::new(&settings)
        .sync_web(&mut users(1500), &http())
        .await
        .unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.records, 1500);
    assert_eq!(page_sizes(&healthy).await, vec![1000, 500]);
    assert_eq!(page_sizes(&failing).await, vec![1000, 500]);

    let failing_summary = &summary.destinations[0];
    assert_eq!(failing_summary.pages_delivered, 0);
    assert_eq!(failing_summary.pages_failed, 2);
    assert_eq!(failing_summary.last_status, Some(500));

    let healthy_summary = &summary.destinations[1];
    assert_eq!(healthy_summary.pages_delivered, 2);
    assert_eq!(healthy_summary.last_status, Some(200));

    assert!(!summary.is_success());
    assert!(matches!(
        summary.into_result(),
        Err(EngineError::Delivery(DeliveryError::Incomplete { failed: 1, total: 2 }))
    ));
}

#[tokio::test]
async fn sync_web_buffered_posts_one_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SYNC_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut settings = settings(tmp.path());
    settings.directory.page_size = 10;
    settings.paging = PagingMode::Buffered;
    web(&mut settings, &[&server]);

    let summary = SyncRunner::new(&settings)
        .sync_web(&mut users(25), &http())
        .await
        .unwrap();

    assert_eq!(summary.pages, 1);
    assert_eq!(page_sizes(&server).await, vec![25]);
    assert!(summary.is_success());
}

#[tokio::test]
async fn sync_web_buffered_empty_result_posts_empty_array() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SYNC_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut settings = settings(tmp.path());
    settings.paging = PagingMode::Buffered;
    web(&mut settings, &[&server]);

    let summary = SyncRunner::new(&settings)
        .sync_web(&mut users(0), &http())
        .await
        .unwrap();

    assert_eq!(summary.pages, 1);
    assert_eq!(page_sizes(&server).await, vec![0]);
}

#[tokio::test]
async fn sync_web_streaming_empty_result_posts_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SYNC_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut settings = settings(tmp.path());
    web(&mut settings, &[&server]);

    let summary = SyncRunner::new(&settings)
        .sync_web(&mut users(0), &http())
        .await
        .unwrap();

    assert_eq!(summary.pages, 0);
    assert!(summary.is_success());
    assert_eq!(summary.destinations[0].last_status, None);
}

// ── Probe ───────────────────────────────────────────────────────

#[tokio::test]
async fn probe_counts_unreachable_destinations() {
    let up = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PROBE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&up)
        .await;
    let missing = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PROBE_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&missing)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut settings = settings(tmp.path());
    web(&mut settings, &[&up, &missing]);

    let summary = SyncRunner::new(&settings).probe(&http()).await;

    assert_eq!(summary.reachable(), 1);
    assert!(!settings.backup_dir.exists());
    assert!(matches!(
        summary.into_result(),
        Err(EngineError::Unreachable { unreachable: 1, total: 2 })
    ));
}
