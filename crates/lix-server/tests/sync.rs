use std::sync::Arc;

use lix_sdk::OpenOptions;
use lix_server::{LixServer, RouterTransport, ServerConfig};
use lix_sync::{
    ActorEnvironment, Call, Environment, HostConfig, InProcessEnvironment, PullOutcome,
    PushOutcome, SyncClient, SyncError,
};
use serde_json::json;

async fn client(config: ServerConfig) -> SyncClient {
    let max = config.max_blob_size;
    let server = LixServer::new(config).await.unwrap();
    SyncClient::new(Arc::new(RouterTransport::new(server.router(), max)))
}

async fn label_count(env: &dyn Environment, name: &str) -> i64 {
    let reply = env
        .call(Call::Execute {
            sql: "SELECT count(*) FROM label WHERE name = ?".into(),
            params: vec![json!(name)],
        })
        .await
        .unwrap();
    reply["rows"][0][0].as_i64().unwrap()
}

#[tokio::test]
async fn databases_travel_through_the_server() {
    let client = client(ServerConfig::default()).await;

    let alice = ActorEnvironment::spawn(HostConfig::in_memory());
    alice.open(OpenOptions::new()).await.unwrap();
    alice
        .call(Call::Execute {
            sql: "INSERT INTO label (name) VALUES ('hello')".into(),
            params: vec![],
        })
        .await
        .unwrap();

    let PushOutcome::Created { lix_id } = client.push(&alice).await.unwrap() else {
        panic!("expected a new upload");
    };
    assert!(matches!(
        client.push(&alice).await.unwrap(),
        PushOutcome::AlreadyExists { .. }
    ));

    let bob = InProcessEnvironment::default();
    assert!(matches!(
        client.pull(&bob, &lix_id).await.unwrap(),
        PullOutcome::Created { .. }
    ));
    assert_eq!(label_count(&bob, "hello").await, 1);

    // Pulling into a copy that already has everything changes nothing.
    let PullOutcome::Merged { outcome, .. } = client.pull(&bob, &lix_id).await.unwrap() else {
        panic!("expected a merge");
    };
    assert_eq!(outcome.imported_changes, 0);
    assert_eq!(label_count(&bob, "hello").await, 1);

    alice.close().await.unwrap();
}

#[tokio::test]
async fn disk_backed_server_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        storage_dir: Some(dir.path().to_path_buf()),
        ..ServerConfig::default()
    };

    let env = InProcessEnvironment::default();
    env.open(OpenOptions::new()).await.unwrap();
    let PushOutcome::Created { lix_id } = client(config.clone()).await.push(&env).await.unwrap()
    else {
        panic!("expected a new upload");
    };

    let restarted = client(config).await;
    let copy = InProcessEnvironment::default();
    restarted.pull(&copy, &lix_id).await.unwrap();
    assert!(copy.exists().await.unwrap());
}

#[tokio::test]
async fn missing_databases_are_reported() {
    let client = client(ServerConfig::default()).await;
    let env = InProcessEnvironment::default();
    assert!(matches!(
        client.pull(&env, &lix_sdk::LixId::new("unknown")).await,
        Err(SyncError::NotFound(_))
    ));
}
