//! End-to-end tests for the replica pool against real servers.

use serde_json::json;
use tokio::net::TcpListener;

use hive_client::{ClientError, ReplicaPool, ReplicaStub, Service};
use hive_server::{build_state, start, ServerConfig, ServerHandle};
use hive_store::Database;

/// Boot a replica with its own in-memory database.
async fn boot_replica() -> (String, ServerHandle) {
    let config = ServerConfig {
        port: 0,
        ..Default::default()
    };
    let state = build_state(config, Database::in_memory().unwrap());
    let handle = start(state).await.unwrap();
    let addr = format!("127.0.0.1:{}", handle.port());
    (addr, handle)
}

/// Register a user directly on one replica; returns its token.
async fn register_on(addr: &str, username: &str) -> String {
    let stub = ReplicaStub::new(addr, None);
    let result = stub
        .call(
            "auth.register",
            Some(json!({
                "email": format!("{username}@example.com"),
                "username": username,
                "password": "correct horse",
            })),
        )
        .await
        .unwrap();
    result["token"].as_str().unwrap().to_string()
}

async fn create_task(addr: &str, token: &str, title: &str) {
    let stub = ReplicaStub::new(addr, None);
    stub.call(
        "task.create",
        Some(json!({"token": token, "title": title})),
    )
    .await
    .unwrap();
}

/// An address nothing listens on: bind, note the port, drop the listener.
async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("127.0.0.1:{}", addr.port())
}

#[tokio::test]
async fn pooled_calls_alternate_between_replicas() {
    let (addr_a, handle_a) = boot_replica().await;
    let (addr_b, handle_b) = boot_replica().await;

    let token_a = register_on(&addr_a, "pool").await;
    let token_b = register_on(&addr_b, "pool").await;
    create_task(&addr_a, &token_a, "only one here").await;
    create_task(&addr_b, &token_b, "first of two").await;
    create_task(&addr_b, &token_b, "second of two").await;

    // A holds 1 task, B holds 2; alternating totals prove the rotation.
    let pool = ReplicaPool::new(vec![addr_a.clone(), addr_b], None).unwrap();
    for expected_total in [1, 2, 1, 2] {
        let stub = pool.next(Service::Task);
        let token = if stub.address() == addr_a {
            &token_a
        } else {
            &token_b
        };
        let result = stub
            .call("task.stats", Some(json!({"token": token})))
            .await
            .unwrap();
        assert_eq!(result["total"], expected_total, "addr {}", stub.address());
    }

    handle_a.shutdown().await;
    handle_b.shutdown().await;
}

#[tokio::test]
async fn register_cycle_lands_on_each_replica_once() {
    let (addr_a, handle_a) = boot_replica().await;
    let (addr_b, handle_b) = boot_replica().await;

    let pool = ReplicaPool::new(vec![addr_a, addr_b], None).unwrap();
    let params = || {
        Some(json!({
            "email": "cycle@example.com",
            "username": "cycle",
            "password": "correct horse",
        }))
    };

    // Fresh on each replica in turn, then a conflict once the cycle repeats.
    pool.call(Service::Auth, "auth.register", params())
        .await
        .unwrap();
    pool.call(Service::Auth, "auth.register", params())
        .await
        .unwrap();
    let err = pool
        .call(Service::Auth, "auth.register", params())
        .await
        .unwrap_err();
    assert!(
        matches!(&err, ClientError::Rpc { code, .. } if code == "ALREADY_EXISTS"),
        "got {err:?}"
    );

    handle_a.shutdown().await;
    handle_b.shutdown().await;
}

#[tokio::test]
async fn lane_cursors_do_not_share_position() {
    let (addr_a, handle_a) = boot_replica().await;
    let (addr_b, handle_b) = boot_replica().await;

    let token_a = register_on(&addr_a, "lanes").await;

    let pool = ReplicaPool::new(vec![addr_a, addr_b], None).unwrap();
    // Spin the task lane so its cursor sits on the second replica.
    pool.next(Service::Task);

    // The auth lane still starts at the first replica, which is the only
    // one that knows this token's user.
    let result = pool
        .call(Service::Auth, "auth.validate", Some(json!({"token": token_a})))
        .await
        .unwrap();
    assert_eq!(result["valid"], true);

    handle_a.shutdown().await;
    handle_b.shutdown().await;
}

#[tokio::test]
async fn dead_replica_costs_one_call_and_rotation_moves_on() {
    let (addr_a, handle_a) = boot_replica().await;
    let dead = dead_address().await;

    let token = register_on(&addr_a, "survivor").await;
    let pool = ReplicaPool::new(vec![addr_a, dead.clone()], None).unwrap();

    let ok = pool
        .call(Service::Task, "task.stats", Some(json!({"token": token})))
        .await;
    assert!(ok.is_ok());

    // The dead replica's turn fails; nothing gets retried or evicted.
    let err = pool
        .call(Service::Task, "task.stats", Some(json!({"token": token})))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, ClientError::Connect { addr, .. } if *addr == dead),
        "got {err:?}"
    );

    // Next turn is the live replica again.
    let ok = pool
        .call(Service::Task, "task.stats", Some(json!({"token": token})))
        .await;
    assert!(ok.is_ok());

    handle_a.shutdown().await;
}
