//! HTTP source against an in-process cluster-status server

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use solcloud_topology::{
    CloudRouter, HttpStateSource, ReaderOptions, RoutingPolicy, SnapshotReader, SourceConfig,
    StateSource, TopologyConfig, TopologyError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn cluster_status() -> Value {
    json!({
        "responseHeader": {"status": 0, "QTime": 2},
        "cluster": {
            "collections": {
                "collection1": {
                    "pullReplicas": "0",
                    "replicationFactor": "2",
                    "router": {"name": "compositeId"},
                    "maxShardsPerNode": "1",
                    "autoAddReplicas": "false",
                    "nrtReplicas": "2",
                    "tlogReplicas": "0",
                    "shards": {
                        "shard1": {
                            "range": "80000000-7fffffff",
                            "state": "active",
                            "replicas": {
                                "core_node3": {
                                    "core": "collection1_shard1_replica_n1",
                                    "base_url": "http://127.0.0.1:8983/solr",
                                    "node_name": "127.0.0.1:8983_solr",
                                    "state": "active",
                                    "type": "NRT",
                                    "force_set_state": "false",
                                    "leader": "true"
                                },
                                "core_node5": {
                                    "core": "collection1_shard1_replica_n2",
                                    "base_url": "http://127.0.0.1:7574/solr",
                                    "node_name": "127.0.0.1:7574_solr",
                                    "state": "active",
                                    "type": "NRT",
                                    "force_set_state": "false"
                                }
                            },
                            "health": "GREEN"
                        }
                    },
                    "health": "GREEN",
                    "znodeVersion": 11,
                    "aliases": ["products"],
                    "configName": "_default"
                }
            },
            "aliases": {"products": "collection1"},
            "live_nodes": ["127.0.0.1:8983_solr", "127.0.0.1:7574_solr"]
        }
    })
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/solr", addr)
}

async fn fake_member() -> String {
    let app = Router::new().route(
        "/solr/admin/collections",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            if params.get("action").map(String::as_str) != Some("CLUSTERSTATUS")
                || params.get("wt").map(String::as_str) != Some("json")
            {
                return (StatusCode::BAD_REQUEST, Json(json!({"error": "bad request"})));
            }
            (StatusCode::OK, Json(cluster_status()))
        }),
    );
    serve(app).await
}

/// URL of a port nothing listens on
async fn closed_member() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/solr", addr)
}

#[tokio::test]
async fn test_fetch_cluster_status() {
    let url = fake_member().await;
    let source = HttpStateSource::new(vec![url], Duration::from_secs(5)).unwrap();

    let raw = source.fetch_raw_topology().await.unwrap();
    assert_eq!(raw.aliases["products"], "collection1");
    assert_eq!(raw.live_nodes.len(), 2);
    assert!(raw.collections.contains_key("collection1"));
}

#[tokio::test]
async fn test_failover_to_reachable_member() {
    let good = fake_member().await;
    let bad = closed_member().await;
    let source = HttpStateSource::new(vec![bad.clone(), good], Duration::from_secs(5)).unwrap();

    for _ in 0..5 {
        assert!(source.fetch_raw_topology().await.is_ok());
    }
}

/// Member that accepts requests and never answers
async fn hung_member() -> String {
    let app = Router::new().route(
        "/solr/admin/collections",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(cluster_status())
        }),
    );
    serve(app).await
}

#[tokio::test]
async fn test_failover_past_hung_member() {
    let hung = hung_member().await;
    let good = fake_member().await;
    let fetch_timeout = Duration::from_millis(600);

    for _ in 0..10 {
        let source =
            HttpStateSource::new(vec![hung.clone(), good.clone()], fetch_timeout).unwrap();
        let reader = SnapshotReader::new(
            Arc::new(source),
            None,
            ReaderOptions {
                fetch_timeout,
                ..Default::default()
            },
        );

        let state = reader.fetch_cluster_state().await.unwrap();
        assert!(state.collection("collection1").is_some());
    }
}

#[tokio::test]
async fn test_all_members_unreachable() {
    let source = HttpStateSource::new(
        vec![closed_member().await, closed_member().await],
        Duration::from_secs(5),
    )
    .unwrap();

    match source.fetch_raw_topology().await.unwrap_err() {
        TopologyError::BackendUnavailable { target, .. } => {
            assert_eq!(target, source.describe());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_error_status_is_unavailable() {
    let app = Router::new().route(
        "/solr/admin/collections",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let url = serve(app).await;
    let source = HttpStateSource::new(vec![url], Duration::from_secs(5)).unwrap();

    assert_eq!(
        source.fetch_raw_topology().await.unwrap_err().error_type(),
        "backend_unavailable"
    );
}

#[tokio::test]
async fn test_body_without_cluster_is_malformed() {
    let app = Router::new().route(
        "/solr/admin/collections",
        get(|| async { Json(json!({"responseHeader": {"status": 0}})) }),
    );
    let url = serve(app).await;
    let source = HttpStateSource::new(vec![url], Duration::from_secs(5)).unwrap();

    assert_eq!(
        source.fetch_raw_topology().await.unwrap_err().error_type(),
        "malformed_snapshot"
    );
}

#[tokio::test]
async fn test_router_over_http() {
    let url = fake_member().await;
    let config = TopologyConfig {
        source: SourceConfig::http(vec![url]),
        ..Default::default()
    };
    let router = CloudRouter::from_config(&config, None).unwrap();

    let leader = router
        .resolve("products", RoutingPolicy::LeaderOnly)
        .await
        .unwrap();
    assert_eq!(leader.uri(), "http://127.0.0.1:8983/solr/collection1/");

    let by_shard = router.all_active_uris_by_shard("products").await.unwrap();
    assert_eq!(by_shard["shard1"].len(), 2);

    let state = router.collection_state("collection1").await.unwrap();
    assert_eq!(state.replication_factor(), 2);
    assert_eq!(state.shard("shard1").unwrap().leader().unwrap().id, "core_node3");
}
