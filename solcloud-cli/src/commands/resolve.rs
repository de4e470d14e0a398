use anyhow::Result;
use serde_json::json;
use solcloud_topology::{CloudRouter, RoutingPolicy};

/// Resolve a collection or alias to one endpoint
pub async fn run_resolve(router: &CloudRouter, name: &str, leader: bool, json: bool) -> Result<()> {
    let policy = if leader {
        RoutingPolicy::LeaderOnly
    } else {
        RoutingPolicy::AnyActive
    };
    let endpoint = router.resolve(name, policy).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "name": name,
                "policy": policy,
                "collection": endpoint.collection,
                "uri": endpoint.uri(),
                "scheme": endpoint.scheme,
                "host": endpoint.host,
                "port": endpoint.port_or_default(),
                "path": endpoint.path,
            }))?
        );
    } else {
        println!("{}", endpoint);
    }

    Ok(())
}

/// List the leader URI of every shard
pub async fn run_leaders(router: &CloudRouter, name: &str, json: bool) -> Result<()> {
    let leaders = router.all_shard_leader_uris(name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&leaders)?);
        return Ok(());
    }

    println!("{:<16} {}", "SHARD", "LEADER");
    println!("{}", "-".repeat(60));
    for (shard, uri) in &leaders {
        println!("{:<16} {}", shard, uri);
    }

    Ok(())
}

/// List active replica URIs per shard
pub async fn run_active(router: &CloudRouter, name: &str, json: bool) -> Result<()> {
    let by_shard = router.all_active_uris_by_shard(name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&by_shard)?);
        return Ok(());
    }

    println!("{:<16} {}", "SHARD", "ACTIVE REPLICAS");
    println!("{}", "-".repeat(60));
    for (shard, uris) in &by_shard {
        if uris.is_empty() {
            println!("{:<16} (none)", shard);
        } else {
            println!("{:<16} {}", shard, uris.join(", "));
        }
    }

    Ok(())
}
