use anyhow::Result;
use solcloud_topology::CloudRouter;

/// Show the current cluster snapshot
pub async fn run_status(router: &CloudRouter, json: bool) -> Result<()> {
    let state = router.cluster_state().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(state.as_ref())?);
        return Ok(());
    }

    println!("Cluster Status");
    println!("==============");
    println!("Generation:  {}", state.generation());
    println!("Fetched at:  {}", state.fetched_at().to_rfc3339());
    println!("Collections: {}", state.collections().len());
    println!("Live nodes:  {}", state.live_nodes().len());
    println!();

    for (name, collection) in state.collections() {
        println!(
            "{} (router={}, replicationFactor={}, maxShardsPerNode={}, autoAddReplicas={})",
            name,
            collection.router_name(),
            collection.replication_factor(),
            collection.max_shards_per_node(),
            collection.auto_add_replicas()
        );
        println!(
            "  {:<12} {:<20} {:<12} {:<16} {:<12} {:<8} {}",
            "SHARD", "RANGE", "STATE", "REPLICA", "STATUS", "LEADER", "BASE_URL"
        );
        println!("  {}", "-".repeat(100));
        for (shard_name, shard) in collection.shards() {
            for replica in shard.replicas().values() {
                let live = if state.is_live(&replica.node_name) { "" } else { " (not live)" };
                println!(
                    "  {:<12} {:<20} {:<12} {:<16} {:<12} {:<8} {}{}",
                    shard_name,
                    shard.range(),
                    shard.status().as_str(),
                    replica.id,
                    replica.status.as_str(),
                    if replica.is_leader { "yes" } else { "" },
                    replica.base_url,
                    live
                );
            }
        }
        println!();
    }

    if !state.aliases().is_empty() {
        println!("Aliases");
        for (alias, target) in state.aliases() {
            println!("  {} -> {}", alias, target);
        }
        println!();
    }

    println!("Live nodes");
    for node in state.live_nodes() {
        println!("  {}", node);
    }

    let stale = state.stale_replica_count();
    if stale > 0 {
        println!();
        println!("Warning: {} replica(s) on nodes that are not live", stale);
    }

    Ok(())
}
