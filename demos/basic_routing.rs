//! Example usage of the partition routers.
//!
//! Builds a partition map in a redb file, routes keys through the hash and
//! dynamic strategies, and opens a federation connection against the
//! in-memory provider.

use redb_partition_router::connection::MemoryProvider;
use redb_partition_router::{
    Connection, ConnectionDescriptor, DynamicPartitionRouter, FederationPartitionRouter,
    HashPartitionRouter, PartitionKey, PartitionKind, PartitionMapStore, PartitionProxy,
    PartitionRegistry, PartitionRouter, ProviderRegistry, RedbPartitionMapStore,
    ScopedKeyProvider, UnitOfWork,
};
use std::sync::Arc;
use uuid::Uuid;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;

    // Connections are created through named providers
    let memory = MemoryProvider::new();
    let providers = ProviderRegistry::new();
    providers.register("memory", Arc::new(memory.clone()));
    let providers = Arc::new(providers);

    // Hash partitioning over a fixed table of three shards
    let hash_store = RedbPartitionMapStore::create(dir.path().join("hash_map.redb"))?;
    for (number, name) in ["A", "B", "C"].iter().enumerate() {
        let descriptor = ConnectionDescriptor::new("memory", format!("db={}", name))?;
        hash_store.add_partition(
            number as u32,
            &descriptor,
            PartitionKind::Manual,
            UnitOfWork::RequiresNew,
        )?;
    }
    let hash_router = HashPartitionRouter::load(&hash_store)?;

    println!("Hash routing over {} partitions:", hash_router.partition_count());
    for key in [PartitionKey::Int(1), PartitionKey::Int(2), PartitionKey::from("acme")] {
        println!("  {} -> {}", key, hash_router.resolve(&key)?);
    }

    // Dynamic partitioning with one manual and two auto-assign partitions
    let dynamic_store = Arc::new(RedbPartitionMapStore::create(
        dir.path().join("dynamic_map.redb"),
    )?);
    let dynamic_router = Arc::new(DynamicPartitionRouter::new(dynamic_store.clone()));
    dynamic_router
        .add_new_manual_partition(0, Some(&ConnectionDescriptor::new("memory", "db=vip")?))?;
    dynamic_router
        .add_new_auto_assign_partition(1, Some(&ConnectionDescriptor::new("memory", "db=east")?))?;
    dynamic_router
        .add_new_auto_assign_partition(2, Some(&ConnectionDescriptor::new("memory", "db=west")?))?;

    let vip = PartitionKey::from("big-customer");
    dynamic_router.add_key_to_manual_partition(0, &vip)?;

    println!("\nDynamic routing:");
    println!("  {} -> {}", vip, dynamic_router.resolve(&vip)?);
    for _ in 0..4 {
        let key = PartitionKey::from(Uuid::new_v4());
        println!("  {} -> {}", key, dynamic_router.resolve(&key)?);
    }
    for entry in dynamic_store.partitions()? {
        println!(
            "  partition {} ({:?}) holds {} keys",
            entry.number,
            entry.kind,
            dynamic_store.key_count(entry.number)?
        );
    }

    // The registry starts on a single default connection
    let registry = PartitionRegistry::new(
        ConnectionDescriptor::new("memory", "db=default")?,
        Arc::clone(&providers),
    );
    println!("\nDefault proxy routes to {}", registry.proxy().descriptor()?);

    // Switch to dynamic routing for keys set on the current thread
    registry.set_proxy(Some(Arc::new(PartitionProxy::new(
        Arc::new(ScopedKeyProvider),
        dynamic_router,
        Arc::clone(&providers),
    ))));
    {
        let _scope = ScopedKeyProvider::enter(vip.clone());
        let mut connection = registry.proxy().connection()?;
        connection.open()?;
        connection.execute("SELECT * FROM orders")?;
        println!("Scoped proxy opened {}", connection.descriptor());
    }

    // Federation connections route themselves when opened
    let federation = FederationPartitionRouter::new(
        ConnectionDescriptor::new("memory", "db=federation_root")?,
        "Orders_Federation",
        "customer_id",
    )?;
    let mut connection = federation.connect(&PartitionKey::Int(42), &providers)?;
    connection.open()?;
    connection.execute("SELECT COUNT(*) FROM orders")?;

    println!("\nStatements executed:");
    for executed in memory.statements() {
        println!("  [{}] {}", executed.descriptor, executed.statement);
    }

    Ok(())
}
