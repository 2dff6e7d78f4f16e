//! Integration tests for dynamic partitioning over the redb partition map store.

#[cfg(test)]
mod tests {
    use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
    use redb_partition_router::store::{PartitionEntry, StoreResult};
    use redb_partition_router::{
        ConnectionDescriptor, DynamicPartitionRouter, Error, PartitionKey, PartitionKind,
        PartitionMapStore, PartitionNumber, PartitionRouter, RedbPartitionMapStore, StoreError,
        UnitOfWork,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::NamedTempFile;
    use uuid::Uuid;

    const ORDERS: TableDefinition<u64, &str> = TableDefinition::new("orders");

    fn descriptor(name: &str) -> ConnectionDescriptor {
        ConnectionDescriptor::new("memory", format!("db={}", name)).unwrap()
    }

    /// Counts auto-assign lookups that reach the wrapped store.
    struct CountingStore {
        inner: RedbPartitionMapStore,
        lookups: AtomicUsize,
    }

    impl PartitionMapStore for CountingStore {
        fn load_all_partitions(&self, uow: UnitOfWork) -> StoreResult<Vec<PartitionEntry>> {
            self.inner.load_all_partitions(uow)
        }

        fn get_or_auto_assign_partition(
            &self,
            key: &PartitionKey,
            uow: UnitOfWork,
        ) -> StoreResult<PartitionNumber> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            // Widen the window in which racing callers would reach the store.
            thread::sleep(std::time::Duration::from_millis(20));
            self.inner.get_or_auto_assign_partition(key, uow)
        }

        fn connection_descriptor(
            &self,
            partition: PartitionNumber,
            uow: UnitOfWork,
        ) -> StoreResult<ConnectionDescriptor> {
            self.inner.connection_descriptor(partition, uow)
        }

        fn add_partition(
            &self,
            number: PartitionNumber,
            descriptor: &ConnectionDescriptor,
            kind: PartitionKind,
            uow: UnitOfWork,
        ) -> StoreResult<()> {
            self.inner.add_partition(number, descriptor, kind, uow)
        }

        fn add_key_to_manual_partition(
            &self,
            number: PartitionNumber,
            key: &PartitionKey,
            uow: UnitOfWork,
        ) -> StoreResult<()> {
            self.inner.add_key_to_manual_partition(number, key, uow)
        }
    }

    #[test]
    fn test_concurrent_first_lookup_hits_store_once() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = Arc::new(CountingStore {
            inner: RedbPartitionMapStore::create(temp_file.path()).unwrap(),
            lookups: AtomicUsize::new(0),
        });
        let router = Arc::new(DynamicPartitionRouter::new(store.clone()));
        for number in 0..3 {
            router
                .add_new_auto_assign_partition(number, Some(&descriptor(&format!("p{}", number))))
                .unwrap();
        }

        let key = PartitionKey::from(Uuid::new_v4());
        let threads = 50;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let router = Arc::clone(&router);
                let barrier = Arc::clone(&barrier);
                let key = key.clone();
                thread::spawn(move || {
                    barrier.wait();
                    router.partition_for(&key).unwrap()
                })
            })
            .collect();

        let results: Vec<PartitionNumber> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|&partition| partition == results[0]));
        assert_eq!(store.inner.assigned_partition(&key).unwrap(), Some(results[0]));
    }

    #[test]
    fn test_manual_partitions_never_receive_auto_assigned_keys() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = Arc::new(RedbPartitionMapStore::create(temp_file.path()).unwrap());
        let router = DynamicPartitionRouter::new(store.clone());

        router.add_new_manual_partition(0, Some(&descriptor("vip"))).unwrap();
        router.add_new_auto_assign_partition(1, Some(&descriptor("a"))).unwrap();
        router.add_new_auto_assign_partition(2, Some(&descriptor("b"))).unwrap();

        for _ in 0..100 {
            let key = PartitionKey::from(Uuid::new_v4());
            assert_ne!(router.partition_for(&key).unwrap(), 0);
        }
        assert_eq!(store.key_count(0).unwrap(), 0);
        assert_eq!(store.key_count(1).unwrap(), 50);
        assert_eq!(store.key_count(2).unwrap(), 50);

        let vip = PartitionKey::from("vip-tenant");
        router.add_key_to_manual_partition(0, &vip).unwrap();
        assert_eq!(router.partition_for(&vip).unwrap(), 0);
        assert_eq!(router.resolve(&vip).unwrap(), descriptor("vip"));
    }

    #[test]
    fn test_manual_path_rejects_auto_assign_partition() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = Arc::new(RedbPartitionMapStore::create(temp_file.path()).unwrap());
        let router = DynamicPartitionRouter::new(store);
        router.add_new_auto_assign_partition(1, Some(&descriptor("a"))).unwrap();

        let err = router
            .add_key_to_manual_partition(1, &PartitionKey::Int(5))
            .unwrap_err();
        match err {
            Error::Partition { operation, source } => {
                assert_eq!(operation, "add_key_to_manual_partition");
                assert!(matches!(source, StoreError::NotManualPartition(1)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_arguments_name_their_parameter() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = Arc::new(RedbPartitionMapStore::create(temp_file.path()).unwrap());
        let router = DynamicPartitionRouter::new(store.clone());

        let err = router
            .add_new_manual_partition(-1, Some(&descriptor("a")))
            .unwrap_err();
        assert_eq!(err.parameter(), Some("number"));

        let err = router.add_new_auto_assign_partition(-1, Some(&descriptor("a"))).unwrap_err();
        assert_eq!(err.parameter(), Some("number"));

        let err = router.add_new_manual_partition(0, None).unwrap_err();
        assert_eq!(err.parameter(), Some("descriptor"));

        let err = router.add_new_auto_assign_partition(0, None).unwrap_err();
        assert_eq!(err.parameter(), Some("descriptor"));

        let err = router
            .add_key_to_manual_partition(-1, &PartitionKey::Int(1))
            .unwrap_err();
        assert_eq!(err.parameter(), Some("number"));

        assert!(store.partitions().unwrap().is_empty());
    }

    #[test]
    fn test_assignment_survives_aborted_caller_transaction() {
        let map_file = NamedTempFile::new().unwrap();
        let app_file = NamedTempFile::new().unwrap();
        let app_db = Database::create(app_file.path()).unwrap();
        {
            let txn = app_db.begin_write().unwrap();
            txn.open_table(ORDERS).unwrap();
            txn.commit().unwrap();
        }

        let key = PartitionKey::from(Uuid::new_v4());
        let assigned = {
            let store = Arc::new(RedbPartitionMapStore::create(map_file.path()).unwrap());
            let router = DynamicPartitionRouter::new(store.clone());
            router.add_new_auto_assign_partition(4, Some(&descriptor("e"))).unwrap();

            let app_txn = app_db.begin_write().unwrap();
            let assigned = {
                let mut orders = app_txn.open_table(ORDERS).unwrap();
                orders.insert(1, "pending").unwrap();
                router.partition_for(&key).unwrap()
            };
            app_txn.abort().unwrap();
            assigned
        };

        let read_txn = app_db.begin_read().unwrap();
        let orders = read_txn.open_table(ORDERS).unwrap();
        assert!(orders.get(1).unwrap().is_none());

        let reopened = RedbPartitionMapStore::create(map_file.path()).unwrap();
        assert_eq!(assigned, 4);
        assert_eq!(reopened.assigned_partition(&key).unwrap(), Some(4));
    }
}
