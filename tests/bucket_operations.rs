//! Integration tests for bucket value operations.

#[cfg(test)]
mod tests {
    use redb::Database;
    use redb_buckets::{
        Bucket, BucketId, BucketKey, BucketRange, BucketStore, BucketValue, Error, ManualClock,
        RedbEngine, StoreConfig, MAX_INDEX,
    };
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    struct Fixture {
        _file: NamedTempFile,
        store: BucketStore,
    }

    impl Fixture {
        fn new() -> Self {
            let file = NamedTempFile::new().unwrap();
            let db = Database::create(file.path()).unwrap();
            let clock = Arc::new(ManualClock::new(1000));
            let config = StoreConfig::default().with_clock(clock);
            let store = BucketStore::open(db, config).unwrap();
            Self { _file: file, store }
        }

        fn bucket(&self, first: u8) -> Arc<Bucket<RedbEngine>> {
            self.store.create_bucket(id(first), key()).unwrap()
        }
    }

    fn id(first: u8) -> BucketId {
        BucketId::from_parts([first; 14], 0, 0b0011_1111)
    }

    fn key() -> BucketKey {
        BucketKey::new([0x42; 32])
    }

    fn values(bucket: &Bucket<RedbEngine>) -> Vec<(u16, Vec<u8>)> {
        bucket
            .get_values(BucketRange::all())
            .unwrap()
            .into_iter()
            .map(|value| (value.index, value.value))
            .collect()
    }

    fn indices(bucket: &Bucket<RedbEngine>) -> Vec<u16> {
        values(bucket).into_iter().map(|(index, _)| index).collect()
    }

    #[test]
    fn test_put_then_explicit_append() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);

        bucket.put_values(vec![BucketValue::next("a")]).unwrap();
        assert_eq!(bucket.last_index(), 1);

        // Last index is 1, so 3 would leave a gap.
        match bucket.append_values(vec![BucketValue::new(3, "c")]) {
            Err(Error::InvalidAppend { index, last }) => {
                assert_eq!(index, 3);
                assert_eq!(last, 1);
            }
            other => panic!("expected invalid append, got {:?}", other),
        }
        assert_eq!(bucket.last_index(), 1);

        bucket.append_values(vec![BucketValue::new(2, "b")]).unwrap();
        assert_eq!(bucket.last_index(), 2);
        assert_eq!(
            values(&bucket),
            vec![(1, b"a".to_vec()), (2, b"b".to_vec())]
        );
    }

    #[test]
    fn test_failed_append_writes_nothing() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);

        let result = bucket.append_values(vec![
            BucketValue::new(1, "a"),
            BucketValue::new(5, "e"),
            BucketValue::next("z"),
        ]);
        assert!(matches!(result, Err(Error::InvalidAppend { index: 5, .. })));

        // Index 1 stays claimed but its value was never committed.
        assert_eq!(bucket.last_index(), 1);
        assert!(indices(&bucket).is_empty());
    }

    #[test]
    fn test_put_overwrites_and_extends() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);

        bucket
            .put_values(vec![BucketValue::next("a"), BucketValue::next("b")])
            .unwrap();
        bucket
            .put_values(vec![BucketValue::new(1, "A"), BucketValue::new(10, "j")])
            .unwrap();
        assert_eq!(bucket.last_index(), 10);

        bucket.put_values(vec![BucketValue::next("k")]).unwrap();
        assert_eq!(
            values(&bucket),
            vec![
                (1, b"A".to_vec()),
                (2, b"b".to_vec()),
                (10, b"j".to_vec()),
                (11, b"k".to_vec())
            ]
        );
    }

    #[test]
    fn test_put_empty_value_deletes_slot() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);

        bucket
            .put_values(vec![
                BucketValue::next("a"),
                BucketValue::next("b"),
                BucketValue::next("c"),
            ])
            .unwrap();
        bucket.put_values(vec![BucketValue::new(2, "")]).unwrap();

        assert_eq!(indices(&bucket), vec![1, 3]);
        assert!(bucket
            .get_values(BucketRange::new(2, 3))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_append_empty_value_is_stored() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);

        bucket
            .append_values(vec![BucketValue::next("a"), BucketValue::next("")])
            .unwrap();
        assert_eq!(values(&bucket), vec![(1, b"a".to_vec()), (2, Vec::new())]);
    }

    #[test]
    fn test_get_range_is_half_open() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);
        let batch: Vec<BucketValue> = (0..10u8).map(|i| BucketValue::next(vec![i])).collect();
        bucket.append_values(batch).unwrap();

        let read = bucket.get_values(BucketRange::new(3, 6)).unwrap();
        let read: Vec<u16> = read.into_iter().map(|value| value.index).collect();
        assert_eq!(read, vec![3, 4, 5]);

        assert!(bucket.get_values(BucketRange::new(6, 6)).unwrap().is_empty());
        assert!(bucket.get_values(BucketRange::new(8, 2)).unwrap().is_empty());
        assert_eq!(bucket.get_values(BucketRange::new(9, MAX_INDEX)).unwrap().len(), 2);
    }

    #[test]
    fn test_buckets_are_isolated() {
        let fixture = Fixture::new();
        let first = fixture.bucket(1);
        let second = fixture.bucket(2);

        first.append_values(vec![BucketValue::next("a")]).unwrap();
        second
            .append_values(vec![BucketValue::next("x"), BucketValue::next("y")])
            .unwrap();
        first.delete_values(BucketRange::all()).unwrap();

        assert!(indices(&first).is_empty());
        assert_eq!(indices(&second), vec![1, 2]);
    }

    #[test]
    fn test_bucket_full() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);

        bucket
            .put_values(vec![BucketValue::new(MAX_INDEX, "last")])
            .unwrap();
        assert_eq!(bucket.last_index(), MAX_INDEX);

        for _ in 0..3 {
            assert!(matches!(
                bucket.append_values(vec![BucketValue::next("x")]),
                Err(Error::BucketFull)
            ));
            assert_eq!(bucket.last_index(), MAX_INDEX);
        }

        // No partial batch: the explicit write before the failed allocation is dropped too.
        let result = bucket.put_values(vec![BucketValue::new(7, "seven"), BucketValue::next("x")]);
        assert!(matches!(result, Err(Error::BucketFull)));
        assert_eq!(indices(&bucket), vec![MAX_INDEX]);
    }

    #[test]
    fn test_fill_to_the_last_index() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);

        bucket
            .put_values(vec![BucketValue::new(MAX_INDEX - 2, "a")])
            .unwrap();
        bucket
            .append_values(vec![BucketValue::next("b"), BucketValue::next("c")])
            .unwrap();
        assert_eq!(bucket.last_index(), MAX_INDEX);
        assert_eq!(indices(&bucket), vec![MAX_INDEX - 2, MAX_INDEX - 1, MAX_INDEX]);
    }

    #[test]
    fn test_delete_tail_recovers_last_index() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);
        let batch: Vec<BucketValue> = (1..=5u8).map(|i| BucketValue::next(vec![i])).collect();
        bucket.append_values(batch).unwrap();

        bucket.delete_values(BucketRange::new(4, 6)).unwrap();
        assert_eq!(bucket.last_index(), 3);

        bucket.append_values(vec![BucketValue::next("d")]).unwrap();
        assert_eq!(indices(&bucket), vec![1, 2, 3, 4]);
        bucket.append_values(vec![BucketValue::new(5, "e")]).unwrap();
    }

    #[test]
    fn test_delete_middle_keeps_last_index() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);
        let batch: Vec<BucketValue> = (1..=5u8).map(|i| BucketValue::next(vec![i])).collect();
        bucket.append_values(batch).unwrap();

        bucket.delete_values(BucketRange::new(1, 3)).unwrap();
        assert_eq!(bucket.last_index(), 5);
        bucket.append_values(vec![BucketValue::next("f")]).unwrap();
        assert_eq!(indices(&bucket), vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_delete_everything_resets_to_zero() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);
        bucket
            .put_values(vec![BucketValue::new(MAX_INDEX, "z"), BucketValue::new(3, "c")])
            .unwrap();

        bucket.delete_values(BucketRange::all()).unwrap();
        assert_eq!(bucket.last_index(), 0);
        assert!(indices(&bucket).is_empty());

        bucket.append_values(vec![BucketValue::next("a")]).unwrap();
        assert_eq!(indices(&bucket), vec![1]);
    }

    #[test]
    fn test_concurrent_auto_append() {
        const WRITERS: u16 = 16;
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);

        std::thread::scope(|scope| {
            for writer in 0..WRITERS {
                let bucket = &bucket;
                scope.spawn(move || {
                    bucket
                        .append_values(vec![BucketValue::next(writer.to_be_bytes().to_vec())])
                        .unwrap();
                });
            }
        });

        let stored: HashSet<u16> = indices(&bucket).into_iter().collect();
        assert_eq!(stored, (1..=WRITERS).collect::<HashSet<_>>());
        assert_eq!(bucket.last_index(), WRITERS);

        // Every writer's payload landed exactly once.
        let payloads: HashSet<Vec<u8>> = values(&bucket).into_iter().map(|(_, v)| v).collect();
        assert_eq!(payloads.len(), usize::from(WRITERS));
    }

    #[test]
    fn test_concurrent_explicit_append_single_winner() {
        let fixture = Fixture::new();
        let bucket = fixture.bucket(1);
        bucket
            .append_values(vec![BucketValue::next("a"), BucketValue::next("b")])
            .unwrap();

        let results: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8u8)
                .map(|writer| {
                    let bucket = &bucket;
                    scope.spawn(move || {
                        bucket
                            .append_values(vec![BucketValue::new(3, vec![writer])])
                            .is_ok()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(indices(&bucket), vec![1, 2, 3]);
    }

    #[test]
    fn test_permissions_follow_presented_key() {
        let fixture = Fixture::new();
        let public_read = BucketId::from_parts([9; 14], 3, 0b0001_0001);
        let bucket = fixture.store.create_bucket(public_read, key()).unwrap();

        let anonymous = bucket.permissions(None);
        assert!(anonymous.read && !anonymous.write && !anonymous.append);

        let wrong = bucket.permissions(Some(&BucketKey::new([0; 32])));
        assert_eq!(wrong, anonymous);

        let owner = bucket.permissions(Some(&key()));
        assert!(owner.read && owner.write && !owner.append);
        assert_eq!(bucket.lifetime(), 3);
    }
}
