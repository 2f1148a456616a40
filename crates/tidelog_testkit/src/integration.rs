//! Cross-crate integration tests for the full engine.
//!
//! The tests here exercise a real file pair end to end: round trips,
//! slice semantics, the durability dichotomy, torn-write recovery and
//! snapshot determinism.

/// Collects every record of a log as `(index, time, payload)` triples.
pub fn read_all(log: &tidelog_core::Log) -> Vec<(u64, i64, Vec<u8>)> {
    let count = log.index().size();
    let mut cursor = log.cursor().expect("failed to open cursor");
    let mut out = Vec::with_capacity(count as usize);
    for k in 0..count {
        let record = if k == 0 {
            cursor.seek(0).expect("seek failed")
        } else {
            cursor.next().expect("next failed")
        };
        out.push((record.index, record.time, record.data.to_vec()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::read_all;
    use crate::crash::{append_garbage, chop_tail, file_len, index_path};
    use crate::fixtures::{nosync_config, sync_config, with_temp_log, TempLog};
    use crate::generators::payload_batch_strategy;
    use proptest::prelude::*;
    use tidelog_core::{
        LogError, FILE_HEADER_SIZE, INDEX_ENTRY_SIZE, RECORD_HEADER_SIZE,
    };

    // S1: create, append five known payloads, read them back.
    #[test]
    fn round_trip_five_records() {
        with_temp_log(nosync_config(), |log| {
            for k in 0u64..5 {
                let written = log.write(&k.to_le_bytes()).unwrap();
                assert_eq!(written, RECORD_HEADER_SIZE + 8);
            }

            let records = read_all(log);
            assert_eq!(records.len(), 5);
            let mut last_time = i64::MIN;
            for (k, (index, time, payload)) in records.into_iter().enumerate() {
                assert_eq!(index, k as u64);
                assert_eq!(payload, (k as u64).to_le_bytes());
                assert!(time >= last_time);
                last_time = time;
            }

            assert_eq!(log.snapshot().size, 176);
        });
    }

    // S2: slice sizing and entry offsets with 25-byte record frames.
    #[test]
    fn slice_semantics() {
        with_temp_log(nosync_config(), |log| {
            for _ in 0..100 {
                log.write(b"x").unwrap();
            }

            let slice = log.index().slice(0, 5).unwrap();
            assert_eq!(slice.len(), 5);
            for k in 0..5 {
                let entry = slice.get(k).unwrap();
                assert_eq!(entry.index, k as u64);
                assert_eq!(entry.offset as u64, (FILE_HEADER_SIZE + k * 25) as u64);
            }

            let clamped = log.index().slice(0, 50_000).unwrap();
            assert_eq!(clamped.len(), 100);

            assert!(matches!(
                log.index().slice(100, 1),
                Err(LogError::SliceOutOfBounds { .. })
            ));
        });
    }

    // Invariant: consecutive entries tile the data file exactly.
    #[test]
    fn entries_tile_the_data_file() {
        with_temp_log(nosync_config(), |log| {
            for len in [0usize, 3, 17, 1, 64, 0, 9] {
                log.write(&vec![0xA5; len]).unwrap();
            }

            let slice = log.index().slice(0, 100).unwrap();
            let mut expected = FILE_HEADER_SIZE as i64;
            let lens = [0usize, 3, 17, 1, 64, 0, 9];
            for (k, len) in lens.iter().enumerate() {
                let entry = slice.get(k).unwrap();
                assert_eq!(entry.offset, expected);
                expected += (RECORD_HEADER_SIZE + len) as i64;
            }
            assert_eq!(log.snapshot().size, expected as u64);
        });
    }

    // S3a: with SyncOnWrite, a fresh reader sees each record as soon as
    // the write returns.
    #[test]
    fn sync_on_write_is_immediately_visible() {
        let mut temp = TempLog::create(sync_config());
        for k in 0..5u64 {
            temp.log().write(&k.to_le_bytes()).unwrap();
            let on_disk = file_len(&temp.path);
            assert_eq!(
                on_disk,
                FILE_HEADER_SIZE as u64 + (k + 1) * (RECORD_HEADER_SIZE as u64 + 8)
            );
        }
        temp.shutdown().unwrap();
    }

    // S3b: with NoSyncOnWrite and buffering, a crash may lose the tail,
    // but the reopened log is a consistent prefix.
    #[test]
    fn crash_with_buffering_leaves_consistent_prefix() {
        let mut temp = TempLog::create(nosync_config().write_buffer(4096));
        for _ in 0..10 {
            temp.log().write(b"p").unwrap();
        }
        temp.crash();

        temp.reopen(nosync_config());
        let survivors = temp.log().index().size();
        assert!(survivors <= 10);

        // Post-recovery consistency: the data file holds exactly the
        // surviving records.
        let frame = (RECORD_HEADER_SIZE + 1) as u64;
        assert_eq!(
            temp.log().snapshot().size,
            FILE_HEADER_SIZE as u64 + survivors * frame
        );
        assert_eq!(read_all(temp.log()).len(), survivors as usize);
        temp.shutdown().unwrap();
    }

    // S3c: a clean close flushes everything regardless of strategy.
    #[test]
    fn close_makes_buffered_records_durable() {
        let mut temp = TempLog::create(nosync_config().write_buffer(4096));
        for _ in 0..10 {
            temp.log().write(b"q").unwrap();
        }
        temp.shutdown().unwrap();

        temp.reopen(nosync_config());
        assert_eq!(temp.log().index().size(), 10);
        temp.shutdown().unwrap();
    }

    // S4: garbage past the last record is truncated at open and the next
    // write lands at the reclaimed offset.
    #[test]
    fn torn_write_is_truncated_on_open() {
        let mut temp = TempLog::create(nosync_config());
        for payload in [&b"aaaa"[..], b"bbbb", b"cccc"] {
            temp.log().write(payload).unwrap();
        }
        temp.shutdown().unwrap();

        append_garbage(&temp.path, &[0xDE; 10]);

        temp.reopen(nosync_config());
        assert_eq!(temp.log().index().size(), 3);

        let frame = (RECORD_HEADER_SIZE + 4) as u64;
        temp.log().write(b"dddd").unwrap();
        let entry = temp.log().index().slice(3, 1).unwrap().get(0).unwrap();
        assert_eq!(entry.offset as u64, FILE_HEADER_SIZE as u64 + 3 * frame);
        temp.shutdown().unwrap();
    }

    // A record cut short at the tail loses its index entry too.
    #[test]
    fn chopped_record_drops_its_entry() {
        let mut temp = TempLog::create(nosync_config());
        for _ in 0..4 {
            temp.log().write(b"stable").unwrap();
        }
        temp.shutdown().unwrap();

        chop_tail(&temp.path, 3);

        temp.reopen(nosync_config());
        assert_eq!(temp.log().index().size(), 3);
        assert_eq!(
            file_len(&index_path(&temp.path)),
            (FILE_HEADER_SIZE + 3 * INDEX_ENTRY_SIZE) as u64
        );
        assert_eq!(read_all(temp.log()).len(), 3);
        temp.shutdown().unwrap();
    }

    // S5: an oversize write changes nothing on either file.
    #[test]
    fn oversize_write_leaves_files_untouched() {
        let mut temp = TempLog::create(nosync_config().max_record_size(1024));
        temp.log().write(&[1u8; 1024]).unwrap();

        let data_len = file_len(&temp.path);
        let idx_len = file_len(&index_path(&temp.path));

        let err = temp.log().write(&[0u8; 1025]).unwrap_err();
        assert!(matches!(err, LogError::RecordTooLarge { size: 1025, .. }));

        assert_eq!(temp.log().index().size(), 1);
        assert_eq!(file_len(&temp.path), data_len);
        assert_eq!(file_len(&index_path(&temp.path)), idx_len);
        temp.shutdown().unwrap();
    }

    // S6: the snapshot hash and size are reproducible across a reopen.
    #[test]
    fn snapshot_is_deterministic_across_reopen() {
        let mut temp = TempLog::create(sync_config());
        for k in 0u64..32 {
            temp.log().write(&(k * 3).to_le_bytes()).unwrap();
        }
        let before = temp.log().snapshot();
        temp.shutdown().unwrap();

        temp.reopen(sync_config());
        let after = temp.log().snapshot();
        assert_eq!(before.size, after.size);
        assert_eq!(before.hash, after.hash);
        temp.shutdown().unwrap();
    }

    // Boundary: empty payloads are legal records.
    #[test]
    fn empty_payload_round_trips() {
        with_temp_log(nosync_config(), |log| {
            assert_eq!(log.write(b"").unwrap(), RECORD_HEADER_SIZE);
            let records = read_all(log);
            assert_eq!(records.len(), 1);
            assert!(records[0].2.is_empty());
        });
    }

    // Boundary: a frame larger than the write buffer is rejected without
    // losing previously buffered records.
    #[test]
    fn buffered_oversize_frame_spares_earlier_records() {
        let capacity = 64;
        let mut temp = TempLog::create(
            nosync_config()
                .write_buffer(capacity)
                .max_record_size(1024),
        );

        temp.log().write(b"aaaa").unwrap();

        // 24-byte header + 41 bytes = 65 > 64 capacity.
        let err = temp.log().write(&[9u8; 41]).unwrap_err();
        assert!(matches!(
            err,
            LogError::BufferTooLarge { len: 65, capacity: 64 }
        ));

        temp.shutdown().unwrap();
        temp.reopen(nosync_config());
        let records = read_all(temp.log());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].2, b"aaaa");
        temp.shutdown().unwrap();
    }

    // TTL is advisory: pipe emits expired records, the predicate flags
    // them.
    #[test]
    fn ttl_is_advisory() {
        with_temp_log(nosync_config().ttl(1), |log| {
            log.write(b"already expired").unwrap();

            let mut cursor = log.cursor().unwrap();
            let record = cursor.seek(0).unwrap();
            let far_future = record.time + 1_000;
            assert!(record.is_expired(far_future, log.header().ttl));
            drop(cursor);

            let mut sink = Vec::new();
            log.pipe(0, 10, &mut sink).unwrap();
            assert_eq!(sink.len(), RECORD_HEADER_SIZE + 15);
        });
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Writing any batch of payloads reads back identically, in
        // order, with dense indices.
        #[test]
        fn arbitrary_batches_round_trip(batch in payload_batch_strategy(24, 512)) {
            with_temp_log(nosync_config(), |log| {
                for payload in &batch {
                    let written = log.write(payload).unwrap();
                    prop_assert_eq!(written, RECORD_HEADER_SIZE + payload.len());
                }

                let records = read_all(log);
                prop_assert_eq!(records.len(), batch.len());
                for (k, (index, _, payload)) in records.iter().enumerate() {
                    prop_assert_eq!(*index, k as u64);
                    prop_assert_eq!(payload, &batch[k]);
                }
                Ok(())
            })?;
        }
    }
}
