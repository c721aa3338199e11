// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! Facade-level tests against the `Instance`/`registry`/`RangeIterator`/
//! `export` surface, rather than a raw `Backend`. Per-adapter
//! CRUD/navigation/TTL coverage already lives in each backend crate's
//! `tests/conformance.rs`.

use kvidxkit::{
    export, import, registry, Direction, Error, ExportFormat, ExportOptions, ImportOptions, Instance, RangeIterator,
    SetCondition,
};
use kvidxkit_testing::tempdir::with_temp_path;

fn open_sqlite(path: &std::path::Path) -> Instance {
    let adapter = registry::find_adapter("sqlite").expect("sqlite adapter compiled in");
    Instance::new(adapter.open(path).expect("open sqlite instance"))
}

#[test]
fn registry_lookup_is_case_insensitive_and_indexable() {
    let by_name = registry::find_adapter("SQLite").unwrap();
    let by_index = registry::adapter_at(0).unwrap();
    assert_eq!(by_name.name, by_index.name);
    assert!(registry::find_adapter("nonexistent").is_err());
    assert!(registry::adapter_at(9999).is_err());
}

#[test]
fn duplicate_key_insert_is_rejected_and_sticks_in_last_error() {
    with_temp_path("s1.kvidx.sqlite3", |path| {
        let mut db = open_sqlite(path);
        db.insert(1, 0, 0, b"first").unwrap();
        let err = db.insert(1, 0, 0, b"second").unwrap_err();
        assert_eq!(err, Error::DuplicateKey);
        // the failed call is reflected by the sticky last-error buffer
        assert_eq!(db.last_error(), Some(Error::DuplicateKey));
        // a subsequent successful call does not clear it
        db.insert(2, 0, 0, b"ok").unwrap();
        assert_eq!(db.last_error(), Some(Error::DuplicateKey));
        db.clear_error();
        assert_eq!(db.last_error(), None);
    });
}

#[test]
fn range_iterator_walks_forward_and_backward_and_seeks() {
    with_temp_path("s2.kvidx.sqlite3", |path| {
        let mut db = open_sqlite(path);
        for key in [2u64, 4, 6, 8, 10] {
            db.insert(key, 0, 0, b"").unwrap();
        }

        let mut forward = RangeIterator::new(&db, 3, 9, Direction::Forward).unwrap();
        let mut seen = Vec::new();
        while forward.next().unwrap() {
            seen.push(forward.key().unwrap());
        }
        assert_eq!(seen, vec![4, 6, 8]);

        let mut backward = RangeIterator::new(&db, 3, 9, Direction::Backward).unwrap();
        let mut seen = Vec::new();
        while backward.next().unwrap() {
            seen.push(backward.key().unwrap());
        }
        assert_eq!(seen, vec![8, 6, 4]);

        let mut cursor = RangeIterator::new(&db, 0, 20, Direction::Forward).unwrap();
        assert!(cursor.seek(6).unwrap());
        assert_eq!(cursor.key(), Some(6));
        assert_eq!(cursor.get().unwrap().unwrap().key, 6);
        cursor.close();
    });
}

#[test]
fn remove_range_respects_inclusivity_flags() {
    with_temp_path("s3.kvidx.sqlite3", |path| {
        let mut db = open_sqlite(path);
        for key in 1..=10u64 {
            db.insert(key, 0, 0, b"").unwrap();
        }
        let removed = db.remove_range(3, 7, false, true).unwrap();
        assert_eq!(removed, 4); // 4,5,6,7
        assert_eq!(db.count_range(1, 10).unwrap(), 6);

        // start > end after exclusivity adjustment is a no-op, not an error
        let removed = db.remove_range(5, 5, true, false).unwrap();
        assert_eq!(removed, 0);
    });
}

#[test]
fn compare_and_swap_and_insert_ex_conditions() {
    with_temp_path("s4.kvidx.sqlite3", |path| {
        let mut db = open_sqlite(path);
        db.insert(1, 0, 0, b"v1").unwrap();

        assert!(db.compare_and_swap(1, b"v1", 1, 1, b"v2").unwrap());
        assert_eq!(db.get(1).unwrap().unwrap().payload.as_slice(), b"v2");

        assert!(!db.compare_and_swap(1, b"stale", 2, 2, b"v3").unwrap());
        assert_eq!(db.get(1).unwrap().unwrap().payload.as_slice(), b"v2");

        db.insert_ex(2, 0, 0, b"only-once", SetCondition::IfNotExists).unwrap();
        let err = db.insert_ex(2, 0, 0, b"again", SetCondition::IfNotExists).unwrap_err();
        assert_eq!(err, Error::ConditionFailed);
    });
}

#[test]
fn ttl_sweep_expires_stale_entries() {
    with_temp_path("s5.kvidx.sqlite3", |path| {
        let mut db = open_sqlite(path);
        db.insert(1, 0, 0, b"sticks-around").unwrap();
        db.insert(2, 0, 0, b"expires-soon").unwrap();
        db.set_expire_at(2, 1).unwrap(); // 1ms since epoch: already in the past

        let swept = db.expire_scan(10).unwrap();
        assert_eq!(swept, 1);
        assert_eq!(db.get(2).unwrap(), None);
        assert!(db.get(1).unwrap().is_some());
    });
}

#[test]
fn binary_export_import_round_trips() {
    with_temp_path("s6-source.kvidx.sqlite3", |source_path| {
        with_temp_path("s6-dest.kvidx.sqlite3", |dest_path| {
            let mut source = open_sqlite(source_path);
            for key in 1..=100u64 {
                let term = key % 10;
                let cmd = key % 5;
                let payload = format!("test-data-{key}");
                source.insert(key, term, cmd, payload.as_bytes()).unwrap();
            }

            let mut buffer = Vec::new();
            let mut progress_calls = 0u64;
            export(&source, &ExportOptions::default(), &mut buffer, |_current, _total| {
                progress_calls += 1;
                true
            })
            .unwrap();
            assert!(progress_calls >= 1);

            let mut dest = open_sqlite(dest_path);
            let imported =
                import(&mut dest, &mut buffer.as_slice(), &ImportOptions::default(), |_, _| true).unwrap();
            assert_eq!(imported, 100);

            for key in 1..=100u64 {
                let expected = format!("test-data-{key}");
                let record = dest.get(key).unwrap().unwrap();
                assert_eq!(record.term, key % 10);
                assert_eq!(record.cmd, key % 5);
                assert_eq!(record.payload.as_slice(), expected.as_bytes());
            }
        });
    });
}

#[test]
fn export_cancellation_propagates_through_progress_callback() {
    with_temp_path("export-cancel.kvidx.sqlite3", |path| {
        let mut db = open_sqlite(path);
        for key in 1..=5u64 {
            db.insert(key, 0, 0, b"x").unwrap();
        }
        let mut buffer = Vec::new();
        let err = export(&db, &ExportOptions::default(), &mut buffer, |_, _| false).unwrap_err();
        assert_eq!(err, Error::Cancelled);
    });
}

#[test]
fn json_export_is_lossy_but_well_formed() {
    with_temp_path("export-json.kvidx.sqlite3", |path| {
        let mut db = open_sqlite(path);
        db.insert(1, 7, 2, b"line\nbreak").unwrap();

        let options =
            ExportOptions { start_key: 0, end_key: u64::MAX, format: ExportFormat::Json { pretty: true, include_metadata: true } };
        let mut buffer = Vec::new();
        export(&db, &options, &mut buffer, |_, _| true).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("{\"format\":\"kvidx-json\",\"version\":1,\"entries\":["));
        assert!(text.contains("\"key\":1"));
        assert!(text.contains("\"term\":7"));
        assert!(text.contains("line\\nbreak"));
    });
}

#[test]
fn import_rejects_bad_magic() {
    with_temp_path("import-bad.kvidx.sqlite3", |path| {
        let mut db = open_sqlite(path);
        let garbage = vec![0u8; 32];
        let err = import(&mut db, &mut garbage.as_slice(), &ImportOptions::default(), |_, _| true).unwrap_err();
        assert_eq!(err, Error::Corrupt("not a kvidxkit binary export stream".into()));
    });
}
