// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! A single suite of behavioral assertions run against every adapter, so
//! that "insert then get returns what was inserted" and friends are
//! expressed once instead of duplicated per backend crate.

use kvidxkit_core::{Backend, Config, Error, SetCondition};

/// Exercises CRUD, navigation, range operations, storage primitives, TTL,
/// and transaction scoping against a freshly-opened backend. `make` must
/// return a new, empty backend instance each time it is called.
pub fn run_conformance(mut make: impl FnMut() -> Box<dyn Backend>) {
    basic_crud(make());
    navigation(make());
    range_ops(make());
    storage_primitives(make());
    ttl(make());
    transaction_scoping(make());
    read_only_config(make());
}

fn basic_crud(mut backend: Box<dyn Backend>) {
    assert_eq!(backend.get(1).unwrap(), None);
    assert!(!backend.exists(1).unwrap());

    backend.insert(1, 10, 20, b"payload").unwrap();
    assert!(backend.exists(1).unwrap());
    let record = backend.get(1).unwrap().unwrap();
    assert_eq!(record.term, 10);
    assert_eq!(record.cmd, 20);
    assert_eq!(record.payload.as_slice(), b"payload");

    let err = backend.insert(1, 10, 20, b"again").unwrap_err();
    assert_eq!(err, Error::DuplicateKey);

    assert!(backend.exists_dual(1, 10).unwrap());
    assert!(!backend.exists_dual(1, 11).unwrap());

    backend.remove(1).unwrap();
    assert_eq!(backend.get(1).unwrap(), None);
    // removing an absent key is not an error
    backend.remove(1).unwrap();
}

fn navigation(mut backend: Box<dyn Backend>) {
    assert_eq!(backend.max_key().unwrap(), None);
    assert!(matches!(backend.min_key(), Err(Error::NotFound)));

    for key in [1u64, 5, 100, u64::MAX] {
        backend.insert(key, 0, 0, b"").unwrap();
    }

    assert_eq!(backend.max_key().unwrap(), Some(u64::MAX));
    assert_eq!(backend.min_key().unwrap(), 1);
    assert_eq!(backend.get_next(1).unwrap(), Some(5));
    assert_eq!(backend.get_next(5).unwrap(), Some(100));
    assert_eq!(backend.get_next(100).unwrap(), Some(u64::MAX));
    // nothing is strictly greater than the largest representable key
    assert_eq!(backend.get_next(u64::MAX).unwrap(), None);
    assert_eq!(backend.get_prev(u64::MAX).unwrap(), Some(100));
    assert_eq!(backend.get_prev(1).unwrap(), None);
}

fn range_ops(mut backend: Box<dyn Backend>) {
    for key in 1..=10u64 {
        backend.insert(key, 0, 0, b"").unwrap();
    }

    assert_eq!(backend.count_range(3, 7).unwrap(), 5);
    assert_eq!(backend.count_range(11, 20).unwrap(), 0);
    assert!(backend.exists_in_range(1, 1).unwrap());
    assert!(!backend.exists_in_range(100, 200).unwrap());

    let removed = backend.remove_range(3, 7, true, true).unwrap();
    assert_eq!(removed, 5);
    assert_eq!(backend.count_range(1, 10).unwrap(), 5);

    let removed = backend.remove_before_n_inclusive(2).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(backend.min_key().unwrap(), 8);

    let removed = backend.remove_after_n_inclusive(9).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(backend.max_key().unwrap(), Some(8));
}

fn storage_primitives(mut backend: Box<dyn Backend>) {
    backend.insert_ex(1, 1, 1, b"a", SetCondition::IfNotExists).unwrap();
    let err = backend.insert_ex(1, 1, 1, b"b", SetCondition::IfNotExists).unwrap_err();
    assert_eq!(err, Error::ConditionFailed);
    backend.insert_ex(1, 2, 2, b"b", SetCondition::IfExists).unwrap();
    assert_eq!(backend.get(1).unwrap().unwrap().payload.as_slice(), b"b");

    let old = backend.get_and_set(1, 3, 3, b"c").unwrap().unwrap();
    assert_eq!(old.payload, b"b");
    assert_eq!(backend.get(1).unwrap().unwrap().payload.as_slice(), b"c");

    assert!(backend.compare_and_swap(1, b"c", 4, 4, b"d").unwrap());
    assert!(!backend.compare_and_swap(1, b"not-current", 5, 5, b"e").unwrap());

    let removed = backend.get_and_remove(1).unwrap();
    assert_eq!(removed.payload, b"d");
    assert!(backend.get(1).unwrap().is_none());

    let len = backend.append(2, 1, 1, b"hello").unwrap();
    assert_eq!(len, 5);
    let len = backend.append(2, 1, 1, b" world").unwrap();
    assert_eq!(len, 11);
    assert_eq!(backend.get(2).unwrap().unwrap().payload.as_slice(), b"hello world");

    let len = backend.prepend(2, 1, 1, b">> ").unwrap();
    assert_eq!(len, 14);
    assert_eq!(backend.get(2).unwrap().unwrap().payload.as_slice(), b">> hello world");

    let slice = backend.get_value_range(2, 3, 5).unwrap();
    assert_eq!(slice, b"hello");
    let slice = backend.get_value_range(2, 100, 5).unwrap();
    assert!(slice.is_empty());

    backend.set_value_range(2, 0, b"<<").unwrap();
    assert_eq!(&backend.get(2).unwrap().unwrap().payload.as_slice()[..2], b"<<");
}

fn ttl(mut backend: Box<dyn Backend>) {
    backend.insert(1, 0, 0, b"").unwrap();
    assert_eq!(backend.get_ttl(1).unwrap(), kvidxkit_core::TTL_NONE);
    assert_eq!(backend.get_ttl(2).unwrap(), kvidxkit_core::TTL_NOT_FOUND);

    backend.set_expire(1, 0).unwrap();
    let removed = backend.expire_scan(0).unwrap();
    assert_eq!(removed, 1);
    assert!(backend.get(1).unwrap().is_none());

    backend.insert(2, 0, 0, b"").unwrap();
    backend.set_expire(2, 60_000).unwrap();
    assert!(backend.get_ttl(2).unwrap() > 0);
    backend.persist(2).unwrap();
    assert_eq!(backend.get_ttl(2).unwrap(), kvidxkit_core::TTL_NONE);
}

fn transaction_scoping(mut backend: Box<dyn Backend>) {
    assert!(!backend.is_writing());
    backend.begin().unwrap();
    assert!(backend.is_writing());
    backend.begin().unwrap(); // idempotent
    backend.insert(1, 0, 0, b"scratch").unwrap();
    backend.abort().unwrap();
    assert!(!backend.is_writing());
    assert!(backend.get(1).unwrap().is_none());
}

/// `Config::read_only` forbids mutations on every adapter; reads keep
/// working.
fn read_only_config(mut backend: Box<dyn Backend>) {
    backend.insert(1, 0, 0, b"before").unwrap();

    let mut cfg = Config::default();
    cfg.read_only = true;
    backend.apply_config(&cfg).unwrap();

    assert_eq!(backend.insert(2, 0, 0, b"denied").unwrap_err(), Error::Readonly);
    assert_eq!(backend.get(1).unwrap().unwrap().payload.as_slice(), b"before");

    cfg.read_only = false;
    backend.apply_config(&cfg).unwrap();
    backend.insert(2, 0, 0, b"allowed").unwrap();
}
