//! Integration test: crash-atomicity of every collection mutation.
//!
//! For each mutating operation, a crash is injected after every
//! possible prefix of its tracked writes; after each simulated crash
//! the pool file is reopened and the observable state must equal the
//! pre-operation state. Once the injection limit passes the
//! operation's write count, the operation succeeds and the state must
//! equal the fully-applied result. No intermediate state is ever
//! observable.

use amber_collections::Root;
use amber_core::{CollectionError, HeapError};
use amber_heap::Pool;
use amber_test_utils::TestPool;

/// Everything observable through the root, in one comparable value.
#[derive(Debug, PartialEq)]
struct PoolState {
    list: Vec<i64>,
    vector: Vec<f64>,
    text: String,
    table: Vec<(i64, i64)>,
    bucket_count: usize,
}

fn observe(pool: &Pool) -> PoolState {
    let root = Root::load(pool).expect("root initialized");
    let mut table: Vec<(i64, i64)> = root.table.iter(pool).collect();
    table.sort_unstable();
    PoolState {
        list: root.list.iter(pool).collect(),
        vector: root.vector.iter(pool).collect(),
        text: root.text.as_string(pool),
        table,
        bucket_count: root.table.bucket_count(pool),
    }
}

/// Run `op` with a crash injected after `k` tracked writes, for every
/// `k` until the operation completes. After each crash the state must
/// match `before`; returns the number of crash points exercised.
fn crash_every_prefix<Op>(t: &mut TestPool, op: Op) -> u64
where
    Op: Fn(&mut Pool) -> Result<(), CollectionError>,
{
    let before = observe(t.pool());
    let mut k = 0;
    loop {
        t.pool_mut().fail_after_tracked_writes(Some(k));
        match op(t.pool_mut()) {
            Err(CollectionError::Heap(HeapError::CrashPoint { .. })) => {
                t.reopen();
                assert!(
                    t.recovery().rolled_back,
                    "recovery must roll back after a crash at prefix {k}"
                );
                assert_eq!(
                    observe(t.pool()),
                    before,
                    "state after crash at prefix {k} must equal the pre-op state"
                );
                k += 1;
            }
            Ok(()) => {
                t.pool_mut().fail_after_tracked_writes(None);
                assert!(k > 0, "operation performed no tracked writes");
                return k;
            }
            Err(e) => panic!("unexpected error at prefix {k}: {e}"),
        }
    }
}

fn fixture() -> (TestPool, Root) {
    let mut t = TestPool::create();
    let root = t.pool_mut().run(|tx| Root::init(tx)).unwrap();
    (t, root)
}

#[test]
fn list_mutations_are_crash_atomic() {
    let (mut t, root) = fixture();
    for v in [0, 1, 2] {
        root.list.push_back(t.pool_mut(), v).unwrap();
    }

    crash_every_prefix(&mut t, |pool| root.list.push_back(pool, 3));
    crash_every_prefix(&mut t, |pool| root.list.push_front(pool, -1));
    crash_every_prefix(&mut t, |pool| root.list.insert(pool, 7, 2));
    crash_every_prefix(&mut t, |pool| root.list.remove(pool, 2).map(|_| ()));
    crash_every_prefix(&mut t, |pool| root.list.pop_back(pool).map(|_| ()));
    crash_every_prefix(&mut t, |pool| root.list.pop_front(pool).map(|_| ()));
    assert_eq!(observe(t.pool()).list, vec![0, 1, 2]);

    crash_every_prefix(&mut t, |pool| root.list.clear(pool));
    assert!(observe(t.pool()).list.is_empty());
}

#[test]
fn vector_mutations_are_crash_atomic() {
    let (mut t, root) = fixture();
    for v in [2.0, 4.0, 6.0, 8.0] {
        root.vector.push_back(t.pool_mut(), v).unwrap();
    }

    // push_back at capacity exercises the reallocating growth path.
    crash_every_prefix(&mut t, |pool| root.vector.push_back(pool, 10.0));
    crash_every_prefix(&mut t, |pool| root.vector.insert(pool, -37.0, 2));
    crash_every_prefix(&mut t, |pool| root.vector.remove(pool, 2).map(|_| ()));
    crash_every_prefix(&mut t, |pool| root.vector.pop_back(pool).map(|_| ()));
    crash_every_prefix(&mut t, |pool| root.vector.resize(pool, 2));
    crash_every_prefix(&mut t, |pool| root.vector.shrink(pool));
    assert_eq!(observe(t.pool()).vector, vec![2.0, 4.0]);
}

#[test]
fn string_mutations_are_crash_atomic() {
    let (mut t, root) = fixture();
    root.text.assign_str(t.pool_mut(), "base").unwrap();

    crash_every_prefix(&mut t, |pool| root.text.append_str(pool, "+suffix"));
    crash_every_prefix(&mut t, |pool| root.text.assign_str(pool, "replaced"));
    assert_eq!(observe(t.pool()).text, "replaced");
}

#[test]
fn table_mutations_are_crash_atomic() {
    let (mut t, root) = fixture();
    for k in 0..5 {
        root.table.put(t.pool_mut(), k, k * 10).unwrap();
    }

    crash_every_prefix(&mut t, |pool| root.table.put(pool, 100, 1));
    crash_every_prefix(&mut t, |pool| root.table.put(pool, 100, 2)); // replace
    crash_every_prefix(&mut t, |pool| root.table.remove(pool, &100).map(|_| ()));
    assert_eq!(observe(t.pool()).table.len(), 5);
}

#[test]
fn rehash_is_crash_atomic() {
    let (mut t, root) = fixture();
    // Fill to the load-factor boundary: the next insert rehashes.
    for k in 0..11 {
        root.table.put(t.pool_mut(), k, -k).unwrap();
    }
    assert_eq!(observe(t.pool()).bucket_count, 11);

    let prefixes = crash_every_prefix(&mut t, |pool| root.table.put(pool, 11, -11));
    // The rehash relinks every node; it is a long transaction.
    assert!(prefixes > 20, "rehash exercised only {prefixes} writes");

    let state = observe(t.pool());
    assert_eq!(state.bucket_count, 19);
    assert_eq!(state.table.len(), 12);
    for k in 0..12 {
        assert!(
            state.table.contains(&(k, -k)),
            "pair ({k}, {}) lost across rehash",
            -k
        );
    }
}

#[test]
fn committed_mutations_survive_crash_of_later_ones() {
    let (mut t, root) = fixture();
    root.list.push_back(t.pool_mut(), 1).unwrap();

    // Crash deep inside the next mutation, then reopen.
    t.pool_mut().fail_after_tracked_writes(Some(2));
    let result = root.list.push_back(t.pool_mut(), 2);
    assert!(matches!(
        result,
        Err(CollectionError::Heap(HeapError::CrashPoint { .. }))
    ));
    t.reopen();

    // The committed first push is intact; the torn second one is gone.
    assert_eq!(observe(t.pool()).list, vec![1]);
}
