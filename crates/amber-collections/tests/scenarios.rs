//! Integration test: the demo driver's operation sequences.
//!
//! Exercises the same pop/push/insert/remove dances the CLI runs,
//! asserting the intermediate snapshots at every step.

use amber_collections::{PList, PVec};
use amber_test_utils::TestPool;

#[test]
fn list_dance() {
    let mut t = TestPool::create();
    let list = t.pool_mut().run(|tx| PList::<i64>::create(tx)).unwrap();

    list.push_back(t.pool_mut(), 0).unwrap();
    list.push_back(t.pool_mut(), 1).unwrap();
    list.push_back(t.pool_mut(), 2).unwrap();
    assert_eq!(snapshot(&list, &t), vec![0, 1, 2]);

    assert_eq!(list.pop_back(t.pool_mut()).unwrap(), 2);
    assert_eq!(snapshot(&list, &t), vec![0, 1]);

    list.push_back(t.pool_mut(), 2).unwrap();
    assert_eq!(snapshot(&list, &t), vec![0, 1, 2]);

    list.push_front(t.pool_mut(), -1).unwrap();
    assert_eq!(snapshot(&list, &t), vec![-1, 0, 1, 2]);

    assert_eq!(list.pop_front(t.pool_mut()).unwrap(), -1);
    assert_eq!(snapshot(&list, &t), vec![0, 1, 2]);

    list.insert(t.pool_mut(), 7, 2).unwrap();
    assert_eq!(snapshot(&list, &t), vec![0, 1, 7, 2]);

    assert_eq!(list.remove(t.pool_mut(), 2).unwrap(), 7);
    assert_eq!(snapshot(&list, &t), vec![0, 1, 2]);

    fn snapshot(list: &PList<i64>, t: &TestPool) -> Vec<i64> {
        list.iter(t.pool()).collect()
    }
}

#[test]
fn vector_dance() {
    let mut t = TestPool::create();
    let vec = t.pool_mut().run(|tx| PVec::<f64>::create(tx)).unwrap();

    let initial = [2.0, 4.0, 6.0, 8.0, 10.0, 12.0];
    for v in initial {
        vec.push_back(t.pool_mut(), v).unwrap();
    }
    assert_eq!(snapshot(&vec, &t), initial.to_vec());

    assert_eq!(vec.pop_back(t.pool_mut()).unwrap(), 12.0);
    assert_eq!(snapshot(&vec, &t), vec![2.0, 4.0, 6.0, 8.0, 10.0]);

    vec.push_back(t.pool_mut(), 12.0).unwrap();
    assert_eq!(snapshot(&vec, &t), initial.to_vec());

    vec.insert(t.pool_mut(), -37.0, 3).unwrap();
    assert_eq!(
        snapshot(&vec, &t),
        vec![2.0, 4.0, 6.0, -37.0, 8.0, 10.0, 12.0]
    );

    assert_eq!(vec.remove(t.pool_mut(), 3).unwrap(), -37.0);
    assert_eq!(snapshot(&vec, &t), initial.to_vec());

    fn snapshot(vec: &PVec<f64>, t: &TestPool) -> Vec<f64> {
        vec.iter(t.pool()).collect()
    }
}
