use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use twine::Runtime;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn joins_return_spawned_values(values in prop::collection::vec(any::<i64>(), 1..16)) {
        let rt = Runtime::new();
        let workers: Vec<_> = values
            .iter()
            .map(|&value| rt.spawn(move |_| value))
            .collect();
        let joined: Vec<i64> = workers.into_iter().map(|worker| rt.join(worker)).collect();
        prop_assert_eq!(joined, values);
    }

    #[test]
    fn mutex_serializes_increments(yields in prop::collection::vec(0usize..4, 1..8)) {
        let rt = Runtime::new();
        let mutex = rt.mutex_create();
        let counter = Rc::new(Cell::new(0usize));
        let workers: Vec<_> = yields
            .iter()
            .map(|&pauses| {
                let counter = counter.clone();
                rt.spawn(move |rt| {
                    rt.mutex_lock(mutex);
                    let seen = counter.get();
                    for _ in 0..pauses {
                        rt.yield_now();
                    }
                    counter.set(seen + 1);
                    rt.mutex_unlock(mutex);
                })
            })
            .collect();
        for worker in workers {
            rt.join(worker);
        }
        prop_assert_eq!(counter.get(), yields.len());
        rt.mutex_destroy(mutex);
    }
}
