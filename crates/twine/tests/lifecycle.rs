use std::cell::{Cell, RefCell};
use std::rc::Rc;

use twine::Runtime;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn joins_return_values_in_creation_order() {
    init_logging();
    let rt = Runtime::new();
    let workers: Vec<_> = (0..8).map(|index| rt.spawn(move |_| index)).collect();
    let values: Vec<i32> = workers.into_iter().map(|worker| rt.join(worker)).collect();
    assert_eq!(values, (0..8).collect::<Vec<i32>>());
}

#[test]
fn spawned_threads_run_lazily() {
    init_logging();
    let rt = Runtime::new();
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    let worker = rt.spawn(move |_| flag.set(true));

    // no suspension point yet, so the worker cannot have run
    assert!(!ran.get());
    rt.yield_now();
    assert!(ran.get());
    rt.join(worker);
}

#[test]
fn join_after_exit_returns_immediately() {
    init_logging();
    let rt = Runtime::new();
    let worker = rt.spawn(|_| "done");
    rt.yield_now(); // run the worker to completion first
    assert_eq!(rt.join(worker), "done");
}

#[test]
fn round_robin_interleaving_is_fifo() {
    init_logging();
    let rt = Runtime::new();
    let trace: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
    let workers: Vec<_> = (1..=3u32)
        .map(|id| {
            let trace = trace.clone();
            rt.spawn(move |rt| {
                for step in 0..2u32 {
                    trace.borrow_mut().push(id * 10 + step);
                    rt.yield_now();
                }
            })
        })
        .collect();
    for worker in workers {
        rt.join(worker);
    }
    assert_eq!(*trace.borrow(), vec![10, 20, 30, 11, 21, 31]);
}

#[test]
fn threads_spawn_and_join_other_threads() {
    init_logging();
    let rt = Runtime::new();
    let outer = rt.spawn(|rt| {
        let inner = rt.spawn(|_| 21);
        rt.join(inner) * 2
    });
    assert_eq!(rt.join(outer), 42);
}

#[test]
fn explicit_exit_carries_its_value() {
    init_logging();
    let rt = Runtime::new();
    let worker = rt.spawn(|rt| -> i32 { rt.exit(5) });
    assert_eq!(rt.join(worker), 5);
}

#[test]
fn values_may_be_any_type() {
    init_logging();
    let rt = Runtime::new();
    let worker = rt.spawn(|_| vec![String::from("a"), String::from("b")]);
    assert_eq!(rt.join(worker), ["a", "b"]);
}

#[test]
#[should_panic(expected = "cannot join itself")]
fn self_join_is_fatal() {
    let rt = Runtime::new();
    let current = rt.current();
    rt.join_raw(current);
}

#[test]
#[should_panic(expected = "unknown or already-joined")]
fn joining_a_reclaimed_thread_is_fatal() {
    let rt = Runtime::new();
    let worker = rt.spawn(|_| ());
    let handle = worker.thread();
    rt.join(worker);
    rt.join_raw(handle); // the control block is gone
}

#[test]
#[should_panic(expected = "unexpected value type")]
fn mismatched_exit_type_is_fatal() {
    let rt = Runtime::new();
    let worker = rt.spawn(|rt| -> i32 { rt.exit("not an i32") });
    rt.join(worker);
}
