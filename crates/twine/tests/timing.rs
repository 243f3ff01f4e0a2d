use std::time::{Duration, Instant};

use twine::{Config, Runtime, RuntimeError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn sleep_blocks_for_at_least_the_requested_time() {
    init_logging();
    let rt = Runtime::new();
    let started = Instant::now();
    rt.sleep_usecs(50_000).unwrap();
    assert!(started.elapsed() >= Duration::from_micros(50_000));
}

#[test]
fn zero_duration_sleep_returns() {
    init_logging();
    let rt = Runtime::new();
    rt.sleep_usecs(0).unwrap();
    rt.sleep(Duration::ZERO).unwrap();
}

#[test]
fn sleepers_wake_concurrently_not_serially() {
    init_logging();
    let rt = Runtime::new();
    let started = Instant::now();
    let workers: Vec<_> = [(100u64, 0usize), (50, 1), (150, 2)]
        .into_iter()
        .map(|(millis, index)| {
            rt.spawn(move |rt| {
                rt.sleep_usecs(millis * 1000).unwrap();
                index
            })
        })
        .collect();

    // joining in creation order returns each thread's own index no matter
    // which order the deadlines expire in
    for (expected, worker) in workers.into_iter().enumerate() {
        assert_eq!(rt.join(worker), expected);
    }

    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_millis(150),
        "woke too early: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_millis(300),
        "sleeps were serialized: {elapsed:?}"
    );
}

#[test]
fn bounded_registry_surfaces_capacity_errors() {
    init_logging();
    let rt = Runtime::with_config(Config {
        max_sleeping: Some(1),
        ..Config::default()
    });
    let sleeper = rt.spawn(|rt| rt.sleep_usecs(40_000).is_ok());
    rt.yield_now(); // the spawned thread takes the only slot

    let err = rt.sleep_usecs(40_000).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::SleepRegistryFull { capacity: 1 }
    ));

    // the sleeper itself was registered fine
    assert!(rt.join(sleeper));
}

#[test]
#[should_panic(expected = "deadlock")]
fn total_deadlock_is_fatal() {
    let rt = Runtime::new();
    let mutex = rt.mutex_create();
    rt.mutex_lock(mutex);
    rt.mutex_lock(mutex); // nothing can ever release it
}
