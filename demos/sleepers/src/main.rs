//! Three threads sleep for different durations and are joined in creation
//! order; total wall time tracks the longest sleep, not the sum.

use std::time::Instant;

use log::info;
use twine::Runtime;

fn main() {
    env_logger::init();

    let rt = Runtime::new();
    let started = Instant::now();

    let workers: Vec<_> = [100u64, 50, 150]
        .into_iter()
        .enumerate()
        .map(|(index, millis)| {
            rt.spawn(move |rt| {
                rt.sleep_usecs(millis * 1000).expect("sleep registry full");
                info!("worker {index} woke after {millis} ms");
                index
            })
        })
        .collect();

    for (index, worker) in workers.into_iter().enumerate() {
        assert_eq!(rt.join(worker), index);
        println!("worker {index} joined at {:?}", started.elapsed());
    }

    println!("all workers joined in {:?}", started.elapsed());
}
