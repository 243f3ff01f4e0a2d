//! Two threads alternate strictly over a mutex and a condition variable.

use std::cell::Cell;
use std::rc::Rc;

use twine::Runtime;

const ROUNDS: usize = 5;

fn main() {
    let rt = Runtime::new();
    let table = rt.mutex_create();
    let turn_flip = rt.cond_create();
    let ping_turn = Rc::new(Cell::new(true));

    let pinger = {
        let ping_turn = ping_turn.clone();
        rt.spawn(move |rt| {
            for round in 0..ROUNDS {
                rt.mutex_lock(table);
                while !ping_turn.get() {
                    rt.cond_wait(turn_flip, table);
                }
                println!("ping {round}");
                ping_turn.set(false);
                rt.cond_signal(turn_flip);
                rt.mutex_unlock(table);
            }
        })
    };

    let ponger = {
        let ping_turn = ping_turn.clone();
        rt.spawn(move |rt| {
            for round in 0..ROUNDS {
                rt.mutex_lock(table);
                while ping_turn.get() {
                    rt.cond_wait(turn_flip, table);
                }
                println!("pong {round}");
                ping_turn.set(true);
                rt.cond_signal(turn_flip);
                rt.mutex_unlock(table);
            }
        })
    };

    rt.join(pinger);
    rt.join(ponger);
    rt.cond_destroy(turn_flip);
    rt.mutex_destroy(table);
}
