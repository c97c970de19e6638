//! Demonstrates renting scratch strings from a `LanePool` on several threads at once.

use std::fmt::Write;
use std::thread;

use lane_pool::LanePool;

fn main() {
    let pool = LanePool::builder()
        .capacity(4)
        .factory(|| String::with_capacity(64))
        .clean(String::clear)
        .dispose(|text| {
            println!(
                "pool is full, dropping a string of capacity {}",
                text.capacity()
            );
        })
        .build()
        .expect("capacity is valid and a factory is set");

    thread::scope(|s| {
        for worker in 0..8 {
            let pool = &pool;

            s.spawn(move || {
                let line = pool
                    .borrow_with_result(|text| {
                        write!(text, "worker {worker} says hello")
                            .expect("writing to a String cannot fail");
                        text.clone()
                    })
                    .expect("pool is not disposed");

                println!("{line}");
            });
        }
    });

    println!("{} idle strings retained", pool.len());

    pool.dispose();
    println!("disposed: {}", pool.is_disposed());
}
