use std::time;

use anyhow::Result;
use crossbeam_utils::thread;

pub trait Runnable: Sync {
    fn run(&self) -> Result<()>;
}

/// Runs every runnable on its own scoped thread and waits for all of them.
/// A failing runnable is logged; the others keep running.
pub fn run_in_parallel(runnables: Vec<&dyn Runnable>) {
    let result = thread::scope(|s| {
        for runnable in runnables {
            s.spawn(move |_| {
                if let Err(err) = runnable.run() {
                    error!("Runnable stopped with error: {:#}", err);
                }
            });
        }
    });

    if result.is_err() {
        error!("A runnable thread panicked");
    }
}

pub fn sleep_millis(millis: u64) {
    let wait_duration = time::Duration::from_millis(millis);
    std::thread::sleep(wait_duration);
}
