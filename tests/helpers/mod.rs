#![allow(dead_code)] // each test binary uses a different subset

use std::thread;
use std::time::{Duration, Instant};

/// How long cloning a [`SlowClone`] blocks for.
pub(crate) const STALL: Duration = Duration::from_millis(300);

/// A value whose `Clone` blocks the calling thread. A `get` makes the owner clone the stored value,
/// so storing one of these is a way to hold the owner busy for a known period.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SlowClone(pub(crate) u32);

impl Clone for SlowClone {
    fn clone(&self) -> Self {
        thread::sleep(STALL);
        Self(self.0)
    }
}

/// Poll `condition` until it holds or `within` has passed, returning its final value.
pub(crate) fn wait_until(within: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// A value that reports on `signal` when it is dropped. Storing one in a map shows when the owner
/// has let go of its storage.
#[derive(Debug, Clone)]
pub(crate) struct DropSignal(pub(crate) crossbeam::channel::Sender<()>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        let _res = self.0.send(());
    }
}
