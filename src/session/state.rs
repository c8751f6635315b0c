use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// What the frame loop is asked to do with frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Show frames only.
    Display,
    /// Run detection on every frame and report readings.
    Detect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running { mode: Mode, paused: bool },
    Stopping,
}

impl LoopState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Running { paused: true, .. })
    }
}

/// Where the worker stands after checking an iteration boundary.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Boundary {
    Proceed,
    Stop,
}

/// Loop state shared between the host and the worker.
///
/// Every transition notifies the condition variable so a paused or sleeping
/// worker re-checks the state right away.
pub(crate) struct Control {
    state: Mutex<LoopState>,
    changed: Condvar,
}

impl Control {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(LoopState::Idle),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn get(&self) -> LoopState {
        *self.lock()
    }

    pub(crate) fn set(&self, next: LoopState) {
        *self.lock() = next;
        self.changed.notify_all();
    }

    /// Apply `f` to the current state; notifies when it changed anything.
    pub(crate) fn update(&self, f: impl FnOnce(LoopState) -> LoopState) -> LoopState {
        let mut state = self.lock();
        let next = f(*state);
        if next != *state {
            *state = next;
            self.changed.notify_all();
        }
        next
    }

    /// Block while paused. Returns `Stop` once a stop has been requested.
    pub(crate) fn boundary(&self) -> Boundary {
        let mut state = self.lock();
        loop {
            match *state {
                LoopState::Running { paused: false, .. } => return Boundary::Proceed,
                LoopState::Running { paused: true, .. } => {
                    state = self
                        .changed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                LoopState::Stopping | LoopState::Idle => return Boundary::Stop,
            }
        }
    }

    /// Sleep for `interval` unless the state leaves plain running first.
    pub(crate) fn sleep(&self, interval: Duration) {
        if interval.is_zero() {
            return;
        }
        let deadline = Instant::now() + interval;
        let mut state = self.lock();
        while matches!(*state, LoopState::Running { paused: false, .. }) {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn boundary_blocks_until_resumed() {
        let control = Arc::new(Control::new());
        control.set(LoopState::Running {
            mode: Mode::Display,
            paused: true,
        });
        let worker = {
            let control = control.clone();
            thread::spawn(move || control.boundary())
        };
        thread::sleep(Duration::from_millis(30));
        assert!(!worker.is_finished());
        control.update(|s| match s {
            LoopState::Running { mode, .. } => LoopState::Running { mode, paused: false },
            other => other,
        });
        assert_eq!(worker.join().unwrap(), Boundary::Proceed);
    }

    #[test]
    fn stop_interrupts_sleep() {
        let control = Arc::new(Control::new());
        control.set(LoopState::Running {
            mode: Mode::Detect,
            paused: false,
        });
        let started = Instant::now();
        let worker = {
            let control = control.clone();
            thread::spawn(move || control.sleep(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        control.set(LoopState::Stopping);
        worker.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(control.boundary(), Boundary::Stop);
    }
}
