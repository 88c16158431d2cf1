use std::sync::{Condvar, Mutex};

// A 0/1 flag guarded by a mutex + condvar. The queue itself carries the job
// count; this only gates worker wake-ups, so a counting semaphore would add
// nothing.
pub(crate) struct BinarySemaphore {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl BinarySemaphore {
    pub fn new(raised: bool) -> Self {
        BinarySemaphore {
            flag: Mutex::new(raised),
            cond: Condvar::new(),
        }
    }

    /// Lower the flag without waking anyone.
    pub fn reset(&self) {
        *self.flag.lock().unwrap() = false;
    }

    /// Raise the flag and wake one waiter.
    pub fn post(&self) {
        let mut raised = self.flag.lock().unwrap();
        *raised = true;
        self.cond.notify_one();
    }

    /// Raise the flag and wake every waiter.
    ///
    /// Only the first waiter to run observes the raised flag; the rest go
    /// back to sleep until someone posts again.
    pub fn post_all(&self) {
        let mut raised = self.flag.lock().unwrap();
        *raised = true;
        self.cond.notify_all();
    }

    /// Block until the flag is raised, then lower it and return.
    pub fn wait(&self) {
        let mut raised = self.flag.lock().unwrap();
        while !*raised {
            raised = self.cond.wait(raised).unwrap();
        }
        *raised = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn post_then_wait_does_not_block() {
        let sem = BinarySemaphore::new(false);
        sem.post();
        sem.wait();
    }

    #[test]
    fn new_raised_lets_first_waiter_through() {
        let sem = BinarySemaphore::new(true);
        sem.wait();
    }

    #[test]
    fn post_wakes_a_blocked_waiter() {
        let sem = Arc::new(BinarySemaphore::new(false));
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.wait())
        };
        // the waiter either blocks first or finds the flag already raised
        sem.post();
        waiter.join().unwrap();
    }

    #[test]
    fn reset_lowers_the_flag() {
        let sem = BinarySemaphore::new(true);
        sem.reset();
        sem.post();
        sem.wait();
    }
}
