//! Cooperative fork/join scheduler (spec.md §4.H): exactly one simulation
//! thread runs at a time, handed off via per-thread semaphores, with an
//! explicit order tree deciding who runs next.

use std::cell::Cell;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use num_bigint::BigInt;
use parking_lot::Mutex;

use crate::access::{AccessChecker, AccessContext};
use crate::error::{SimError, SimResult};
use crate::ids::ThreadId;
use crate::sched::order_tree::OrderTree;
use crate::sched::semaphore::Semaphore;

thread_local! {
    static CURRENT: Cell<Option<ThreadId>> = Cell::new(None);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadStatus {
    Active,
    WaitingUntil(u64),
    WaitingForJoin(ThreadId),
    Finished,
}

struct ThreadSlot {
    status: ThreadStatus,
    semaphore: Arc<Semaphore>,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    threads: Vec<ThreadSlot>,
    active: ThreadId,
    current_step: u64,
    order: OrderTree,
    checker: AccessChecker,
}

/// A handle to the running scheduler. Cheap to clone — every clone shares
/// the same underlying state. Each OS thread that calls into it must first
/// have been registered via [`Scheduler::new`] (the main thread) or
/// [`Scheduler::fork`] (every other thread).
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Mutex<Inner>>,
}

impl Scheduler {
    pub fn new(checker: AccessChecker) -> Self {
        let inner = Inner {
            threads: vec![ThreadSlot {
                status: ThreadStatus::Active,
                semaphore: Arc::new(Semaphore::new(0)),
                handle: None,
            }],
            active: ThreadId::MAIN,
            current_step: 0,
            order: OrderTree::new(),
            checker,
        };
        CURRENT.with(|c| c.set(Some(ThreadId::MAIN)));
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Runs `test` as the main thread, joining every forked thread and
    /// finishing the main thread afterwards regardless of the outcome.
    pub fn run<F>(checker: AccessChecker, test: F) -> SimResult<()>
    where
        F: FnOnce(&Scheduler) -> SimResult<()>,
    {
        let scheduler = Scheduler::new(checker);
        let test_result = test(&scheduler);
        let finish_result = scheduler.finish_main();
        test_result.and(finish_result)
    }

    fn current_id() -> ThreadId {
        CURRENT
            .with(|c| c.get())
            .expect("scheduler method called from a thread that was never fork()ed or registered as main")
    }

    pub fn current_step(&self) -> u64 {
        self.inner.lock().current_step
    }

    pub fn active_thread(&self) -> ThreadId {
        self.inner.lock().active
    }

    pub fn set_timeout(&self, cycles: u64) {
        self.inner.lock().checker.set_timeout(cycles);
    }

    pub fn idle_cycles(&self) -> u64 {
        self.inner.lock().checker.idle_cycles()
    }

    pub fn coverage(&self) -> std::collections::HashMap<String, u64> {
        self.inner.lock().checker.coverage()
    }

    pub fn poke(&self, name: &str, value: BigInt) -> SimResult<()> {
        let me = Self::current_id();
        let mut inner = self.inner.lock();
        let Inner {
            checker,
            order,
            current_step,
            ..
        } = &mut *inner;
        let is_ancestor = |a: ThreadId, b: ThreadId| order.is_parent_of(a, b);
        let ctx = AccessContext {
            active_thread: me,
            current_step: *current_step,
            is_ancestor: &is_ancestor,
        };
        checker.poke(&ctx, name, value)
    }

    pub fn peek(&self, name: &str) -> SimResult<BigInt> {
        let me = Self::current_id();
        let mut inner = self.inner.lock();
        let Inner {
            checker,
            order,
            current_step,
            ..
        } = &mut *inner;
        let is_ancestor = |a: ThreadId, b: ThreadId| order.is_parent_of(a, b);
        let ctx = AccessContext {
            active_thread: me,
            current_step: *current_step,
            is_ancestor: &is_ancestor,
        };
        checker.peek(&ctx, name)
    }

    /// Forks a new simulation thread running `body`, adds it to the order
    /// tree as a child of the active thread, then yields control for 0
    /// cycles so the newborn runs before `fork` returns (spec.md §4.H).
    pub fn fork<F>(&self, name: impl Into<String>, body: F) -> ThreadId
    where
        F: FnOnce(&Scheduler) -> SimResult<()> + Send + 'static,
    {
        let parent = Self::current_id();
        let sem = Arc::new(Semaphore::new(0));
        let id;
        {
            let mut inner = self.inner.lock();
            id = ThreadId(inner.threads.len() as u32);
            let step_now = inner.current_step;
            inner.threads.push(ThreadSlot {
                status: ThreadStatus::WaitingUntil(step_now),
                semaphore: sem.clone(),
                handle: None,
            });
            inner.order.add_thread(parent, id);
            tracing::trace!(thread = id.0, parent = parent.0, "fork");
        }

        let scheduler = self.clone();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                sem.acquire();
                CURRENT.with(|c| c.set(Some(id)));
                {
                    let mut inner = scheduler.inner.lock();
                    inner.threads[id.0 as usize].status = ThreadStatus::Active;
                    inner.active = id;
                }
                // A thread body that errors doesn't get to report it to
                // anyone directly (there is no caller left on its stack) —
                // stash it for the next checkpoint, same as a mid-run
                // failure noticed while finishing self below.
                if let Err(e) = body(&scheduler) {
                    scheduler.inner.lock().checker.raise_pending(e);
                }
                scheduler.finish_self();
            })
            .expect("failed to spawn simulation thread");
        self.inner.lock().threads[id.0 as usize].handle = Some(handle);

        // Safe to ignore: findNextThread always finds at least the newborn
        // itself (WaitingUntil(currentStep), eligible immediately).
        let _ = self.yield_for(0);
        id
    }

    /// Advances the active thread by `n >= 1` cycles, handing control to any
    /// other thread whose own wait would elapse first (spec.md §4.H "Step").
    pub fn step(&self, n: u64) -> SimResult<()> {
        assert!(n >= 1, "step cycles must be >= 1");
        let me = Self::current_id();

        let waiting: Vec<u64> = {
            let inner = self.inner.lock();
            inner
                .threads
                .iter()
                .filter_map(|t| match t.status {
                    ThreadStatus::WaitingUntil(s) => Some(s),
                    _ => None,
                })
                .collect()
        };

        let current_step = self.inner.lock().current_step;
        if waiting.is_empty() {
            self.do_step(n)?;
            return Ok(());
        }

        let next_wake = *waiting.iter().min().unwrap();
        if next_wake > current_step + n {
            self.do_step(n)?;
            return Ok(());
        }

        {
            let mut inner = self.inner.lock();
            inner.threads[me.0 as usize].status = ThreadStatus::WaitingUntil(current_step + n);
        }
        let step_taken = next_wake - current_step;
        let delta = self.do_step(step_taken)?;
        self.yield_for(n - delta)
    }

    fn do_step(&self, n: u64) -> SimResult<u64> {
        let mut inner = self.inner.lock();
        let from = inner.current_step;
        let delta = inner.checker.simulation_step(from, n)?;
        inner.current_step += delta;
        tracing::trace!(step = inner.current_step, cycles = delta, "doStep");
        Ok(delta)
    }

    /// Hands control to the next runnable thread and blocks the active
    /// thread until it is woken again, after `s` cycles have elapsed.
    fn yield_for(&self, s: u64) -> SimResult<()> {
        let me = Self::current_id();
        {
            let mut inner = self.inner.lock();
            let next = Self::find_next_thread_locked(&mut inner).ok_or(SimError::Deadlock)?;
            inner.threads[me.0 as usize].status = ThreadStatus::WaitingUntil(inner.current_step + s);
            Self::wake_locked(&mut inner, next);
        }
        self.semaphore_of(me).acquire();
        {
            let mut inner = self.inner.lock();
            inner.threads[me.0 as usize].status = ThreadStatus::Active;
            inner.active = me;
        }
        Ok(())
    }

    fn semaphore_of(&self, id: ThreadId) -> Arc<Semaphore> {
        self.inner.lock().threads[id.0 as usize].semaphore.clone()
    }

    fn find_next_thread_locked(inner: &mut Inner) -> Option<ThreadId> {
        let order: Vec<ThreadId> = inner.order.order().to_vec();
        for id in order {
            let eligible = match inner.threads[id.0 as usize].status {
                ThreadStatus::WaitingUntil(s) => s == inner.current_step,
                ThreadStatus::WaitingForJoin(target) => {
                    matches!(inner.threads[target.0 as usize].status, ThreadStatus::Finished)
                }
                _ => false,
            };
            if eligible {
                return Some(id);
            }
        }
        None
    }

    fn wake_locked(inner: &mut Inner, id: ThreadId) {
        if let ThreadStatus::WaitingUntil(_) = inner.threads[id.0 as usize].status {
            inner.threads[id.0 as usize].semaphore.release();
        }
        // A WaitingForJoin thread isn't semaphore-blocked — its joiner
        // resumes naturally once the target's OS thread terminates.
    }

    /// If no thread is runnable at `current_step`, advances the clock to the
    /// nearest pending `WaitingUntil` and retries. A no-op if some thread is
    /// already runnable, or if none is waiting on a future step at all.
    fn advance_to_nearest_wait(inner: &mut Inner) -> SimResult<()> {
        if Self::find_next_thread_locked(inner).is_some() {
            return Ok(());
        }
        let next_wake = inner
            .threads
            .iter()
            .filter_map(|t| match t.status {
                ThreadStatus::WaitingUntil(s) => Some(s),
                _ => None,
            })
            .min();
        if let Some(next_wake) = next_wake {
            if next_wake > inner.current_step {
                let from = inner.current_step;
                let delta = inner.checker.simulation_step(from, next_wake - from)?;
                inner.current_step += delta;
            }
        }
        Ok(())
    }

    /// Blocks until every thread in `ids` has finished, in order.
    pub fn join(&self, ids: &[ThreadId]) -> SimResult<()> {
        for &target in ids {
            let already_finished = matches!(
                self.inner.lock().threads[target.0 as usize].status,
                ThreadStatus::Finished
            );
            if already_finished {
                continue;
            }

            let me = Self::current_id();
            let join_handle = {
                let mut inner = self.inner.lock();
                Self::advance_to_nearest_wait(&mut inner)?;
                let next = Self::find_next_thread_locked(&mut inner).ok_or(SimError::Deadlock)?;
                inner.threads[me.0 as usize].status = ThreadStatus::WaitingForJoin(target);
                Self::wake_locked(&mut inner, next);
                inner.threads[target.0 as usize].handle.take()
            };

            if let Some(handle) = join_handle {
                handle.join().expect("simulation thread panicked");
            }

            let mut inner = self.inner.lock();
            inner.threads[me.0 as usize].status = ThreadStatus::Active;
            inner.active = me;
        }
        Ok(())
    }

    /// Called from inside a forked thread's body once it returns.
    fn finish_self(&self) {
        let me = Self::current_id();
        let mut inner = self.inner.lock();
        inner.threads[me.0 as usize].status = ThreadStatus::Finished;
        inner.order.finish_thread(me);
        tracing::trace!(thread = me.0, "thread finished");

        let joiner_waiting = inner
            .threads
            .iter()
            .any(|t| matches!(t.status, ThreadStatus::WaitingForJoin(target) if target == me));
        if joiner_waiting {
            // The joiner's blocked `JoinHandle::join()` call resolves once
            // this OS thread actually returns — no bookkeeping needed here.
            return;
        }
        if inner.threads.iter().all(|t| t.status == ThreadStatus::Finished) {
            return;
        }
        if let Err(e) = Self::advance_to_nearest_wait(&mut inner) {
            inner.checker.raise_pending(e);
            return;
        }
        if let Some(next) = Self::find_next_thread_locked(&mut inner) {
            Self::wake_locked(&mut inner, next);
        }
    }

    /// Joins every forked thread, then finishes the main thread. Call once,
    /// at the end of a test, from the main thread.
    pub fn finish_main(&self) -> SimResult<()> {
        let others: Vec<ThreadId> = {
            let inner = self.inner.lock();
            (1..inner.threads.len() as u32).map(ThreadId).collect()
        };
        self.join(&others)?;

        let me = Self::current_id();
        let mut inner = self.inner.lock();
        inner.threads[me.0 as usize].status = ThreadStatus::Finished;
        inner.order.finish_thread(me);
        inner.checker.checkpoint()
    }
}
