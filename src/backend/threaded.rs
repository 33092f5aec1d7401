//! The threaded backend: wires the scheduler's fork/join/step to the user
//! API, routing every peek/poke through the access checker (spec.md §4.I).

use std::collections::HashMap;

use num_bigint::BigInt;

use crate::access::{AccessChecker, Direction};
use crate::backend::RunReport;
use crate::error::{SimError, SimResult};
use crate::ids::ThreadId;
use crate::sched::Scheduler;
use crate::simulator::Simulator;

pub struct ThreadedBackend {
    scheduler: Scheduler,
    master_clock: String,
}

impl ThreadedBackend {
    fn from_scheduler(scheduler: Scheduler, master_clock: impl Into<String>) -> Self {
        Self {
            scheduler,
            master_clock: master_clock.into(),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn require_master(&self, clock: &str) -> SimResult<()> {
        if clock != self.master_clock {
            return Err(SimError::NotSupported);
        }
        Ok(())
    }

    pub fn poke_bits(&self, signal: &str, value: BigInt) -> SimResult<()> {
        self.scheduler.poke(signal, value)
    }

    pub fn peek_bits(&self, signal: &str) -> SimResult<BigInt> {
        self.scheduler.peek(signal)
    }

    pub fn step(&self, clock: &str, cycles: u64) -> SimResult<()> {
        self.require_master(clock)?;
        self.scheduler.step(cycles)
    }

    pub fn set_timeout(&self, clock: &str, cycles: u64) -> SimResult<()> {
        self.require_master(clock)?;
        self.scheduler.set_timeout(cycles);
        Ok(())
    }

    pub fn get_step_count(&self, clock: &str) -> SimResult<u64> {
        self.require_master(clock)?;
        Ok(self.scheduler.current_step())
    }

    pub fn fork<F>(&self, name: impl Into<String>, body: F) -> ThreadId
    where
        F: FnOnce(&Scheduler) -> SimResult<()> + Send + 'static,
    {
        self.scheduler.fork(name, body)
    }

    /// Joins `ids`, then optionally steps the master clock forward by
    /// `step_after` cycles once every joined thread has finished.
    pub fn join(&self, ids: &[ThreadId], step_after: Option<u64>) -> SimResult<()> {
        self.scheduler.join(ids)?;
        if let Some(n) = step_after {
            if n > 0 {
                self.scheduler.step(n)?;
            }
        }
        Ok(())
    }

    /// Builds the access checker and scheduler, runs `test` as the main
    /// thread, then joins every still-live forked thread before returning.
    pub fn run<F>(
        sim: Box<dyn Simulator>,
        master_clock: impl Into<String>,
        io_signals: Vec<(String, Direction)>,
        comb_paths: &HashMap<String, Vec<String>>,
        test: F,
    ) -> SimResult<RunReport>
    where
        F: FnOnce(&ThreadedBackend) -> SimResult<()>,
    {
        let checker = AccessChecker::new(sim, io_signals, comb_paths);
        let master_clock = master_clock.into();
        let mut steps = 0;
        let mut coverage = HashMap::new();
        let result = Scheduler::run(checker, |scheduler| {
            let backend = ThreadedBackend::from_scheduler(scheduler.clone(), master_clock.clone());
            let outcome = test(&backend);
            steps = backend.scheduler.current_step();
            coverage = backend.scheduler.coverage();
            outcome
        });
        result.map(|_| RunReport { steps, coverage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::ScriptedSimulator;

    #[test]
    fn non_master_clock_is_rejected() {
        let report = ThreadedBackend::run(
            Box::new(ScriptedSimulator::new()),
            "clock",
            vec![],
            &HashMap::new(),
            |backend| {
                assert!(matches!(backend.step("aux_clock", 1), Err(SimError::NotSupported)));
                Ok(())
            },
        );
        assert!(report.is_ok());
    }

    #[test]
    fn fork_join_step_sequencing_reaches_main() {
        let report = ThreadedBackend::run(
            Box::new(ScriptedSimulator::new()),
            "clock",
            vec![],
            &HashMap::new(),
            |backend| {
                let child = backend.fork("worker", |s| s.step(4));
                backend.join(&[child], None)?;
                backend.step("clock", 1)
            },
        );
        let report = report.unwrap();
        assert_eq!(report.steps, 5);
    }
}
