//! The single-thread backend: no scheduler, no fork/join, its own
//! last-poked coalescing map since there is never more than one accessor
//! (spec.md §4.I).

use std::collections::HashMap;

use num_bigint::BigInt;

use crate::backend::RunReport;
use crate::error::{SimError, SimResult};
use crate::ids::ThreadId;
use crate::simulator::{Simulator, StepResult};

pub struct SingleThreadBackend {
    sim: Box<dyn Simulator>,
    master_clock: String,
    last_poked: HashMap<String, BigInt>,
    timeout: u64,
    idle_cycles: u64,
    step_count: u64,
    cumulative_cycles: u64,
}

impl SingleThreadBackend {
    pub fn new(sim: Box<dyn Simulator>, master_clock: impl Into<String>) -> Self {
        Self {
            sim,
            master_clock: master_clock.into(),
            last_poked: HashMap::new(),
            timeout: 0,
            idle_cycles: 0,
            step_count: 0,
            cumulative_cycles: 0,
        }
    }

    fn require_master(&self, clock: &str) -> SimResult<()> {
        if clock != self.master_clock {
            return Err(SimError::NotSupported);
        }
        Ok(())
    }

    pub fn poke_bits(&mut self, signal: &str, value: BigInt) -> SimResult<()> {
        let changed = self.last_poked.get(signal) != Some(&value);
        if changed {
            self.sim.poke(signal, value.clone())?;
            self.idle_cycles = 0;
        }
        self.last_poked.insert(signal.to_string(), value);
        Ok(())
    }

    pub fn peek_bits(&self, signal: &str) -> SimResult<BigInt> {
        self.sim.peek(signal)
    }

    pub fn step(&mut self, clock: &str, cycles: u64) -> SimResult<()> {
        self.require_master(clock)?;
        let from = self.cumulative_cycles;
        let delta = if self.timeout > 0 {
            cycles.min(self.timeout.saturating_sub(self.idle_cycles))
        } else {
            cycles
        };
        match self.sim.step(delta) {
            StepResult::Ok => {
                self.idle_cycles += delta;
                self.step_count += 1;
                self.cumulative_cycles += delta;
                if self.timeout > 0 && self.idle_cycles >= self.timeout {
                    return Err(SimError::Timeout(self.idle_cycles));
                }
                Ok(())
            }
            StepResult::Interrupted { after, is_assertion } => {
                self.cumulative_cycles = from + after;
                let at = from + after;
                if is_assertion {
                    Err(SimError::AssertionFailed(at))
                } else {
                    Err(SimError::Stop(at))
                }
            }
        }
    }

    pub fn set_timeout(&mut self, clock: &str, cycles: u64) -> SimResult<()> {
        self.require_master(clock)?;
        self.timeout = cycles;
        Ok(())
    }

    pub fn get_step_count(&self, clock: &str) -> SimResult<u64> {
        self.require_master(clock)?;
        Ok(self.step_count)
    }

    pub fn fork(&self) -> SimResult<ThreadId> {
        Err(SimError::NotSupported)
    }

    pub fn join(&self) -> SimResult<()> {
        Err(SimError::NotSupported)
    }

    pub fn finish(&mut self) {
        self.sim.finish();
    }

    pub fn run<F>(sim: Box<dyn Simulator>, master_clock: impl Into<String>, test: F) -> SimResult<RunReport>
    where
        F: FnOnce(&mut SingleThreadBackend) -> SimResult<()>,
    {
        let mut backend = SingleThreadBackend::new(sim, master_clock);
        let result = test(&mut backend);
        let coverage = backend.sim.coverage();
        backend.finish();
        result.map(|_| RunReport {
            steps: backend.step_count,
            coverage,
        })
    }
}
