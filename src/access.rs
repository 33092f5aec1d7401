//! Access checker: per-signal metadata, combinational dependency tracking,
//! cross-thread conflict detection, and idle-cycle timeout (spec.md §4.F).

use std::collections::HashMap;

use num_bigint::BigInt;

use crate::error::{ConflictKind, SimError, SimResult};
use crate::ids::{SignalId, ThreadId};
use crate::simulator::{Simulator, StepResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Peek,
    Poke,
}

#[derive(Debug, Clone)]
struct SignalMeta {
    name: String,
    read_only: bool,
    depends_on: Vec<SignalId>,
    depended_on_by: Vec<SignalId>,
    last_poked_value: Option<BigInt>,
    last_access_step: i64,
    last_access_thread: ThreadId,
    last_access_mode: AccessMode,
}

/// Everything the access checker needs to know about where the active
/// thread stands in the fork tree — supplied by the scheduler (spec.md
/// §4.I: "the scheduler-provided `(activeThreadId, currentStep, isParentOf)`
/// view"), not owned by the checker itself.
pub struct AccessContext<'a> {
    pub active_thread: ThreadId,
    pub current_step: u64,
    pub is_ancestor: &'a dyn Fn(ThreadId, ThreadId) -> bool,
}

/// Per-signal metadata plus the combinational dependency graph, wrapping a
/// [`Simulator`] and policing every peek/poke that passes through it.
pub struct AccessChecker {
    sim: Box<dyn Simulator>,
    signals: Vec<SignalMeta>,
    by_name: HashMap<String, SignalId>,
    timeout: u64,
    idle_cycles: u64,
    pending_exception: Option<SimError>,
}

impl AccessChecker {
    /// Builds the signal table restricted to IO leaves, in `io_signals`'
    /// traversal order, assigning ids 0..N in that order. `comb_paths` maps
    /// a sink name to the list of source names it combinationally depends
    /// on; only names present in `io_signals` are kept.
    pub fn new(
        sim: Box<dyn Simulator>,
        io_signals: Vec<(String, Direction)>,
        comb_paths: &HashMap<String, Vec<String>>,
    ) -> Self {
        let mut by_name = HashMap::new();
        for (i, (name, _)) in io_signals.iter().enumerate() {
            by_name.insert(name.clone(), SignalId(i as u32));
        }

        let mut depends_on: Vec<Vec<SignalId>> = vec![Vec::new(); io_signals.len()];
        for (sink, sources) in comb_paths {
            let Some(&sink_id) = by_name.get(sink) else {
                continue;
            };
            let mut ids: Vec<SignalId> = sources.iter().filter_map(|s| by_name.get(s).copied()).collect();
            ids.sort_by_key(|id| id.0);
            ids.dedup();
            depends_on[sink_id.0 as usize] = ids;
        }

        let mut depended_on_by: Vec<Vec<SignalId>> = vec![Vec::new(); io_signals.len()];
        for (sink_idx, sources) in depends_on.iter().enumerate() {
            for &src in sources {
                depended_on_by[src.0 as usize].push(SignalId(sink_idx as u32));
            }
        }
        for list in &mut depended_on_by {
            list.sort_by_key(|id| id.0);
            list.dedup();
        }

        let signals = io_signals
            .into_iter()
            .enumerate()
            .map(|(i, (name, dir))| SignalMeta {
                name,
                read_only: dir == Direction::Output,
                depends_on: std::mem::take(&mut depends_on[i]),
                depended_on_by: std::mem::take(&mut depended_on_by[i]),
                last_poked_value: None,
                last_access_step: -1,
                last_access_thread: ThreadId::MAIN,
                last_access_mode: AccessMode::Peek,
            })
            .collect();

        Self {
            sim,
            signals,
            by_name,
            timeout: 0,
            idle_cycles: 0,
            pending_exception: None,
        }
    }

    /// `cycles == 0` disables the timeout.
    pub fn set_timeout(&mut self, cycles: u64) {
        self.timeout = cycles;
    }

    pub fn idle_cycles(&self) -> u64 {
        self.idle_cycles
    }

    pub fn supports_coverage(&self) -> bool {
        self.sim.supports_coverage()
    }

    pub fn coverage(&self) -> HashMap<String, u64> {
        self.sim.coverage()
    }

    fn id_of(&self, name: &str) -> SimResult<SignalId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownSymbol(name.to_string()))
    }

    /// A signal's last access is conflicting with the active thread's
    /// current one iff it happened this same step, from a different thread,
    /// that isn't an ancestor of the active one (spec.md §4.F).
    fn conflicting(&self, id: SignalId, ctx: &AccessContext) -> bool {
        let meta = &self.signals[id.0 as usize];
        meta.last_access_step == ctx.current_step as i64
            && meta.last_access_thread != ctx.active_thread
            && !(ctx.is_ancestor)(meta.last_access_thread, ctx.active_thread)
    }

    fn conflicting_with_mode(&self, id: SignalId, ctx: &AccessContext, mode: AccessMode) -> bool {
        self.signals[id.0 as usize].last_access_mode == mode && self.conflicting(id, ctx)
    }

    /// Drains any pending environment exception before a step, so a failure
    /// raised by a concurrently-running thread is never masked.
    pub fn checkpoint(&mut self) -> SimResult<()> {
        if let Some(e) = self.pending_exception.take() {
            return Err(e);
        }
        Ok(())
    }

    pub fn poke(&mut self, ctx: &AccessContext, name: &str, value: BigInt) -> SimResult<()> {
        let id = self.id_of(name)?;
        {
            let meta = &self.signals[id.0 as usize];
            if meta.read_only {
                return Err(SimError::UnpokeableSignal(name.to_string()));
            }
        }

        if self.conflicting(id, ctx) {
            return Err(SimError::ThreadOrderDependent {
                signal: name.to_string(),
                kind: ConflictKind::DirectConflict,
                is_poke: true,
            });
        }
        let dependents = self.signals[id.0 as usize].depended_on_by.clone();
        for dep in dependents {
            if self.conflicting_with_mode(dep, ctx, AccessMode::Peek) {
                return Err(SimError::ThreadOrderDependent {
                    signal: name.to_string(),
                    kind: ConflictKind::DependentConflict,
                    is_poke: true,
                });
            }
        }

        let changed = self.signals[id.0 as usize].last_poked_value.as_ref() != Some(&value);
        if changed {
            self.sim.poke(name, value.clone())?;
            self.idle_cycles = 0;
        }

        let meta = &mut self.signals[id.0 as usize];
        meta.last_poked_value = Some(value);
        meta.last_access_step = ctx.current_step as i64;
        meta.last_access_thread = ctx.active_thread;
        meta.last_access_mode = AccessMode::Poke;
        Ok(())
    }

    pub fn peek(&mut self, ctx: &AccessContext, name: &str) -> SimResult<BigInt> {
        let id = self.id_of(name)?;

        if self.conflicting_with_mode(id, ctx, AccessMode::Poke) {
            return Err(SimError::ThreadOrderDependent {
                signal: name.to_string(),
                kind: ConflictKind::DirectConflict,
                is_poke: false,
            });
        }
        let depends_on = self.signals[id.0 as usize].depends_on.clone();
        for dep in depends_on {
            if self.conflicting_with_mode(dep, ctx, AccessMode::Poke) {
                return Err(SimError::ThreadOrderDependent {
                    signal: name.to_string(),
                    kind: ConflictKind::DependentConflict,
                    is_poke: false,
                });
            }
        }

        let value = self.sim.peek(name)?;

        let meta = &mut self.signals[id.0 as usize];
        meta.last_access_step = ctx.current_step as i64;
        meta.last_access_thread = ctx.active_thread;
        meta.last_access_mode = AccessMode::Peek;
        Ok(value)
    }

    /// Advances the underlying simulator by up to `cycles`, clamped to the
    /// remaining timeout budget, and accounts idle cycles. Returns the
    /// number of cycles actually taken.
    pub fn simulation_step(&mut self, from: u64, cycles: u64) -> SimResult<u64> {
        self.checkpoint()?;
        let delta = if self.timeout > 0 {
            cycles.min(self.timeout.saturating_sub(self.idle_cycles))
        } else {
            cycles
        };
        match self.sim.step(delta) {
            StepResult::Ok => {
                self.idle_cycles += delta;
                if self.timeout > 0 && self.idle_cycles >= self.timeout {
                    return Err(SimError::Timeout(self.idle_cycles));
                }
                Ok(delta)
            }
            StepResult::Interrupted { after, is_assertion } => {
                let at = from + after;
                if is_assertion {
                    Err(SimError::AssertionFailed(at))
                } else {
                    Err(SimError::Stop(at))
                }
            }
        }
    }

    /// Records an exception raised by a concurrently-running thread so the
    /// next `checkpoint()` surfaces it instead of letting a later `step`
    /// mask it.
    pub fn raise_pending(&mut self, error: SimError) {
        self.pending_exception = Some(error);
    }
}
