//! The external simulator contract (spec.md §6).
//!
//! The scheduler and access checker are written against this trait, not
//! against [`crate::sim::Simulation`] directly — the real deployment swaps
//! in a native, compiler-generated harness behind the same seam. This
//! crate's own evaluation engine is one implementation of it
//! ([`EvalSimulator`]), used by the demo and the integration tests.

use std::collections::HashMap;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::{SimError, SimResult};
use crate::sim::Simulation;

/// Outcome of advancing the underlying simulator by some number of cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Ok,
    /// The simulator stopped early, after `after` of the requested cycles.
    /// `is_assertion` distinguishes a failed assertion from a plain `Stop`.
    Interrupted { after: u64, is_assertion: bool },
}

pub trait Simulator: Send {
    fn step(&mut self, cycles: u64) -> StepResult;
    fn peek(&self, name: &str) -> SimResult<BigInt>;
    fn poke(&mut self, name: &str, value: BigInt) -> SimResult<()>;
    fn finish(&mut self);
    fn supports_coverage(&self) -> bool {
        false
    }
    fn coverage(&self) -> HashMap<String, u64> {
        HashMap::new()
    }
}

/// Adapts this crate's own evaluation engine to the [`Simulator`] contract
/// by widening every peek to a `BigInt` and narrowing every poke back down
/// to the symbol's native class.
pub struct EvalSimulator {
    pub sim: Simulation,
}

impl EvalSimulator {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }
}

impl Simulator for EvalSimulator {
    fn step(&mut self, cycles: u64) -> StepResult {
        for _ in 0..cycles {
            self.sim.step();
        }
        StepResult::Ok
    }

    fn peek(&self, name: &str) -> SimResult<BigInt> {
        let id = self.sim.get_symbol_id(name)?;
        let symbol = self.sim.executable().info.get(id);
        match symbol.class {
            crate::storage::values::ValueKind::Bool => {
                Ok(BigInt::from(self.sim.peek_bool(id)? as u64))
            }
            crate::storage::values::ValueKind::Long => {
                Ok(BigInt::from(self.sim.peek_long(id)?))
            }
            crate::storage::values::ValueKind::Big => self.sim.peek_big(id),
        }
    }

    fn poke(&mut self, name: &str, value: BigInt) -> SimResult<()> {
        let id = self.sim.get_symbol_id(name)?;
        let symbol = self.sim.executable().info.get(id);
        match symbol.class {
            crate::storage::values::ValueKind::Bool => {
                self.sim.poke_bool(id, value != BigInt::from(0))
            }
            crate::storage::values::ValueKind::Long => {
                let v = value.to_i64().ok_or_else(|| SimError::ValueOutOfRange {
                    symbol: symbol.name.clone(),
                    class: "Long",
                })?;
                self.sim.poke_long(id, v)
            }
            crate::storage::values::ValueKind::Big => self.sim.poke_big(id, value),
        }
    }

    fn finish(&mut self) {}
}

/// A scripted test double implementing [`Simulator`] without any evaluation
/// engine behind it, for scheduler/access-checker tests that don't need a
/// real design (spec.md §8 scenarios S2–S6).
#[derive(Default)]
pub struct ScriptedSimulator {
    pub values: HashMap<String, BigInt>,
    pub interrupt_at: Option<(u64, bool)>,
    steps_taken: u64,
}

impl ScriptedSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }
}

impl Simulator for ScriptedSimulator {
    fn step(&mut self, cycles: u64) -> StepResult {
        if let Some((at, is_assertion)) = self.interrupt_at {
            if self.steps_taken + cycles >= at {
                let after = at - self.steps_taken;
                self.steps_taken = at;
                self.interrupt_at = None;
                return StepResult::Interrupted { after, is_assertion };
            }
        }
        self.steps_taken += cycles;
        StepResult::Ok
    }

    fn peek(&self, name: &str) -> SimResult<BigInt> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::UnknownSymbol(name.to_string()))
    }

    fn poke(&mut self, name: &str, value: BigInt) -> SimResult<()> {
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    fn finish(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::executable::{Executable, StorageIndex, Symbol, SymbolKind, SymbolTable};
    use crate::storage::node::{Node, NodeId};
    use crate::storage::store::{Store, StoreTarget};
    use crate::storage::values::{Storage, ValueKind};

    fn one_long_register_exe() -> Executable {
        let mut info = SymbolTable::new();
        let mut data = Storage::new();
        let idx = data.push_long(0);
        info.insert(Symbol {
            name: "counter".into(),
            kind: SymbolKind::Register,
            width: 32,
            signed: true,
            is_clock: false,
            class: ValueKind::Long,
            storage: StorageIndex::Scalar(idx),
        });
        let nodes = vec![Node::LoadLong(idx)];
        let stores = vec![Store::new(StoreTarget::Long(idx), NodeId(0))];
        Executable::new(info, data, nodes, stores)
    }

    #[test]
    fn negative_long_poke_round_trips_through_peek() {
        let mut sim = EvalSimulator::new(Simulation::new(one_long_register_exe()));
        sim.poke("counter", BigInt::from(-42)).unwrap();
        assert_eq!(sim.peek("counter").unwrap(), BigInt::from(-42));
    }

    #[test]
    fn long_poke_out_of_i64_range_errors_instead_of_truncating() {
        let mut sim = EvalSimulator::new(Simulation::new(one_long_register_exe()));
        let too_big = BigInt::from(i64::MAX) + BigInt::from(1);
        assert!(matches!(
            sim.poke("counter", too_big),
            Err(SimError::ValueOutOfRange { .. })
        ));
    }
}
