//! The simulation façade: name resolution plus typed peek/poke/step
//! (spec.md §4.E). Access is by [`SymbolId`] once resolved; resolution
//! happens once, via the symbol table.

use num_bigint::BigInt;

use crate::error::{SimError, SimResult};
use crate::storage::executable::{Executable, StorageIndex, SymbolId};
use crate::storage::values::ValueKind;

/// Thin façade over a compiled [`Executable`]. Owns nothing the executable
/// doesn't already own; it exists purely to give test code a typed,
/// name-resolvable surface over raw storage indices.
pub struct Simulation {
    executable: Executable,
}

impl Simulation {
    pub fn new(executable: Executable) -> Self {
        Self { executable }
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    pub fn get_symbol_id(&self, name: &str) -> SimResult<SymbolId> {
        self.executable.info.lookup(name)
    }

    fn scalar_index(&self, id: SymbolId, expected: ValueKind) -> SimResult<usize> {
        let symbol = self.executable.info.get(id);
        if symbol.class != expected {
            return Err(SimError::ClassMismatch {
                symbol: symbol.name.clone(),
                expected: expected.name(),
                actual: symbol.class.name(),
            });
        }
        match symbol.storage {
            StorageIndex::Scalar(i) => Ok(i),
            StorageIndex::Array { .. } => Err(SimError::ClassMismatch {
                symbol: symbol.name.clone(),
                expected: "scalar",
                actual: "array",
            }),
        }
    }

    pub fn poke_bool(&mut self, id: SymbolId, v: bool) -> SimResult<()> {
        let i = self.scalar_index(id, ValueKind::Bool)?;
        self.executable.data.bools[i] = v;
        Ok(())
    }

    pub fn poke_long(&mut self, id: SymbolId, v: i64) -> SimResult<()> {
        let i = self.scalar_index(id, ValueKind::Long)?;
        self.executable.data.longs[i] = v;
        Ok(())
    }

    pub fn poke_big(&mut self, id: SymbolId, v: BigInt) -> SimResult<()> {
        let i = self.scalar_index(id, ValueKind::Big)?;
        self.executable.data.bigs[i] = v;
        Ok(())
    }

    pub fn peek_bool(&self, id: SymbolId) -> SimResult<bool> {
        let i = self.scalar_index(id, ValueKind::Bool)?;
        Ok(self.executable.data.bools[i])
    }

    pub fn peek_long(&self, id: SymbolId) -> SimResult<i64> {
        let i = self.scalar_index(id, ValueKind::Long)?;
        Ok(self.executable.data.longs[i])
    }

    pub fn peek_big(&self, id: SymbolId) -> SimResult<BigInt> {
        let i = self.scalar_index(id, ValueKind::Big)?;
        Ok(self.executable.data.bigs[i].clone())
    }

    /// Advances one tick: every store runs once, in order.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn step(&mut self) {
        self.executable.update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::executable::{Symbol, SymbolKind, SymbolTable};
    use crate::storage::node::{Node, NodeId};
    use crate::storage::store::{Store, StoreTarget};
    use crate::storage::values::Storage;

    fn one_register_exe() -> Executable {
        let mut info = SymbolTable::new();
        let mut data = Storage::new();
        let idx = data.push_bool(false);
        info.insert(Symbol {
            name: "flag".into(),
            kind: SymbolKind::Register,
            width: 1,
            signed: false,
            is_clock: false,
            class: ValueKind::Bool,
            storage: StorageIndex::Scalar(idx),
        });
        let nodes = vec![Node::LoadBool(idx)];
        let stores = vec![Store::new(StoreTarget::Bool(idx), NodeId(0))];
        Executable::new(info, data, nodes, stores)
    }

    #[test]
    fn poke_then_peek_round_trips_between_ticks() {
        let mut sim = Simulation::new(one_register_exe());
        let id = sim.get_symbol_id("flag").unwrap();
        sim.poke_bool(id, true).unwrap();
        assert!(sim.peek_bool(id).unwrap());
    }

    #[test]
    fn class_mismatch_is_an_error_not_a_panic() {
        let mut sim = Simulation::new(one_register_exe());
        let id = sim.get_symbol_id("flag").unwrap();
        assert!(matches!(sim.poke_long(id, 1), Err(SimError::ClassMismatch { .. })));
    }

    #[test]
    fn unknown_symbol_errors() {
        let sim = Simulation::new(one_register_exe());
        assert!(matches!(sim.get_symbol_id("nope"), Err(SimError::UnknownSymbol(_))));
    }
}
