//! Shared fixtures for integration tests: the subtractive-GCD reference
//! design used by the cycle-accuracy scenario.

use cyclesim::storage::executable::{Executable, StorageIndex, Symbol, SymbolKind, SymbolTable};
use cyclesim::storage::node::{Node, NodeId};
use cyclesim::storage::store::{Store, StoreTarget};
use cyclesim::storage::values::{Storage, ValueKind};

pub fn gcd_design() -> Executable {
    let mut info = SymbolTable::new();
    let mut data = Storage::new();

    let a_idx = data.push_long(0);
    let b_idx = data.push_long(0);
    let e_idx = data.push_bool(false);
    let x_idx = data.push_long(0);
    let y_idx = data.push_long(0);
    let old_x_idx = data.push_long(0);
    let old_y_idx = data.push_long(0);
    let z_idx = data.push_long(0);
    let v_idx = data.push_bool(false);

    let io = [
        ("a", SymbolKind::Input, ValueKind::Long, 32, a_idx),
        ("b", SymbolKind::Input, ValueKind::Long, 32, b_idx),
        ("e", SymbolKind::Input, ValueKind::Bool, 1, e_idx),
        ("z", SymbolKind::Output, ValueKind::Long, 32, z_idx),
        ("v", SymbolKind::Output, ValueKind::Bool, 1, v_idx),
    ];
    for (name, kind, class, width, idx) in io {
        info.insert(Symbol {
            name: name.to_string(),
            kind,
            width,
            signed: false,
            is_clock: false,
            class,
            storage: StorageIndex::Scalar(idx),
        });
    }

    let nodes = vec![
        Node::LoadLong(x_idx),
        Node::LoadLong(y_idx),
        Node::LoadBool(e_idx),
        Node::LoadLong(a_idx),
        Node::LoadLong(b_idx),
        Node::LoadLong(old_x_idx),
        Node::LoadLong(old_y_idx),
        Node::GtLong(NodeId(5), NodeId(6)),
        Node::SubLong(NodeId(5), NodeId(6)),
        Node::SubLong(NodeId(6), NodeId(5)),
        Node::MuxLong(NodeId(7), NodeId(8), NodeId(5)),
        Node::MuxLong(NodeId(2), NodeId(3), NodeId(10)),
        Node::MuxLong(NodeId(7), NodeId(6), NodeId(9)),
        Node::MuxLong(NodeId(2), NodeId(4), NodeId(12)),
        Node::LoadLong(x_idx),
        Node::LoadLong(y_idx),
        Node::ConstLong(0),
        Node::EqualLong(NodeId(15), NodeId(16)),
    ];

    let stores = vec![
        Store::new(StoreTarget::Long(old_x_idx), NodeId(0)),
        Store::new(StoreTarget::Long(old_y_idx), NodeId(1)),
        Store::new(StoreTarget::Long(x_idx), NodeId(11)),
        Store::new(StoreTarget::Long(y_idx), NodeId(13)),
        Store::new(StoreTarget::Long(z_idx), NodeId(14)),
        Store::new(StoreTarget::Bool(v_idx), NodeId(17)),
    ];

    Executable::new(info, data, nodes, stores)
}
