//! Builds the subtractive-GCD reference design by hand and drives it through
//! a handful of input pairs, printing each result. Demonstrates the public
//! API end to end: a hand-assembled `Executable`, wrapped in an
//! `EvalSimulator`, driven through the single-thread backend.

use cyclesim::backend::SingleThreadBackend;
use cyclesim::error::SimResult;
use cyclesim::sim::Simulation;
use cyclesim::simulator::EvalSimulator;
use cyclesim::storage::executable::{Executable, StorageIndex, Symbol, SymbolKind, SymbolTable};
use cyclesim::storage::node::{Node, NodeId};
use cyclesim::storage::store::{Store, StoreTarget};
use cyclesim::storage::values::{Storage, ValueKind};
use num_bigint::BigInt;

/// Two inputs `a`, `b`, a load strobe `e`, and outputs `z` (the GCD once
/// converged) and `v` (valid/done). Internally, two registers `x`/`y` run
/// the subtractive Euclidean algorithm one step per tick.
fn gcd_design() -> Executable {
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

    info.insert(Symbol {
        name: "a".into(),
        kind: SymbolKind::Input,
        width: 32,
        signed: false,
        is_clock: false,
        class: ValueKind::Long,
        storage: StorageIndex::Scalar(a_idx),
    });
    info.insert(Symbol {
        name: "b".into(),
        kind: SymbolKind::Input,
        width: 32,
        signed: false,
        is_clock: false,
        class: ValueKind::Long,
        storage: StorageIndex::Scalar(b_idx),
    });
    info.insert(Symbol {
        name: "e".into(),
        kind: SymbolKind::Input,
        width: 1,
        signed: false,
        is_clock: false,
        class: ValueKind::Bool,
        storage: StorageIndex::Scalar(e_idx),
    });
    info.insert(Symbol {
        name: "z".into(),
        kind: SymbolKind::Output,
        width: 32,
        signed: false,
        is_clock: false,
        class: ValueKind::Long,
        storage: StorageIndex::Scalar(z_idx),
    });
    info.insert(Symbol {
        name: "v".into(),
        kind: SymbolKind::Output,
        width: 1,
        signed: false,
        is_clock: false,
        class: ValueKind::Bool,
        storage: StorageIndex::Scalar(v_idx),
    });

    // Nodes, in evaluation order (each NodeId is its position in this Vec).
    let nodes = vec![
        Node::LoadLong(x_idx),                                 // 0: old_x source
        Node::LoadLong(y_idx),                                 // 1: old_y source
        Node::LoadBool(e_idx),                                 // 2: e
        Node::LoadLong(a_idx),                                 // 3: a
        Node::LoadLong(b_idx),                                 // 4: b
        Node::LoadLong(old_x_idx),                             // 5: old_x (post-snapshot)
        Node::LoadLong(old_y_idx),                             // 6: old_y (post-snapshot)
        Node::GtLong(NodeId(5), NodeId(6)),                    // 7: old_x > old_y
        Node::SubLong(NodeId(5), NodeId(6)),                   // 8: old_x - old_y
        Node::SubLong(NodeId(6), NodeId(5)),                   // 9: old_y - old_x
        Node::MuxLong(NodeId(7), NodeId(8), NodeId(5)),        // 10: next x if not loading
        Node::MuxLong(NodeId(2), NodeId(3), NodeId(10)),       // 11: next x
        Node::MuxLong(NodeId(7), NodeId(6), NodeId(9)),        // 12: next y if not loading
        Node::MuxLong(NodeId(2), NodeId(4), NodeId(12)),       // 13: next y
        Node::LoadLong(x_idx),                                 // 14: x after update, for z
        Node::LoadLong(y_idx),                                 // 15: y after update, for v
        Node::ConstLong(0),                                    // 16: zero
        Node::EqualLong(NodeId(15), NodeId(16)),               // 17: y == 0
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

fn run_gcd(backend: &mut SingleThreadBackend, a: i64, b: i64) -> SimResult<i64> {
    backend.step("clock", 1)?;
    backend.poke_bits("a", BigInt::from(a))?;
    backend.poke_bits("b", BigInt::from(b))?;
    backend.poke_bits("e", BigInt::from(1))?;
    backend.step("clock", 1)?;
    backend.poke_bits("e", BigInt::from(0))?;
    loop {
        backend.step("clock", 1)?;
        if backend.peek_bits("v")? == BigInt::from(1) {
            break;
        }
    }
    let z = backend.peek_bits("z")?;
    let (_, digits) = z.to_u64_digits();
    Ok(digits.first().copied().unwrap_or(0) as i64)
}

fn main() -> SimResult<()> {
    cyclesim::telemetry::init(&cyclesim::config::LoggingConfig::default());
    let sim = EvalSimulator::new(Simulation::new(gcd_design()));
    SingleThreadBackend::run(Box::new(sim), "clock", |backend| {
        backend.set_timeout("clock", 1_000)?;
        for (a, b) in [(12, 18), (0, 5), (17, 13), (30, 18)] {
            let z = run_gcd(backend, a, b)?;
            println!("gcd({a}, {b}) = {z}");
        }
        Ok(())
    })
    .map(|_| ())
}
