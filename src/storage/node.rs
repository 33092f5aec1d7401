//! Expression nodes: the value-producing tree assembled into a store's root.
//!
//! Nodes live in a flat arena (`Vec<Node>`) owned by the
//! [`super::executable::Executable`] and are addressed by [`NodeId`], an
//! index rather than a pointer. This sidesteps the "loads hold a
//! back-reference to storage, rebinding is supported" indirection spec.md
//! §4.B asks for in languages with mutable object graphs: here, evaluation
//! simply takes `&Storage` as a parameter, so "rebinding" is just passing a
//! different `Storage` — free, and impossible to get wrong.
//!
//! Mutation-free evaluation: nodes are immutable after construction, and
//! `eval` never allocates for the `Bool`/`Long` classes. `Big` evaluation may
//! allocate (arbitrary-precision arithmetic), matching the explicit carve-out
//! in spec.md §4.C.

use num_bigint::BigInt;

use super::values::{Storage, Value};

/// An index into an [`Executable`](super::executable::Executable)'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// A tagged, value-producing expression node. See spec.md §4.B for the full
/// node catalogue and semantics; each variant here carries exactly the
/// operands and precomputed constants (masks, shifts) it needs to evaluate.
#[derive(Debug, Clone)]
pub enum Node {
    LoadBool(usize),
    LoadLong(usize),
    LoadBig(usize),

    ConstBool(bool),
    ConstLong(i64),
    ConstBig(BigInt),

    BoolToLong(NodeId),
    BoolToBig(NodeId),
    LongToBig(NodeId),

    AddLong(NodeId, NodeId),
    AddBig(NodeId, NodeId),
    SubLong(NodeId, NodeId),
    SubBig(NodeId, NodeId),

    BitsBoolFromLong(NodeId, u32),
    BitsBoolFromBig(NodeId, u32),
    /// `(e >> shift) & mask`, result Long.
    BitsLongFromLong(NodeId, i64, u32),
    /// `((e >> shift) & mask).toLong()`, e is Big.
    BitsLongFromBig(NodeId, BigInt, u32),
    /// `(e >> shift) & mask`, result Big.
    BitsBig(NodeId, BigInt, u32),

    NotBool(NodeId),
    NotLong(NodeId, i64),
    NotBig(NodeId, BigInt),

    MuxBool(NodeId, NodeId, NodeId),
    MuxLong(NodeId, NodeId, NodeId),
    MuxBig(NodeId, NodeId, NodeId),

    EqualBool(NodeId, NodeId),
    EqualLong(NodeId, NodeId),
    EqualBig(NodeId, NodeId),

    GtLong(NodeId, NodeId),
    GtBig(NodeId, NodeId),
    GtUnsigned64Long(NodeId, NodeId),
    GtUnsignedBool(NodeId, NodeId),
    GtSignedBool(NodeId, NodeId),
}

/// Unsigned `>` for two values held in signed 64-bit cells. See spec.md
/// §4.B: when the sign bits differ the comparison is decided by which one
/// is set; when they agree the host's signed compare already agrees with
/// the unsigned one.
pub fn gt_unsigned64(a: i64, b: i64) -> bool {
    let a_msb = a < 0;
    let b_msb = b < 0;
    if a_msb == b_msb {
        a > b
    } else {
        a_msb
    }
}

/// Evaluates the subtree rooted at `id` against `storage`. Recursive, not
/// allocating tree structure (the arena is shared, read-only during eval).
pub fn eval(arena: &[Node], id: NodeId, storage: &Storage) -> Value {
    match &arena[id.0 as usize] {
        Node::LoadBool(i) => Value::Bool(storage.bools[*i]),
        Node::LoadLong(i) => Value::Long(storage.longs[*i]),
        Node::LoadBig(i) => Value::Big(storage.bigs[*i].clone()),

        Node::ConstBool(v) => Value::Bool(*v),
        Node::ConstLong(v) => Value::Long(*v),
        Node::ConstBig(v) => Value::Big(v.clone()),

        Node::BoolToLong(e) => Value::Long(if eval(arena, *e, storage).as_bool() { 1 } else { 0 }),
        Node::BoolToBig(e) => Value::Big(if eval(arena, *e, storage).as_bool() {
            BigInt::from(1)
        } else {
            BigInt::from(0)
        }),
        Node::LongToBig(e) => {
            let v = eval(arena, *e, storage).as_long();
            Value::Big(BigInt::from(v as u64))
        }

        Node::AddLong(a, b) => Value::Long(
            eval(arena, *a, storage)
                .as_long()
                .wrapping_add(eval(arena, *b, storage).as_long()),
        ),
        Node::AddBig(a, b) => {
            Value::Big(eval(arena, *a, storage).into_big() + eval(arena, *b, storage).into_big())
        }
        Node::SubLong(a, b) => Value::Long(
            eval(arena, *a, storage)
                .as_long()
                .wrapping_sub(eval(arena, *b, storage).as_long()),
        ),
        Node::SubBig(a, b) => {
            Value::Big(eval(arena, *a, storage).into_big() - eval(arena, *b, storage).into_big())
        }

        Node::BitsBoolFromLong(e, bit) => {
            let v = eval(arena, *e, storage).as_long();
            Value::Bool(((v >> bit) & 1) == 1)
        }
        Node::BitsBoolFromBig(e, bit) => {
            let v = eval(arena, *e, storage).into_big();
            Value::Bool((v >> *bit) & BigInt::from(1) == BigInt::from(1))
        }
        Node::BitsLongFromLong(e, mask, shift) => {
            let v = eval(arena, *e, storage).as_long();
            Value::Long((v >> shift) & mask)
        }
        Node::BitsLongFromBig(e, mask, shift) => {
            let v = eval(arena, *e, storage).into_big();
            let masked = (v >> *shift) & mask;
            Value::Long(to_i64_truncating(&masked))
        }
        Node::BitsBig(e, mask, shift) => {
            let v = eval(arena, *e, storage).into_big();
            Value::Big((v >> *shift) & mask)
        }

        Node::NotBool(e) => Value::Bool(!eval(arena, *e, storage).as_bool()),
        Node::NotLong(e, mask) => Value::Long(!eval(arena, *e, storage).as_long() & mask),
        Node::NotBig(e, mask) => {
            let v = eval(arena, *e, storage).into_big();
            Value::Big(!v & mask)
        }

        Node::MuxBool(c, t, f) => Value::Bool(if eval(arena, *c, storage).as_bool() {
            eval(arena, *t, storage).as_bool()
        } else {
            eval(arena, *f, storage).as_bool()
        }),
        Node::MuxLong(c, t, f) => Value::Long(if eval(arena, *c, storage).as_bool() {
            eval(arena, *t, storage).as_long()
        } else {
            eval(arena, *f, storage).as_long()
        }),
        Node::MuxBig(c, t, f) => Value::Big(if eval(arena, *c, storage).as_bool() {
            eval(arena, *t, storage).into_big()
        } else {
            eval(arena, *f, storage).into_big()
        }),

        Node::EqualBool(a, b) => Value::Bool(
            eval(arena, *a, storage).as_bool() == eval(arena, *b, storage).as_bool(),
        ),
        Node::EqualLong(a, b) => Value::Bool(
            eval(arena, *a, storage).as_long() == eval(arena, *b, storage).as_long(),
        ),
        Node::EqualBig(a, b) => Value::Bool(
            eval(arena, *a, storage).into_big() == eval(arena, *b, storage).into_big(),
        ),

        Node::GtLong(a, b) => Value::Bool(
            eval(arena, *a, storage).as_long() > eval(arena, *b, storage).as_long(),
        ),
        Node::GtBig(a, b) => Value::Bool(
            eval(arena, *a, storage).into_big() > eval(arena, *b, storage).into_big(),
        ),
        Node::GtUnsigned64Long(a, b) => Value::Bool(gt_unsigned64(
            eval(arena, *a, storage).as_long(),
            eval(arena, *b, storage).as_long(),
        )),
        Node::GtUnsignedBool(a, b) => {
            let a = eval(arena, *a, storage).as_bool();
            let b = eval(arena, *b, storage).as_bool();
            Value::Bool(a && !b)
        }
        Node::GtSignedBool(a, b) => {
            let a = eval(arena, *a, storage).as_bool();
            let b = eval(arena, *b, storage).as_bool();
            Value::Bool(!a && b)
        }
    }
}

/// Truncates a (possibly large) non-negative `BigInt` to its low 64 bits,
/// interpreted as a signed `i64` two's-complement pattern — used by
/// `BitsLongFromBig` to cast a masked Big slice down to Long.
fn to_i64_truncating(v: &BigInt) -> i64 {
    let (sign, bytes) = v.to_bytes_le();
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    let unsigned = u64::from_le_bytes(buf);
    if sign == num_bigint::Sign::Minus {
        (unsigned as i64).wrapping_neg()
    } else {
        unsigned as i64
    }
}
