//! End-to-end scenarios exercising the whole stack: evaluation engine,
//! access checker, and scheduler together.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use num_bigint::BigInt;
use test_case::test_case;

use cyclesim::access::Direction;
use cyclesim::backend::{SingleThreadBackend, ThreadedBackend};
use cyclesim::error::{SimError, SimResult};
use cyclesim::sim::Simulation;
use cyclesim::simulator::{ScriptedSimulator, Simulator, StepResult};

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

#[test_case(12, 18, 6; "both even, common factor 6")]
#[test_case(0, 5, 5; "zero operand returns the other")]
#[test_case(17, 13, 1; "coprime pair")]
#[test_case(30, 18, 6; "shared factor 6 again, different magnitudes")]
fn s1_gcd_cycle_accuracy(a: i64, b: i64, expected: i64) {
    let sim = cyclesim::simulator::EvalSimulator::new(Simulation::new(common::gcd_design()));
    SingleThreadBackend::run(Box::new(sim), "clock", |backend| {
        backend.set_timeout("clock", 1_000)?;
        assert_eq!(run_gcd(backend, a, b).unwrap(), expected);
        Ok(())
    })
    .unwrap();
}

/// Wraps a `ScriptedSimulator`, counting how many pokes actually reach it.
struct CountingSimulator {
    inner: ScriptedSimulator,
    poke_count: Arc<Mutex<u64>>,
}

impl Simulator for CountingSimulator {
    fn step(&mut self, cycles: u64) -> StepResult {
        self.inner.step(cycles)
    }
    fn peek(&self, name: &str) -> SimResult<BigInt> {
        self.inner.peek(name)
    }
    fn poke(&mut self, name: &str, value: BigInt) -> SimResult<()> {
        *self.poke_count.lock().unwrap() += 1;
        self.inner.poke(name, value)
    }
    fn finish(&mut self) {}
}

#[test]
fn s2_poke_coalescing_still_times_out() {
    let poke_count = Arc::new(Mutex::new(0u64));
    let sim = CountingSimulator {
        inner: ScriptedSimulator::new(),
        poke_count: poke_count.clone(),
    };
    let mut backend = SingleThreadBackend::new(Box::new(sim), "clock");
    backend.set_timeout("clock", 100).unwrap();

    for _ in 0..99 {
        backend.poke_bits("x", BigInt::from(3)).unwrap();
        backend.step("clock", 1).unwrap();
    }
    let err = {
        backend.poke_bits("x", BigInt::from(3)).unwrap();
        backend.step("clock", 1).unwrap_err()
    };
    assert!(matches!(err, SimError::Timeout(100)));
    // Only the first poke actually changed the value; the other 99 coalesce.
    assert_eq!(*poke_count.lock().unwrap(), 1);
}

#[test]
fn s3_cross_thread_conflict_between_unrelated_threads() {
    let io = vec![("x".to_string(), Direction::Input)];
    let report = ThreadedBackend::run(
        Box::new(ScriptedSimulator::new()),
        "clock",
        io,
        &HashMap::new(),
        |backend| {
            let conflict = Arc::new(Mutex::new(None));
            let conflict_writer = conflict.clone();

            // Sibling threads: neither is an ancestor of the other, so the
            // access checker cannot treat one's access as ordered before
            // the other's within the same tick.
            let poker = backend.fork("poker", |s| s.poke("x", BigInt::from(1)));
            backend.join(&[poker], None).unwrap();

            let peeker = backend.fork("peeker", move |s| {
                *conflict_writer.lock().unwrap() = Some(s.peek("x"));
                Ok(())
            });
            backend.join(&[peeker], None).unwrap();

            let result = conflict.lock().unwrap().take().unwrap();
            assert!(matches!(
                result,
                Err(SimError::ThreadOrderDependent { is_poke: false, .. })
            ));
            Ok(())
        },
    );
    assert!(report.is_ok());
}

#[test]
fn s4_fork_join_ordering_is_depth_first_pre_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_a = log.clone();
    let log_b = log.clone();

    let report = ThreadedBackend::run(
        Box::new(ScriptedSimulator::new()),
        "clock",
        vec![],
        &HashMap::new(),
        move |backend| {
            let a = backend.fork("A", move |s| {
                s.step(3)?;
                log_a.lock().unwrap().push("A");
                Ok(())
            });
            let b = backend.fork("B", move |s| {
                s.step(3)?;
                log_b.lock().unwrap().push("B");
                Ok(())
            });
            backend.join(&[a], None)?;
            backend.join(&[b], None)?;
            Ok(())
        },
    );
    assert!(report.is_ok());
    assert_eq!(*log.lock().unwrap(), vec!["A", "B"]);
}

#[test]
fn s5_mutual_join_before_stepping_deadlocks() {
    let report = ThreadedBackend::run(
        Box::new(ScriptedSimulator::new()),
        "clock",
        vec![],
        &HashMap::new(),
        |backend| {
            let a_id = Arc::new(Mutex::new(None));
            let b_id = Arc::new(Mutex::new(None));
            let a_id_for_b = a_id.clone();
            let b_id_for_a = b_id.clone();

            let a = backend.fork("a", move |s| {
                s.step(1)?;
                let b = b_id_for_a.lock().unwrap().expect("b forked before a resumes");
                s.join(&[b])
            });
            *a_id.lock().unwrap() = Some(a);
            let b = backend.fork("b", move |s| {
                s.step(1)?;
                let a = a_id_for_b.lock().unwrap().expect("a forked before b resumes");
                s.join(&[a])
            });
            *b_id.lock().unwrap() = Some(b);
            backend.join(&[a, b], None)
        },
    );
    assert!(matches!(report, Err(SimError::Deadlock)));
}

#[test]
fn s6_timeout_fires_at_exactly_ten_idle_cycles() {
    let io = vec![("x".to_string(), Direction::Input)];
    let report = ThreadedBackend::run(
        Box::new(ScriptedSimulator::new()),
        "clock",
        io,
        &HashMap::new(),
        |backend| {
            backend.set_timeout("clock", 10)?;
            for _ in 0..5 {
                backend.step("clock", 1)?;
            }
            backend.poke_bits("x", BigInt::from(7))?;
            for _ in 0..9 {
                backend.step("clock", 1)?;
            }
            backend.step("clock", 1)
        },
    );
    assert!(matches!(report, Err(SimError::Timeout(10))));
}
