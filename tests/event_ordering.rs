//! Integration tests for task submission and ordering
//!
//! Tests verify:
//! - Tasks run after their predecessors
//! - Failures and panics propagate to dependents without running them
//! - Order managers chain and drain submissions

mod common;

use common::create_cpu_client;
use devkern::error::Error;
use devkern::runtime::{Blocking, OrderManager, RuntimeClient, SequentialOrderManager};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[test]
fn test_chain_runs_in_order() {
    let (client, _device) = create_cpu_client();
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut prev = Vec::new();
    for i in 0..20 {
        let log = Arc::clone(&log);
        let event = client.submit("append", &prev, move || {
            // Give later tasks a chance to overtake if ordering were broken.
            if i % 3 == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            log.lock().push(i);
            Ok(())
        });
        prev = vec![event];
    }
    prev[0].wait().unwrap();
    assert_eq!(*log.lock(), (0..20).collect::<Vec<_>>());
}

#[test]
fn test_join_waits_for_every_predecessor() {
    let (client, _device) = create_cpu_client();
    let done = Arc::new(Mutex::new(0usize));

    let parents: Vec<_> = (0..8)
        .map(|_| {
            let done = Arc::clone(&done);
            client.submit("parent", &[], move || {
                std::thread::sleep(Duration::from_millis(2));
                *done.lock() += 1;
                Ok(())
            })
        })
        .collect();

    let seen = Arc::new(Mutex::new(0usize));
    let seen_in_child = Arc::clone(&seen);
    let child = client.submit("child", &parents, move || {
        *seen_in_child.lock() = *done.lock();
        Ok(())
    });
    child.wait().unwrap();
    assert_eq!(*seen.lock(), 8);
}

#[test]
fn test_failure_skips_dependents() {
    let (client, _device) = create_cpu_client();
    let ran = Arc::new(AtomicBool::new(false));

    let failing = client.submit("failing", &[], || {
        Err(Error::kernel_failed("failing", "synthetic failure"))
    });
    let ran_in_child = Arc::clone(&ran);
    let child = client.submit("child", &[failing.clone()], move || {
        ran_in_child.store(true, Ordering::SeqCst);
        Ok(())
    });

    assert!(matches!(failing.wait(), Err(Error::KernelFailed { op: "failing", .. })));
    assert!(matches!(child.wait(), Err(Error::DependencyFailed { op: "child", .. })));
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn test_panic_becomes_kernel_failure() {
    let (client, _device) = create_cpu_client();
    let event = client.submit("panicking", &[], || panic!("index out of range"));
    match event.wait() {
        Err(Error::KernelFailed { op, reason }) => {
            assert_eq!(op, "panicking");
            assert!(reason.contains("index out of range"));
        }
        other => panic!("expected KernelFailed, got {other:?}"),
    }
}

#[test]
fn test_synchronize_reports_failures() {
    let (client, _device) = create_cpu_client();
    let ok = client.submit("ok", &[], || Ok(()));
    let _bad = client.submit("bad", &[ok], || Err(Error::kernel_failed("bad", "nope")));
    assert!(client.synchronize().is_err());
    // Failures are reported once.
    assert!(client.synchronize().is_ok());
    assert_eq!(client.in_flight(), 0);
}

#[test]
fn test_sequential_order_chains_submissions() {
    let (client, _device) = create_cpu_client();
    let order = SequentialOrderManager::new();
    let value = Arc::new(Mutex::new(1i64));

    for step in 0..10 {
        let value = Arc::clone(&value);
        let compute = client.submit("step", &order.depends_on(), move || {
            std::thread::sleep(Duration::from_millis(1));
            let mut v = value.lock();
            // Not commutative: any reordering changes the result.
            *v = *v * 3 + step;
            Ok(())
        });
        let host = client.submit("host", std::slice::from_ref(&compute), || Ok(()));
        order.submit(host, compute).unwrap();
    }
    order.wait().unwrap();

    let expected = (0..10).fold(1i64, |v, step| v * 3 + step);
    assert_eq!(*value.lock(), expected);
    assert_eq!(order.outstanding(), 0);
}

#[test]
fn test_blocking_returns_completed_work() {
    let (client, _device) = create_cpu_client();
    let flag = Arc::new(AtomicBool::new(false));
    let flag_in_task = Arc::clone(&flag);
    let compute = client.submit("work", &Blocking.depends_on(), move || {
        std::thread::sleep(Duration::from_millis(2));
        flag_in_task.store(true, Ordering::SeqCst);
        Ok(())
    });
    let host = client.submit("host", std::slice::from_ref(&compute), || Ok(()));
    Blocking.submit(host, compute).unwrap();
    assert!(flag.load(Ordering::SeqCst));
}

#[test]
fn test_sequential_order_surfaces_failure() {
    let (client, _device) = create_cpu_client();
    let order = SequentialOrderManager::new();

    let compute = client.submit("bad", &[], || Err(Error::kernel_failed("bad", "broken")));
    order.submit(compute.clone(), compute).unwrap();

    let next = client.submit("next", &order.depends_on(), || Ok(()));
    order.submit(next.clone(), next).unwrap();

    assert!(order.wait().is_err());
}
