//! Multi-thread stress tests for the interning dictionary.
//!
//! All tests run against the process-wide dictionary, exactly as production
//! callers do. The properties checked (canonical addresses, content
//! immortality) are stable under interference between concurrently running
//! tests, so no serialization between them is needed.

#![expect(clippy::unwrap_used)]

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use litdict::DictStr;

/// Build a workload of random strings with lengths in `1..=30`.
fn random_strings(count: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let len = rng.gen_range(1..=30);
            (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect()
        })
        .collect()
}

#[test]
fn parallel_refill_converges_on_one_address_per_string() {
    common::init_tracing();

    const THREADS: usize = 5;
    const STRINGS: usize = 100_000;

    let strings = Arc::new(random_strings(STRINGS, 0x5eed));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let strings = Arc::clone(&strings);
            thread::spawn(move || {
                strings
                    .iter()
                    .map(|s| litdict::intern(s).unwrap().as_ptr() as usize)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let per_thread: Vec<Vec<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Every thread saw the same canonical address at every index.
    for addresses in &per_thread[1..] {
        assert_eq!(addresses, &per_thread[0]);
    }

    // Exactly one node per distinct string.
    let distinct_strings: HashSet<&str> = strings.iter().map(String::as_str).collect();
    let distinct_addresses: HashSet<usize> = per_thread[0].iter().copied().collect();
    assert_eq!(distinct_addresses.len(), distinct_strings.len());
}

#[test]
fn addresses_stay_valid_while_other_threads_insert() {
    common::init_tracing();

    // Pin a set of strings and their addresses.
    let pinned = random_strings(2_000, 0xcafe);
    let handles: Vec<DictStr> = pinned.iter().map(|s| litdict::intern(s).unwrap()).collect();

    // Hammer the dictionary from background threads, enough to force page
    // allocations and table growth underneath the pinned handles.
    let writers: Vec<_> = (0..4)
        .map(|t| {
            thread::spawn(move || {
                for i in 0..50_000 {
                    litdict::intern(format!("churn-{t}-{i}")).unwrap();
                }
            })
        })
        .collect();

    // Re-check contents and addresses while the writers run.
    for _ in 0..20 {
        for (s, handle) in pinned.iter().zip(&handles) {
            assert_eq!(handle.as_bytes(), s.as_bytes());
            assert_eq!(litdict::intern(s).unwrap().as_ptr(), handle.as_ptr());
        }
    }

    for writer in writers {
        writer.join().unwrap();
    }

    // And after they are done.
    for (s, handle) in pinned.iter().zip(&handles) {
        assert_eq!(handle.as_bytes(), s.as_bytes());
        assert_eq!(litdict::intern(s).unwrap().as_ptr(), handle.as_ptr());
    }
}

#[test]
fn contended_interning_of_the_same_keys_yields_one_node_each() {
    common::init_tracing();

    const THREADS: usize = 8;
    const KEYS: usize = 1_000;

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..KEYS)
                    .map(|i| litdict::intern(format!("contended-{i}")).unwrap().as_ptr() as usize)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<Vec<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for addresses in &results[1..] {
        assert_eq!(addresses, &results[0]);
    }
}

#[test]
fn handles_cross_threads() {
    common::init_tracing();

    let local = litdict::intern("sent-across").unwrap();
    let received = thread::spawn(move || {
        assert_eq!(local.as_bytes(), b"sent-across");
        local
    })
    .join()
    .unwrap();
    assert_eq!(received.as_ptr(), local.as_ptr());
}
