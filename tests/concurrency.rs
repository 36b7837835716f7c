//! Concurrency tests: the engine is shared across threads and each queue
//! serializes its own commands.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, TimeZone, Utc};
use qflow::{BookToken, CallNext, Command, ConfirmCheckIn, Engine, Outcome, QueueConfig};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 4, 10, 0, 0).unwrap()
}

#[test]
fn test_parallel_bookings_get_distinct_numbers() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 250;

    let engine = Arc::new(Engine::new());
    let queue = engine.create_queue(QueueConfig::with_size((THREADS * PER_THREAD) as u32));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut numbers = Vec::with_capacity(PER_THREAD as usize);
                for i in 0..PER_THREAD {
                    let user = t * PER_THREAD + i + 1;
                    match engine
                        .process(Command::Book(BookToken { queue_id: queue, user_id: user }), t0())
                        .unwrap()
                    {
                        Outcome::Booked { token_number, .. } => numbers.push(token_number),
                        other => panic!("Expected Booked, got {other:?}"),
                    }
                }
                numbers
            })
        })
        .collect();

    let mut all_numbers: Vec<u32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all_numbers.sort_unstable();

    // Serialized booking: the numbers form exactly 1..=N, no repeats, no
    // holes.
    let expected: Vec<u32> = (1..=(THREADS * PER_THREAD) as u32).collect();
    assert_eq!(all_numbers, expected);
}

#[test]
fn test_queues_do_not_interfere_under_load() {
    const QUEUES: usize = 4;
    const BOOKINGS: u64 = 300;

    let engine = Arc::new(Engine::new());
    let queues: Vec<_> = (0..QUEUES)
        .map(|_| engine.create_queue(QueueConfig::with_size(BOOKINGS as u32)))
        .collect();

    let handles: Vec<_> = queues
        .iter()
        .map(|&queue| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for user in 1..=BOOKINGS {
                    engine
                        .process(Command::Book(BookToken { queue_id: queue, user_id: user }), t0())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for &queue in &queues {
        assert_eq!(engine.waiting_count(queue).unwrap(), BOOKINGS as u32);
        let numbers: Vec<u32> = engine
            .positions(queue)
            .unwrap()
            .iter()
            .map(|t| t.token_number)
            .collect();
        assert_eq!(numbers, (1..=BOOKINGS as u32).collect::<Vec<_>>());
    }
}

#[test]
fn test_concurrent_call_and_confirm_serves_each_token_once() {
    const WAITERS: u64 = 64;

    let engine = Arc::new(Engine::new());
    let queue = engine.create_queue(QueueConfig::with_size(WAITERS as u32));
    for user in 1..=WAITERS {
        engine
            .process(Command::Book(BookToken { queue_id: queue, user_id: user }), t0())
            .unwrap();
    }

    // Several clerks race over CallNext + Confirm on the same queue.
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut confirmed = Vec::new();
                loop {
                    match engine
                        .process(Command::CallNext(CallNext { queue_id: queue }), t0())
                        .unwrap()
                    {
                        Outcome::Called { token_id, .. } => {
                            // Another clerk may confirm the same call first;
                            // losing that race is a business rejection, not
                            // a fault.
                            if engine
                                .process(
                                    Command::Confirm(ConfirmCheckIn { queue_id: queue, token_id }),
                                    t0(),
                                )
                                .is_ok()
                            {
                                confirmed.push(token_id);
                            }
                        }
                        Outcome::QueueEmpty => break,
                        other => panic!("Unexpected outcome {other:?}"),
                    }
                }
                confirmed
            })
        })
        .collect();

    let mut all_confirmed: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all_confirmed.sort_unstable();
    let before_dedup = all_confirmed.len();
    all_confirmed.dedup();

    assert_eq!(before_dedup, all_confirmed.len(), "a token was confirmed twice");
    assert_eq!(all_confirmed.len() as u64, WAITERS);
    assert_eq!(engine.waiting_count(queue).unwrap(), 0);
}
