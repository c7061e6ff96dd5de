//! Tests for the zero channel flavor.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_utils::thread::scope;
use handoff::{bounded, RecvError, RecvTimeoutError, SendError, SendTimeoutError};
use handoff::{TryRecvError, TrySendError};
use rand::{thread_rng, Rng};

fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[test]
fn smoke() {
    let (s, r) = bounded(0);
    assert_eq!(s.try_send(7), Err(TrySendError::Full(7)));
    assert_eq!(r.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn capacity() {
    let (s, r) = bounded::<()>(0);
    assert_eq!(s.capacity(), Some(0));
    assert_eq!(r.capacity(), Some(0));
    assert!(s.is_full());
    assert!(s.is_empty());
    assert_eq!(r.len(), 0);
}

#[test]
fn handoff_single_value() {
    let (s, r) = bounded(0);

    scope(|scope| {
        scope.spawn(move |_| s.send(16).unwrap());
        assert_eq!(r.recv(), Ok(16));
    })
    .unwrap();
}

#[test]
fn sender_waits_for_receiver() {
    let (s, r) = bounded(0);
    let sent = AtomicBool::new(false);

    scope(|scope| {
        scope.spawn(|_| {
            s.send(1).unwrap();
            sent.store(true, Ordering::SeqCst);
        });

        thread::sleep(ms(200));
        assert!(!sent.load(Ordering::SeqCst));

        assert_eq!(r.recv(), Ok(1));
    })
    .unwrap();

    assert!(sent.load(Ordering::SeqCst));
}

#[test]
fn recv_blocks_until_send() {
    let (s, r) = bounded(0);

    scope(|scope| {
        scope.spawn(move |_| {
            let start = Instant::now();
            assert_eq!(r.recv(), Ok(7));
            assert!(start.elapsed() >= ms(100));
        });
        scope.spawn(move |_| {
            thread::sleep(ms(100));
            s.send(7).unwrap();
        });
    })
    .unwrap();
}

#[test]
fn recv_timeout() {
    let (s, r) = bounded::<i32>(0);

    scope(|scope| {
        scope.spawn(move |_| {
            assert_eq!(r.recv_timeout(ms(100)), Err(RecvTimeoutError::Timeout));
            assert_eq!(r.recv_timeout(ms(1000)), Ok(7));
            assert_eq!(r.recv_timeout(ms(1000)), Err(RecvTimeoutError::Closed));
        });
        scope.spawn(move |_| {
            thread::sleep(ms(300));
            s.send(7).unwrap();
        });
    })
    .unwrap();
}

#[test]
fn send_timeout() {
    let (s, r) = bounded(0);

    scope(|scope| {
        scope.spawn(move |_| {
            assert_eq!(s.send_timeout(7, ms(100)), Err(SendTimeoutError::Timeout(7)));
            assert_eq!(s.send_timeout(8, ms(1000)), Ok(()));
            assert_eq!(s.send_timeout(9, ms(1000)), Err(SendTimeoutError::Closed(9)));
        });
        scope.spawn(move |_| {
            thread::sleep(ms(300));
            assert_eq!(r.recv(), Ok(8));
        });
    })
    .unwrap();
}

#[test]
fn close_wakes_receiver() {
    let (s, r) = bounded::<()>(0);

    scope(|scope| {
        scope.spawn(|_| assert_eq!(r.recv(), Err(RecvError)));
        scope.spawn(|_| {
            thread::sleep(ms(100));
            assert!(s.close());
            assert!(!s.close());
        });
    })
    .unwrap();

    assert!(r.is_closed());
}

#[test]
fn close_wakes_sender() {
    let (s, r) = bounded(0);

    scope(|scope| {
        scope.spawn(|_| assert_eq!(s.send(1), Err(SendError(1))));
        scope.spawn(|_| {
            thread::sleep(ms(100));
            drop(r);
        });
    })
    .unwrap();
}

#[test]
fn len_stays_zero_while_busy() {
    const COUNT: usize = 1_000;

    let (s, r) = bounded(0);

    scope(|scope| {
        scope.spawn(|_| {
            for i in 0..COUNT {
                s.send(i).unwrap();
                assert_eq!(s.len(), 0);
            }
        });
        scope.spawn(|_| {
            for i in 0..COUNT {
                assert_eq!(r.recv(), Ok(i));
                assert_eq!(r.len(), 0);
            }
        });
    })
    .unwrap();
}

#[test]
fn spsc_preserves_order() {
    const COUNT: usize = 20_000;

    let (s, r) = bounded(0);

    scope(|scope| {
        scope.spawn(move |_| {
            for i in 0..COUNT {
                assert_eq!(r.recv(), Ok(i));
            }
            assert_eq!(r.recv(), Err(RecvError));
        });
        scope.spawn(move |_| {
            for i in 0..COUNT {
                s.send(i).unwrap();
            }
        });
    })
    .unwrap();
}

#[test]
fn mpmc_delivers_each_value_once() {
    const COUNT: usize = 5_000;
    let threads = num_cpus::get().clamp(2, 4);

    let (s, r) = bounded::<usize>(0);
    let seen: Vec<AtomicUsize> = (0..COUNT).map(|_| AtomicUsize::new(0)).collect();

    scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|_| {
                for _ in 0..COUNT {
                    let n = r.recv().unwrap();
                    seen[n].fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        for _ in 0..threads {
            scope.spawn(|_| {
                for i in 0..COUNT {
                    s.send(i).unwrap();
                }
            });
        }
    })
    .unwrap();

    for c in seen {
        assert_eq!(c.into_inner(), threads);
    }
}

#[test]
fn try_send_pairs_with_waiting_receiver() {
    let (s, r) = bounded(0);

    scope(|scope| {
        scope.spawn(|_| assert_eq!(r.recv(), Ok(5)));

        loop {
            match s.try_send(5) {
                Ok(()) => break,
                Err(TrySendError::Full(_)) => thread::sleep(ms(10)),
                Err(TrySendError::Closed(_)) => panic!("channel closed"),
            }
        }
    })
    .unwrap();
}

#[test]
fn drops_unreceived_messages() {
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, PartialEq)]
    struct DropCounter;

    impl Drop for DropCounter {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    let mut rng = thread_rng();

    for _ in 0..10 {
        let steps = rng.gen_range(0..500);
        DROPS.store(0, Ordering::SeqCst);

        let (s, r) = bounded::<DropCounter>(0);

        scope(|scope| {
            scope.spawn(|_| {
                for _ in 0..steps {
                    r.recv().unwrap();
                }
            });
            scope.spawn(|_| {
                for _ in 0..steps {
                    s.send(DropCounter).unwrap();
                }
            });
        })
        .unwrap();

        assert_eq!(DROPS.load(Ordering::SeqCst), steps);
        drop(s);
        drop(r);
        assert_eq!(DROPS.load(Ordering::SeqCst), steps);
    }
}
