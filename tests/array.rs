//! Tests for the array channel flavor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_utils::thread::scope;
use handoff::{bounded, RecvError, RecvTimeoutError, SendError, SendTimeoutError};
use handoff::{TryRecvError, TrySendError};
use rand::{thread_rng, Rng};

fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[test]
fn smoke() {
    let (s, r) = bounded(1);
    s.send(7).unwrap();
    assert_eq!(r.try_recv(), Ok(7));

    s.send(8).unwrap();
    assert_eq!(r.recv(), Ok(8));

    assert_eq!(r.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(r.recv_timeout(ms(100)), Err(RecvTimeoutError::Timeout));
}

#[test]
fn single_slot_on_one_thread() {
    let (s, r) = bounded(1);
    s.send(10).unwrap();
    assert_eq!(s.try_send(11), Err(TrySendError::Full(11)));
    assert_eq!(r.recv(), Ok(10));
}

#[test]
fn capacity() {
    for i in 1..10 {
        let (s, r) = bounded::<()>(i);
        assert_eq!(s.capacity(), Some(i));
        assert_eq!(r.capacity(), Some(i));
    }
}

#[test]
fn len_empty_full() {
    let (s, r) = bounded(2);

    assert_eq!(s.len(), 0);
    assert!(s.is_empty());
    assert!(!s.is_full());

    s.send(()).unwrap();

    assert_eq!(s.len(), 1);
    assert!(!r.is_empty());
    assert!(!s.is_full());

    s.send(()).unwrap();

    assert_eq!(r.len(), 2);
    assert!(s.is_full());

    r.recv().unwrap();

    assert_eq!(s.len(), 1);
    assert!(!s.is_full());
}

#[test]
fn fifo_order() {
    let (s, r) = bounded(5);
    for i in 0..5 {
        s.send(i).unwrap();
    }
    let got: Vec<i32> = r.try_iter().collect();
    assert_eq!(got, [0, 1, 2, 3, 4]);
}

#[test]
fn full_channel_blocks_sender() {
    let (s, r) = bounded(1);
    s.send(1).unwrap();

    scope(|scope| {
        scope.spawn(|_| {
            s.send(2).unwrap();
        });

        thread::sleep(ms(200));
        assert_eq!(r.len(), 1);
        assert_eq!(r.recv(), Ok(1));
        assert_eq!(r.recv(), Ok(2));
    })
    .unwrap();
}

#[test]
fn send_timeout() {
    let (s, r) = bounded(2);

    scope(|scope| {
        scope.spawn(move |_| {
            assert_eq!(s.send_timeout(1, ms(1000)), Ok(()));
            assert_eq!(s.send_timeout(2, ms(1000)), Ok(()));
            assert_eq!(s.send_timeout(3, ms(100)), Err(SendTimeoutError::Timeout(3)));
            thread::sleep(ms(300));
            assert_eq!(s.send_timeout(4, ms(1000)), Ok(()));
            thread::sleep(ms(300));
            assert_eq!(s.send(5), Err(SendError(5)));
        });
        scope.spawn(move |_| {
            thread::sleep(ms(200));
            assert_eq!(r.recv(), Ok(1));
            thread::sleep(ms(300));
            assert_eq!(r.recv(), Ok(2));
            assert_eq!(r.recv(), Ok(4));
        });
    })
    .unwrap();
}

#[test]
fn close_keeps_buffered_messages() {
    let (s, r) = bounded(3);
    s.send(1).unwrap();
    s.send(2).unwrap();

    assert!(s.close());
    assert!(s.is_closed());
    assert_eq!(s.try_send(3), Err(TrySendError::Closed(3)));

    assert_eq!(r.recv(), Ok(1));
    assert_eq!(r.recv(), Ok(2));
    assert_eq!(r.recv(), Err(RecvError));
    assert_eq!(r.try_recv(), Err(TryRecvError::Closed));
}

#[test]
fn close_wakes_receiver() {
    let (s, r) = bounded::<()>(1);

    scope(|scope| {
        scope.spawn(|_| assert_eq!(r.recv(), Err(RecvError)));
        scope.spawn(|_| {
            thread::sleep(ms(100));
            drop(s);
        });
    })
    .unwrap();
}

#[test]
fn close_wakes_sender() {
    let (s, r) = bounded(1);

    scope(|scope| {
        scope.spawn(|_| {
            assert_eq!(s.send(()), Ok(()));
            assert_eq!(s.send(()), Err(SendError(())));
        });
        scope.spawn(|_| {
            thread::sleep(ms(100));
            drop(r);
        });
    })
    .unwrap();
}

#[test]
fn spsc() {
    const COUNT: usize = 100_000;

    let (s, r) = bounded(3);

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
fn mpmc() {
    const COUNT: usize = 25_000;
    let threads = num_cpus::get().clamp(2, 4);

    let (s, r) = bounded::<usize>(3);
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
fn drops() {
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug)]
    struct DropCounter;

    impl Drop for DropCounter {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    let mut rng = thread_rng();

    for _ in 0..20 {
        let steps = rng.gen_range(0..1_000);
        let additional = rng.gen_range(0..50);

        DROPS.store(0, Ordering::SeqCst);
        let (s, r) = bounded::<DropCounter>(50);

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

        for _ in 0..additional {
            s.try_send(DropCounter).unwrap();
        }

        assert_eq!(DROPS.load(Ordering::SeqCst), steps);
        drop(s);
        drop(r);
        assert_eq!(DROPS.load(Ordering::SeqCst), steps + additional);
    }
}

#[test]
fn linearizable() {
    const COUNT: usize = 25_000;
    let threads = num_cpus::get().clamp(2, 4);

    let (s, r) = bounded(threads);

    scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|_| {
                for _ in 0..COUNT {
                    s.send(0).unwrap();
                    r.try_recv().unwrap();
                }
            });
        }
    })
    .unwrap();
}
