//! 快照并发读写测试
//!
//! 单写者不断整体发布快照，多个读者验证永远看不到半更新的状态。

use cropdrop_driver::{DriverContext, Rgb, SensorSnapshot};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// 快照内所有字段都由 sequence 推导，读者可据此检查一致性
fn snapshot_for(sequence: u64) -> SensorSnapshot {
    let v = (sequence % 1000) as f64 / 1000.0;
    SensorSnapshot {
        line_sensors: [v; 5],
        proximity_m: Some(v),
        color: Rgb::new(v, v, v),
        sequence,
        system_timestamp_us: sequence,
    }
}

fn is_consistent(snapshot: &SensorSnapshot) -> bool {
    if snapshot.sequence == 0 {
        return *snapshot == SensorSnapshot::default();
    }
    *snapshot == snapshot_for(snapshot.sequence)
}

#[test]
fn test_readers_never_observe_torn_snapshot() {
    let ctx = Arc::new(DriverContext::new(Duration::from_secs(1)));
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let (ctx, done) = (ctx.clone(), done.clone());
        thread::spawn(move || {
            for sequence in 1..=20_000 {
                ctx.publish(snapshot_for(sequence));
            }
            done.store(true, Ordering::Release);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let (ctx, done) = (ctx.clone(), done.clone());
            thread::spawn(move || {
                let mut last_sequence = 0;
                let mut reads = 0u64;
                while !done.load(Ordering::Acquire) {
                    let snapshot = ctx.load();
                    assert!(is_consistent(&snapshot), "torn read: {:?}", snapshot);
                    assert!(
                        snapshot.sequence >= last_sequence,
                        "sequence went backwards"
                    );
                    last_sequence = snapshot.sequence;
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(ctx.load().sequence, 20_000);
}

#[test]
fn test_disconnect_visible_across_threads() {
    let ctx = Arc::new(DriverContext::new(Duration::from_secs(1)));
    let observer = {
        let ctx = ctx.clone();
        thread::spawn(move || {
            while ctx.is_connected() {
                thread::yield_now();
            }
        })
    };
    thread::sleep(Duration::from_millis(10));
    ctx.mark_disconnected();
    observer.join().unwrap();
}
