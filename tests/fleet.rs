//! Multi-worker protocol tests over real flock-guarded segments

use bumpylife::segment::SegmentOrigin;
use bumpylife::{
    ExitRegister, MemoryRegister, RecordingTerminator, RecycleConfig, RecyclingContext,
    SharedSegment, SignalTerminator, Terminator, ThresholdGenerator, WorkerId,
};
use nix::sys::signal::Signal;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::os::unix::process::ExitStatusExt;
use std::process::Command;
use std::thread;
use tempfile::tempdir;

const HOST: u32 = 4000;

fn worker(pid: u32) -> WorkerId {
    WorkerId::new(pid).unwrap()
}

fn config(min: u64, max: u64) -> RecycleConfig {
    RecycleConfig {
        enable: true,
        min,
        max,
        ..RecycleConfig::default()
    }
}

fn seeded<R: ExitRegister, T: Terminator>(
    cfg: &RecycleConfig,
    pid: u32,
    register: R,
    terminator: T,
) -> RecyclingContext<R, T> {
    RecyclingContext::new(cfg, worker(pid), register, terminator).with_threshold_generator(
        ThresholdGenerator::with_rng(StdRng::seed_from_u64(u64::from(pid) * 31)),
    )
}

fn drive_to_trigger<R: ExitRegister, T: Terminator>(ctx: &mut RecyclingContext<R, T>) {
    while !ctx.is_exiting() {
        ctx.on_request();
        assert!(ctx.request_count() < 100_000, "worker never triggered");
    }
}

#[test]
fn test_generation_lag_across_segment_handles() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fleet.shm");
    let path = path.to_str().unwrap();
    let cfg = config(20, 40);
    let terminator = RecordingTerminator::new();

    let mut fleet: Vec<_> = (1..=5u32)
        .map(|pid| {
            let segment = SharedSegment::open(path, HOST).unwrap();
            seeded(&cfg, pid, segment, terminator.clone())
        })
        .collect();

    for (i, ctx) in fleet.iter_mut().enumerate() {
        drive_to_trigger(ctx);
        let pid = i as u32 + 1;
        assert_eq!(ctx.register().peek().unwrap(), Some(worker(pid)));
        let expected: Vec<_> = (1..pid).map(worker).collect();
        assert_eq!(terminator.sent(), expected);
    }
}

#[test]
fn test_concurrent_triggers_signal_each_worker_at_most_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fleet.shm");
    let path = path.to_str().unwrap().to_string();
    SharedSegment::open(&path, HOST).unwrap();

    let terminator = RecordingTerminator::new();
    let workers = 12u32;
    let handles: Vec<_> = (1..=workers)
        .map(|pid| {
            let path = path.clone();
            let terminator = terminator.clone();
            thread::spawn(move || {
                let segment = SharedSegment::open(&path, HOST).unwrap();
                assert_eq!(segment.origin(), SegmentOrigin::Attached);
                let mut ctx = seeded(&config(50, 500), pid, segment, terminator);
                drive_to_trigger(&mut ctx);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let sent = terminator.sent();
    assert_eq!(sent.len(), workers as usize - 1);
    let mut unique = sent.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), sent.len());

    let pending = SharedSegment::attach_existing(&path)
        .unwrap()
        .peek()
        .unwrap()
        .unwrap();
    assert!(!sent.contains(&pending));
    assert!((1..=workers).contains(&pending.as_u32()));
}

#[test]
fn test_flagged_worker_survives_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fleet.shm");
    let path = path.to_str().unwrap();
    let cfg = config(3, 3);
    let terminator = RecordingTerminator::new();

    let mut a = seeded(&cfg, 1, SharedSegment::open(path, HOST).unwrap(), terminator.clone());
    drive_to_trigger(&mut a);
    drop(a);

    // Configuration reload: workers re-attach under the same host
    let segment = SharedSegment::open(path, HOST).unwrap();
    assert_eq!(segment.origin(), SegmentOrigin::Attached);
    assert_eq!(segment.peek().unwrap(), Some(worker(1)));

    let mut b = seeded(&cfg, 2, segment, terminator.clone());
    drive_to_trigger(&mut b);
    assert_eq!(terminator.sent(), vec![worker(1)]);
}

#[test]
fn test_full_restart_forgets_flagged_worker() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fleet.shm");
    let path = path.to_str().unwrap();
    let cfg = config(3, 3);
    let terminator = RecordingTerminator::new();

    let mut a = seeded(&cfg, 1, SharedSegment::open(path, HOST).unwrap(), terminator.clone());
    drive_to_trigger(&mut a);
    drop(a);

    let mut b = seeded(&cfg, 2, SharedSegment::open(path, HOST + 1).unwrap(), terminator.clone());
    drive_to_trigger(&mut b);
    assert!(terminator.sent().is_empty());
}

#[test]
fn test_real_signal_reaches_flagged_process() {
    let mut child = Command::new("sleep").arg("30").spawn().unwrap();
    let register = MemoryRegister::new();
    register
        .transact(|slot| *slot = WorkerId::new(child.id()))
        .unwrap();

    let mut ctx = seeded(
        &config(1, 1),
        std::process::id(),
        register.clone(),
        SignalTerminator::new(Signal::SIGTERM),
    );
    drive_to_trigger(&mut ctx);

    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    assert_eq!(register.peek().unwrap(), Some(WorkerId::current()));
}

proptest! {
    #[test]
    fn prop_each_worker_is_signaled_by_its_successor(
        order in (2u32..9).prop_flat_map(|n| Just((1..=n).collect::<Vec<u32>>()).prop_shuffle())
    ) {
        let register = MemoryRegister::new();
        let terminator = RecordingTerminator::new();
        let cfg = config(4, 4);

        for &pid in &order {
            let mut ctx = seeded(&cfg, pid, register.clone(), terminator.clone());
            drive_to_trigger(&mut ctx);
        }

        let expected: Vec<_> = order[..order.len() - 1].iter().copied().map(worker).collect();
        prop_assert_eq!(terminator.sent(), expected);
        prop_assert_eq!(register.peek().unwrap(), Some(worker(*order.last().unwrap())));
    }
}
