mod common;

use std::time::Duration;

use common::*;
use selogic_meter::poller::{MeterPoller, PollerSettings};
use selogic_meter::register_map::MeterBlock;
use selogic_meter::scheduler::Scheduler;
use selogic_meter::snapshot::MetricKey;

#[tokio::test]
async fn first_cycle_runs_immediately() {
    let (transport, _script) = MockTransport::healthy();
    let scheduler = Scheduler::new(
        MeterPoller::new(transport, PollerSettings::default()),
        Duration::from_secs(3600),
    );
    let mut handle = scheduler.handle();
    let task = scheduler.spawn();

    // identity, then snapshot
    tokio::time::timeout(Duration::from_secs(5), async {
        while handle.snapshot().is_none() {
            assert!(handle.changed().await);
        }
    })
    .await
    .expect("first snapshot well before the first interval elapses");

    assert_eq!(handle.value(MetricKey::Freq), Some(f64::from(FREQUENCY)));
    task.abort();
}

#[tokio::test]
async fn overrunning_cycles_never_overlap() {
    let (transport, script) = MockTransport::healthy();
    // four measurement reads plus two identity reads: every cycle outlasts the interval
    lock(&script).read_delay = Duration::from_millis(15);

    let scheduler = Scheduler::new(
        MeterPoller::new(transport, PollerSettings::default()),
        Duration::from_millis(20),
    );
    let handle = scheduler.handle();
    let task = scheduler.spawn();

    tokio::time::sleep(Duration::from_millis(400)).await;
    task.abort();
    let _ = task.await;

    let script = lock(&script);
    assert_eq!(script.max_open_sessions, 1);
    let cycles = script.reads_of(MeterBlock::Voltages);
    assert!(cycles >= 2, "only {cycles} cycles ran");
    // each cycle takes at least 60 ms
    assert!(cycles <= 400 / 60 + 1, "{cycles} cycles in 400 ms");
    assert_eq!(script.reads_of(MeterBlock::Model), 1);
    drop(script);

    assert!(handle.snapshot().is_some());
}

#[tokio::test]
async fn ticks_missed_during_overrun_are_not_replayed() {
    let (transport, script) = MockTransport::healthy();
    {
        let mut script = lock(&script);
        // the first cycle (identity plus four blocks) spans three intervals
        script.read_delay = Duration::from_millis(50);
        script.delayed_reads = Some(6);
    }

    let scheduler = Scheduler::new(
        MeterPoller::new(transport, PollerSettings::default()),
        Duration::from_millis(100),
    );
    let task = scheduler.spawn();

    tokio::time::sleep(Duration::from_millis(350)).await;
    task.abort();
    let _ = task.await;

    // one catch-up cycle right after the overrun, the next one waits for the 400 ms tick
    let cycles = lock(&script).reads_of(MeterBlock::Voltages);
    assert_eq!(cycles, 2, "{cycles} cycles by 350 ms");
}

#[tokio::test]
async fn failures_do_not_stop_the_scheduler() {
    let (transport, script) = MockTransport::healthy();
    lock(&script).refuse_connect = true;

    let scheduler = Scheduler::new(
        MeterPoller::new(transport, PollerSettings::default()),
        Duration::from_millis(10),
    );
    let handle = scheduler.handle();
    let task = scheduler.spawn();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.snapshot().is_none());
    assert!(handle.state().consecutive_failures >= 2);

    lock(&script).refuse_connect = false;
    tokio::time::sleep(Duration::from_millis(100)).await;
    task.abort();

    let state = handle.state();
    assert!(state.snapshot.is_some());
    assert!(state.last_error.is_none());
    assert!(lock(&script).connects >= 3);
}
