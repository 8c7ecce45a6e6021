mod common;

use cadence_scheduler::{
    Clock, FrameCallbacks, ManualClock, Millis, RoundRobinScheduler, SchedulerError, TaskContext,
    TaskError, TaskQueue, WindowReport,
};
use common::{Log, NeverFires, frame_strategy};
use futures::FutureExt;
use futures::executor::LocalPool;
use std::rc::Rc;

/// Each tick logs `label` and costs `cost` milliseconds on the manual clock.
async fn costly(
    context: TaskContext,
    clock: Rc<ManualClock>,
    log: Log,
    label: &'static str,
    cost: Millis,
    yields: usize,
) -> Result<usize, TaskError> {
    for _ in 0..yields {
        log.borrow_mut().push(label);
        clock.advance(cost);
        context.yield_now().await?;
    }
    log.borrow_mut().push(label);
    clock.advance(cost);
    Ok(yields + 1)
}

fn manual_clock() -> (Rc<ManualClock>, Rc<dyn Clock>) {
    let clock = Rc::new(ManualClock::new(0.0));
    let shared: Rc<dyn Clock> = clock.clone();
    (clock, shared)
}

fn run_frame(pool: &mut LocalPool, frames: &FrameCallbacks, clock: &ManualClock) {
    frames.run_frame(clock.now());
    pool.run_until_stalled();
}

#[test]
fn test_first_tick_runs_even_over_budget() {
    let mut pool = LocalPool::new();
    let frames = FrameCallbacks::new();
    let (clock, shared) = manual_clock();
    let strategy = Rc::new(frame_strategy(&frames, &shared, &pool, 12.0));
    let queue = TaskQueue::new("slow", strategy, pool.spawner());
    let log = common::log();

    let handle = {
        let (clock, log) = (clock.clone(), log.clone());
        queue.schedule_task(move |context| costly(context, clock, log, "slow", 50.0, 3))
    };

    for expected in 1..=4 {
        assert_eq!(frames.pending(), 1);
        run_frame(&mut pool, &frames, &clock);
        assert_eq!(handle.stats().tick_count, expected);
    }

    assert_eq!(frames.pending(), 0);
    assert_eq!(handle.stats().avg_tick_duration, 50.0);
    assert_eq!(handle.now_or_never().unwrap().unwrap(), 4);
}

#[test]
fn test_window_admits_ticks_while_average_fits() {
    let mut pool = LocalPool::new();
    let frames = FrameCallbacks::new();
    let (clock, shared) = manual_clock();
    let strategy = Rc::new(frame_strategy(&frames, &shared, &pool, 12.0));
    let queue = TaskQueue::new("steady", strategy, pool.spawner());
    let log = common::log();

    let handle = {
        let (clock, log) = (clock.clone(), log.clone());
        queue.schedule_task(move |context| costly(context, clock, log, "steady", 5.0, 5))
    };

    // 5ms ticks in a 12ms budget: two per frame.
    for expected in [2, 4, 6] {
        run_frame(&mut pool, &frames, &clock);
        assert_eq!(handle.stats().tick_count, expected);
    }
    assert_eq!(frames.pending(), 0);
    assert!(handle.now_or_never().unwrap().is_ok());
}

#[test]
fn test_frame_budget_accounts_for_elapsed_frame_time() {
    let mut pool = LocalPool::new();
    let frames = FrameCallbacks::new();
    let (clock, shared) = manual_clock();
    let strategy = Rc::new(frame_strategy(&frames, &shared, &pool, 12.0));
    let queue = TaskQueue::new("late", strategy, pool.spawner());
    let log = common::log();

    let handle = {
        let (clock, log) = (clock.clone(), log.clone());
        queue.schedule_task(move |context| costly(context, clock, log, "late", 5.0, 5))
    };

    // Prime the average with a full frame.
    run_frame(&mut pool, &frames, &clock);
    assert_eq!(handle.stats().tick_count, 2);

    // The frame began 6ms ago, leaving 6ms: only the unconditional tick fits.
    let frame_start = clock.now();
    clock.advance(6.0);
    frames.run_frame(frame_start);
    pool.run_until_stalled();
    assert_eq!(handle.stats().tick_count, 3);
}

#[test]
fn test_slow_task_ends_the_window_for_later_tasks() {
    let mut pool = LocalPool::new();
    let frames = FrameCallbacks::new();
    let (clock, shared) = manual_clock();
    let strategy = Rc::new(frame_strategy(&frames, &shared, &pool, 12.0));
    let queue = TaskQueue::new("mixed", strategy, pool.spawner());
    let log = common::log();

    for (label, cost) in [("fast1", 1.0), ("slow", 20.0), ("fast2", 1.0)] {
        let (clock, log) = (clock.clone(), log.clone());
        // Completions are not inspected here.
        let _ = queue.schedule_task(move |context| costly(context, clock, log, label, cost, 10));
    }

    let mut windows = Vec::new();
    for _ in 0..3 {
        let before = log.borrow().len();
        run_frame(&mut pool, &frames, &clock);
        windows.push(log.borrow()[before..].to_vec());
    }

    assert_eq!(
        windows,
        vec![
            vec!["fast1", "slow"],
            // 10ms remain, but the slow task's 20ms average stops the window.
            vec!["fast2", "fast1"],
            vec!["slow"],
        ]
    );
}

#[test]
fn test_window_requests_do_not_overlap() {
    let pool = LocalPool::new();
    let frames = FrameCallbacks::new();
    let (_clock, shared) = manual_clock();
    let strategy = Rc::new(frame_strategy(&frames, &shared, &pool, 12.0));
    let queue = TaskQueue::new("busy", strategy.clone(), pool.spawner());

    for _ in 0..5 {
        let _ = queue.schedule_task(|_context| async { Ok::<_, TaskError>(()) });
    }

    assert!(strategy.has_pending_window());
    assert_eq!(frames.pending(), 1);
}

#[test]
fn test_direct_execute_reports_progress() {
    let mut pool = LocalPool::new();
    let (clock, shared) = manual_clock();
    let strategy = RoundRobinScheduler::new(NeverFires, shared, pool.spawner());
    let queue = TaskQueue::new("direct", Rc::new(strategy.clone()), pool.spawner());
    let log = common::log();

    let handle = {
        let (clock, log) = (clock.clone(), log.clone());
        queue.schedule_task(move |context| costly(context, clock, log, "direct", 4.0, 1))
    };

    // Zero budget still runs exactly one tick.
    let report = pool.run_until(strategy.execute(0.0)).unwrap();
    assert_eq!(report, WindowReport { ticks: 1, completed: 0 });

    let report = pool.run_until(strategy.execute(100.0)).unwrap();
    assert_eq!(report, WindowReport { ticks: 1, completed: 1 });
    assert!(strategy.next_task().is_none());
    assert_eq!(handle.now_or_never().unwrap().unwrap(), 2);
}

#[test]
fn test_manual_window_leaves_the_host_request_alone() {
    let mut pool = LocalPool::new();
    let frames = FrameCallbacks::new();
    let (clock, shared) = manual_clock();
    let strategy = Rc::new(frame_strategy(&frames, &shared, &pool, 12.0));
    let queue = TaskQueue::new("manual", strategy.clone(), pool.spawner());
    let log = common::log();

    let handle = {
        let (clock, log) = (clock.clone(), log.clone());
        queue.schedule_task(move |context| costly(context, clock, log, "manual", 50.0, 3))
    };
    assert_eq!(frames.pending(), 1);

    let report = pool.run_until(strategy.execute(0.0)).unwrap();
    assert_eq!(report, WindowReport { ticks: 1, completed: 0 });
    assert!(strategy.has_pending_window());
    assert_eq!(frames.pending(), 1);

    // The host window runs alone and still makes its single tick.
    run_frame(&mut pool, &frames, &clock);
    assert_eq!(handle.stats().tick_count, 2);
    assert_eq!(frames.pending(), 1);
}

#[test]
fn test_execute_rejects_a_second_running_window() {
    let mut pool = LocalPool::new();
    let (clock, shared) = manual_clock();
    let strategy = RoundRobinScheduler::new(NeverFires, shared, pool.spawner());
    let queue = TaskQueue::new("overlap", Rc::new(strategy.clone()), pool.spawner());
    let log = common::log();

    let handle = {
        let (clock, log) = (clock.clone(), log.clone());
        queue.schedule_task(move |context| costly(context, clock, log, "overlap", 1.0, 1))
    };

    let (first, second) =
        pool.run_until(async { futures::join!(strategy.execute(100.0), strategy.execute(100.0)) });
    assert_eq!(first.unwrap(), WindowReport { ticks: 2, completed: 1 });
    assert!(matches!(second, Err(SchedulerError::InvariantViolation(_))));
    assert_eq!(*log.borrow(), vec!["overlap", "overlap"]);
    assert_eq!(handle.now_or_never().unwrap().unwrap(), 2);
}

#[test]
fn test_removing_the_only_task_clears_the_rotation() {
    let pool = LocalPool::new();
    let (_clock, shared) = manual_clock();
    let strategy = RoundRobinScheduler::new(NeverFires, shared, pool.spawner());
    let queue = TaskQueue::new("solo", Rc::new(strategy.clone()), pool.spawner());

    let handle = queue.schedule_task(|_context| async { Ok::<_, TaskError>(()) });
    assert_eq!(strategy.next_task(), Some(handle.id()));

    // A task that can still run stays put.
    assert!(matches!(
        queue.remove_task(handle.id()),
        Err(SchedulerError::InvariantViolation(_))
    ));
    assert!(queue.contains(handle.id()));

    assert!(handle.cancel());
    queue.remove_task(handle.id()).unwrap();
    assert_eq!(strategy.next_task(), None);

    // Advancing an empty rotation is harmless.
    strategy.advance_task();
    assert_eq!(strategy.next_task(), None);

    assert!(matches!(
        queue.remove_task(handle.id()),
        Err(SchedulerError::InvariantViolation(_))
    ));
}

#[test]
fn test_canceled_tasks_are_dropped_without_a_tick() {
    let mut pool = LocalPool::new();
    let frames = FrameCallbacks::new();
    let (clock, shared) = manual_clock();
    let strategy = Rc::new(frame_strategy(&frames, &shared, &pool, 12.0));
    let queue = TaskQueue::new("cancel", strategy, pool.spawner());
    let log = common::log();

    let doomed = {
        let (clock, log) = (clock.clone(), log.clone());
        queue.schedule_task(move |context| costly(context, clock, log, "doomed", 1.0, 2))
    };
    let survivor = {
        let (clock, log) = (clock.clone(), log.clone());
        queue.schedule_task(move |context| costly(context, clock, log, "survivor", 1.0, 2))
    };

    assert!(doomed.cancel());
    run_frame(&mut pool, &frames, &clock);

    assert_eq!(*log.borrow(), vec!["survivor", "survivor", "survivor"]);
    assert_eq!(doomed.stats().tick_count, 0);
    assert!(queue.is_empty());
    assert!(doomed.now_or_never().unwrap().unwrap_err().is_canceled());
    assert_eq!(survivor.now_or_never().unwrap().unwrap(), 3);
}
