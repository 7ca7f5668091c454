//! Stress tests designed to break the machine under concurrency.
//!
//! These exercise racing triggers, waiter herds, and subscription cleanup.

#[cfg(test)]
mod stress_tests {
    use crate::machine::Machine;
    use crate::table::{TransitionRule, TransitionTable};
    use crate::HopscotchError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    // ==========================================================================
    // Fixtures
    // ==========================================================================

    /// `spin` is admissible from anywhere; `rest` only from `spinning`.
    fn spin_table() -> TransitionTable {
        TransitionTable::new(
            "idle",
            vec![
                TransitionRule::new("spin", "*", "spinning"),
                TransitionRule::new("rest", "spinning", "idle"),
            ],
        )
    }

    fn ignition_table() -> TransitionTable {
        TransitionTable::new(
            "cold",
            vec![TransitionRule::new("ignite", "cold", "hot")],
        )
    }

    fn counted(machine: &Machine) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let changed = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicUsize::new(0));

        let c = changed.clone();
        machine.on_state_change(move |_state, _args| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let r = rejected.clone();
        machine.on_invalid_transition(move |_event, _state| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        (changed, rejected)
    }

    // ==========================================================================
    // Tests
    // ==========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_trigger_publishes_exactly_one_notification() {
        let machine = Machine::builder(spin_table()).build().unwrap();
        let (changed, rejected) = counted(&machine);

        let mut tasks = Vec::new();
        for i in 0..100 {
            let machine = machine.clone();
            tasks.push(tokio::spawn(async move {
                let event = if i % 2 == 0 { "spin" } else { "rest" };
                machine.trigger(event).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Every trigger lands on exactly one side: commit or rejection.
        assert_eq!(
            changed.load(Ordering::SeqCst) + rejected.load(Ordering::SeqCst),
            100
        );
        let state = machine.state();
        assert!(state == "idle" || state == "spinning", "untabled state {state}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicate_triggers_race_to_a_single_commit() {
        let machine = Machine::builder(ignition_table()).build().unwrap();
        let (changed, rejected) = counted(&machine);

        let mut tasks = Vec::new();
        for _ in 0..64 {
            let machine = machine.clone();
            tasks.push(tokio::spawn(async move {
                machine.trigger("ignite").await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(machine.state(), "hot");
        assert_eq!(changed.load(Ordering::SeqCst), 1);
        assert_eq!(rejected.load(Ordering::SeqCst), 63);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_all_waiters_release_when_the_state_lands() {
        let machine = Machine::builder(ignition_table()).build().unwrap();

        let mut waiters = Vec::new();
        for _ in 0..50 {
            let machine = machine.clone();
            waiters.push(tokio::spawn(async move {
                machine.wait_until_entered("hot").await;
            }));
        }
        // Let the herd subscribe before the transition fires.
        tokio::time::sleep(Duration::from_millis(50)).await;

        machine.trigger("ignite").await.unwrap();
        for waiter in waiters {
            waiter.await.unwrap();
        }
        assert_eq!(machine.state_change_subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_waiters_leave_no_subscriptions_behind() {
        let machine = Machine::builder(ignition_table()).build().unwrap();

        let mut waiters = Vec::new();
        for _ in 0..32 {
            let machine = machine.clone();
            let limit = Duration::from_millis(10 + fastrand::u64(0..50));
            waiters.push(tokio::spawn(async move {
                machine.wait_until_entered_timeout("hot", limit).await
            }));
        }
        for waiter in waiters {
            let outcome = waiter.await.unwrap();
            assert!(matches!(outcome, Err(HopscotchError::Timeout { .. })));
        }

        assert_eq!(machine.state_change_subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_rapid_fire_triggers_neither_drop_nor_double_publish() {
        let machine = Machine::builder(spin_table()).build().unwrap();
        let (changed, rejected) = counted(&machine);

        for i in 0..1000 {
            let event = if i % 3 == 0 { "rest" } else { "spin" };
            machine.trigger(event).await.unwrap();
        }

        assert_eq!(
            changed.load(Ordering::SeqCst) + rejected.load(Ordering::SeqCst),
            1000
        );
    }
}
