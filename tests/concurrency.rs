//! Concurrency and re-entrancy tests.

use busline::{
    payload, Event, EventBus, EventHandler, HandlerResult, Payload, SubscriptionId,
    SubscriptionOptions,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_handler_can_subscribe_during_delivery() {
    let bus = Arc::new(EventBus::new());
    let added = Arc::new(Mutex::new(None));

    let inner_bus = Arc::clone(&bus);
    let slot = Arc::clone(&added);
    let handler: Arc<dyn EventHandler> = Arc::new(move |_: &Event| -> HandlerResult {
        let id = inner_bus.subscribe_simple("orders/**", "late-joiner")?;
        *slot.lock() = Some(id);
        Ok(())
    });
    bus.subscribe("orders/created", "bootstrap", Some(handler), SubscriptionOptions::default())
        .unwrap();

    // The subscription added mid-delivery is not part of this publish.
    assert_eq!(bus.publish("orders/created", Payload::new(), "orders").unwrap(), 1);
    assert!(added.lock().is_some());
    assert_eq!(bus.subscriber_count("orders/created"), 2);
}

#[test]
fn test_handler_can_unsubscribe_itself() {
    let bus = Arc::new(EventBus::new());
    let hits = Arc::new(AtomicUsize::new(0));
    let own_id: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

    let inner_bus = Arc::clone(&bus);
    let counter = Arc::clone(&hits);
    let id_slot = Arc::clone(&own_id);
    let once: Arc<dyn EventHandler> = Arc::new(move |_: &Event| -> HandlerResult {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(id) = *id_slot.lock() {
            inner_bus.unsubscribe(id);
        }
        Ok(())
    });

    let id = bus
        .subscribe("ping", "once", Some(once), SubscriptionOptions::default())
        .unwrap();
    *own_id.lock() = Some(id);

    bus.publish("ping", Payload::new(), "x").unwrap();
    bus.publish("ping", Payload::new(), "x").unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(bus.subscriptions_for("once").is_empty());
}

#[test]
fn test_handler_can_publish_follow_up() {
    let bus = Arc::new(EventBus::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    let inner_bus = Arc::clone(&bus);
    let rules: Arc<dyn EventHandler> = Arc::new(move |event: &Event| -> HandlerResult {
        let order_id = event.get("orderId").cloned().unwrap_or_default();
        inner_bus.publish(
            "rules/check/completed",
            payload! { "orderId" => order_id, "passed" => true },
            "rules",
        )?;
        Ok(())
    });
    let seen = Arc::clone(&log);
    let orders: Arc<dyn EventHandler> = Arc::new(move |event: &Event| -> HandlerResult {
        seen.lock().push(event.topic.clone());
        Ok(())
    });

    bus.subscribe("orders/created", "rules", Some(rules), SubscriptionOptions::default())
        .unwrap();
    bus.subscribe("rules/**", "orders", Some(orders), SubscriptionOptions::default())
        .unwrap();

    bus.publish("orders/created", payload! { "orderId" => "42" }, "orders")
        .unwrap();
    assert_eq!(*log.lock(), vec!["rules/check/completed"]);
}

#[test]
fn test_concurrent_publish_and_subscribe() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 200;

    let bus = Arc::new(EventBus::new());
    let delivered = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS * 2));

    let counter = Arc::clone(&delivered);
    let stable: Arc<dyn EventHandler> = Arc::new(move |_: &Event| -> HandlerResult {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    bus.subscribe("load/**", "stable", Some(stable), SubscriptionOptions::default())
        .unwrap();

    let mut handles = Vec::new();

    for t in 0..THREADS {
        let bus = Arc::clone(&bus);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..ROUNDS {
                let notified = bus
                    .publish(&format!("load/{t}"), payload! { "i" => i as i64 }, "publisher")
                    .unwrap();
                assert!(notified >= 1);
            }
        }));
    }

    for t in 0..THREADS {
        let bus = Arc::clone(&bus);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let owner = format!("churn-{t}");
            for _ in 0..ROUNDS {
                let id = bus.subscribe_simple("load/*", &owner).unwrap();
                assert!(bus.subscriptions_for(&owner).contains(&id));
                assert!(bus.unsubscribe(id));
            }
            assert_eq!(bus.unsubscribe_all(&owner), 0);
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(delivered.load(Ordering::SeqCst), THREADS * ROUNDS);
    assert_eq!(bus.subscription_count(), 1);
    assert_eq!(bus.stats().events_published, (THREADS * ROUNDS) as u64);

    let total: u64 = (0..THREADS)
        .map(|t| bus.topic_stats(&format!("load/{t}")).event_count)
        .sum();
    assert_eq!(total, (THREADS * ROUNDS) as u64);
}

#[test]
fn test_fully_unsubscribed_receives_nothing() {
    let bus = Arc::new(EventBus::new());
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&hits);
    let handler: Arc<dyn EventHandler> = Arc::new(move |_: &Event| -> HandlerResult {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    bus.subscribe("t/**", "gone", Some(handler), SubscriptionOptions::default())
        .unwrap();
    bus.unsubscribe_all("gone");

    let publishers: Vec<_> = (0..4)
        .map(|_| {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                for _ in 0..100 {
                    bus.publish("t/x", Payload::new(), "p").unwrap();
                }
            })
        })
        .collect();
    for handle in publishers {
        handle.join().unwrap();
    }

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_listener_on_another_thread() {
    let bus = Arc::new(EventBus::new());
    let listener = bus.listen();
    bus.subscribe_simple("jobs/**", "worker").unwrap();

    let consumer = thread::spawn(move || {
        let mut topics = Vec::new();
        while let Ok(event) = listener.recv_timeout(std::time::Duration::from_secs(2)) {
            topics.push(event.topic.clone());
            if topics.len() == 3 {
                break;
            }
        }
        topics
    });

    for n in 0..3 {
        bus.publish(&format!("jobs/{n}"), Payload::new(), "scheduler").unwrap();
    }

    assert_eq!(consumer.join().unwrap(), vec!["jobs/0", "jobs/1", "jobs/2"]);
}
