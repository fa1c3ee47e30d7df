//! Notification bus
//!
//! Publish/subscribe for device `add` and `remove` events, plus a separate
//! listener list for errors raised by the monitor loop.
//!
//! Every subscriber gets its own unbounded queue. Callback subscribers are
//! drained by a dedicated OS thread, so publishing never waits on a handler
//! and a slow or blocking handler never holds up the async runtime or other
//! subscribers. Each subscriber sees events in publish order, and a handler
//! that panics only loses the event it panicked on.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::thread;

use audio_detect_core::{AudioDevice, DetectError};
use futures::Stream as FuturesStream;
use tokio::sync::mpsc as tokio_mpsc;

// ============================================================================
// Topics
// ============================================================================

/// Device notification topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Add,
    Remove,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            other => Err(format!("unknown topic '{other}', expected 'add' or 'remove'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Topic(Topic),
    Errors,
}

/// Handle returned by the subscribe calls, used to unsubscribe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
    channel: Channel,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The device topic, or `None` for an error listener
    pub fn topic(&self) -> Option<Topic> {
        match self.channel {
            Channel::Topic(topic) => Some(topic),
            Channel::Errors => None,
        }
    }
}

// ============================================================================
// Bus
// ============================================================================

struct Subscriber<T> {
    id: u64,
    sender: tokio_mpsc::UnboundedSender<T>,
}

struct BusInner {
    next_id: AtomicU64,
    add: Mutex<Vec<Subscriber<AudioDevice>>>,
    remove: Mutex<Vec<Subscriber<AudioDevice>>>,
    errors: Mutex<Vec<Subscriber<DetectError>>>,
}

#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(1),
                add: Mutex::new(Vec::new()),
                remove: Mutex::new(Vec::new()),
                errors: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a callback for every device published on `topic`
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(AudioDevice) + Send + Sync + 'static,
    {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let list = self.topic_list(topic);
        let id = self.register(list, tx);
        spawn_dispatcher(list, id, rx, handler, topic.as_str());
        tracing::debug!(subscription = id, %topic, "Subscribed");
        Subscription {
            id,
            channel: Channel::Topic(topic),
        }
    }

    /// Register a callback for errors reported by the monitor loop
    pub fn subscribe_errors<F>(&self, handler: F) -> Subscription
    where
        F: Fn(DetectError) + Send + Sync + 'static,
    {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let id = self.register(&self.inner.errors, tx);
        spawn_dispatcher(&self.inner.errors, id, rx, handler, "error");
        Subscription {
            id,
            channel: Channel::Errors,
        }
    }

    /// Stream of devices published on `topic`, as an alternative to callbacks
    pub fn events(&self, topic: Topic) -> DeviceEvents {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let id = self.register(self.topic_list(topic), tx);
        DeviceEvents {
            receiver: rx,
            subscription: Subscription {
                id,
                channel: Channel::Topic(topic),
            },
        }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    ///
    /// Events already queued for a callback subscriber are still delivered.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let removed = match subscription.channel {
            Channel::Topic(topic) => remove_subscriber(self.topic_list(topic), subscription.id),
            Channel::Errors => remove_subscriber(&self.inner.errors, subscription.id),
        };
        if removed {
            tracing::debug!(subscription = subscription.id, "Unsubscribed");
        }
        removed
    }

    /// Queue `device` for every subscriber of `topic`; returns how many
    /// subscribers received it
    pub fn publish(&self, topic: Topic, device: &AudioDevice) -> usize {
        tracing::trace!(%topic, id = %device.id, "Publishing device event");
        broadcast(self.topic_list(topic), device)
    }

    pub fn publish_error(&self, error: &DetectError) -> usize {
        broadcast(&self.inner.errors, error)
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        lock(self.topic_list(topic)).len()
    }

    pub fn error_listener_count(&self) -> usize {
        lock(&self.inner.errors).len()
    }

    fn topic_list(&self, topic: Topic) -> &Mutex<Vec<Subscriber<AudioDevice>>> {
        match topic {
            Topic::Add => &self.inner.add,
            Topic::Remove => &self.inner.remove,
        }
    }

    fn register<T>(
        &self,
        list: &Mutex<Vec<Subscriber<T>>>,
        sender: tokio_mpsc::UnboundedSender<T>,
    ) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        lock(list).push(Subscriber { id, sender });
        id
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("add", &self.subscriber_count(Topic::Add))
            .field("remove", &self.subscriber_count(Topic::Remove))
            .field("errors", &self.error_listener_count())
            .finish()
    }
}

/// Send a clone of `item` to every live subscriber, dropping subscribers
/// whose receiving side is gone
fn broadcast<T: Clone>(list: &Mutex<Vec<Subscriber<T>>>, item: &T) -> usize {
    let mut subscribers = lock(list);
    subscribers.retain(|subscriber| subscriber.sender.send(item.clone()).is_ok());
    subscribers.len()
}

/// Drain `rx` into `handler` on a dedicated thread until the subscriber is
/// removed or the bus is dropped.
///
/// If the thread cannot be spawned the subscriber is unregistered again, so
/// publishers never queue events nobody will read.
fn spawn_dispatcher<T, F>(
    list: &Mutex<Vec<Subscriber<T>>>,
    id: u64,
    mut rx: tokio_mpsc::UnboundedReceiver<T>,
    handler: F,
    channel: &'static str,
) where
    T: Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    let spawned = thread::Builder::new()
        .name(format!("audio-detect-{channel}-{id}"))
        .spawn(move || {
            while let Some(item) = rx.blocking_recv() {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(item)));
                if outcome.is_err() {
                    tracing::warn!(channel, "Subscriber handler panicked; event dropped");
                }
            }
            tracing::trace!(channel, subscription = id, "Dispatcher exited");
        });

    if let Err(e) = spawned {
        tracing::error!(channel, "Failed to spawn subscriber thread: {}", e);
        remove_subscriber(list, id);
    }
}

fn remove_subscriber<T>(list: &Mutex<Vec<Subscriber<T>>>, id: u64) -> bool {
    let mut subscribers = lock(list);
    let before = subscribers.len();
    subscribers.retain(|subscriber| subscriber.id != id);
    subscribers.len() != before
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// DeviceEvents stream
// ============================================================================

/// Stream of devices published on one topic
///
/// Dropping the stream detaches it from the bus on the next publish.
pub struct DeviceEvents {
    receiver: tokio_mpsc::UnboundedReceiver<AudioDevice>,
    subscription: Subscription,
}

impl DeviceEvents {
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Take an already queued event without waiting
    pub fn try_next(&mut self) -> Option<AudioDevice> {
        self.receiver.try_recv().ok()
    }
}

impl FuturesStream for DeviceEvents {
    type Item = AudioDevice;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_detect_core::DeviceType;
    use futures::StreamExt;
    use std::time::Duration;

    fn device(id: &str) -> AudioDevice {
        AudioDevice::new(id, id.to_uppercase(), DeviceType::Output)
    }

    async fn recv(rx: &mut tokio_mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for handler")
            .expect("handler channel closed")
    }

    #[test]
    fn test_topic_round_trips_through_str() {
        assert_eq!("add".parse::<Topic>(), Ok(Topic::Add));
        assert_eq!("remove".parse::<Topic>(), Ok(Topic::Remove));
        assert!("change".parse::<Topic>().is_err());
        assert_eq!(Topic::Remove.to_string(), "remove");
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_in_order() {
        let bus = NotificationBus::new();
        let (tx1, mut rx1) = tokio_mpsc::unbounded_channel();
        let (tx2, mut rx2) = tokio_mpsc::unbounded_channel();
        bus.subscribe(Topic::Add, move |d| {
            let _ = tx1.send(d.id);
        });
        bus.subscribe(Topic::Add, move |d| {
            let _ = tx2.send(d.id);
        });

        for id in ["a", "b", "c"] {
            assert_eq!(bus.publish(Topic::Add, &device(id)), 2);
        }

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(recv(rx).await, "a");
            assert_eq!(recv(rx).await, "b");
            assert_eq!(recv(rx).await, "c");
        }
    }

    #[tokio::test]
    async fn test_topics_are_independent() {
        let bus = NotificationBus::new();
        let mut adds = bus.events(Topic::Add);
        let mut removes = bus.events(Topic::Remove);

        bus.publish(Topic::Remove, &device("gone"));

        let removed = tokio::time::timeout(Duration::from_secs(2), removes.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(removed.id, "gone");
        assert!(adds.try_next().is_none());
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_affect_others() {
        let bus = NotificationBus::new();
        let (tx, mut rx) = tokio_mpsc::unbounded_channel();

        bus.subscribe(Topic::Add, |d| {
            if d.id == "boom" {
                panic!("handler failure");
            }
        });
        let (panicky_tx, mut panicky_rx) = tokio_mpsc::unbounded_channel();
        bus.subscribe(Topic::Add, move |d| {
            let _ = panicky_tx.send(d.id.clone());
            if d.id == "boom" {
                panic!("second handler failure");
            }
        });
        bus.subscribe(Topic::Add, move |d| {
            let _ = tx.send(d.id);
        });

        bus.publish(Topic::Add, &device("boom"));
        bus.publish(Topic::Add, &device("after"));

        assert_eq!(recv(&mut rx).await, "boom");
        assert_eq!(recv(&mut rx).await, "after");
        // A handler keeps receiving after it panicked
        assert_eq!(recv(&mut panicky_rx).await, "boom");
        assert_eq!(recv(&mut panicky_rx).await, "after");
    }

    #[tokio::test]
    async fn test_slow_handler_does_not_delay_others() {
        let bus = NotificationBus::new();
        let (tx, mut rx) = tokio_mpsc::unbounded_channel();
        bus.subscribe(Topic::Add, |_| std::thread::sleep(Duration::from_secs(1)));
        bus.subscribe(Topic::Add, move |d| {
            let _ = tx.send(d.id);
        });

        bus.publish(Topic::Add, &device("a"));
        bus.publish(Topic::Add, &device("b"));

        let fast = tokio::time::timeout(Duration::from_millis(300), async {
            (rx.recv().await, rx.recv().await)
        })
        .await
        .expect("slow handler held up delivery");
        assert_eq!(fast, (Some("a".to_string()), Some("b".to_string())));
    }

    #[test]
    fn test_handlers_run_without_a_runtime() {
        let bus = NotificationBus::new();
        let (tx, rx) = std::sync::mpsc::channel();
        bus.subscribe(Topic::Remove, move |d| {
            let _ = tx.send(d.id);
        });

        bus.publish(Topic::Remove, &device("gone"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "gone");
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = NotificationBus::new();
        let subscription = bus.subscribe(Topic::Remove, |_| {});
        assert_eq!(subscription.topic(), Some(Topic::Remove));
        assert_eq!(bus.subscriber_count(Topic::Remove), 1);

        assert!(bus.unsubscribe(&subscription));
        assert!(!bus.unsubscribe(&subscription));
        assert_eq!(bus.publish(Topic::Remove, &device("x")), 0);
    }

    #[tokio::test]
    async fn test_dropped_stream_is_pruned_on_publish() {
        let bus = NotificationBus::new();
        let events = bus.events(Topic::Add);
        assert_eq!(bus.subscriber_count(Topic::Add), 1);
        drop(events);

        assert_eq!(bus.publish(Topic::Add, &device("x")), 0);
        assert_eq!(bus.subscriber_count(Topic::Add), 0);
    }

    #[tokio::test]
    async fn test_error_listeners() {
        let bus = NotificationBus::new();
        let (tx, mut rx) = tokio_mpsc::unbounded_channel();
        let subscription = bus.subscribe_errors(move |err| {
            let _ = tx.send(err.to_string());
        });
        assert_eq!(subscription.topic(), None);

        bus.publish_error(&DetectError::Enumeration("flaky".to_string()));
        assert_eq!(recv(&mut rx).await, "Device enumeration failed: flaky");
        assert_eq!(bus.error_listener_count(), 1);
    }
}
