//! Broadcast broker for live call and enrollment delivery.
//!
//! Two fixed topics fan every published message out to every live
//! subscriber. The target device id travels inside the payload, not in the
//! topic name: the set of interested subscribers changes every time a
//! device attaches or drops a stream, and per-device topics would need
//! lifecycle management with no benefit over payload filtering.
//!
//! Queues use hand-off semantics (capacity 1). A publish may block briefly
//! until the fan-out loop accepts the message but is bounded by the publish
//! timeout, and a subscriber that stays full past the dispatch timeout is
//! disconnected so one stuck device cannot starve publishes for others.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Topic carrying [`CallAnnouncement`] messages.
pub const CALLS_TOPIC: &str = "calls";

/// Topic carrying [`EnrollmentAnnouncement`] messages.
pub const ENROLLMENTS_TOPIC: &str = "enrollments";

/// Announcement published on the calls topic when a call is dispatched.
///
/// Carries the same credential/room pair as the outbox row, so a device
/// receiving the call both live and via pull sees identical data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAnnouncement {
    pub call_id: Uuid,
    pub device_id: Uuid,
    pub device_credential: String,
    pub room_id: String,
}

/// Announcement published on the enrollments topic when a device finishes
/// the enrollment handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentAnnouncement {
    pub device_id: Uuid,
}

/// Error type for broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("topic '{0}' is closed")]
    Closed(&'static str),

    #[error("publish to topic '{0}' timed out")]
    PublishTimeout(&'static str),

    #[error("broker run loop already started")]
    AlreadyRunning,

    #[error("failed to encode message: {0}")]
    Encode(String),

    #[error("failed to decode message: {0}")]
    Decode(String),

    #[error("subscription handler failed: {0}")]
    Handler(String),
}

/// Tuning knobs for the broker.
#[derive(Debug, Clone)]
pub struct BrokerOptions {
    /// Upper bound on how long a publish may wait for the fan-out loop.
    pub publish_timeout: Duration,
    /// Upper bound on how long the fan-out loop waits for a single
    /// subscriber before disconnecting it.
    pub dispatch_timeout: Duration,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_secs(5),
            dispatch_timeout: Duration::from_secs(5),
        }
    }
}

/// A message handed to a subscriber. Must be settled with [`Delivery::ack`]
/// or [`Delivery::nack`]; dropping it unsettled is logged as a nack.
#[derive(Debug)]
pub struct Delivery {
    topic: &'static str,
    payload: Vec<u8>,
    settled: bool,
}

impl Delivery {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Positive acknowledgement: the message was processed or deliberately
    /// skipped (filter mismatch).
    pub fn ack(mut self) {
        self.settled = true;
    }

    /// Negative acknowledgement: a local processing fault. Fatal to the
    /// subscription that reports it, never to the topic.
    pub fn nack(mut self) {
        self.settled = true;
        warn!(topic = self.topic, "message negatively acknowledged");
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.settled {
            debug!(topic = self.topic, "delivery dropped without acknowledgement");
        }
    }
}

/// A live subscription to one topic. Dropping it releases the slot.
pub struct Subscription {
    rx: mpsc::Receiver<Delivery>,
}

impl Subscription {
    /// Next delivery, in publish order. Returns `None` once the topic shuts
    /// down or the subscriber was disconnected for being stuck.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

struct Topic {
    name: &'static str,
    publish_tx: mpsc::Sender<Vec<u8>>,
    subscribers: Arc<Mutex<Vec<mpsc::Sender<Delivery>>>>,
    accepting: Arc<AtomicBool>,
}

impl Topic {
    fn new(name: &'static str) -> (Self, mpsc::Receiver<Vec<u8>>) {
        // Capacity 1: hand-off to the fan-out loop, no real buffering.
        let (publish_tx, publish_rx) = mpsc::channel(1);
        (
            Self {
                name,
                publish_tx,
                subscribers: Arc::new(Mutex::new(Vec::new())),
                accepting: Arc::new(AtomicBool::new(true)),
            },
            publish_rx,
        )
    }

    async fn publish(&self, payload: Vec<u8>, timeout: Duration) -> Result<(), BrokerError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(BrokerError::Closed(self.name));
        }
        match self.publish_tx.send_timeout(payload, timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(BrokerError::PublishTimeout(self.name)),
            Err(SendTimeoutError::Closed(_)) => Err(BrokerError::Closed(self.name)),
        }
    }

    fn subscribe(&self) -> Result<Subscription, BrokerError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(BrokerError::Closed(self.name));
        }
        // Capacity 1 per subscriber: a delivery waits for the previous one
        // to be consumed before the next is queued.
        let (tx, rx) = mpsc::channel(1);
        self.subscribers
            .lock()
            .expect("subscriber registry lock poisoned")
            .push(tx);
        Ok(Subscription { rx })
    }
}

struct TopicWorker {
    name: &'static str,
    publish_rx: mpsc::Receiver<Vec<u8>>,
    subscribers: Arc<Mutex<Vec<mpsc::Sender<Delivery>>>>,
    accepting: Arc<AtomicBool>,
    dispatch_timeout: Duration,
}

impl TopicWorker {
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe = self.publish_rx.recv() => match maybe {
                    Some(payload) => self.dispatch(payload).await,
                    None => break,
                },
            }
        }

        // Graceful shutdown: refuse new traffic, drain what is already
        // queued, then release every subscriber.
        self.accepting.store(false, Ordering::Release);
        self.publish_rx.close();
        while let Some(payload) = self.publish_rx.recv().await {
            self.dispatch(payload).await;
        }
        self.subscribers
            .lock()
            .expect("subscriber registry lock poisoned")
            .clear();
        debug!(topic = self.name, "topic worker stopped");
    }

    async fn dispatch(&self, payload: Vec<u8>) {
        let targets: Vec<mpsc::Sender<Delivery>> = self
            .subscribers
            .lock()
            .expect("subscriber registry lock poisoned")
            .clone();

        for tx in targets {
            let delivery = Delivery {
                topic: self.name,
                payload: payload.clone(),
                settled: false,
            };
            // Uncontended fast path first; fall back to a bounded wait so a
            // stuck subscriber gets disconnected instead of stalling the
            // topic.
            let send_result = match tx.try_send(delivery) {
                Ok(()) => Ok(()),
                Err(TrySendError::Closed(_)) => Err(()),
                Err(TrySendError::Full(delivery)) => {
                    match tx.send_timeout(delivery, self.dispatch_timeout).await {
                        Ok(()) => Ok(()),
                        Err(SendTimeoutError::Timeout(_)) => {
                            warn!(topic = self.name, "disconnecting stuck subscriber");
                            Err(())
                        }
                        Err(SendTimeoutError::Closed(_)) => Err(()),
                    }
                }
            };

            if send_result.is_err() {
                self.subscribers
                    .lock()
                    .expect("subscriber registry lock poisoned")
                    .retain(|s| !s.same_channel(&tx));
            }
        }
    }
}

struct RunState {
    calls_rx: mpsc::Receiver<Vec<u8>>,
    enrollments_rx: mpsc::Receiver<Vec<u8>>,
}

/// Broadcast broker over the `calls` and `enrollments` topics.
///
/// Construct once, call [`Broker::run`] from a dedicated task, and await
/// [`Broker::started`] before publishing so a publish cannot race the
/// fan-out loops coming up.
pub struct Broker {
    calls: Topic,
    enrollments: Topic,
    options: BrokerOptions,
    run_state: Mutex<Option<RunState>>,
    started_tx: watch::Sender<bool>,
    started_rx: watch::Receiver<bool>,
}

impl Broker {
    pub fn new(options: BrokerOptions) -> Self {
        let (calls, calls_rx) = Topic::new(CALLS_TOPIC);
        let (enrollments, enrollments_rx) = Topic::new(ENROLLMENTS_TOPIC);
        let (started_tx, started_rx) = watch::channel(false);
        Self {
            calls,
            enrollments,
            options,
            run_state: Mutex::new(Some(RunState {
                calls_rx,
                enrollments_rx,
            })),
            started_tx,
            started_rx,
        }
    }

    /// Runs both topic fan-out loops until the token is cancelled, then
    /// drains and closes. May be called at most once.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), BrokerError> {
        let state = self
            .run_state
            .lock()
            .expect("broker run state lock poisoned")
            .take()
            .ok_or(BrokerError::AlreadyRunning)?;

        let calls_worker = TopicWorker {
            name: CALLS_TOPIC,
            publish_rx: state.calls_rx,
            subscribers: self.calls.subscribers.clone(),
            accepting: self.calls.accepting.clone(),
            dispatch_timeout: self.options.dispatch_timeout,
        };
        let enrollments_worker = TopicWorker {
            name: ENROLLMENTS_TOPIC,
            publish_rx: state.enrollments_rx,
            subscribers: self.enrollments.subscribers.clone(),
            accepting: self.enrollments.accepting.clone(),
            dispatch_timeout: self.options.dispatch_timeout,
        };

        // Workers consume from channels that exist since construction, so
        // traffic is accepted from this point on.
        let _ = self.started_tx.send(true);

        tokio::join!(
            calls_worker.run(cancel.clone()),
            enrollments_worker.run(cancel)
        );
        let _ = self.started_tx.send(false);
        Ok(())
    }

    /// Resolves once the fan-out loops are running.
    pub async fn started(&self) {
        let mut rx = self.started_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Whether the fan-out loops are currently reported as running.
    pub fn is_started(&self) -> bool {
        *self.started_rx.borrow()
    }

    /// Publishes a call announcement to every live calls subscriber.
    pub async fn publish_call(&self, call: &CallAnnouncement) -> Result<(), BrokerError> {
        let payload = serde_json::to_vec(call).map_err(|e| BrokerError::Encode(e.to_string()))?;
        self.calls
            .publish(payload, self.options.publish_timeout)
            .await
    }

    /// Publishes an enrollment-completion announcement.
    pub async fn publish_enrollment(&self, device_id: Uuid) -> Result<(), BrokerError> {
        let announcement = EnrollmentAnnouncement { device_id };
        let payload =
            serde_json::to_vec(&announcement).map_err(|e| BrokerError::Encode(e.to_string()))?;
        self.enrollments
            .publish(payload, self.options.publish_timeout)
            .await
    }

    /// Consumes the calls topic on behalf of one device.
    ///
    /// Announcements for other devices are acked and skipped. A handler
    /// error nacks the delivery and ends this subscription with an error;
    /// the topic and its other subscribers are unaffected. Returns `Ok(())`
    /// when the broker shuts down.
    pub async fn subscribe_to_calls<F, Fut>(
        &self,
        device_id: Uuid,
        mut handler: F,
    ) -> Result<(), BrokerError>
    where
        F: FnMut(CallAnnouncement) -> Fut,
        Fut: Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>,
    {
        let mut subscription = self.calls.subscribe()?;
        while let Some(delivery) = subscription.next().await {
            let call: CallAnnouncement = match serde_json::from_slice(delivery.payload()) {
                Ok(call) => call,
                Err(e) => {
                    delivery.nack();
                    return Err(BrokerError::Decode(e.to_string()));
                }
            };

            if call.device_id != device_id {
                delivery.ack();
                continue;
            }

            match handler(call).await {
                Ok(()) => delivery.ack(),
                Err(e) => {
                    delivery.nack();
                    return Err(BrokerError::Handler(e.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Consumes the enrollments topic on behalf of one device. Same
    /// acknowledgement contract as [`Broker::subscribe_to_calls`].
    pub async fn subscribe_to_enrollments<F, Fut>(
        &self,
        device_id: Uuid,
        mut handler: F,
    ) -> Result<(), BrokerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>,
    {
        let mut subscription = self.enrollments.subscribe()?;
        while let Some(delivery) = subscription.next().await {
            let announcement: EnrollmentAnnouncement =
                match serde_json::from_slice(delivery.payload()) {
                    Ok(announcement) => announcement,
                    Err(e) => {
                        delivery.nack();
                        return Err(BrokerError::Decode(e.to_string()));
                    }
                };

            if announcement.device_id != device_id {
                delivery.ack();
                continue;
            }

            match handler().await {
                Ok(()) => delivery.ack(),
                Err(e) => {
                    delivery.nack();
                    return Err(BrokerError::Handler(e.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Raw subscription to the calls topic, without payload filtering.
    pub fn subscribe_calls_raw(&self) -> Result<Subscription, BrokerError> {
        self.calls.subscribe()
    }

    /// Raw subscription to the enrollments topic, without payload
    /// filtering.
    pub fn subscribe_enrollments_raw(&self) -> Result<Subscription, BrokerError> {
        self.enrollments.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_announcement(device_id: Uuid, room: &str) -> CallAnnouncement {
        CallAnnouncement {
            call_id: Uuid::new_v4(),
            device_id,
            device_credential: "device-jwt".to_string(),
            room_id: room.to_string(),
        }
    }

    async fn started_broker() -> (Arc<Broker>, CancellationToken) {
        let broker = Arc::new(Broker::new(BrokerOptions::default()));
        let cancel = CancellationToken::new();
        let run_broker = broker.clone();
        let run_cancel = cancel.clone();
        tokio::spawn(async move { run_broker.run(run_cancel).await });
        broker.started().await;
        (broker, cancel)
    }

    #[tokio::test]
    async fn test_publish_order_preserved_for_subscriber() {
        let (broker, cancel) = started_broker().await;
        let device_id = Uuid::new_v4();

        let a = test_announcement(device_id, "room-a");
        let b = test_announcement(device_id, "room-b");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub_broker = broker.clone();
        let subscriber = tokio::spawn(async move {
            sub_broker
                .subscribe_to_calls(device_id, |call| {
                    let tx = tx.clone();
                    async move {
                        tx.send(call).unwrap();
                        Ok(())
                    }
                })
                .await
        });
        // Let the subscriber attach before publishing.
        tokio::task::yield_now().await;

        broker.publish_call(&a).await.unwrap();
        broker.publish_call(&b).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first, a);
        assert_eq!(second, b);

        cancel.cancel();
        assert!(subscriber.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_foreign_device_messages_skipped() {
        let (broker, cancel) = started_broker().await;
        let device_id = Uuid::new_v4();

        let foreign = test_announcement(Uuid::new_v4(), "room-x");
        let mine = test_announcement(device_id, "room-y");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub_broker = broker.clone();
        tokio::spawn(async move {
            sub_broker
                .subscribe_to_calls(device_id, |call| {
                    let tx = tx.clone();
                    async move {
                        tx.send(call).unwrap();
                        Ok(())
                    }
                })
                .await
        });
        tokio::task::yield_now().await;

        broker.publish_call(&foreign).await.unwrap();
        broker.publish_call(&mine).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, mine);
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_handler_error_ends_only_that_subscription() {
        let (broker, cancel) = started_broker().await;
        let device_id = Uuid::new_v4();

        let failing_broker = broker.clone();
        let failing = tokio::spawn(async move {
            failing_broker
                .subscribe_to_calls(device_id, |_| async { Err("send to client failed".into()) })
                .await
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let healthy_broker = broker.clone();
        tokio::spawn(async move {
            healthy_broker
                .subscribe_to_calls(device_id, |call| {
                    let tx = tx.clone();
                    async move {
                        tx.send(call).unwrap();
                        Ok(())
                    }
                })
                .await
        });
        tokio::task::yield_now().await;

        let announcement = test_announcement(device_id, "room-z");
        broker.publish_call(&announcement).await.unwrap();

        let result = failing.await.unwrap();
        assert!(matches!(result, Err(BrokerError::Handler(_))));

        // The healthy subscriber still got the message and keeps working.
        assert_eq!(rx.recv().await.unwrap(), announcement);
        broker.publish_call(&announcement).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), announcement);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_lost_not_an_error() {
        let (broker, cancel) = started_broker().await;
        let announcement = test_announcement(Uuid::new_v4(), "room-empty");
        broker.publish_call(&announcement).await.unwrap();
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_enrollment_subscription_filters_by_device() {
        let (broker, cancel) = started_broker().await;
        let device_id = Uuid::new_v4();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub_broker = broker.clone();
        tokio::spawn(async move {
            sub_broker
                .subscribe_to_enrollments(device_id, || {
                    let tx = tx.clone();
                    async move {
                        tx.send(()).unwrap();
                        Ok(())
                    }
                })
                .await
        });
        tokio::task::yield_now().await;

        broker.publish_enrollment(Uuid::new_v4()).await.unwrap();
        broker.publish_enrollment(device_id).await.unwrap();

        rx.recv().await.unwrap();
        assert!(rx.try_recv().is_err());
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscriptions_and_refuses_new_traffic() {
        let (broker, cancel) = started_broker().await;
        let device_id = Uuid::new_v4();

        let sub_broker = broker.clone();
        let subscriber = tokio::spawn(async move {
            sub_broker
                .subscribe_to_calls(device_id, |_| async { Ok(()) })
                .await
        });
        tokio::task::yield_now().await;

        cancel.cancel();
        // Subscription ends cleanly on shutdown.
        assert!(subscriber.await.unwrap().is_ok());

        // Give the workers a moment to flip the accepting flag.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let result = broker
            .publish_call(&test_announcement(device_id, "room-late"))
            .await;
        assert!(matches!(
            result,
            Err(BrokerError::Closed(_)) | Err(BrokerError::PublishTimeout(_))
        ));
        assert!(broker.subscribe_calls_raw().is_err());
    }

    #[tokio::test]
    async fn test_run_twice_fails() {
        let broker = Arc::new(Broker::new(BrokerOptions::default()));
        let cancel = CancellationToken::new();
        let run_broker = broker.clone();
        let run_cancel = cancel.clone();
        tokio::spawn(async move { run_broker.run(run_cancel).await });
        broker.started().await;

        let result = broker.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(BrokerError::AlreadyRunning)));
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_stuck_subscriber_does_not_starve_publishes() {
        let broker = Arc::new(Broker::new(BrokerOptions {
            publish_timeout: Duration::from_secs(5),
            dispatch_timeout: Duration::from_millis(100),
        }));
        let cancel = CancellationToken::new();
        let run_broker = broker.clone();
        let run_cancel = cancel.clone();
        tokio::spawn(async move { run_broker.run(run_cancel).await });
        broker.started().await;

        // Raw subscription that never consumes: its queue fills and stays
        // full.
        let stuck = broker.subscribe_calls_raw().unwrap();

        let device_id = Uuid::new_v4();
        for i in 0..3 {
            broker
                .publish_call(&test_announcement(device_id, &format!("room-{i}")))
                .await
                .expect("publish must not be starved by a stuck subscriber");
        }

        drop(stuck);
        cancel.cancel();
    }
}
