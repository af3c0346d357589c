use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use crate::elements::ElementStore;
use crate::frames::{transform, Context, Frame, Observer, StateVector, TransformError};
use crate::propagate::propagate;

use super::error::HubError;
use super::types::{ConnectionState, StreamMessage, StreamState};

struct Subscriber {
    state: ConnectionState,
    interest: HashSet<u32>,
    observer: Option<Observer>,
    tx: mpsc::Sender<StreamMessage>,
}

/// Point-in-time view of one subscriber, taken under the registry lock and
/// used for the rest of the tick without it.
struct SubscriberSnapshot {
    id: String,
    interest: HashSet<u32>,
    observer: Option<Observer>,
    tx: mpsc::Sender<StreamMessage>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub delivered: usize,
    pub failed: usize,
    pub skipped_ids: usize,
}

/// Fans propagated state out to subscribers at a fixed cadence. All
/// registry mutation (connect, subscribe, unsubscribe, the post-tick sweep)
/// is serialized through one lock; `tick` snapshots the registry before
/// fanning out, so churn during a tick can neither corrupt the iteration
/// nor skip a surviving subscriber on its next tick.
pub struct BroadcastHub {
    store: Arc<ElementStore>,
    registry: Mutex<HashMap<String, Subscriber>>,
    tick_period: Duration,
    channel_capacity: usize,
}

impl BroadcastHub {
    pub fn new(store: Arc<ElementStore>, tick_period: Duration, channel_capacity: usize) -> Self {
        Self {
            store,
            registry: Mutex::new(HashMap::new()),
            tick_period,
            channel_capacity,
        }
    }

    /// Open a connection. The subscriber stays `Connecting` until its first
    /// `subscribe` completes the handshake; an omitted id gets a fresh uuid.
    pub fn connect(
        &self,
        subscriber_id: Option<String>,
        observer: Option<Observer>,
    ) -> (String, mpsc::Receiver<StreamMessage>) {
        let id = subscriber_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        let mut registry = self.registry.lock().unwrap();
        registry.insert(
            id.clone(),
            Subscriber {
                state: ConnectionState::Connecting,
                interest: HashSet::new(),
                observer,
                tx,
            },
        );
        log::info!("Subscriber connected: {}", id);
        (id, rx)
    }

    /// Replace a subscriber's interest set atomically. The broadcast tick
    /// can only ever observe the old set or the new one, never a partial
    /// update.
    pub fn subscribe(&self, subscriber_id: &str, interest: HashSet<u32>) -> Result<(), HubError> {
        let mut registry = self.registry.lock().unwrap();
        let subscriber = registry
            .get_mut(subscriber_id)
            .ok_or_else(|| HubError::UnknownSubscriber(subscriber_id.to_string()))?;
        log::info!(
            "Subscriber {} now tracking {} objects",
            subscriber_id,
            interest.len()
        );
        subscriber.interest = interest;
        if subscriber.state == ConnectionState::Connecting {
            subscriber.state = ConnectionState::Active;
        }
        Ok(())
    }

    /// Unsubscribe-all: the connection drains and closes at the next sweep.
    pub fn unsubscribe(&self, subscriber_id: &str) -> Result<(), HubError> {
        let mut registry = self.registry.lock().unwrap();
        let subscriber = registry
            .get_mut(subscriber_id)
            .ok_or_else(|| HubError::UnknownSubscriber(subscriber_id.to_string()))?;
        subscriber.interest.clear();
        subscriber.state = ConnectionState::Draining;
        Ok(())
    }

    /// Transport-level disconnect: drop the subscriber immediately.
    pub fn disconnect(&self, subscriber_id: &str) {
        let mut registry = self.registry.lock().unwrap();
        if registry.remove(subscriber_id).is_some() {
            log::info!("Subscriber disconnected: {}", subscriber_id);
        }
    }

    pub fn connection_state(&self, subscriber_id: &str) -> Option<ConnectionState> {
        let registry = self.registry.lock().unwrap();
        registry.get(subscriber_id).map(|s| s.state)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().unwrap().len()
    }

    /// One broadcast round: compute fresh state for every tracked object,
    /// then deliver one message per Active subscriber. A failed delivery
    /// drains that subscriber only; siblings still receive theirs.
    pub fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let snapshot: Vec<SubscriberSnapshot> = {
            let registry = self.registry.lock().unwrap();
            registry
                .iter()
                .filter(|(_, s)| s.state == ConnectionState::Active && !s.interest.is_empty())
                .map(|(id, s)| SubscriberSnapshot {
                    id: id.clone(),
                    interest: s.interest.clone(),
                    observer: s.observer,
                    tx: s.tx.clone(),
                })
                .collect()
        };

        let mut report = TickReport::default();
        if snapshot.is_empty() {
            self.sweep();
            return report;
        }

        // propagate each unique object once, shared across subscribers
        let mut wanted: HashSet<u32> = HashSet::new();
        for sub in &snapshot {
            wanted.extend(sub.interest.iter().copied());
        }
        let mut base: HashMap<u32, (String, StateVector)> = HashMap::new();
        for norad_id in wanted {
            match self.compute_state(norad_id, now) {
                Ok(entry) => {
                    base.insert(norad_id, entry);
                }
                Err(reason) => {
                    log::warn!("Skipping {} this tick: {}", norad_id, reason);
                    report.skipped_ids += 1;
                }
            }
        }

        let mut failed: Vec<String> = Vec::new();
        for sub in &snapshot {
            let mut states = HashMap::new();
            for norad_id in &sub.interest {
                let Some((name, teme)) = base.get(norad_id) else {
                    continue;
                };
                let state = match subscriber_view(teme, sub.observer) {
                    Ok(state) => state,
                    Err(e) => {
                        log::warn!(
                            "Observer transform for {} failed, omitting it this tick: {}",
                            norad_id,
                            e
                        );
                        report.skipped_ids += 1;
                        continue;
                    }
                };
                states.insert(
                    *norad_id,
                    StreamState {
                        norad_id: *norad_id,
                        name: name.clone(),
                        state,
                    },
                );
            }

            if states.is_empty() {
                continue;
            }

            match sub.tx.try_send(StreamMessage::position_update(now, states)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    log::warn!("Delivery to {} failed: {}", sub.id, e);
                    report.failed += 1;
                    failed.push(sub.id.clone());
                }
            }
        }

        // back on the serialized mutation path: drain failures, then sweep
        if !failed.is_empty() {
            let mut registry = self.registry.lock().unwrap();
            for id in failed {
                if let Some(subscriber) = registry.get_mut(&id) {
                    subscriber.state = ConnectionState::Draining;
                }
            }
        }
        self.sweep();

        report
    }

    fn compute_state(
        &self,
        norad_id: u32,
        now: DateTime<Utc>,
    ) -> Result<(String, StateVector), String> {
        let set = self
            .store
            .find(norad_id)
            .ok_or_else(|| format!("no element set for {}", norad_id))?;
        let state = propagate(&set, now).map_err(|e| e.to_string())?;
        Ok((set.name.clone(), state))
    }

    /// Close out drained subscribers. Runs after every tick so a `Draining`
    /// connection reaches `Closed` once its in-flight tick is done.
    fn sweep(&self) {
        let mut registry = self.registry.lock().unwrap();
        registry.retain(|id, subscriber| {
            if subscriber.state == ConnectionState::Draining {
                subscriber.state = ConnectionState::Closed;
                log::info!("Subscriber closed: {}", id);
                false
            } else {
                subscriber.state != ConnectionState::Closed
            }
        });
    }

    /// Fixed-cadence tick loop; runs until the stop channel fires. The loop
    /// touches only the element store, never upstream I/O, so a slow or
    /// failing refresh can never stall a tick.
    pub async fn run(self: Arc<Self>, mut stop_rx: oneshot::Receiver<()>) {
        let mut interval = tokio::time::interval(self.tick_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        log::info!(
            "Broadcast hub ticking every {}ms",
            self.tick_period.as_millis()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick(Utc::now());
                    if report.failed > 0 || report.skipped_ids > 0 {
                        log::debug!(
                            "tick: {} delivered, {} failed, {} ids skipped",
                            report.delivered,
                            report.failed,
                            report.skipped_ids
                        );
                    }
                }
                _ = &mut stop_rx => {
                    log::info!("Broadcast hub stopping");
                    return;
                }
            }
        }
    }
}

/// State as one subscriber sees it: local look angles when the connection
/// bound an observer, the inertial state otherwise. An error means the id
/// is omitted from that subscriber's payload, never replaced with a state
/// in a different frame.
fn subscriber_view(
    base: &StateVector,
    observer: Option<Observer>,
) -> Result<StateVector, TransformError> {
    match observer {
        Some(observer) => transform(base, Frame::Enu, &Context::with_observer(observer)),
        None => Ok(base.clone()),
    }
}
