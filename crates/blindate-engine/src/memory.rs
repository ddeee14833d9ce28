//! # In-Memory Adapters
//!
//! Port implementations backed by process memory, used by tests and by the
//! API server when no database is configured.
//!
//! All locks are `parking_lot` and are never held across an `.await`, so
//! every trait method completes its critical section synchronously.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

use blindate_core::{ChatRoomId, EngagementId, ParticipantPair, Timestamp, UserId};
use blindate_state::{ChatRoom, Engagement, EngagementStatus};

use crate::clock::Clock;
use crate::error::StorageError;
use crate::ports::{
    ChatRoomRepository, EngagementRepository, EventSink, LiveEvent, Notification, Notifier,
    NotifyError, Ports, UserDirectory, UserProfile,
};

// ─── Generic store ───────────────────────────────────────────────────

/// Thread-safe, cloneable key-value store.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// Records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// Run `f` with exclusive access to the whole map.
    ///
    /// Checks that span several records (pair uniqueness) and the write
    /// they guard happen under the same lock.
    pub fn write_with<R>(&self, f: impl FnOnce(&mut HashMap<Uuid, T>) -> R) -> R {
        f(&mut self.data.write())
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare-and-swap `record` into `map`, bumping its version.
fn compare_and_swap<T: Clone>(
    map: &mut HashMap<Uuid, T>,
    id: Uuid,
    record: &T,
    version_of: impl Fn(&T) -> u64,
    set_version: impl Fn(&mut T, u64),
) -> Result<u64, StorageError> {
    let stored = map
        .get(&id)
        .ok_or_else(|| StorageError::Conflict("record no longer exists".into()))?;
    if version_of(stored) != version_of(record) {
        return Err(StorageError::Conflict(format!(
            "stale version {} (stored {})",
            version_of(record),
            version_of(stored)
        )));
    }
    let next_version = version_of(record) + 1;
    let mut next = record.clone();
    set_version(&mut next, next_version);
    map.insert(id, next);
    Ok(next_version)
}

// ─── Engagements ─────────────────────────────────────────────────────

/// In-memory [`EngagementRepository`]. Enforces one active engagement per pair.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEngagementRepository {
    records: Store<Engagement>,
}

impl InMemoryEngagementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn other_active_for_pair(
    map: &HashMap<Uuid, Engagement>,
    id: EngagementId,
    pair: &ParticipantPair,
) -> bool {
    map.values()
        .any(|e| e.id != id && e.active && e.participants == *pair)
}

#[async_trait]
impl EngagementRepository for InMemoryEngagementRepository {
    async fn get(&self, id: EngagementId) -> Result<Option<Engagement>, StorageError> {
        Ok(self.records.get(id.as_uuid()))
    }

    async fn find_active_by_pair(
        &self,
        pair: &ParticipantPair,
    ) -> Result<Option<Engagement>, StorageError> {
        Ok(self
            .records
            .filter(|e| e.active && e.participants == *pair)
            .into_iter()
            .next())
    }

    async fn find_all_by_pair(
        &self,
        pair: &ParticipantPair,
    ) -> Result<Vec<Engagement>, StorageError> {
        let mut all = self.records.filter(|e| e.participants == *pair);
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    async fn list_for_participant(&self, user: UserId) -> Result<Vec<Engagement>, StorageError> {
        let mut all = self.records.filter(|e| e.participants.contains(&user));
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn list_due_for_grace(
        &self,
        scheduled_before: Timestamp,
    ) -> Result<Vec<Engagement>, StorageError> {
        Ok(self.records.filter(|e| {
            e.status == EngagementStatus::Accepted
                && e.meeting
                    .scheduled_for
                    .is_some_and(|at| at < scheduled_before)
        }))
    }

    async fn insert(&self, engagement: &Engagement) -> Result<(), StorageError> {
        self.records.write_with(|map| {
            if map.contains_key(engagement.id.as_uuid()) {
                return Err(StorageError::Conflict("engagement id already exists".into()));
            }
            if engagement.active
                && other_active_for_pair(map, engagement.id, &engagement.participants)
            {
                return Err(StorageError::Conflict(
                    "pair already has an active engagement".into(),
                ));
            }
            map.insert(*engagement.id.as_uuid(), engagement.clone());
            Ok(())
        })
    }

    async fn update(&self, engagement: &Engagement) -> Result<u64, StorageError> {
        self.records.write_with(|map| {
            if engagement.active
                && other_active_for_pair(map, engagement.id, &engagement.participants)
            {
                return Err(StorageError::Conflict(
                    "pair already has an active engagement".into(),
                ));
            }
            compare_and_swap(
                map,
                *engagement.id.as_uuid(),
                engagement,
                |e| e.version,
                |e, v| e.version = v,
            )
        })
    }
}

// ─── Chat rooms ──────────────────────────────────────────────────────

/// In-memory [`ChatRoomRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryChatRoomRepository {
    rooms: Store<ChatRoom>,
}

impl InMemoryChatRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rooms created for `engagement_id`.
    pub fn count_for(&self, engagement_id: EngagementId) -> usize {
        self.rooms
            .filter(|r| r.engagement_id == engagement_id)
            .len()
    }
}

#[async_trait]
impl ChatRoomRepository for InMemoryChatRoomRepository {
    async fn get(&self, id: ChatRoomId) -> Result<Option<ChatRoom>, StorageError> {
        Ok(self.rooms.get(id.as_uuid()))
    }

    async fn find_by_engagement(
        &self,
        engagement_id: EngagementId,
    ) -> Result<Option<ChatRoom>, StorageError> {
        Ok(self
            .rooms
            .filter(|r| r.engagement_id == engagement_id)
            .into_iter()
            .max_by_key(|r| r.created_at))
    }

    async fn insert(&self, room: &ChatRoom) -> Result<(), StorageError> {
        self.rooms.write_with(|map| {
            if map.contains_key(room.id.as_uuid()) {
                return Err(StorageError::Conflict("chat room id already exists".into()));
            }
            map.insert(*room.id.as_uuid(), room.clone());
            Ok(())
        })
    }

    async fn update(&self, room: &ChatRoom) -> Result<u64, StorageError> {
        self.rooms.write_with(|map| {
            compare_and_swap(map, *room.id.as_uuid(), room, |r| r.version, |r, v| r.version = v)
        })
    }
}

// ─── Users ───────────────────────────────────────────────────────────

/// In-memory [`UserDirectory`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    profiles: Store<UserProfile>,
    blocks: Arc<RwLock<HashSet<(UserId, UserId)>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user.
    pub fn register(&self, id: UserId, verified: bool) {
        self.profiles
            .write_with(|map| map.insert(*id.as_uuid(), UserProfile { id, verified }));
    }

    /// One-directional block: `by` no longer wants to see `target`.
    pub fn block(&self, by: UserId, target: UserId) {
        self.blocks.write().insert((by, target));
    }

    pub fn has_blocked(&self, by: UserId, target: UserId) -> bool {
        self.blocks.read().contains(&(by, target))
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn profile(&self, user: UserId) -> Result<Option<UserProfile>, StorageError> {
        Ok(self.profiles.get(user.as_uuid()))
    }

    async fn is_blocked(&self, a: UserId, b: UserId) -> Result<bool, StorageError> {
        let blocks = self.blocks.read();
        Ok(blocks.contains(&(a, b)) || blocks.contains(&(b, a)))
    }

    async fn block_mutual(&self, a: UserId, b: UserId) -> Result<(), StorageError> {
        let mut blocks = self.blocks.write();
        blocks.insert((a, b));
        blocks.insert((b, a));
        Ok(())
    }
}

// ─── Notifications ───────────────────────────────────────────────────

/// Records every notification; can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successfully delivered notifications, in order.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, user: UserId) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.recipient == user)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("delivery disabled".into()));
        }
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

/// Writes notifications to the log. Stand-in for a real delivery channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %notification.recipient,
            event = notification.event.as_str(),
            reference = notification.reference.kind(),
            "notification"
        );
        Ok(())
    }
}

// ─── Live events ─────────────────────────────────────────────────────

/// Fans live events out to any number of in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<LiveEvent>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for BroadcastHub {
    fn publish(&self, event: LiveEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

// ─── Bundle ──────────────────────────────────────────────────────────

/// A full set of in-memory adapters with handles for seeding and inspection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    pub engagements: Arc<InMemoryEngagementRepository>,
    pub chat_rooms: Arc<InMemoryChatRoomRepository>,
    pub users: Arc<InMemoryUserDirectory>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: Arc<BroadcastHub>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ports wired to these adapters and `clock`.
    pub fn ports(&self, clock: Arc<dyn Clock>) -> Ports {
        Ports {
            engagements: self.engagements.clone(),
            chat_rooms: self.chat_rooms.clone(),
            users: self.users.clone(),
            notifier: self.notifier.clone(),
            events: self.events.clone(),
            clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Timestamp {
        Timestamp::parse("t", "2026-05-01T12:00:00Z").unwrap()
    }

    fn engagement() -> Engagement {
        Engagement::invite(EngagementId::new(), UserId::new(), UserId::new(), t0()).unwrap()
    }

    #[tokio::test]
    async fn update_bumps_version_and_rejects_stale_writes() {
        let repo = InMemoryEngagementRepository::new();
        let e = engagement();
        repo.insert(&e).await.unwrap();

        let mut first = e.clone();
        first.updated_at = t0().shifted(chrono::Duration::seconds(1));
        assert_eq!(repo.update(&first).await.unwrap(), 1);

        let stale = e.clone();
        assert!(matches!(
            repo.update(&stale).await,
            Err(StorageError::Conflict(_))
        ));
        assert_eq!(repo.get(e.id).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn second_active_engagement_for_pair_rejected() {
        let repo = InMemoryEngagementRepository::new();
        let e = engagement();
        repo.insert(&e).await.unwrap();

        let [a, b] = e.participants.members();
        let twin = Engagement::invite(EngagementId::new(), b, a, t0()).unwrap();
        assert!(matches!(
            repo.insert(&twin).await,
            Err(StorageError::Conflict(_))
        ));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_room_insert_conflicts() {
        let repo = InMemoryChatRoomRepository::new();
        let pair = ParticipantPair::new(UserId::new(), UserId::new()).unwrap();
        let room = ChatRoom::open(ChatRoomId::new(), EngagementId::new(), pair, "hi", t0());
        repo.insert(&room).await.unwrap();
        assert!(matches!(
            repo.insert(&room).await,
            Err(StorageError::Conflict(_))
        ));
        assert_eq!(repo.count_for(room.engagement_id), 1);
    }

    #[tokio::test]
    async fn blocks_are_checked_in_both_directions() {
        let users = InMemoryUserDirectory::new();
        let (a, b) = (UserId::new(), UserId::new());
        users.block(a, b);
        assert!(users.is_blocked(b, a).await.unwrap());
        users.block_mutual(a, b).await.unwrap();
        assert!(users.has_blocked(b, a));
    }

    #[tokio::test]
    async fn failing_notifier_records_nothing() {
        let notifier = RecordingNotifier::new();
        notifier.set_failing(true);
        let n = Notification {
            recipient: UserId::new(),
            sender: None,
            event: crate::ports::EventType::Invite,
            message: "hi".into(),
            reference: crate::ports::Reference::Engagement(EngagementId::new()),
        };
        assert!(notifier.notify(&n).await.is_err());
        assert!(notifier.sent().is_empty());
    }
}
