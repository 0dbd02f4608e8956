use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use pubsub_broker::Message;
use tokio::sync::{Mutex, Notify};

/// Pending messages of one subscription.
#[derive(Debug)]
pub struct SubscriptionQueue {
    pub id: String,
    pub topic_id: String,
    pending: Mutex<VecDeque<Message>>,
    notify: Notify,
    deleted: AtomicBool,
}

impl SubscriptionQueue {
    pub fn new(id: String, topic_id: String) -> Self {
        Self {
            id,
            topic_id,
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            deleted: AtomicBool::new(false),
        }
    }

    pub async fn push(&self, message: Message) {
        if self.is_deleted() {
            return;
        }
        self.pending.lock().await.push_back(message);
        self.notify.notify_one();
    }

    /// Waits for the next pending message. Returns `None` once the queue is deleted.
    pub async fn next(&self) -> Option<Message> {
        loop {
            if self.is_deleted() {
                return None;
            }
            if let Some(message) = self.pending.lock().await.pop_front() {
                return Some(message);
            }
            // notify_one stores a permit, so a push between the check and here is not lost
            self.notify.notified().await;
        }
    }

    pub fn delete(&self) {
        self.deleted.store(true, Ordering::Release);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }
}
