//! Per-board broadcast of committed mutations.

use canvasboard_core::elements::BoardId;
use canvasboard_core::sync::protocol::BoardEvent;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Event already encoded as JSON, shared by every subscriber.
pub type EncodedEvent = Arc<str>;

#[derive(Default)]
pub struct Hub {
    boards: DashMap<BoardId, broadcast::Sender<EncodedEvent>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, board_id: &str) -> broadcast::Receiver<EncodedEvent> {
        self.boards
            .entry(board_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Send `event` to every subscriber of the board, the originator
    /// included. Returns how many subscribers it reached.
    pub fn publish(&self, board_id: &str, event: &BoardEvent) -> usize {
        let Some(tx) = self.boards.get(board_id).map(|entry| entry.value().clone()) else {
            return 0;
        };
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(board_id, kind = event.kind(), "failed to encode event: {}", e);
                return 0;
            }
        };
        match tx.send(Arc::from(json)) {
            Ok(receivers) => receivers,
            Err(_) => {
                // Everyone left; forget the channel.
                self.boards.remove_if(board_id, |_, tx| tx.receiver_count() == 0);
                0
            }
        }
    }

    pub fn subscriber_count(&self, board_id: &str) -> usize {
        self.boards.get(board_id).map_or(0, |tx| tx.receiver_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deleted(user: &str) -> BoardEvent {
        BoardEvent::ElementDeleted {
            element_id: uuid::Uuid::new_v4(),
            user_id: user.into(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_board_subscribers_only() {
        let hub = Hub::new();
        let mut a = hub.subscribe("b1");
        let mut b = hub.subscribe("b1");
        let mut other = hub.subscribe("b2");

        assert_eq!(hub.publish("b1", &deleted("alice")), 2);
        for rx in [&mut a, &mut b] {
            let json = rx.recv().await.unwrap();
            let event: BoardEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(event.user_id(), "alice");
        }
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribed_board_is_forgotten() {
        let hub = Hub::new();
        assert_eq!(hub.publish("nobody", &deleted("alice")), 0);
        let rx = hub.subscribe("b1");
        assert_eq!(hub.subscriber_count("b1"), 1);
        drop(rx);
        assert_eq!(hub.publish("b1", &deleted("alice")), 0);
        assert_eq!(hub.subscriber_count("b1"), 0);
    }
}
