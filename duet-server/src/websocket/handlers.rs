use std::sync::Arc;
use tracing::info;

use crate::session::SessionCoordinator;
use crate::websocket::connection::{ConnectionId, ConnectionManager};
use duet_types::{ClientMessage, ServerMessage};

#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    player_id: String,
    connection_manager: Arc<ConnectionManager>,
    coordinator: Arc<SessionCoordinator>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        coordinator: Arc<SessionCoordinator>,
    ) -> Self {
        Self {
            connection_id,
            player_id: connection_id.to_string(),
            connection_manager,
            coordinator,
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub async fn handle_message(&self, message: ClientMessage) {
        self.connection_manager
            .update_activity(self.connection_id)
            .await;

        self.coordinator
            .handle_command(&self.player_id, message)
            .await;
    }

    pub async fn handle_disconnect(&self) {
        info!("Handling disconnect for connection {}", self.connection_id);
        self.coordinator.handle_disconnect(&self.player_id).await;
    }

    pub async fn send_error(&self, message: &str) {
        let _ = self
            .connection_manager
            .send_to_connection(
                self.connection_id,
                ServerMessage::RoomError {
                    message: message.to_string(),
                },
            )
            .await;
    }
}
