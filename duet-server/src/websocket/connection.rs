use duet_types::ServerMessage;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    /// External identity bound with `register-user`
    pub external_user_id: Option<String>,
    pub connected_at: Instant,
    pub last_activity: Instant,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        let connection = Self {
            id,
            external_user_id: None,
            connected_at: now,
            last_activity: now,
            sender,
        };

        (connection, receiver)
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }

    pub fn is_inactive(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

/// Live connections, their outbound channels and external user bindings
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    user_to_connection: RwLock<HashMap<String, ConnectionId>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            user_to_connection: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_connection(
        &self,
        id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (conn, receiver) = Connection::new(id);

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, conn);
        }

        receiver
    }

    pub async fn remove_connection(&self, id: ConnectionId) {
        let user_id = {
            let mut connections = self.connections.write().await;
            connections.remove(&id).and_then(|conn| conn.external_user_id)
        };

        if let Some(user_id) = user_id {
            let mut user_to_connection = self.user_to_connection.write().await;
            // Only drop the binding if a newer connection has not taken it
            if user_to_connection.get(&user_id) == Some(&id) {
                user_to_connection.remove(&user_id);
            }
        }
    }

    pub async fn get_connection(&self, id: ConnectionId) -> Option<Connection> {
        let connections = self.connections.read().await;
        connections.get(&id).cloned()
    }

    pub async fn get_connection_by_user(&self, user_id: &str) -> Option<Connection> {
        let user_to_connection = self.user_to_connection.read().await;
        if let Some(connection_id) = user_to_connection.get(user_id) {
            let connections = self.connections.read().await;
            connections.get(connection_id).cloned()
        } else {
            None
        }
    }

    /// Binds an external user id to a connection. A user registering again
    /// from a newer connection moves the binding there.
    pub async fn register_user(&self, id: ConnectionId, user_id: String) -> Result<(), String> {
        let previous = {
            let mut connections = self.connections.write().await;
            let connection = connections
                .get_mut(&id)
                .ok_or_else(|| "Connection not found".to_string())?;
            connection.external_user_id.replace(user_id.clone())
        };

        let mut user_to_connection = self.user_to_connection.write().await;
        if let Some(previous) = previous {
            if previous != user_id && user_to_connection.get(&previous) == Some(&id) {
                user_to_connection.remove(&previous);
            }
        }

        if let Some(old_connection) = user_to_connection.insert(user_id.clone(), id) {
            if old_connection != id {
                tracing::info!(
                    "Rebound user {} from connection {} to {}",
                    user_id,
                    old_connection,
                    id
                );
                let mut connections = self.connections.write().await;
                if let Some(old) = connections.get_mut(&old_connection) {
                    old.external_user_id = None;
                }
            }
        }

        Ok(())
    }

    pub async fn update_activity(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&id) {
            connection.update_activity();
        }
    }

    pub async fn send_to_connection(
        &self,
        id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connections = self.connections.read().await;
        if let Some(connection) = connections.get(&id) {
            connection.send_message(message)
        } else {
            Err("Connection not found".to_string())
        }
    }

    /// Players are identified by their connection id string
    pub async fn send_to_player(&self, player_id: &str, message: ServerMessage) -> Result<(), String> {
        let id = player_id
            .parse::<ConnectionId>()
            .map_err(|_| "Invalid player id".to_string())?;
        self.send_to_connection(id, message).await
    }

    /// Out-of-band delivery to an external user. Never required for gameplay.
    pub async fn notify_user(&self, user_id: &str, message: ServerMessage) -> Result<(), String> {
        let connection_id = {
            let user_to_connection = self.user_to_connection.read().await;
            user_to_connection.get(user_id).copied()
        };

        if let Some(connection_id) = connection_id {
            self.send_to_connection(connection_id, message).await
        } else {
            Err("User not connected".to_string())
        }
    }

    pub async fn cleanup_inactive_connections(&self, timeout: Duration) {
        let inactive_connections: Vec<ConnectionId> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .filter(|conn| conn.is_inactive(timeout))
                .map(|conn| conn.id)
                .collect()
        };

        for connection_id in inactive_connections {
            tracing::info!("Removing inactive connection: {}", connection_id);
            self.remove_connection(connection_id).await;
        }
    }

    // Test helper methods
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    pub async fn user_connection_count(&self) -> usize {
        let user_connections = self.user_to_connection.read().await;
        user_connections.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
