use std::sync::Arc;
use tracing::error;
use warp::Filter;
use warp::http::StatusCode;

use crate::session::SessionCoordinator;
use crate::websocket::ConnectionManager;

pub mod config;
pub mod scheduler;
pub mod session;
pub mod websocket;

pub fn create_routes(
    connection_manager: Arc<ConnectionManager>,
    coordinator: Arc<SessionCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let connection_manager_filter = warp::any().map({
        let connection_manager = connection_manager.clone();
        move || connection_manager.clone()
    });

    let coordinator_filter = warp::any().map({
        let coordinator = coordinator.clone();
        move || coordinator.clone()
    });

    // WebSocket endpoint
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(connection_manager_filter.clone())
        .and(coordinator_filter.clone())
        .map(|ws: warp::ws::Ws, conn_mgr, coordinator| {
            ws.on_upgrade(move |socket| websocket::handle_connection(socket, conn_mgr, coordinator))
        });

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    let rooms = warp::path("rooms")
        .and(warp::path::end())
        .and(warp::get())
        .and(coordinator_filter.clone())
        .and_then(handle_list_rooms);

    let room = warp::path!("rooms" / String)
        .and(warp::get())
        .and(coordinator_filter.clone())
        .and_then(handle_get_room);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET"]);

    websocket
        .or(health)
        .or(rooms)
        .or(room)
        .with(cors)
        .with(warp::log("duet"))
}

async fn handle_list_rooms(
    coordinator: Arc<SessionCoordinator>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match coordinator.list_rooms().await {
        Ok(rooms) => Ok(warp::reply::with_status(
            warp::reply::json(&rooms),
            StatusCode::OK,
        )),
        Err(e) => {
            error!("Failed to list rooms: {}", e);
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": e.client_message()
                })),
                StatusCode::SERVICE_UNAVAILABLE,
            ))
        }
    }
}

async fn handle_get_room(
    code: String,
    coordinator: Arc<SessionCoordinator>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match coordinator.room_snapshot(&code).await {
        Ok(Some(room)) => Ok(warp::reply::with_status(
            warp::reply::json(&room),
            StatusCode::OK,
        )),
        Ok(None) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "error": "Room not found"
            })),
            StatusCode::NOT_FOUND,
        )),
        Err(e) => {
            error!("Failed to load room {}: {}", code, e);
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": e.client_message()
                })),
                StatusCode::SERVICE_UNAVAILABLE,
            ))
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::config::SessionConfig;
    use duet_core::QuestionBank;
    use duet_persistence::{MemoryStore, RoomRepository};
    use duet_types::{ClientMessage, Question, QuestionText, Room, ServerMessage};
    use std::time::Duration;

    fn test_question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            text: QuestionText::Plain(format!("Question {}", id)),
            category: "general".to_string(),
            have_answers: false,
            answers: None,
        }
    }

    fn create_test_app() -> (
        impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone,
        Arc<SessionCoordinator>,
    ) {
        let connection_manager = Arc::new(ConnectionManager::new());
        let repository = RoomRepository::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let bank = QuestionBank::from_questions(vec![test_question("q1"), test_question("q2")]);
        let coordinator = SessionCoordinator::new(
            connection_manager.clone(),
            repository,
            Arc::new(bank),
            SessionConfig::default(),
        );

        (create_routes(connection_manager, coordinator.clone()), coordinator)
    }

    async fn recv_server_message(ws: &mut warp::test::WsClient) -> ServerMessage {
        let msg = ws.recv().await.expect("Should receive a message");
        let text = msg.to_str().expect("Should be a text frame");
        serde_json::from_str(text).expect("Should be valid ServerMessage")
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = create_test_app();

        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "OK");
    }

    #[tokio::test]
    async fn test_rooms_endpoints() {
        let (app, coordinator) = create_test_app();
        let host_id = crate::websocket::connection::ConnectionId::new().to_string();
        let room = coordinator
            .create_room(&host_id, "Alice", "fox", "general")
            .await
            .unwrap();

        let response = warp::test::request()
            .method("GET")
            .path("/rooms")
            .reply(&app)
            .await;
        assert_eq!(response.status(), 200);
        let rooms: Vec<Room> = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(rooms.len(), 1);

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/rooms/{}", room.room_code.to_lowercase()))
            .reply(&app)
            .await;
        assert_eq!(response.status(), 200);
        let fetched: Room = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(fetched.room_code, room.room_code);

        let response = warp::test::request()
            .method("GET")
            .path("/rooms/ZZZZ")
            .reply(&app)
            .await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_websocket_invalid_message_handling() {
        let (app, _) = create_test_app();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        ws.send_text("invalid json").await;

        match recv_server_message(&mut ws).await {
            ServerMessage::RoomError { message } => assert_eq!(message, "Invalid message"),
            other => panic!("Expected room-error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_websocket_create_and_join_room() {
        let (app, _) = create_test_app();

        let mut host = warp::test::ws()
            .path("/ws")
            .handshake(app.clone())
            .await
            .expect("WebSocket handshake should succeed");
        let mut guest = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        let create = ClientMessage::CreateRoom {
            name: "Alice".to_string(),
            avatar: "fox".to_string(),
            category: "general".to_string(),
        };
        host.send_text(serde_json::to_string(&create).unwrap()).await;

        let code = match recv_server_message(&mut host).await {
            ServerMessage::RoomCreated { room, player } => {
                assert!(player.is_host);
                room.room_code
            }
            other => panic!("Expected room-created, got: {:?}", other),
        };

        let join = ClientMessage::JoinRoom {
            code: code.clone(),
            name: "Bob".to_string(),
            avatar: "owl".to_string(),
        };
        guest.send_text(serde_json::to_string(&join).unwrap()).await;

        match recv_server_message(&mut guest).await {
            ServerMessage::RoomJoined { room, player } => {
                assert_eq!(room.room_code, code);
                assert!(!player.is_host);
            }
            other => panic!("Expected room-joined, got: {:?}", other),
        }
        match recv_server_message(&mut host).await {
            ServerMessage::PlayerJoined { room, player } => {
                assert_eq!(room.players.len(), 2);
                assert_eq!(player.name, "Bob");
            }
            other => panic!("Expected player-joined, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_websocket_disconnect_removes_player() {
        let (app, coordinator) = create_test_app();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("WebSocket handshake should succeed");

        let create = ClientMessage::CreateRoom {
            name: "Alice".to_string(),
            avatar: String::new(),
            category: "general".to_string(),
        };
        ws.send_text(serde_json::to_string(&create).unwrap()).await;
        let code = match recv_server_message(&mut ws).await {
            ServerMessage::RoomCreated { room, .. } => room.room_code,
            other => panic!("Expected room-created, got: {:?}", other),
        };

        // Drop the WebSocket to close the connection
        drop(ws);

        let mut removed = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            if coordinator.room_snapshot(&code).await.unwrap().is_none() {
                removed = true;
                break;
            }
        }
        assert!(removed, "Room should be deleted once its only player disconnects");
    }
}
