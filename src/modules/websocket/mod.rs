/// Real-time layer.
///
/// Each websocket connection is scoped to a single conversation: the client
/// connects to `/ws/{conversation_id}` and only ever receives events for that
/// room. The pieces:
///
/// - Wire protocol (ClientMessage & ServerMessage)
/// - ChatServer actor (registry of sessions and rooms)
/// - WebSocketSession actor (one per connection)
/// - HTTP handler (authenticates, then upgrades to a websocket)
pub mod events;
pub mod handler;
pub mod message;
pub mod server;
pub mod session;
