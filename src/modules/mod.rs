pub mod access;
pub mod conversation;
pub mod message;
pub mod read_tracking;
pub mod user;
pub mod websocket;
