use std::sync::Arc;

use actix::Addr;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::api::error;
use crate::modules::access::{AccessPolicy, Action, Resource};
use crate::modules::conversation::repository::{ConversationRepository, ParticipantRepository};
use crate::modules::message::model::{
    GetMessageResponse, MessageResponse, NewMessage, SendMessage,
};
use crate::modules::message::repository::MessageRepository;
use crate::modules::message::schema::MessageType;
use crate::modules::read_tracking::repository::ReadReceiptRepository;
use crate::modules::websocket::events::BroadcastToRoom;
use crate::modules::websocket::message::ServerMessage;
use crate::modules::websocket::server::ChatServer;

#[derive(Clone)]
pub struct MessageService<C, P, M, R>
where
    C: ConversationRepository + Send + Sync,
    P: ParticipantRepository + Send + Sync,
    M: MessageRepository + Send + Sync,
    R: ReadReceiptRepository + Send + Sync,
{
    conversation_repo: Arc<C>,
    participant_repo: Arc<P>,
    message_repo: Arc<M>,
    receipt_repo: Arc<R>,
    access: AccessPolicy<P, M>,
    // None in unit tests, where no actor system is running.
    ws_server: Option<Addr<ChatServer>>,
}

impl<C, P, M, R> MessageService<C, P, M, R>
where
    C: ConversationRepository + Send + Sync,
    P: ParticipantRepository + Send + Sync,
    M: MessageRepository + Send + Sync,
    R: ReadReceiptRepository + Send + Sync,
{
    pub fn with_dependencies(
        conversation_repo: Arc<C>,
        participant_repo: Arc<P>,
        message_repo: Arc<M>,
        receipt_repo: Arc<R>,
        ws_server: Option<Addr<ChatServer>>,
    ) -> Self {
        let access =
            AccessPolicy::with_dependencies(participant_repo.clone(), message_repo.clone());
        MessageService {
            conversation_repo,
            participant_repo,
            message_repo,
            receipt_repo,
            access,
            ws_server,
        }
    }

    /// Appends a message to the conversation log. On success the sender's read
    /// cursor and the conversation's last-message pointer are advanced, and
    /// the room is notified over the websocket.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        payload: SendMessage,
    ) -> Result<MessageResponse, error::SystemError> {
        self.access
            .authorize(&sender_id, Resource::Conversation(conversation_id), Action::View)
            .await?;

        let content = payload.content.trim();
        if content.is_empty() {
            return Err(error::SystemError::bad_request("Message content cannot be empty"));
        }

        if let Some(reply_to) = payload.reply_to {
            let target = self
                .message_repo
                .find_by_id(&reply_to)
                .await?
                .filter(|m| m.deleted_at.is_none())
                .ok_or_else(|| error::SystemError::not_found("Replied message not found"))?;

            if target.conversation_id != conversation_id {
                return Err(error::SystemError::bad_request(
                    "Cannot reply to a message from another conversation",
                ));
            }
        }

        let message = self
            .message_repo
            .create(&NewMessage {
                conversation_id,
                sender_id,
                reply_to_id: payload.reply_to,
                _type: payload._type.unwrap_or(MessageType::Text),
                content: Some(content.to_string()),
                file_url: None,
            })
            .await?;

        // The sender has trivially seen their own message: self receipt plus
        // cursor advance.
        self.receipt_repo.mark_read(&message.id, &sender_id).await?;
        self.participant_repo.advance_cursor(&conversation_id, &sender_id, &message.id).await?;
        self.conversation_repo.set_last_message(&conversation_id, &message.id).await?;

        let response = MessageResponse::from(message);
        self.broadcast(conversation_id, ServerMessage::NewMessage { message: response.clone() });

        Ok(response)
    }

    /// One page of history, oldest first within the page. The cursor walks
    /// backwards over send time; a missing cursor starts from the newest.
    pub async fn get_messages(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        limit: i32,
        cursor: Option<String>,
    ) -> Result<GetMessageResponse, error::SystemError> {
        self.access
            .authorize(&user_id, Resource::Conversation(conversation_id), Action::View)
            .await?;

        let before = cursor
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|_| error::SystemError::bad_request("Malformed pagination cursor"))
            })
            .transpose()?;

        let mut page = self.message_repo.list_page(&conversation_id, before, limit as i64).await?;

        let cursor = (page.len() == limit as usize)
            .then(|| page.last().map(|m| m.created_at.to_rfc3339()))
            .flatten();

        page.reverse();
        let messages = page.into_iter().map(MessageResponse::from).collect();

        Ok(GetMessageResponse { messages, cursor })
    }

    pub async fn edit_message(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Result<MessageResponse, error::SystemError> {
        self.access.authorize(&user_id, Resource::Message(message_id), Action::Modify).await?;

        let content = content.trim();
        if content.is_empty() {
            return Err(error::SystemError::bad_request("Message content cannot be empty"));
        }

        let message = self
            .message_repo
            .edit(&message_id, content)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        let response = MessageResponse::from(message);
        self.broadcast(
            response.conversation_id,
            ServerMessage::MessageEdited { message: response.clone() },
        );

        Ok(response)
    }

    pub async fn delete_message(
        &self,
        message_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), error::SystemError> {
        self.access.authorize(&user_id, Resource::Message(message_id), Action::Modify).await?;

        let message = self
            .message_repo
            .find_by_id(&message_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        if !self.message_repo.soft_delete(&message_id).await? {
            return Err(error::SystemError::not_found("Message not found"));
        }

        self.broadcast(
            message.conversation_id,
            ServerMessage::MessageDeleted {
                message_id,
                conversation_id: message.conversation_id,
            },
        );

        tracing::info!("Message {} deleted by {}", message_id, user_id);
        Ok(())
    }

    fn broadcast(&self, conversation_id: Uuid, message: ServerMessage) {
        let Some(server) = &self.ws_server else { return };
        server.do_send(BroadcastToRoom { conversation_id, message, skip_user_id: None });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::mem::MemStore;

    fn service(
        store: &MemStore,
    ) -> MessageService<
        crate::test::mem::MemConversationRepository,
        crate::test::mem::MemParticipantRepository,
        crate::test::mem::MemMessageRepository,
        crate::test::mem::MemReadReceiptRepository,
    > {
        MessageService::with_dependencies(
            store.conversation_repo(),
            store.participant_repo(),
            store.message_repo(),
            store.receipt_repo(),
            None,
        )
    }

    fn text(content: &str) -> SendMessage {
        SendMessage { content: content.to_string(), reply_to: None, _type: None }
    }

    #[actix_web::test]
    async fn sending_updates_pointer_and_sender_cursor() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let conv = store.direct_conversation(alice, bob);
        let svc = service(&store);

        let sent = svc.send_message(conv, alice, text("hello")).await.unwrap();

        assert_eq!(store.last_message_of(conv), Some(sent.id));
        assert_eq!(store.cursor_of(conv, alice), Some(sent.id));
        assert_eq!(store.cursor_of(conv, bob), None);
        // Self receipt written at send time.
        assert_eq!(store.receipt_count(sent.id), 1);
    }

    #[actix_web::test]
    async fn outsider_cannot_send() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let mallory = store.add_user("mallory");
        let conv = store.direct_conversation(alice, bob);
        let svc = service(&store);

        assert!(svc.send_message(conv, mallory, text("hi")).await.is_err());
    }

    #[actix_web::test]
    async fn blank_content_is_rejected() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let conv = store.direct_conversation(alice, bob);
        let svc = service(&store);

        assert!(svc.send_message(conv, alice, text("   ")).await.is_err());
    }

    #[actix_web::test]
    async fn reply_must_target_same_conversation() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let carol = store.add_user("carol");
        let conv_ab = store.direct_conversation(alice, bob);
        let conv_ac = store.direct_conversation(alice, carol);
        let foreign = store.add_message(conv_ac, alice, "elsewhere");
        let svc = service(&store);

        let cross = svc
            .send_message(
                conv_ab,
                alice,
                SendMessage { content: "re".to_string(), reply_to: Some(foreign), _type: None },
            )
            .await;
        assert!(cross.is_err());

        let local = store.add_message(conv_ab, bob, "here");
        let reply = svc
            .send_message(
                conv_ab,
                alice,
                SendMessage { content: "re".to_string(), reply_to: Some(local), _type: None },
            )
            .await
            .unwrap();
        assert_eq!(reply.reply_to_id, Some(local));
    }

    #[actix_web::test]
    async fn pagination_walks_backwards_in_ascending_pages() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let conv = store.direct_conversation(alice, bob);
        for i in 0..5 {
            store.add_message(conv, alice, &format!("m{i}"));
        }
        let svc = service(&store);

        let first = svc.get_messages(conv, bob, 2, None).await.unwrap();
        let contents: Vec<_> =
            first.messages.iter().filter_map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
        assert!(first.cursor.is_some());

        let second = svc.get_messages(conv, bob, 2, first.cursor).await.unwrap();
        let contents: Vec<_> =
            second.messages.iter().filter_map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["m1", "m2"]);

        let last = svc.get_messages(conv, bob, 2, second.cursor).await.unwrap();
        let contents: Vec<_> = last.messages.iter().filter_map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["m0"]);
        assert!(last.cursor.is_none());
    }

    #[actix_web::test]
    async fn only_sender_can_edit_and_delete() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let conv = store.direct_conversation(alice, bob);
        let message = store.add_message(conv, alice, "draft");
        let svc = service(&store);

        assert!(svc.edit_message(message, bob, "hijacked".to_string()).await.is_err());

        let edited = svc.edit_message(message, alice, "final".to_string()).await.unwrap();
        assert!(edited.is_edited);
        assert_eq!(edited.content.as_deref(), Some("final"));

        assert!(svc.delete_message(message, bob).await.is_err());
        svc.delete_message(message, alice).await.unwrap();

        // Deleted messages disappear from history and cannot be edited again.
        let page = svc.get_messages(conv, alice, 10, None).await.unwrap();
        assert!(page.messages.is_empty());
        assert!(svc.edit_message(message, alice, "again".to_string()).await.is_err());
    }
}
