use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::access::{AccessPolicy, Action, Resource};
use crate::modules::conversation::model::{ConversationDetail, ParticipantDetail};
use crate::modules::conversation::repository::{ConversationRepository, ParticipantRepository};
use crate::modules::conversation::schema::{ConversationEntity, ConversationType};
use crate::modules::message::model::MessageResponse;
use crate::modules::message::repository::MessageRepository;

#[derive(Clone)]
pub struct ConversationService<C, P, M>
where
    C: ConversationRepository + Send + Sync,
    P: ParticipantRepository + Send + Sync,
    M: MessageRepository + Send + Sync,
{
    conversation_repo: Arc<C>,
    participant_repo: Arc<P>,
    message_repo: Arc<M>,
    access: AccessPolicy<P, M>,
}

impl<C, P, M> ConversationService<C, P, M>
where
    C: ConversationRepository + Send + Sync,
    P: ParticipantRepository + Send + Sync,
    M: MessageRepository + Send + Sync,
{
    pub fn with_dependencies(
        conversation_repo: Arc<C>,
        participant_repo: Arc<P>,
        message_repo: Arc<M>,
    ) -> Self {
        let access =
            AccessPolicy::with_dependencies(participant_repo.clone(), message_repo.clone());
        ConversationService { conversation_repo, participant_repo, message_repo, access }
    }

    /// Creates a conversation. A direct conversation between a pair that
    /// already shares one is returned instead of duplicated.
    pub async fn create_conversation(
        &self,
        _type: ConversationType,
        name: Option<String>,
        member_ids: Vec<Uuid>,
        user_id: Uuid,
    ) -> Result<ConversationDetail, error::SystemError> {
        let conversation = match _type {
            ConversationType::Direct => {
                let other = match member_ids.as_slice() {
                    [other] if *other != user_id => *other,
                    _ => {
                        return Err(error::SystemError::bad_request(
                            "A direct conversation needs exactly one other member",
                        ))
                    }
                };

                match self.conversation_repo.find_direct_between(&user_id, &other).await? {
                    Some(existing) => existing,
                    None => self.conversation_repo.create_direct(&user_id, &other).await?,
                }
            }

            ConversationType::Group => {
                let mut members: Vec<Uuid> =
                    member_ids.into_iter().filter(|id| *id != user_id).collect();
                members.sort();
                members.dedup();

                if members.len() < 2 {
                    return Err(error::SystemError::bad_request(
                        "A group conversation needs at least two other members",
                    ));
                }

                self.conversation_repo.create_group(name.as_deref(), &user_id, &members).await?
            }
        };

        self.detail(conversation, &user_id).await
    }

    pub async fn get_by_user_id(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationDetail>, error::SystemError> {
        let conversations = self.conversation_repo.list_for_user(&user_id).await?;

        let conversation_ids: Vec<Uuid> = conversations.iter().map(|c| c.id).collect();
        let participants = self.participant_repo.list_details(&conversation_ids).await?;

        let mut participant_map = participants.into_iter().fold(
            HashMap::<Uuid, Vec<ParticipantDetail>>::new(),
            |mut acc, participant| {
                acc.entry(participant.conversation_id).or_default().push(participant);
                acc
            },
        );

        let mut details = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let participants = participant_map.remove(&conversation.id).unwrap_or_default();
            let last_message = self.last_message(&conversation).await?;
            let unread_count =
                self.unread_count_for(&conversation, &participants, &user_id).await?;

            details.push(ConversationDetail {
                conversation,
                participants,
                last_message,
                unread_count,
            });
        }

        Ok(details)
    }

    pub async fn get_detail(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<ConversationDetail, error::SystemError> {
        self.access
            .authorize(&user_id, Resource::Conversation(conversation_id), Action::View)
            .await?;

        let conversation = self
            .conversation_repo
            .find_by_id(&conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        self.detail(conversation, &user_id).await
    }

    /// Membership of a direct conversation is fixed at creation.
    pub async fn add_participant(
        &self,
        conversation_id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
    ) -> Result<(), error::SystemError> {
        self.access
            .authorize(&actor_id, Resource::Conversation(conversation_id), Action::View)
            .await?;

        let conversation = self
            .conversation_repo
            .find_by_id(&conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        if conversation._type == ConversationType::Direct {
            return Err(error::SystemError::bad_request(
                "Cannot add participants to a direct conversation",
            ));
        }

        let created = self.participant_repo.add(&conversation_id, &target_id, false).await?;
        if !created {
            return Err(error::SystemError::bad_request("User is already a participant"));
        }

        tracing::info!("User {} added to conversation {}", target_id, conversation_id);
        Ok(())
    }

    pub async fn remove_participant(
        &self,
        conversation_id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
    ) -> Result<(), error::SystemError> {
        self.access
            .authorize(&actor_id, Resource::Conversation(conversation_id), Action::View)
            .await?;

        let conversation = self
            .conversation_repo
            .find_by_id(&conversation_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Conversation not found"))?;

        if conversation._type == ConversationType::Direct {
            return Err(error::SystemError::bad_request(
                "Cannot remove participants from a direct conversation",
            ));
        }

        let removed = self.participant_repo.remove(&conversation_id, &target_id).await?;
        if !removed {
            return Err(error::SystemError::not_found("Participant not found"));
        }

        tracing::info!("User {} removed from conversation {}", target_id, conversation_id);
        Ok(())
    }

    async fn detail(
        &self,
        conversation: ConversationEntity,
        user_id: &Uuid,
    ) -> Result<ConversationDetail, error::SystemError> {
        let participants = self.participant_repo.list_details(&[conversation.id]).await?;
        let last_message = self.last_message(&conversation).await?;
        let unread_count = self.unread_count_for(&conversation, &participants, user_id).await?;

        Ok(ConversationDetail { conversation, participants, last_message, unread_count })
    }

    async fn last_message(
        &self,
        conversation: &ConversationEntity,
    ) -> Result<Option<MessageResponse>, error::SystemError> {
        let Some(last_message_id) = conversation.last_message_id else {
            return Ok(None);
        };

        let message = self.message_repo.find_by_id(&last_message_id).await?;
        Ok(message.filter(|m| m.deleted_at.is_none()).map(MessageResponse::from))
    }

    /// Unread = messages sent after the caller's read cursor, not authored by
    /// the caller. A conversation without a last message short-circuits to 0.
    async fn unread_count_for(
        &self,
        conversation: &ConversationEntity,
        participants: &[ParticipantDetail],
        user_id: &Uuid,
    ) -> Result<i64, error::SystemError> {
        if conversation.last_message_id.is_none() {
            return Ok(0);
        }

        let cursor_id = participants
            .iter()
            .find(|p| p.user_id == *user_id)
            .and_then(|p| p.last_read_message_id);

        let after = match cursor_id {
            Some(id) => self.message_repo.find_by_id(&id).await?.map(|m| m.created_at),
            None => None,
        };

        self.message_repo.count_unread(&conversation.id, after, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::mem::MemStore;

    fn service(
        store: &MemStore,
    ) -> ConversationService<
        crate::test::mem::MemConversationRepository,
        crate::test::mem::MemParticipantRepository,
        crate::test::mem::MemMessageRepository,
    > {
        ConversationService::with_dependencies(
            store.conversation_repo(),
            store.participant_repo(),
            store.message_repo(),
        )
    }

    #[actix_web::test]
    async fn direct_conversation_is_deduplicated() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let svc = service(&store);

        let first = svc
            .create_conversation(ConversationType::Direct, None, vec![bob], alice)
            .await
            .unwrap();
        // Second creation between the same pair, from either side.
        let second = svc
            .create_conversation(ConversationType::Direct, None, vec![alice], bob)
            .await
            .unwrap();

        assert_eq!(first.conversation.id, second.conversation.id);
        assert_eq!(first.participants.len(), 2);
    }

    #[actix_web::test]
    async fn direct_creates_collapse_in_the_store() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let repo = store.conversation_repo();

        // Two writers that both missed the lookup still end up with one row,
        // enforced by the store itself rather than the find-then-create path.
        let first = repo.create_direct(&alice, &bob).await.unwrap();
        let second = repo.create_direct(&bob, &alice).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.participant_count(first.id), 2);
    }

    #[actix_web::test]
    async fn direct_conversation_requires_exactly_one_other_member() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let carol = store.add_user("carol");
        let svc = service(&store);

        let too_many = svc
            .create_conversation(ConversationType::Direct, None, vec![bob, carol], alice)
            .await;
        assert!(too_many.is_err());

        let with_self =
            svc.create_conversation(ConversationType::Direct, None, vec![alice], alice).await;
        assert!(with_self.is_err());
    }

    #[actix_web::test]
    async fn direct_membership_is_immutable() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let carol = store.add_user("carol");
        let svc = service(&store);

        let conv = svc
            .create_conversation(ConversationType::Direct, None, vec![bob], alice)
            .await
            .unwrap()
            .conversation
            .id;

        assert!(svc.add_participant(conv, alice, carol).await.is_err());
        assert!(svc.remove_participant(conv, alice, bob).await.is_err());
        assert_eq!(store.participant_count(conv), 2);
    }

    #[actix_web::test]
    async fn group_membership_is_mutable() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let carol = store.add_user("carol");
        let dave = store.add_user("dave");
        let svc = service(&store);

        let conv = svc
            .create_conversation(
                ConversationType::Group,
                Some("team".to_string()),
                vec![bob, carol],
                alice,
            )
            .await
            .unwrap()
            .conversation
            .id;
        assert_eq!(store.participant_count(conv), 3);

        svc.add_participant(conv, alice, dave).await.unwrap();
        assert_eq!(store.participant_count(conv), 4);

        // Adding twice is rejected.
        assert!(svc.add_participant(conv, alice, dave).await.is_err());

        svc.remove_participant(conv, alice, dave).await.unwrap();
        assert_eq!(store.participant_count(conv), 3);
    }

    #[actix_web::test]
    async fn group_requires_two_other_members() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let svc = service(&store);

        let result = svc
            .create_conversation(ConversationType::Group, Some("duo".to_string()), vec![bob], alice)
            .await;
        assert!(result.is_err());
    }

    #[actix_web::test]
    async fn listing_carries_unread_count_and_last_message() {
        let store = MemStore::new();
        let (alice, bob) = (store.add_user("alice"), store.add_user("bob"));
        let svc = service(&store);

        let conv = svc
            .create_conversation(ConversationType::Direct, None, vec![bob], alice)
            .await
            .unwrap()
            .conversation
            .id;

        store.add_message(conv, alice, "hi");
        let m2 = store.add_message(conv, alice, "are you there?");
        store.set_last_message(conv, m2);

        let listing = svc.get_by_user_id(bob).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].unread_count, 2);
        assert_eq!(
            listing[0].last_message.as_ref().unwrap().content.as_deref(),
            Some("are you there?")
        );

        // The sender has nothing unread in their own conversation.
        let listing = svc.get_by_user_id(alice).await.unwrap();
        assert_eq!(listing[0].unread_count, 0);
    }
}
