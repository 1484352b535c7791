use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Chat platform user id (numeric snowflake).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Role id (numeric snowflake).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub u64);

/// Channel id (numeric snowflake).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub u64);

/// Message id (numeric snowflake).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Who is asking: resolved by the embedding bot and handed to the core by value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: UserId,
    pub role_ids: HashSet<RoleId>,
    pub is_owner: bool,
}

impl CallerIdentity {
    /// A caller with no roles who is not the bot owner.
    pub fn member(user_id: UserId) -> Self {
        Self {
            user_id,
            role_ids: HashSet::new(),
            is_owner: false,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.role_ids.extend(roles);
        self
    }

    pub fn owner(mut self) -> Self {
        self.is_owner = true;
        self
    }

    pub fn has_role(&self, role: RoleId) -> bool {
        self.role_ids.contains(&role)
    }
}
