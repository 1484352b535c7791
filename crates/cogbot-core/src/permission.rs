use crate::domain::{CallerIdentity, RoleId};

/// Reserved tag: visible to holders of the configured staff role.
pub const STAFF_TAG: &str = "#STAFF";
/// Reserved tag: visible to the bot owner.
pub const OWNER_TAG: &str = "#OWNER";

// ============== Visibility ==============

/// Resolves role tags against a caller.
///
/// Tags form an allow-list: the first tag the caller satisfies grants
/// visibility. There is no deny or negation syntax.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermissionEvaluator {
    staff_role_id: RoleId,
}

impl PermissionEvaluator {
    pub fn new(staff_role_id: RoleId) -> Self {
        Self { staff_role_id }
    }

    pub fn is_staff(&self, caller: &CallerIdentity) -> bool {
        caller.has_role(self.staff_role_id)
    }

    /// Untagged commands are open to everyone.
    pub fn is_visible<S: AsRef<str>>(&self, role_tags: &[S], caller: &CallerIdentity) -> bool {
        if role_tags.is_empty() {
            return true;
        }
        role_tags.iter().any(|tag| self.tag_allows(tag.as_ref(), caller))
    }

    fn tag_allows(&self, tag: &str, caller: &CallerIdentity) -> bool {
        match tag {
            STAFF_TAG => self.is_staff(caller),
            OWNER_TAG => caller.is_owner,
            // Literal role names are reserved; they never match for now.
            _ => false,
        }
    }
}
