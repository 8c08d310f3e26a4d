use sprite_core::model::UserId;

/// Authenticated session handed over by the session provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    user_id: UserId,
}

impl Session {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

/// User behind the session, if any.
pub(crate) fn session_user(session: Option<&Session>) -> Option<UserId> {
    session.map(Session::user_id)
}
