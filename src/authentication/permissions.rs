use crate::{
    error::{Error, HtmlError},
    jwt::SessionData,
    schema::UserRole,
};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnCart,
            ActionType::ManageOwnSubscriptions,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnCart,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageAllRecipes,
        ],
    ),
];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnFavorites,
    ManageOwnCart,
    ManageOwnSubscriptions,

    ManageAllRecipes,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        let user_uid = &session.user_uid;

        ACTION_TABLE
            .iter()
            .find_map(|(uid, actions)| {
                if user_uid != uid {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

/// Mutating a recipe is allowed to its author and to anyone allowed to
/// manage all recipes.
pub fn authorize_recipe_change(session: &SessionData, author_id: i32) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;

    if ActionType::ManageAllRecipes.authenticate(session) || author_id == session.user_id {
        Ok(())
    } else {
        Err(HtmlError::Forbidden.default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: i32, role: UserRole) -> SessionData {
        SessionData {
            user_id,
            username: format!("user{user_id}"),
            user_uid: role,
            is_admin: role == UserRole::Admin,
            token_id: format!("token-{user_id}"),
            expires_at: i64::MAX,
        }
    }

    #[test]
    fn users_cannot_manage_all_recipes() {
        let user = session(1, UserRole::User);

        assert!(ActionType::CreateRecipes.authenticate(&user));
        assert!(!ActionType::ManageAllRecipes.authenticate(&user));
    }

    #[test]
    fn author_may_change_own_recipe() {
        assert!(authorize_recipe_change(&session(7, UserRole::User), 7).is_ok());
    }

    #[test]
    fn other_users_are_forbidden() {
        let error = authorize_recipe_change(&session(8, UserRole::User), 7).unwrap_err();

        assert_eq!(error.code, 403);
    }

    #[test]
    fn admins_may_change_any_recipe() {
        assert!(authorize_recipe_change(&session(2, UserRole::Admin), 7).is_ok());
    }
}
