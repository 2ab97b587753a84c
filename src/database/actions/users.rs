use std::path::Path;

use serde::Deserialize;
use sqlx::{Pool, Postgres};
use validator::ValidateEmail;

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{generate_jwt_session, SessionData},
    },
    constants::{EMAIL_MAX_LENGTH, NAME_MAX_LENGTH, RESERVED_USERNAMES},
    database::error::QueryError,
    error::{Error, HtmlError},
    media::remove_image,
    pagination::{Page, PageContext},
    schema::{Id, User, UserRole, UserRow},
};

#[derive(Deserialize, Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
}

impl NewUser {
    /// Field checks that need no storage access.
    pub fn validate(&self) -> Result<(), Error> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(HtmlError::InvalidRequest.field("email", "This field may not be blank."));
        }
        if email.len() > EMAIL_MAX_LENGTH || !email.validate_email() {
            return Err(HtmlError::InvalidRequest.field("email", "Enter a valid email address."));
        }

        let username = self.username.trim();
        if username.is_empty() {
            return Err(HtmlError::InvalidRequest.field("username", "This field may not be blank."));
        }
        if RESERVED_USERNAMES.contains(&username) {
            return Err(HtmlError::InvalidRequest
                .field("username", &format!("The username \"{username}\" is not allowed.")));
        }
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
        {
            return Err(HtmlError::InvalidRequest.field(
                "username",
                "Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters.",
            ));
        }

        for (field, value) in [
            ("username", username),
            ("first_name", self.first_name.as_str()),
            ("last_name", self.last_name.as_str()),
        ] {
            if value.chars().count() > NAME_MAX_LENGTH {
                return Err(HtmlError::InvalidRequest.field(
                    field,
                    &format!("Ensure this field has no more than {NAME_MAX_LENGTH} characters."),
                ));
            }
        }

        if self.password.is_empty() {
            return Err(HtmlError::InvalidRequest.field("password", "This field may not be blank."));
        }

        Ok(())
    }
}

pub async fn get_user_by_id(id: Id, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_email(email: &str, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email.trim())
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_users(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<User>, Error> {
    let rows: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn fetch_users(page: Page, pool: &Pool<Postgres>) -> Result<PageContext<User>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "SELECT *, COUNT(*) OVER() AS count FROM users ORDER BY id LIMIT $1 OFFSET $2",
    )
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let rows = rows.into_iter().map(|row| row.user).collect();
    PageContext::paginate(rows, total_count, page)
}

/// Creates an account after checking the email and username are free. The
/// insert is still guarded in case a concurrent registration wins the race.
pub async fn create_user(
    user: &NewUser,
    role: UserRole,
    pool: &Pool<Postgres>,
) -> Result<User, Error> {
    user.validate()?;

    let taken: (bool, bool) = sqlx::query_as(
        "
        SELECT COALESCE(bool_or(LOWER(email) = LOWER($1)), false),
            COALESCE(bool_or(username = $2), false)
        FROM users
        WHERE LOWER(email) = LOWER($1) OR username = $2
    ",
    )
    .bind(user.email.trim())
    .bind(user.username.trim())
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    match taken {
        (true, _) => {
            return Err(HtmlError::InvalidRequest
                .field("email", "A user with that email already exists."))
        }
        (_, true) => {
            return Err(HtmlError::InvalidRequest
                .field("username", "A user with that username already exists."))
        }
        (false, false) => {}
    }

    let password = hash_password(&user.password)?;

    let created: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT DO NOTHING
        RETURNING *
    ",
    )
    .bind(user.email.trim())
    .bind(user.username.trim())
    .bind(user.first_name.trim())
    .bind(user.last_name.trim())
    .bind(password)
    .bind(role)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    match created {
        Some(created) => {
            log::info!("Registered user {} ({:?})", created.id, created.role);
            Ok(created)
        }
        None => Err(HtmlError::InvalidRequest.new("A user with these credentials already exists.")),
    }
}

/// Exchanges an email and password for a session token.
pub async fn login_user(
    email: &str,
    password: &str,
    secret: &str,
    lifetime: chrono::Duration,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let invalid = || {
        HtmlError::InvalidRequest
            .field("non_field_errors", "Unable to log in with provided credentials.")
    };

    let user = get_user_by_email(email, pool).await?.ok_or_else(invalid)?;
    if !verify_password(password, &user)? {
        return Err(invalid());
    }

    generate_jwt_session(&user, secret, lifetime)
}

pub async fn set_password(
    session: &SessionData,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if new_password.is_empty() {
        return Err(HtmlError::InvalidRequest.field("new_password", "This field may not be blank."));
    }

    let user = get_user_by_id(session.user_id, pool)
        .await?
        .ok_or_else(|| HtmlError::InvalidSession.new("Invalid session; User no longer exists"))?;

    if !verify_password(current_password, &user)? {
        return Err(HtmlError::InvalidRequest.field("current_password", "Invalid password."));
    }

    let password = hash_password(new_password)?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Deletes the caller's account. Favorites, carts and subscriptions go with
/// it through the foreign keys; the recipe images are removed after commit.
pub async fn delete_user(
    session: &SessionData,
    media_root: &Path,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    let images: Vec<(String,)> =
        sqlx::query_as("DELETE FROM recipes WHERE author_id = $1 RETURNING image")
            .bind(session.user_id)
            .fetch_all(&mut *tr)
            .await
            .map_err(QueryError::from)?;

    let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(session.user_id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?
        .rows_affected();
    if deleted == 0 {
        return Err(HtmlError::InvalidSession.new("Invalid session; User no longer exists"));
    }

    tr.commit().await.map_err(QueryError::from)?;

    for (image,) in &images {
        remove_image(image, media_root).await;
    }
    log::info!(
        "Deleted user {} with {} recipe(s)",
        session.user_id,
        images.len()
    );

    Ok(())
}
