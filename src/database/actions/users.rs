use sqlx::{QueryBuilder, Sqlite};

use crate::{
    authentication::cryptography::{hash_password, verify_password},
    error::{Error, NON_FIELD_ERRORS},
    form::UserForm,
    jwt::Viewer,
    pagination::{PageContext, PageRequest},
    pool::DbPool,
    schema::{Id, User, UserProfile, UserRole},
};

use super::annotations::push_subscribed_flag;

pub async fn get_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &DbPool, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Registers a user, storing an argon2 hash of their password.
pub async fn create_user(form: UserForm, pool: &DbPool) -> Result<User, Error> {
    form.validate()?;

    if get_user_by_email(pool, &form.email).await?.is_some() {
        return Err(Error::Conflict(String::from(
            "A user with that email already exists.",
        )));
    }

    let password = hash_password(&form.password)?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(|e| match Error::from(e) {
        Error::Conflict(_) => {
            Error::Conflict(String::from("A user with that username already exists."))
        }
        other => other,
    })?;

    log::info!("User {} registered", user.id);
    Ok(user)
}

pub async fn set_user_role(user_id: Id, role: UserRole, pool: &DbPool) -> Result<(), Error> {
    let result = sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
        .bind(role)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(String::from("User not found.")));
    }
    Ok(())
}

/// Checks credentials and returns the matching user.
pub async fn authenticate_user(email: &str, password: &str, pool: &DbPool) -> Result<User, Error> {
    let invalid = || Error::validation(NON_FIELD_ERRORS, "Invalid credentials.");

    let user = get_user_by_email(pool, email).await?.ok_or_else(invalid)?;
    if !verify_password(password, &user.password) {
        return Err(invalid());
    }

    Ok(user)
}

fn profile_query(viewer: &Viewer) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new("SELECT u.email, u.id, u.username, u.first_name, u.last_name, ");
    push_subscribed_flag(&mut builder, viewer, "u.id");
    builder.push(" AS is_subscribed FROM users u");
    builder
}

pub async fn get_user_profile(
    viewer: &Viewer,
    user_id: Id,
    pool: &DbPool,
) -> Result<UserProfile, Error> {
    let mut builder = profile_query(viewer);
    builder.push(" WHERE u.id = ").push_bind(user_id);

    let row: Option<UserProfile> = builder.build_query_as().fetch_optional(pool).await?;

    row.ok_or_else(|| Error::NotFound(String::from("User not found.")))
}

pub async fn list_users(
    viewer: &Viewer,
    page: PageRequest,
    pool: &DbPool,
) -> Result<PageContext<UserProfile>, Error> {
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    let mut builder = profile_query(viewer);
    builder
        .push(" ORDER BY u.username LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    let rows: Vec<UserProfile> = builder.build_query_as().fetch_all(pool).await?;

    Ok(PageContext::from_rows(rows, total.0, page))
}
