use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite};

use crate::{
    authentication::permissions::ActionType,
    error::{Error, NON_FIELD_ERRORS},
    jwt::{SessionData, Viewer},
    pagination::{PageContext, PageRequest},
    pool::DbPool,
    schema::{Id, ShortRecipe, SubscriptionCard, UserProfile},
};

use super::{
    annotations::push_subscribed_flag, recipes::get_short_recipe, users::get_user_profile,
};

/// Membership relations between a user and another row. Existence of the row is
/// the whole relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Follow,
    Favorite,
    ShopList,
}

impl RelationKind {
    fn table(self) -> &'static str {
        match self {
            RelationKind::Follow => "follows",
            RelationKind::Favorite => "favorite_recipes",
            RelationKind::ShopList => "shop_list",
        }
    }

    fn object_column(self) -> &'static str {
        match self {
            RelationKind::Follow => "author_id",
            RelationKind::Favorite | RelationKind::ShopList => "recipe_id",
        }
    }

    fn exists_message(self) -> &'static str {
        match self {
            RelationKind::Follow => "You are already subscribed to this author.",
            RelationKind::Favorite => "Recipe is already in favorites.",
            RelationKind::ShopList => "Recipe is already in the shopping cart.",
        }
    }

    fn missing_message(self) -> &'static str {
        match self {
            RelationKind::Follow => "Subscription not found.",
            RelationKind::Favorite => "Recipe is not in favorites.",
            RelationKind::ShopList => "Recipe is not in the shopping cart.",
        }
    }
}

/// Inserts `(subject, object)`. A duplicate, including one created by a concurrent
/// request, is rejected by the unique constraint and reported as `Conflict`.
pub async fn add_relation(
    kind: RelationKind,
    subject: Id,
    object: Id,
    pool: &DbPool,
) -> Result<Id, Error> {
    if kind == RelationKind::Follow && subject == object {
        return Err(Error::validation(
            NON_FIELD_ERRORS,
            "You can not subscribe to yourself.",
        ));
    }

    let row: Option<(Id,)> = sqlx::query_as(&format!(
        "INSERT INTO {} (user_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING id",
        kind.table(),
        kind.object_column()
    ))
    .bind(subject)
    .bind(object)
    .fetch_optional(pool)
    .await?;

    match row {
        Some((id,)) => {
            log::info!("Added {kind:?} {subject} -> {object}");
            Ok(id)
        }
        None => Err(Error::Conflict(kind.exists_message().to_string())),
    }
}

/// Deletes exactly the `(subject, object)` row.
pub async fn remove_relation(
    kind: RelationKind,
    subject: Id,
    object: Id,
    pool: &DbPool,
) -> Result<(), Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
        kind.table(),
        kind.object_column()
    ))
    .bind(subject)
    .bind(object)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(kind.missing_message().to_string()));
    }

    log::info!("Removed {kind:?} {subject} -> {object}");
    Ok(())
}

pub async fn relation_exists(
    kind: RelationKind,
    subject: Id,
    object: Id,
    pool: &DbPool,
) -> Result<bool, Error> {
    let row: Option<(Id,)> = sqlx::query_as(&format!(
        "SELECT id FROM {} WHERE user_id = $1 AND {} = $2",
        kind.table(),
        kind.object_column()
    ))
    .bind(subject)
    .bind(object)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

async fn add_recipe_relation(
    kind: RelationKind,
    session: &SessionData,
    recipe_id: Id,
    pool: &DbPool,
) -> Result<ShortRecipe, Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let recipe = get_short_recipe(recipe_id, pool).await?;

    add_relation(kind, session.user_id, recipe.id, pool).await?;
    Ok(recipe)
}

pub async fn add_to_favorites(
    session: &SessionData,
    recipe_id: Id,
    pool: &DbPool,
) -> Result<ShortRecipe, Error> {
    add_recipe_relation(RelationKind::Favorite, session, recipe_id, pool).await
}

pub async fn remove_from_favorites(
    session: &SessionData,
    recipe_id: Id,
    pool: &DbPool,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    remove_relation(RelationKind::Favorite, session.user_id, recipe_id, pool).await
}

pub async fn add_to_shopping_cart(
    session: &SessionData,
    recipe_id: Id,
    pool: &DbPool,
) -> Result<ShortRecipe, Error> {
    add_recipe_relation(RelationKind::ShopList, session, recipe_id, pool).await
}

pub async fn remove_from_shopping_cart(
    session: &SessionData,
    recipe_id: Id,
    pool: &DbPool,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    remove_relation(RelationKind::ShopList, session.user_id, recipe_id, pool).await
}

/// Follows `author_id` and returns the author's card as the caller now sees it.
pub async fn subscribe(
    session: &SessionData,
    author_id: Id,
    recipes_limit: Option<i64>,
    pool: &DbPool,
) -> Result<SubscriptionCard, Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let viewer = Viewer::User(session.clone());
    get_user_profile(&viewer, author_id, pool).await?;

    add_relation(RelationKind::Follow, session.user_id, author_id, pool).await?;

    let author = get_user_profile(&viewer, author_id, pool).await?;
    let mut cards = subscription_cards(vec![author], recipes_limit, pool).await?;
    cards
        .pop()
        .ok_or_else(|| Error::NotFound(String::from("User not found.")))
}

pub async fn unsubscribe(session: &SessionData, author_id: Id, pool: &DbPool) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    remove_relation(RelationKind::Follow, session.user_id, author_id, pool).await
}

#[derive(sqlx::FromRow)]
struct FollowedAuthorRow {
    #[sqlx(flatten)]
    profile: UserProfile,
    count: i64,
}

/// Authors the session follows, each with up to `recipes_limit` of their recipes.
pub async fn list_subscriptions(
    session: &SessionData,
    recipes_limit: Option<i64>,
    page: PageRequest,
    pool: &DbPool,
) -> Result<PageContext<SubscriptionCard>, Error> {
    let viewer = Viewer::User(session.clone());

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT u.email, u.id, u.username, u.first_name, u.last_name, ",
    );
    push_subscribed_flag(&mut builder, &viewer, "u.id");
    builder
        .push(
            " AS is_subscribed, COUNT(*) OVER () AS count
            FROM follows f
            INNER JOIN users u ON u.id = f.author_id
            WHERE f.user_id = ",
        )
        .push_bind(session.user_id)
        .push(" ORDER BY u.username LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    let rows: Vec<FollowedAuthorRow> = builder.build_query_as().fetch_all(pool).await?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.offset > 0 => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE user_id = $1")
                .bind(session.user_id)
                .fetch_one(pool)
                .await?
        }
        None => 0,
    };
    let authors = rows.into_iter().map(|row| row.profile).collect();
    let cards = subscription_cards(authors, recipes_limit, pool).await?;

    Ok(PageContext::from_rows(cards, total_count, page))
}

#[derive(sqlx::FromRow)]
struct AuthoredRecipeRow {
    author_id: Id,
    #[sqlx(flatten)]
    recipe: ShortRecipe,
}

/// Attaches recipe previews and counts to a list of authors with a single query.
async fn subscription_cards(
    authors: Vec<UserProfile>,
    recipes_limit: Option<i64>,
    pool: &DbPool,
) -> Result<Vec<SubscriptionCard>, Error> {
    if authors.is_empty() {
        return Ok(vec![]);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT author_id, id, name, image, cooking_time FROM recipes WHERE author_id IN (",
    );
    {
        let mut separated = builder.separated(", ");
        for author in &authors {
            separated.push_bind(author.id);
        }
        separated.push_unseparated(") ORDER BY created, id");
    }

    let rows: Vec<AuthoredRecipeRow> = builder.build_query_as().fetch_all(pool).await?;

    let mut hashmap: HashMap<Id, Vec<ShortRecipe>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.author_id).or_default().push(row.recipe);
    });

    let limit = recipes_limit.map(|limit| limit.max(0) as usize);

    Ok(authors
        .into_iter()
        .map(|author| {
            let mut recipes = hashmap.remove(&author.id).unwrap_or_default();
            let recipes_count = recipes.len() as i64;
            if let Some(limit) = limit {
                recipes.truncate(limit);
            }

            SubscriptionCard {
                author,
                recipes,
                recipes_count,
            }
        })
        .collect())
}
