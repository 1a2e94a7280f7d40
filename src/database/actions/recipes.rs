use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    authentication::permissions::ActionType,
    error::Error,
    form::{IngredientAmount, RecipeFilter, RecipeForm, RecipePatch},
    images::{ImagePayload, ImageStore},
    jwt::{SessionData, Viewer},
    pagination::{PageContext, PageRequest},
    pool::DbPool,
    schema::{
        Id, Recipe, RecipeDetail, RecipeIngredient, RecipeIngredientRow, RecipeRow, RecipeTagRow,
        ShortRecipe, Tag,
    },
};

use super::annotations::annotated_recipes;

/// Recipe operations. Dispatch is decided by this enum instead of by payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeAction {
    List,
    Retrieve,
    Create,
    PartialUpdate,
    Destroy,
}

impl RecipeAction {
    pub fn requires_session(self) -> bool {
        match self {
            RecipeAction::List | RecipeAction::Retrieve => false,
            RecipeAction::Create | RecipeAction::PartialUpdate | RecipeAction::Destroy => true,
        }
    }

    pub fn permission(self) -> Option<ActionType> {
        match self {
            RecipeAction::List | RecipeAction::Retrieve => None,
            RecipeAction::Create => Some(ActionType::CreateRecipes),
            RecipeAction::PartialUpdate | RecipeAction::Destroy => {
                Some(ActionType::ManageOwnRecipes)
            }
        }
    }

    /// Resolves the session this action runs under, if it needs one.
    pub fn authorize(self, viewer: &Viewer) -> Result<Option<&SessionData>, Error> {
        if !self.requires_session() {
            return Ok(viewer.session());
        }

        let session = viewer.session().ok_or(Error::Unauthorized)?;
        if let Some(permission) = self.permission() {
            session.authenticate(permission)?;
        }
        Ok(Some(session))
    }
}

fn missing_object(field: &str, id: Id) -> Error {
    Error::validation(
        field,
        &format!("Invalid pk \"{id}\" - object does not exist."),
    )
}

async fn ensure_tags_exist(tags: &[Id], pool: &DbPool) -> Result<(), Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM tags WHERE id IN (");
    {
        let mut separated = builder.separated(", ");
        for id in tags {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
    }

    let found: Vec<(Id,)> = builder.build_query_as().fetch_all(pool).await?;
    let found: HashSet<Id> = found.into_iter().map(|row| row.0).collect();

    match tags.iter().find(|id| !found.contains(id)) {
        Some(id) => Err(missing_object("tags", *id)),
        None => Ok(()),
    }
}

async fn ensure_ingredients_exist(
    ingredients: &[IngredientAmount],
    pool: &DbPool,
) -> Result<(), Error> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id FROM ingredients WHERE id IN (");
    {
        let mut separated = builder.separated(", ");
        for ingredient in ingredients {
            separated.push_bind(ingredient.id);
        }
        separated.push_unseparated(")");
    }

    let found: Vec<(Id,)> = builder.build_query_as().fetch_all(pool).await?;
    let found: HashSet<Id> = found.into_iter().map(|row| row.0).collect();

    match ingredients.iter().find(|i| !found.contains(&i.id)) {
        Some(ingredient) => Err(missing_object("ingredients", ingredient.id)),
        None => Ok(()),
    }
}

async fn insert_recipe_ingredients(
    recipe_id: Id,
    ingredients: &[IngredientAmount],
    conn: &mut SqliteConnection,
) -> Result<(), Error> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");

    builder.push_values(ingredients, |mut b, ingredient| {
        b.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });

    builder.build().execute(&mut *conn).await?;
    Ok(())
}

async fn insert_recipe_tags(
    recipe_id: Id,
    tags: &[Id],
    conn: &mut SqliteConnection,
) -> Result<(), Error> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    builder.push_values(tags, |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    builder.build().execute(&mut *conn).await?;
    Ok(())
}

/// Creates a recipe with its ingredient amounts and tags in one transaction.
pub async fn create_recipe(
    session: &SessionData,
    form: RecipeForm,
    images: &dyn ImageStore,
    pool: &DbPool,
) -> Result<RecipeDetail, Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    form.validate()?;
    let image = ImagePayload::from_data_url(&form.image)?;
    ensure_ingredients_exist(&form.ingredients, pool).await?;
    ensure_tags_exist(&form.tags, pool).await?;

    let image = images.store(image).await?;

    let mut tr = pool.begin().await?;

    let recipe: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time, created)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(&form.name)
    .bind(&form.text)
    .bind(&image)
    .bind(form.cooking_time)
    .bind(Utc::now())
    .fetch_one(&mut *tr)
    .await?;

    let recipe_id = recipe.0;
    insert_recipe_ingredients(recipe_id, &form.ingredients, &mut tr).await?;
    insert_recipe_tags(recipe_id, &form.tags, &mut tr).await?;

    tr.commit().await?;
    log::info!("Recipe {recipe_id} created by user {}", session.user_id);

    get_recipe(&Viewer::User(session.clone()), recipe_id, pool).await
}

/// Applies a partial update. A supplied ingredient or tag list replaces the stored one
/// (clear-then-reinsert); omitted fields keep their stored values.
pub async fn update_recipe(
    session: &SessionData,
    id: Id,
    patch: RecipePatch,
    images: &dyn ImageStore,
    pool: &DbPool,
) -> Result<RecipeDetail, Error> {
    get_recipe_mut(id, session, pool).await?;
    patch.validate()?;

    let image = patch
        .image
        .as_deref()
        .map(ImagePayload::from_data_url)
        .transpose()?;
    if let Some(ingredients) = &patch.ingredients {
        ensure_ingredients_exist(ingredients, pool).await?;
    }
    if let Some(tags) = &patch.tags {
        ensure_tags_exist(tags, pool).await?;
    }

    let image = match image {
        Some(image) => Some(images.store(image).await?),
        None => None,
    };

    let mut tr = pool.begin().await?;

    let updated = sqlx::query(
        "
        UPDATE recipes SET
        name = COALESCE($1, name),
        text = COALESCE($2, text),
        image = COALESCE($3, image),
        cooking_time = COALESCE($4, cooking_time)
        WHERE id = $5
    ",
    )
    .bind(&patch.name)
    .bind(&patch.text)
    .bind(&image)
    .bind(patch.cooking_time)
    .bind(id)
    .execute(&mut *tr)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(Error::NotFound(String::from("Recipe not found.")));
    }

    if let Some(ingredients) = &patch.ingredients {
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tr)
            .await?;
        insert_recipe_ingredients(id, ingredients, &mut tr).await?;
    }

    if let Some(tags) = &patch.tags {
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tr)
            .await?;
        insert_recipe_tags(id, tags, &mut tr).await?;
    }

    tr.commit().await?;
    log::info!("Recipe {id} updated by user {}", session.user_id);

    get_recipe(&Viewer::User(session.clone()), id, pool).await
}

/// Deletes a recipe; its tag links, ingredient rows, favorites and cart entries cascade.
pub async fn delete_recipe(session: &SessionData, id: Id, pool: &DbPool) -> Result<(), Error> {
    get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    log::info!("Recipe {id} deleted by user {}", session.user_id);
    Ok(())
}

pub async fn find_recipe(id: Id, pool: &DbPool) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_short_recipe(id: Id, pool: &DbPool) -> Result<ShortRecipe, Error> {
    let row: Option<ShortRecipe> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    row.ok_or_else(|| Error::NotFound(String::from("Recipe not found.")))
}

/// Fetches a recipe the session may modify: its own, or any for admins.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &DbPool,
) -> Result<Recipe, Error> {
    let recipe = find_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(Error::PermissionDenied(String::from(
                        "Only the author can change this recipe.",
                    )))
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(Error::NotFound(String::from("Recipe not found."))),
    }
}

pub async fn get_recipe(viewer: &Viewer, id: Id, pool: &DbPool) -> Result<RecipeDetail, Error> {
    let mut builder = annotated_recipes(viewer);
    builder.push(" AND r.id = ").push_bind(id);

    let rows: Vec<RecipeRow> = builder.build_query_as().fetch_all(pool).await?;

    compose_recipes(rows, pool)
        .await?
        .pop()
        .ok_or_else(|| Error::NotFound(String::from("Recipe not found.")))
}

/// Appends the list filters to a query whose recipe table is aliased `r`.
fn push_recipe_filter(
    builder: &mut QueryBuilder<'_, Sqlite>,
    viewer: &Viewer,
    filter: &RecipeFilter,
) {
    if let Some(author) = filter.author {
        builder.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        builder.push(
            " AND r.id IN (SELECT rt.recipe_id FROM recipe_tags rt
                INNER JOIN tags t ON t.id = rt.tag_id WHERE t.slug IN (",
        );
        let mut separated = builder.separated(", ");
        for slug in &filter.tags {
            separated.push_bind(slug.to_owned());
        }
        separated.push_unseparated("))");
    }

    if let Some(user_id) = viewer.user_id() {
        if filter.is_favorited {
            builder
                .push(" AND EXISTS (SELECT 1 FROM favorite_recipes f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            builder
                .push(" AND EXISTS (SELECT 1 FROM shop_list s WHERE s.recipe_id = r.id AND s.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
    }
}

async fn count_recipes(
    viewer: &Viewer,
    filter: &RecipeFilter,
    pool: &DbPool,
) -> Result<i64, Error> {
    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE 1 = 1");
    push_recipe_filter(&mut builder, viewer, filter);

    let count: i64 = builder.build_query_scalar().fetch_one(pool).await?;
    Ok(count)
}

/// Lists recipes oldest first. Tags match by slug with OR semantics; the
/// favorite/cart filters only apply to an authenticated viewer.
pub async fn list_recipes(
    viewer: &Viewer,
    filter: &RecipeFilter,
    page: PageRequest,
    pool: &DbPool,
) -> Result<PageContext<RecipeDetail>, Error> {
    let mut builder = annotated_recipes(viewer);
    push_recipe_filter(&mut builder, viewer, filter);

    builder
        .push(" ORDER BY r.created, r.id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    log::trace!("> Listing recipes: {}", builder.sql());
    let rows: Vec<RecipeRow> = builder.build_query_as().fetch_all(pool).await?;

    // Past the last page there is no row to carry the window count.
    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.offset > 0 => count_recipes(viewer, filter, pool).await?,
        None => 0,
    };
    let recipes = compose_recipes(rows, pool).await?;

    Ok(PageContext::from_rows(recipes, total_count, page))
}

async fn list_tags_for_recipes(
    ids: &[Id],
    pool: &DbPool,
) -> Result<HashMap<Id, Vec<Tag>>, Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name, t.color AS color, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id IN (",
    );
    {
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY t.name");
    }

    let rows: Vec<RecipeTagRow> = builder.build_query_as().fetch_all(pool).await?;

    let mut hashmap: HashMap<Id, Vec<Tag>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.recipe_id).or_default().push(row.into());
    });

    Ok(hashmap)
}

async fn list_ingredients_for_recipes(
    ids: &[Id],
    pool: &DbPool,
) -> Result<HashMap<Id, Vec<RecipeIngredient>>, Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT ri.recipe_id AS recipe_id, i.id AS id, i.name AS name,
            i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id IN (",
    );
    {
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY i.name");
    }

    let rows: Vec<RecipeIngredientRow> = builder.build_query_as().fetch_all(pool).await?;

    let mut hashmap: HashMap<Id, Vec<RecipeIngredient>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.recipe_id).or_default().push(row.into());
    });

    Ok(hashmap)
}

/// Attaches tags and ingredients to a page of rows with one query each.
async fn compose_recipes(rows: Vec<RecipeRow>, pool: &DbPool) -> Result<Vec<RecipeDetail>, Error> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut tags = list_tags_for_recipes(&ids, pool).await?;
    let mut ingredients = list_ingredients_for_recipes(&ids, pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| RecipeDetail {
            id: row.id,
            tags: tags.remove(&row.id).unwrap_or_default(),
            author: row.author(),
            ingredients: ingredients.remove(&row.id).unwrap_or_default(),
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
            name: row.name,
            image: row.image,
            text: row.text,
            cooking_time: row.cooking_time,
        })
        .collect())
}
