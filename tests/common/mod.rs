#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use foodgram_sdk::{
    actions::{ingredients::search_name, recipes::create_recipe},
    error::Error,
    form::{IngredientAmount, RecipeForm},
    images::{ImagePayload, ImageStore},
    jwt::{generate_jwt_session, SessionData},
    pool::{connect_in_memory, DbPool},
    schema::{Id, Ingredient, RecipeDetail, Tag, User, UserRole},
    AppState, Config,
};

pub const IMAGE: &str = "data:image/png;base64,aGVsbG8=";
pub const SECRET: &str = "test-session-secret";

/// Keeps uploads in memory and counts them.
#[derive(Default)]
pub struct MemoryImageStore {
    stored: AtomicUsize,
}

impl MemoryImageStore {
    pub fn stored(&self) -> usize {
        self.stored.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn store(&self, image: ImagePayload) -> Result<String, Error> {
        let n = self.stored.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("/media/recipes/images/test-{n}.{}", image.extension))
    }
}

pub async fn setup() -> DbPool {
    connect_in_memory().await.unwrap()
}

pub fn config() -> Config {
    Config {
        database_url: String::from("sqlite::memory:"),
        max_connections: 1,
        session_secret: String::from(SECRET),
        session_ttl_hours: 1,
        media_root: PathBuf::from("media"),
        media_url: String::from("/media"),
        page_size: 6,
    }
}

pub async fn state() -> Arc<AppState> {
    AppState::new(setup().await, config(), Arc::new(MemoryImageStore::default()))
}

/// Inserts a user directly; the password hash is never checked by these tests.
pub async fn seed_user(pool: &DbPool, username: &str, role: UserRole) -> User {
    sqlx::query_as(
        "INSERT INTO users (email, username, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(format!("{username}@example.com"))
    .bind(username)
    .bind("First")
    .bind("Last")
    .bind("not-a-hash")
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn seed_session(pool: &DbPool, username: &str) -> SessionData {
    SessionData::from(&seed_user(pool, username, UserRole::User).await)
}

pub async fn seed_tag(pool: &DbPool, name: &str, slug: &str, color: &str) -> Tag {
    sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *")
        .bind(name)
        .bind(color)
        .bind(slug)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn seed_ingredient(pool: &DbPool, name: &str, unit: &str) -> Ingredient {
    sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit, search_name) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(name)
    .bind(unit)
    .bind(search_name(name))
    .fetch_one(pool)
    .await
    .unwrap()
}

pub fn recipe_form(name: &str, tags: &[Id], ingredients: &[(Id, i32)]) -> RecipeForm {
    RecipeForm {
        ingredients: ingredients
            .iter()
            .map(|(id, amount)| IngredientAmount {
                id: *id,
                amount: *amount,
            })
            .collect(),
        tags: tags.to_vec(),
        image: String::from(IMAGE),
        name: String::from(name),
        text: String::from("Mix and bake."),
        cooking_time: 30,
    }
}

pub async fn seed_recipe(
    pool: &DbPool,
    session: &SessionData,
    name: &str,
    tags: &[Id],
    ingredients: &[(Id, i32)],
) -> RecipeDetail {
    let images = MemoryImageStore::default();
    create_recipe(session, recipe_form(name, tags, ingredients), &images, pool)
        .await
        .unwrap()
}

pub async fn count(pool: &DbPool, table: &str) -> i64 {
    let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap();
    row.0
}

pub fn token(user: &User) -> String {
    format!("Token {}", generate_jwt_session(user, SECRET, 1).unwrap())
}
