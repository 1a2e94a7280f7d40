use std::{convert::Infallible, sync::Arc};

use serde::Deserialize;
use warp::{
    body::BodyDeserializeError,
    http::{header::CONTENT_DISPOSITION, StatusCode},
    reject::{MethodNotAllowed, Rejection},
    reply::{self, Reply},
};

use crate::{
    actions::{
        ingredients::{create_ingredient, get_ingredient, search_ingredients},
        recipes::{
            create_recipe, delete_recipe, get_recipe, list_recipes, update_recipe, RecipeAction,
        },
        relations::{
            add_to_favorites, add_to_shopping_cart, list_subscriptions, remove_from_favorites,
            remove_from_shopping_cart, subscribe, unsubscribe,
        },
        shopping::download_shop_list,
        tags::{create_tag, get_tag, list_tags},
        users::{create_user, get_user_profile, list_users},
    },
    constants::SHOP_LIST_FILENAME,
    error::{Error, ErrorBody, NON_FIELD_ERRORS},
    form::{IngredientForm, RecipeForm, RecipePatch, RecipeQuery, TagForm, UserForm},
    jwt::{SessionData, Viewer},
    pagination::PageRequest,
    schema::Id,
    state::AppState,
};

type Response = Result<reply::Response, Rejection>;

#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SubscriptionQuery {
    pub recipes_limit: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct IngredientQuery {
    pub name: Option<String>,
}

fn created<T: serde::Serialize>(value: &T) -> reply::Response {
    reply::with_status(reply::json(value), StatusCode::CREATED).into_response()
}

fn no_content() -> reply::Response {
    StatusCode::NO_CONTENT.into_response()
}

fn session_of(action: RecipeAction, viewer: &Viewer) -> Result<&SessionData, Rejection> {
    action
        .authorize(viewer)?
        .ok_or_else(|| warp::reject::custom(Error::Unauthorized))
}

pub async fn recipe_list(
    pairs: Vec<(String, String)>,
    viewer: Viewer,
    state: Arc<AppState>,
) -> Response {
    RecipeAction::List.authorize(&viewer)?;
    let query = RecipeQuery::from_pairs(pairs, state.config.page_size)?;

    let page = list_recipes(&viewer, &query.filter, query.page, &state.pool).await?;
    Ok(reply::json(&page).into_response())
}

pub async fn recipe_retrieve(id: Id, viewer: Viewer, state: Arc<AppState>) -> Response {
    RecipeAction::Retrieve.authorize(&viewer)?;

    let recipe = get_recipe(&viewer, id, &state.pool).await?;
    Ok(reply::json(&recipe).into_response())
}

pub async fn recipe_create(viewer: Viewer, form: RecipeForm, state: Arc<AppState>) -> Response {
    let session = session_of(RecipeAction::Create, &viewer)?;

    let recipe = create_recipe(session, form, state.images.as_ref(), &state.pool).await?;
    Ok(created(&recipe))
}

pub async fn recipe_update(
    id: Id,
    viewer: Viewer,
    patch: RecipePatch,
    state: Arc<AppState>,
) -> Response {
    let session = session_of(RecipeAction::PartialUpdate, &viewer)?;

    let recipe = update_recipe(session, id, patch, state.images.as_ref(), &state.pool).await?;
    Ok(reply::json(&recipe).into_response())
}

pub async fn recipe_destroy(id: Id, viewer: Viewer, state: Arc<AppState>) -> Response {
    let session = session_of(RecipeAction::Destroy, &viewer)?;

    delete_recipe(session, id, &state.pool).await?;
    Ok(no_content())
}

pub async fn favorite_add(id: Id, session: SessionData, state: Arc<AppState>) -> Response {
    let recipe = add_to_favorites(&session, id, &state.pool).await?;
    Ok(created(&recipe))
}

pub async fn favorite_remove(id: Id, session: SessionData, state: Arc<AppState>) -> Response {
    remove_from_favorites(&session, id, &state.pool).await?;
    Ok(no_content())
}

pub async fn shopping_cart_add(id: Id, session: SessionData, state: Arc<AppState>) -> Response {
    let recipe = add_to_shopping_cart(&session, id, &state.pool).await?;
    Ok(created(&recipe))
}

pub async fn shopping_cart_remove(id: Id, session: SessionData, state: Arc<AppState>) -> Response {
    remove_from_shopping_cart(&session, id, &state.pool).await?;
    Ok(no_content())
}

pub async fn shopping_cart_download(session: SessionData, state: Arc<AppState>) -> Response {
    let text = download_shop_list(&session, &state.pool).await?;

    Ok(reply::with_header(
        text,
        CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOP_LIST_FILENAME}\""),
    )
    .into_response())
}

pub async fn user_list(query: PageQuery, viewer: Viewer, state: Arc<AppState>) -> Response {
    let page = PageRequest::new(query.limit, query.offset, state.config.page_size);

    let users = list_users(&viewer, page, &state.pool).await?;
    Ok(reply::json(&users).into_response())
}

pub async fn user_create(form: UserForm, state: Arc<AppState>) -> Response {
    let user = create_user(form, &state.pool).await?;

    let profile = get_user_profile(&Viewer::Anonymous, user.id, &state.pool).await?;
    Ok(created(&profile))
}

pub async fn user_retrieve(id: Id, viewer: Viewer, state: Arc<AppState>) -> Response {
    let profile = get_user_profile(&viewer, id, &state.pool).await?;
    Ok(reply::json(&profile).into_response())
}

pub async fn user_me(session: SessionData, state: Arc<AppState>) -> Response {
    let user_id = session.user_id;
    let viewer = Viewer::from(session);

    let profile = get_user_profile(&viewer, user_id, &state.pool).await?;
    Ok(reply::json(&profile).into_response())
}

pub async fn subscription_list(
    query: SubscriptionQuery,
    session: SessionData,
    state: Arc<AppState>,
) -> Response {
    let page = PageRequest::new(query.limit, query.offset, state.config.page_size);

    let cards = list_subscriptions(&session, query.recipes_limit, page, &state.pool).await?;
    Ok(reply::json(&cards).into_response())
}

pub async fn subscribe_add(
    id: Id,
    query: SubscriptionQuery,
    session: SessionData,
    state: Arc<AppState>,
) -> Response {
    let card = subscribe(&session, id, query.recipes_limit, &state.pool).await?;
    Ok(created(&card))
}

pub async fn subscribe_remove(id: Id, session: SessionData, state: Arc<AppState>) -> Response {
    unsubscribe(&session, id, &state.pool).await?;
    Ok(no_content())
}

pub async fn tag_list(state: Arc<AppState>) -> Response {
    let tags = list_tags(&state.pool).await?;
    Ok(reply::json(&tags).into_response())
}

pub async fn tag_retrieve(id: Id, state: Arc<AppState>) -> Response {
    let tag = get_tag(id, &state.pool)
        .await?
        .ok_or_else(|| Error::NotFound(String::from("Tag not found.")))?;
    Ok(reply::json(&tag).into_response())
}

pub async fn tag_create(session: SessionData, form: TagForm, state: Arc<AppState>) -> Response {
    let tag = create_tag(&session, form, &state.pool).await?;
    Ok(created(&tag))
}

pub async fn ingredient_list(query: IngredientQuery, state: Arc<AppState>) -> Response {
    let ingredients = search_ingredients(query.name.as_deref(), &state.pool).await?;
    Ok(reply::json(&ingredients).into_response())
}

pub async fn ingredient_retrieve(id: Id, state: Arc<AppState>) -> Response {
    let ingredient = get_ingredient(id, &state.pool)
        .await?
        .ok_or_else(|| Error::NotFound(String::from("Ingredient not found.")))?;
    Ok(reply::json(&ingredient).into_response())
}

pub async fn ingredient_create(
    session: SessionData,
    form: IngredientForm,
    state: Arc<AppState>,
) -> Response {
    let ingredient = create_ingredient(&session, form, &state.pool).await?;
    Ok(created(&ingredient))
}

/// Turns every rejection into a JSON `ErrorBody` with a matching status.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(error) = err.find::<Error>() {
        if error.status_code().is_server_error() {
            log::error!("Request failed: {error}");
        }
        (error.status_code(), error.body())
    } else if err.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            ErrorBody {
                field: None,
                detail: String::from("Not found."),
            },
        )
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                field: Some(String::from(NON_FIELD_ERRORS)),
                detail: e.to_string(),
            },
        )
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                field: None,
                detail: String::from("Invalid query string."),
            },
        )
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorBody {
                field: None,
                detail: String::from("Method not allowed."),
            },
        )
    } else {
        log::warn!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody {
                field: None,
                detail: String::from("Internal server error"),
            },
        )
    };

    Ok(reply::with_status(reply::json(&body), status))
}
