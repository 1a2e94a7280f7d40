use std::{convert::Infallible, sync::Arc};

use serde::de::DeserializeOwned;
use warp::{reject::Rejection, reply::Reply, Filter};

use crate::{
    middleware::{with_session, with_viewer},
    schema::Id,
    state::AppState,
};

use super::handlers;

const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn recipes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let secret = state.session_secret();

    let list = warp::get()
        .and(warp::path!("api" / "recipes"))
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_viewer(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::recipe_list);

    let create = warp::post()
        .and(warp::path!("api" / "recipes"))
        .and(with_viewer(secret.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::recipe_create);

    let download = warp::get()
        .and(warp::path!("api" / "recipes" / "download_shopping_cart"))
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::shopping_cart_download);

    let retrieve = warp::get()
        .and(warp::path!("api" / "recipes" / Id))
        .and(with_viewer(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::recipe_retrieve);

    let update = warp::patch()
        .and(warp::path!("api" / "recipes" / Id))
        .and(with_viewer(secret.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::recipe_update);

    let destroy = warp::delete()
        .and(warp::path!("api" / "recipes" / Id))
        .and(with_viewer(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::recipe_destroy);

    let favorite_add = warp::post()
        .and(warp::path!("api" / "recipes" / Id / "favorite"))
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::favorite_add);

    let favorite_remove = warp::delete()
        .and(warp::path!("api" / "recipes" / Id / "favorite"))
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::favorite_remove);

    let cart_add = warp::post()
        .and(warp::path!("api" / "recipes" / Id / "shopping_cart"))
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::shopping_cart_add);

    let cart_remove = warp::delete()
        .and(warp::path!("api" / "recipes" / Id / "shopping_cart"))
        .and(with_session(secret))
        .and(with_state(state))
        .and_then(handlers::shopping_cart_remove);

    list.or(create)
        .or(download)
        .or(retrieve)
        .or(update)
        .or(destroy)
        .or(favorite_add)
        .or(favorite_remove)
        .or(cart_add)
        .or(cart_remove)
}

fn users(state: Arc<AppState>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let secret = state.session_secret();

    let list = warp::get()
        .and(warp::path!("api" / "users"))
        .and(warp::query::<handlers::PageQuery>())
        .and(with_viewer(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::user_list);

    let create = warp::post()
        .and(warp::path!("api" / "users"))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::user_create);

    let me = warp::get()
        .and(warp::path!("api" / "users" / "me"))
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::user_me);

    let subscriptions = warp::get()
        .and(warp::path!("api" / "users" / "subscriptions"))
        .and(warp::query::<handlers::SubscriptionQuery>())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::subscription_list);

    let retrieve = warp::get()
        .and(warp::path!("api" / "users" / Id))
        .and(with_viewer(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::user_retrieve);

    let subscribe = warp::post()
        .and(warp::path!("api" / "users" / Id / "subscribe"))
        .and(warp::query::<handlers::SubscriptionQuery>())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::subscribe_add);

    let unsubscribe = warp::delete()
        .and(warp::path!("api" / "users" / Id / "subscribe"))
        .and(with_session(secret))
        .and(with_state(state))
        .and_then(handlers::subscribe_remove);

    list.or(create)
        .or(me)
        .or(subscriptions)
        .or(retrieve)
        .or(subscribe)
        .or(unsubscribe)
}

fn catalog(state: Arc<AppState>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let secret = state.session_secret();

    let tag_list = warp::get()
        .and(warp::path!("api" / "tags"))
        .and(with_state(state.clone()))
        .and_then(handlers::tag_list);

    let tag_retrieve = warp::get()
        .and(warp::path!("api" / "tags" / Id))
        .and(with_state(state.clone()))
        .and_then(handlers::tag_retrieve);

    let tag_create = warp::post()
        .and(warp::path!("api" / "tags"))
        .and(with_session(secret.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::tag_create);

    let ingredient_list = warp::get()
        .and(warp::path!("api" / "ingredients"))
        .and(warp::query::<handlers::IngredientQuery>())
        .and(with_state(state.clone()))
        .and_then(handlers::ingredient_list);

    let ingredient_retrieve = warp::get()
        .and(warp::path!("api" / "ingredients" / Id))
        .and(with_state(state.clone()))
        .and_then(handlers::ingredient_retrieve);

    let ingredient_create = warp::post()
        .and(warp::path!("api" / "ingredients"))
        .and(with_session(secret))
        .and(json_body())
        .and(with_state(state))
        .and_then(handlers::ingredient_create);

    tag_list
        .or(tag_retrieve)
        .or(tag_create)
        .or(ingredient_list)
        .or(ingredient_retrieve)
        .or(ingredient_create)
}

/// Every API route, with rejections rendered as JSON errors.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    recipes(state.clone())
        .or(users(state.clone()))
        .or(catalog(state))
        .recover(handlers::handle_rejection)
}
