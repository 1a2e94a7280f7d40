mod common;

use common::*;
use foodgram_sdk::{
    actions::ingredients::{create_ingredient, get_ingredient, search_ingredients},
    actions::tags::{create_tag, find_tags_by_slugs, get_tag, list_tags},
    actions::users::{
        authenticate_user, create_user, get_user_by_email, get_user_by_id, list_users,
        set_user_role,
    },
    error::Error,
    form::{IngredientForm, TagForm, UserForm},
    jwt::{SessionData, Viewer},
    pagination::PageRequest,
    schema::UserRole,
};

fn user_form(email: &str, username: &str) -> UserForm {
    UserForm {
        email: email.to_string(),
        username: username.to_string(),
        first_name: String::from("Ada"),
        last_name: String::from("Lovelace"),
        password: String::from("analytical"),
    }
}

fn tag_form(name: &str, color: &str, slug: &str) -> TagForm {
    TagForm {
        name: name.to_string(),
        color: color.to_string(),
        slug: slug.to_string(),
    }
}

#[tokio::test]
async fn users_are_unique_and_authenticate() {
    let pool = setup().await;

    let user = create_user(user_form("ada@example.com", "ada"), &pool)
        .await
        .unwrap();
    assert_eq!(user.role, UserRole::User);
    assert_ne!(user.password, "analytical");

    let result = create_user(user_form("ADA@example.com", "other"), &pool).await;
    assert!(matches!(result, Err(Error::Conflict(_))));
    let result = create_user(user_form("other@example.com", "ada"), &pool).await;
    assert!(matches!(result, Err(Error::Conflict(_))));

    let result = create_user(user_form("me@example.com", "me"), &pool).await;
    assert!(matches!(result, Err(Error::Validation { field, .. }) if field == "username"));
    let result = create_user(user_form("not-an-email", "bob"), &pool).await;
    assert!(matches!(result, Err(Error::Validation { field, .. }) if field == "email"));

    let found = get_user_by_email(&pool, "ada@example.com").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id));
    assert!(get_user_by_id(&pool, user.id).await.unwrap().is_some());
    assert!(get_user_by_id(&pool, 999).await.unwrap().is_none());

    let authenticated = authenticate_user("ada@example.com", "analytical", &pool)
        .await
        .unwrap();
    assert_eq!(authenticated.id, user.id);
    let result = authenticate_user("ada@example.com", "wrong", &pool).await;
    assert!(matches!(result, Err(Error::Validation { .. })));
    let result = authenticate_user("nobody@example.com", "analytical", &pool).await;
    assert!(matches!(result, Err(Error::Validation { .. })));
}

#[tokio::test]
async fn only_admins_manage_tags_and_ingredients() {
    let pool = setup().await;
    let user = seed_user(&pool, "cook", UserRole::User).await;

    let session = SessionData::from(&user);
    let result = create_tag(&session, tag_form("Lunch", "#49B64E", "lunch"), &pool).await;
    assert!(matches!(result, Err(Error::PermissionDenied(_))));
    let ingredient = IngredientForm {
        name: String::from("salt"),
        measurement_unit: String::from("g"),
    };
    let result = create_ingredient(&session, ingredient.clone(), &pool).await;
    assert!(matches!(result, Err(Error::PermissionDenied(_))));

    set_user_role(user.id, UserRole::Admin, &pool).await.unwrap();
    let admin = get_user_by_id(&pool, user.id).await.unwrap().unwrap();
    let session = SessionData::from(&admin);

    let tag = create_tag(&session, tag_form("Lunch", "#49B64E", "lunch"), &pool)
        .await
        .unwrap();
    assert_eq!(tag.color, "#49b64e");
    assert_eq!(get_tag(tag.id, &pool).await.unwrap(), Some(tag.clone()));

    let result = create_tag(&session, tag_form("Brunch", "#49b64e", "brunch"), &pool).await;
    assert!(matches!(result, Err(Error::Conflict(_))));
    let result = create_tag(&session, tag_form("Brunch", "teal", "brunch"), &pool).await;
    assert!(matches!(result, Err(Error::Validation { field, .. }) if field == "color"));
    let result = create_tag(&session, tag_form("Brunch", "#abc", "not a slug"), &pool).await;
    assert!(matches!(result, Err(Error::Validation { field, .. }) if field == "slug"));

    let salt = create_ingredient(&session, ingredient.clone(), &pool)
        .await
        .unwrap();
    assert_eq!(get_ingredient(salt.id, &pool).await.unwrap(), Some(salt));
    let result = create_ingredient(&session, ingredient, &pool).await;
    assert!(matches!(result, Err(Error::Conflict(_))));

    let result = set_user_role(999, UserRole::Admin, &pool).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn tags_list_by_name_and_slug_lookup() {
    let pool = setup().await;
    let lunch = seed_tag(&pool, "Lunch", "lunch", "#49b64e").await;
    let breakfast = seed_tag(&pool, "Breakfast", "breakfast", "#e26c2d").await;
    seed_tag(&pool, "Dinner", "dinner", "#8775d2").await;

    let names: Vec<_> = list_tags(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    assert_eq!(names, vec!["Breakfast", "Dinner", "Lunch"]);

    let found = find_tags_by_slugs(
        &[String::from("lunch"), String::from("breakfast"), String::from("none")],
        &pool,
    )
    .await
    .unwrap();
    assert_eq!(found, vec![breakfast, lunch]);
    assert!(find_tags_by_slugs(&[], &pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn ingredient_search_is_a_literal_prefix() {
    let pool = setup().await;
    seed_ingredient(&pool, "Sugar", "g").await;
    seed_ingredient(&pool, "sugar_syrup", "ml").await;
    seed_ingredient(&pool, "sugarsnap peas", "g").await;
    seed_ingredient(&pool, "salt", "g").await;

    let names = |rows: Vec<foodgram_sdk::schema::Ingredient>| -> Vec<String> {
        rows.into_iter().map(|i| i.name).collect()
    };

    let all = search_ingredients(None, &pool).await.unwrap();
    assert_eq!(all.len(), 4);

    let sugar = search_ingredients(Some("SUG"), &pool).await.unwrap();
    assert_eq!(names(sugar), vec!["Sugar", "sugar_syrup", "sugarsnap peas"]);

    let underscore = search_ingredients(Some("sugar_"), &pool).await.unwrap();
    assert_eq!(names(underscore), vec!["sugar_syrup"]);
}

#[tokio::test]
async fn ingredient_search_folds_cyrillic_case() {
    let pool = setup().await;
    seed_ingredient(&pool, "Мука", "г").await;
    seed_ingredient(&pool, "Мёд", "г").await;
    seed_ingredient(&pool, "молоко", "мл").await;

    let admin = SessionData::from(&seed_user(&pool, "admin", UserRole::Admin).await);
    let form = IngredientForm {
        name: String::from("Сахар"),
        measurement_unit: String::from("г"),
    };
    create_ingredient(&admin, form, &pool).await.unwrap();

    let names = |rows: Vec<foodgram_sdk::schema::Ingredient>| -> Vec<String> {
        rows.into_iter().map(|i| i.name).collect()
    };

    let lower = search_ingredients(Some("мук"), &pool).await.unwrap();
    assert_eq!(names(lower), vec!["Мука"]);

    let upper = search_ingredients(Some("МУК"), &pool).await.unwrap();
    assert_eq!(names(upper), vec!["Мука"]);

    let created = search_ingredients(Some("сах"), &pool).await.unwrap();
    assert_eq!(names(created), vec!["Сахар"]);

    let all_m = search_ingredients(Some("М"), &pool).await.unwrap();
    assert_eq!(names(all_m), vec!["Мука", "Мёд", "молоко"]);
}

#[tokio::test]
async fn user_listing_reports_subscriptions() {
    let pool = setup().await;
    let alice = seed_session(&pool, "alice").await;
    let bob = seed_session(&pool, "bob").await;
    seed_session(&pool, "carol").await;

    foodgram_sdk::actions::relations::subscribe(&alice, bob.user_id, None, &pool)
        .await
        .unwrap();

    let page = list_users(
        &Viewer::User(alice.clone()),
        PageRequest::default().with_limit(2),
        &pool,
    )
    .await
    .unwrap();
    assert_eq!(page.count, 3);
    assert_eq!(page.next_offset, Some(2));
    let flags: Vec<_> = page
        .results
        .iter()
        .map(|u| (u.username.as_str(), u.is_subscribed))
        .collect();
    assert_eq!(flags, vec![("alice", false), ("bob", true)]);
}
