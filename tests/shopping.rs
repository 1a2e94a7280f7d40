mod common;

use common::*;
use foodgram_sdk::{
    actions::relations::add_to_shopping_cart,
    actions::shopping::{aggregate_shop_list, download_shop_list, render_shop_list},
    schema::ShopListLine,
};

fn line(name: &str, total_amount: i64, unit: &str) -> ShopListLine {
    ShopListLine {
        name: name.to_string(),
        measurement_unit: unit.to_string(),
        total_amount,
    }
}

#[tokio::test]
async fn cart_amounts_are_summed_per_ingredient() {
    let pool = setup().await;
    let cook = seed_session(&pool, "cook").await;
    let other = seed_session(&pool, "other").await;
    let tag = seed_tag(&pool, "Baking", "baking", "#aabbcc").await;
    let flour = seed_ingredient(&pool, "flour", "g").await;
    let sugar = seed_ingredient(&pool, "sugar", "g").await;
    let egg = seed_ingredient(&pool, "egg", "pcs").await;

    let a = seed_recipe(&pool, &cook, "A", &[tag.id], &[(flour.id, 200), (sugar.id, 50)]).await;
    let b = seed_recipe(&pool, &cook, "B", &[tag.id], &[(flour.id, 100), (egg.id, 2)]).await;
    let c = seed_recipe(&pool, &cook, "C", &[tag.id], &[(sugar.id, 999)]).await;

    add_to_shopping_cart(&cook, a.id, &pool).await.unwrap();
    add_to_shopping_cart(&cook, b.id, &pool).await.unwrap();
    // someone else's cart does not leak in
    add_to_shopping_cart(&other, c.id, &pool).await.unwrap();

    let lines = aggregate_shop_list(cook.user_id, &pool).await.unwrap();
    assert_eq!(
        lines,
        vec![
            line("egg", 2, "pcs"),
            line("flour", 300, "g"),
            line("sugar", 50, "g"),
        ]
    );

    let text = download_shop_list(&cook, &pool).await.unwrap();
    assert_eq!(text, "1. Egg, 2 pcs\n2. Flour, 300 g\n3. Sugar, 50 g");
}

#[tokio::test]
async fn same_name_with_other_unit_stays_separate() {
    let pool = setup().await;
    let cook = seed_session(&pool, "cook").await;
    let tag = seed_tag(&pool, "Baking", "baking", "#aabbcc").await;
    let milk_ml = seed_ingredient(&pool, "milk", "ml").await;
    let milk_cup = seed_ingredient(&pool, "milk", "cup").await;

    let a = seed_recipe(&pool, &cook, "A", &[tag.id], &[(milk_ml.id, 200)]).await;
    let b = seed_recipe(&pool, &cook, "B", &[tag.id], &[(milk_cup.id, 1)]).await;
    add_to_shopping_cart(&cook, a.id, &pool).await.unwrap();
    add_to_shopping_cart(&cook, b.id, &pool).await.unwrap();

    let lines = aggregate_shop_list(cook.user_id, &pool).await.unwrap();
    assert_eq!(lines, vec![line("milk", 1, "cup"), line("milk", 200, "ml")]);
}

#[tokio::test]
async fn empty_cart_renders_nothing() {
    let pool = setup().await;
    let cook = seed_session(&pool, "cook").await;

    let lines = aggregate_shop_list(cook.user_id, &pool).await.unwrap();
    assert!(lines.is_empty());
    assert_eq!(render_shop_list(&lines), "");
    assert_eq!(download_shop_list(&cook, &pool).await.unwrap(), "");
}
