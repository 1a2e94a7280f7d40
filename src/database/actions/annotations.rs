use sqlx::{QueryBuilder, Sqlite};

use crate::jwt::Viewer;

/// Pushes `is_favorited` and `is_in_shopping_cart` columns for the recipe aliased `r`.
/// Each flag is a correlated `EXISTS` evaluated inside the same statement; an anonymous
/// viewer gets constant `FALSE` columns and no subquery at all.
pub fn push_recipe_flags(builder: &mut QueryBuilder<'_, Sqlite>, viewer: &Viewer) {
    match viewer.user_id() {
        Some(user_id) => {
            builder
                .push("EXISTS (SELECT 1 FROM favorite_recipes fr WHERE fr.recipe_id = r.id AND fr.user_id = ")
                .push_bind(user_id)
                .push(") AS is_favorited, ")
                .push("EXISTS (SELECT 1 FROM shop_list sl WHERE sl.recipe_id = r.id AND sl.user_id = ")
                .push_bind(user_id)
                .push(") AS is_in_shopping_cart");
        }
        None => {
            builder.push("FALSE AS is_favorited, FALSE AS is_in_shopping_cart");
        }
    }
}

/// Pushes an `is_subscribed` expression telling whether the viewer follows `author_column`.
pub fn push_subscribed_flag(
    builder: &mut QueryBuilder<'_, Sqlite>,
    viewer: &Viewer,
    author_column: &str,
) {
    match viewer.user_id() {
        Some(user_id) => {
            builder
                .push("EXISTS (SELECT 1 FROM follows fo WHERE fo.author_id = ")
                .push(author_column)
                .push(" AND fo.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
        None => {
            builder.push("FALSE");
        }
    }
}

/// Starts an annotated recipe query. Callers append further `AND` conditions,
/// ordering and limits; every row decodes into `RecipeRow`.
pub fn annotated_recipes(viewer: &Viewer) -> QueryBuilder<'static, Sqlite> {
    let mut builder = QueryBuilder::new(
        "SELECT r.id, r.name, r.text, r.image, r.cooking_time, r.created,
            u.id AS author_id, u.email AS author_email, u.username AS author_username,
            u.first_name AS author_first_name, u.last_name AS author_last_name, ",
    );

    push_subscribed_flag(&mut builder, viewer, "u.id");
    builder.push(" AS author_is_subscribed, ");
    push_recipe_flags(&mut builder, viewer);
    builder.push(
        ", COUNT(*) OVER () AS count
        FROM recipes r
        INNER JOIN users u ON u.id = r.author_id
        WHERE 1 = 1",
    );

    builder
}
