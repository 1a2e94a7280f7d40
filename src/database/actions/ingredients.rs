use crate::{
    authentication::permissions::ActionType,
    error::Error,
    form::IngredientForm,
    jwt::SessionData,
    pool::DbPool,
    schema::{Id, Ingredient},
};

pub async fn create_ingredient(
    session: &SessionData,
    form: IngredientForm,
    pool: &DbPool,
) -> Result<Ingredient, Error> {
    session.authenticate(ActionType::ManageIngredients)?;
    form.validate()?;

    let name = form.name.trim();
    let ingredient: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit, search_name) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(name)
    .bind(form.measurement_unit.trim())
    .bind(search_name(name))
    .fetch_one(pool)
    .await
    .map_err(|e| match Error::from(e) {
        Error::Conflict(_) => Error::Conflict(String::from(
            "This ingredient already exists with the same measurement unit.",
        )),
        other => other,
    })?;

    log::info!("Ingredient {} created", ingredient.id);
    Ok(ingredient)
}

pub async fn get_ingredient(id: Id, pool: &DbPool) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Lower-cased form of an ingredient name used for prefix search. SQLite only
/// folds ASCII, so the folding happens here for every alphabet.
pub fn search_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Ingredients whose name starts with `prefix`, ignoring case. An empty prefix lists all.
pub async fn search_ingredients(prefix: Option<&str>, pool: &DbPool) -> Result<Vec<Ingredient>, Error> {
    let pattern = format!("{}%", escape_like(&search_name(prefix.unwrap_or_default())));

    let rows: Vec<Ingredient> = sqlx::query_as(
        "SELECT * FROM ingredients WHERE search_name LIKE $1 ESCAPE '\\' ORDER BY name, measurement_unit",
    )
    .bind(pattern)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::{escape_like, search_name};

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("flour"), "flour");
    }

    #[test]
    fn search_name_folds_every_alphabet() {
        assert_eq!(search_name("  Мука "), "мука");
        assert_eq!(search_name("ÄPPLE"), "äpple");
    }
}
