use crate::{
    authentication::permissions::ActionType, error::Error, jwt::SessionData, pool::DbPool,
    schema::{Id, ShopListLine},
};

/// Sums ingredient amounts over every recipe in the user's cart, one line per
/// (name, unit) pair, ordered by name.
pub async fn aggregate_shop_list(user_id: Id, pool: &DbPool) -> Result<Vec<ShopListLine>, Error> {
    let rows: Vec<ShopListLine> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, SUM(ri.amount) AS total_amount
        FROM shop_list sl
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = sl.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sl.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Renders lines as `1. Flour, 300 g`, one per line. No lines renders as an empty string.
pub fn render_shop_list(lines: &[ShopListLine]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            format!(
                "{}. {}, {} {}",
                index + 1,
                capitalize(&line.name),
                line.total_amount,
                line.measurement_unit
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// The session user's rendered shopping list.
pub async fn download_shop_list(session: &SessionData, pool: &DbPool) -> Result<String, Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let lines = aggregate_shop_list(session.user_id, pool).await?;

    log::debug!("Rendering {} shop list lines for {}", lines.len(), session.user_id);
    Ok(render_shop_list(&lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, total_amount: i64, unit: &str) -> ShopListLine {
        ShopListLine {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            total_amount,
        }
    }

    #[test]
    fn capitalize_lowers_the_tail() {
        assert_eq!(capitalize("flour"), "Flour");
        assert_eq!(capitalize("bROWN sugar"), "Brown sugar");
        assert_eq!(capitalize("ёлка"), "Ёлка");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn render_numbers_lines_from_one() {
        let lines = vec![
            line("egg", 2, "pcs"),
            line("flour", 300, "g"),
            line("sugar", 50, "g"),
        ];

        assert_eq!(
            render_shop_list(&lines),
            "1. Egg, 2 pcs\n2. Flour, 300 g\n3. Sugar, 50 g"
        );
    }

    #[test]
    fn render_empty_list() {
        assert_eq!(render_shop_list(&[]), "");
    }
}
