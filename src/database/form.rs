use std::{collections::HashSet, sync::OnceLock};

use regex::Regex;
use serde::Deserialize;

use crate::{
    constants::{
        MAX_LENGTH_EMAIL, MAX_LENGTH_TEXT_FIELD, MAX_LENGTH_USER_FIELD, RESERVED_USERNAMES,
    },
    error::Error,
    pagination::PageRequest,
    schema::Id,
};

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9\-_.]{1,20}$").expect("valid pattern"))
}

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid pattern"))
}

fn validate_text(field: &str, value: &str, max_length: usize) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "This field may not be blank."));
    }
    if value.chars().count() > max_length {
        return Err(Error::validation(
            field,
            &format!("Ensure this field has no more than {max_length} characters."),
        ));
    }
    Ok(())
}

fn validate_cooking_time(cooking_time: i32) -> Result<(), Error> {
    if cooking_time < 1 {
        return Err(Error::validation(
            "cooking_time",
            "Ensure this value is greater than or equal to 1.",
        ));
    }
    Ok(())
}

fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<(), Error> {
    if ingredients.is_empty() {
        return Err(Error::validation(
            "ingredients",
            "You must provide at least one ingredient.",
        ));
    }

    let mut seen = HashSet::new();
    for ingredient in ingredients {
        if ingredient.amount < 1 {
            return Err(Error::validation(
                "ingredients",
                "Ensure amount is greater than or equal to 1.",
            ));
        }
        if !seen.insert(ingredient.id) {
            return Err(Error::validation("ingredients", "Ingredients must be unique."));
        }
    }
    Ok(())
}

fn validate_tags(tags: &[Id]) -> Result<(), Error> {
    if tags.is_empty() {
        return Err(Error::validation("tags", "You must provide at least one tag."));
    }

    let unique: HashSet<&Id> = tags.iter().collect();
    if unique.len() != tags.len() {
        return Err(Error::validation("tags", "Tags must be unique."));
    }
    Ok(())
}

fn validate_image(image: &str) -> Result<(), Error> {
    if image.trim().is_empty() {
        return Err(Error::validation("image", "Image is required."));
    }
    Ok(())
}

/// Accepts `#rgb` and `#rrggbb` hex colours.
pub fn validate_color(color: &str) -> Result<(), Error> {
    let digits = color
        .strip_prefix('#')
        .filter(|digits| digits.len() == 3 || digits.len() == 6)
        .filter(|digits| digits.chars().all(|c| c.is_ascii_hexdigit()));

    match digits {
        Some(_) => Ok(()),
        None => Err(Error::validation("color", "Invalid color value.")),
    }
}

pub fn validate_username(username: &str) -> Result<(), Error> {
    if RESERVED_USERNAMES.contains(&username) {
        return Err(Error::validation(
            "username",
            &format!("Username can not be \"{username}\"."),
        ));
    }
    if !username_pattern().is_match(username) {
        return Err(Error::validation(
            "username",
            "Username contains invalid characters.",
        ));
    }
    Ok(())
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i32,
}

/// Payload for creating a recipe.
#[derive(Deserialize, Debug, Clone)]
pub struct RecipeForm {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<Id>,
    pub image: String,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

impl RecipeForm {
    pub fn validate(&self) -> Result<(), Error> {
        validate_ingredients(&self.ingredients)?;
        validate_tags(&self.tags)?;
        validate_image(&self.image)?;
        validate_text("name", &self.name, MAX_LENGTH_TEXT_FIELD)?;
        validate_text("text", &self.text, usize::MAX)?;
        validate_cooking_time(self.cooking_time)
    }
}

/// Payload for a partial recipe update. Absent fields are left as stored;
/// a present `ingredients` or `tags` list replaces the stored set.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RecipePatch {
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<Id>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

impl RecipePatch {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(ingredients) = &self.ingredients {
            validate_ingredients(ingredients)?;
        }
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }
        if let Some(image) = &self.image {
            validate_image(image)?;
        }
        if let Some(name) = &self.name {
            validate_text("name", name, MAX_LENGTH_TEXT_FIELD)?;
        }
        if let Some(text) = &self.text {
            validate_text("text", text, usize::MAX)?;
        }
        if let Some(cooking_time) = self.cooking_time {
            validate_cooking_time(cooking_time)?;
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserForm {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl UserForm {
    pub fn validate(&self) -> Result<(), Error> {
        validate_text("email", &self.email, MAX_LENGTH_EMAIL)?;
        if !validator::validate_email(self.email.as_str()) {
            return Err(Error::validation("email", "Enter a valid email address."));
        }
        validate_text("username", &self.username, MAX_LENGTH_USER_FIELD)?;
        validate_username(&self.username)?;
        validate_text("first_name", &self.first_name, MAX_LENGTH_USER_FIELD)?;
        validate_text("last_name", &self.last_name, MAX_LENGTH_USER_FIELD)?;
        validate_text("password", &self.password, MAX_LENGTH_USER_FIELD)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TagForm {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl TagForm {
    pub fn validate(&self) -> Result<(), Error> {
        validate_text("name", &self.name, MAX_LENGTH_TEXT_FIELD)?;
        validate_color(&self.color)?;
        validate_text("slug", &self.slug, MAX_LENGTH_TEXT_FIELD)?;
        if !slug_pattern().is_match(&self.slug) {
            return Err(Error::validation(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct IngredientForm {
    pub name: String,
    pub measurement_unit: String,
}

impl IngredientForm {
    pub fn validate(&self) -> Result<(), Error> {
        validate_text("name", &self.name, MAX_LENGTH_TEXT_FIELD)?;
        validate_text("measurement_unit", &self.measurement_unit, MAX_LENGTH_TEXT_FIELD)
    }
}

/// Filters recognised by the recipe listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

fn parse_flag(field: &str, value: &str) -> Result<bool, Error> {
    match value.to_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(Error::validation(field, "Enter a valid boolean.")),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| Error::validation(field, "A valid integer is required."))
}

/// Query string of the recipe listing. `tags` may repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeQuery {
    pub filter: RecipeFilter,
    pub page: PageRequest,
}

impl RecipeQuery {
    pub fn from_pairs(pairs: Vec<(String, String)>, page_size: i64) -> Result<Self, Error> {
        let mut filter = RecipeFilter::default();
        let mut page = PageRequest::new(None, None, page_size);

        for (key, value) in pairs {
            match key.as_str() {
                "author" => filter.author = Some(parse_number("author", &value)?),
                "tags" => filter.tags.push(value),
                "is_favorited" => filter.is_favorited = parse_flag("is_favorited", &value)?,
                "is_in_shopping_cart" => {
                    filter.is_in_shopping_cart = parse_flag("is_in_shopping_cart", &value)?
                }
                "limit" => page = page.with_limit(parse_number("limit", &value)?),
                "offset" => page = page.with_offset(parse_number("offset", &value)?),
                _ => {}
            }
        }

        Ok(Self { filter, page })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RecipeForm {
        RecipeForm {
            ingredients: vec![
                IngredientAmount { id: 1, amount: 3 },
                IngredientAmount { id: 2, amount: 1 },
            ],
            tags: vec![1, 2],
            image: String::from("data:image/png;base64,AA=="),
            name: String::from("Pancakes"),
            text: String::from("Mix and fry."),
            cooking_time: 15,
        }
    }

    fn field_of(result: Result<(), Error>) -> String {
        match result {
            Err(Error::Validation { field, .. }) => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_recipe_form_passes() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn recipe_form_rejects_bad_collections() {
        let mut empty_tags = form();
        empty_tags.tags.clear();
        assert_eq!(field_of(empty_tags.validate()), "tags");

        let mut duplicate_tags = form();
        duplicate_tags.tags = vec![1, 1];
        assert_eq!(field_of(duplicate_tags.validate()), "tags");

        let mut empty_ingredients = form();
        empty_ingredients.ingredients.clear();
        assert_eq!(field_of(empty_ingredients.validate()), "ingredients");

        let mut duplicate_ingredients = form();
        duplicate_ingredients.ingredients[1].id = 1;
        assert_eq!(field_of(duplicate_ingredients.validate()), "ingredients");

        let mut zero_amount = form();
        zero_amount.ingredients[0].amount = 0;
        assert_eq!(field_of(zero_amount.validate()), "ingredients");
    }

    #[test]
    fn recipe_form_rejects_bad_scalars() {
        let mut no_time = form();
        no_time.cooking_time = 0;
        assert_eq!(field_of(no_time.validate()), "cooking_time");

        let mut no_name = form();
        no_name.name = String::from("   ");
        assert_eq!(field_of(no_name.validate()), "name");

        let mut no_image = form();
        no_image.image = String::new();
        assert_eq!(field_of(no_image.validate()), "image");
    }

    #[test]
    fn patch_only_checks_present_fields() {
        assert!(RecipePatch::default().validate().is_ok());

        let patch = RecipePatch {
            tags: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(field_of(patch.validate()), "tags");

        let patch = RecipePatch {
            ingredients: Some(vec![IngredientAmount { id: 4, amount: 5 }]),
            ..Default::default()
        };
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn colors_follow_hex_notation() {
        assert!(validate_color("#49B64E").is_ok());
        assert!(validate_color("#fff").is_ok());
        assert!(validate_color("49B64E").is_err());
        assert!(validate_color("#49B64").is_err());
        assert!(validate_color("#GGGGGG").is_err());
    }

    #[test]
    fn usernames_are_checked() {
        assert!(validate_username("cook_42").is_ok());
        assert!(validate_username("me").is_err());
        assert!(validate_username("4cook").is_err());
        assert!(validate_username("c").is_err());
    }

    #[test]
    fn user_form_requires_valid_email() {
        let form = UserForm {
            email: String::from("not-an-email"),
            username: String::from("cook"),
            first_name: String::from("Jamie"),
            last_name: String::from("Oliver"),
            password: String::from("secret"),
        };
        assert_eq!(field_of(form.validate()), "email");
    }

    #[test]
    fn recipe_query_collects_repeated_tags() {
        let pairs = vec![
            (String::from("tags"), String::from("breakfast")),
            (String::from("tags"), String::from("dinner")),
            (String::from("author"), String::from("3")),
            (String::from("is_favorited"), String::from("1")),
            (String::from("limit"), String::from("2")),
        ];
        let query = RecipeQuery::from_pairs(pairs, 6).unwrap();

        assert_eq!(query.filter.tags, vec!["breakfast", "dinner"]);
        assert_eq!(query.filter.author, Some(3));
        assert!(query.filter.is_favorited);
        assert!(!query.filter.is_in_shopping_cart);
        assert_eq!(query.page.limit, 2);
        assert_eq!(query.page.offset, 0);
    }

    #[test]
    fn recipe_query_rejects_bad_flags() {
        let pairs = vec![(String::from("is_in_shopping_cart"), String::from("maybe"))];
        assert!(RecipeQuery::from_pairs(pairs, 6).is_err());
    }
}
