use sqlx::{QueryBuilder, Sqlite};

use crate::{
    authentication::permissions::ActionType,
    error::Error,
    form::TagForm,
    jwt::SessionData,
    pool::DbPool,
    schema::{Id, Tag},
};

pub async fn create_tag(session: &SessionData, form: TagForm, pool: &DbPool) -> Result<Tag, Error> {
    session.authenticate(ActionType::ManageTags)?;
    form.validate()?;

    let tag: Tag = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(form.name.trim())
    .bind(form.color.to_lowercase())
    .bind(&form.slug)
    .fetch_one(pool)
    .await
    .map_err(|e| match Error::from(e) {
        Error::Conflict(_) => Error::Conflict(String::from(
            "A tag with this name, color or slug already exists.",
        )),
        other => other,
    })?;

    log::info!("Tag {} created", tag.slug);
    Ok(tag)
}

pub async fn get_tag(id: Id, pool: &DbPool) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(tag)
}

pub async fn list_tags(pool: &DbPool) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

pub async fn find_tags_by_slugs(slugs: &[String], pool: &DbPool) -> Result<Vec<Tag>, Error> {
    if slugs.is_empty() {
        return Ok(vec![]);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM tags WHERE slug IN (");
    {
        let mut separated = builder.separated(", ");
        for slug in slugs {
            separated.push_bind(slug.to_owned());
        }
        separated.push_unseparated(") ORDER BY name");
    }

    let list: Vec<Tag> = builder.build_query_as().fetch_all(pool).await?;
    Ok(list)
}
