//! Event log backed by the configured database.

use crate::entity::event;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder,
};
use time::OffsetDateTime;

/// Records `event` for `username` with the current time.
#[tracing::instrument(skip(db))]
pub async fn log_event(
    db: &DatabaseConnection,
    username: &str,
    event_kind: &str,
) -> Result<event::Model, DbErr> {
    let model = event::ActiveModel {
        username: Set(username.to_string()),
        event: Set(event_kind.to_string()),
        timestamp: Set(OffsetDateTime::now_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tracing::info!(event_id = model.id, "Event logged");
    Ok(model)
}

/// Events newest first, optionally restricted to one user.
#[tracing::instrument(skip(db))]
pub async fn list_events(
    db: &DatabaseConnection,
    username: Option<&str>,
) -> Result<Vec<event::Model>, DbErr> {
    let mut query = event::Entity::find();
    if let Some(username) = username {
        query = query.filter(event::Column::Username.eq(username));
    }
    query
        .order_by_desc(event::Column::Timestamp)
        .order_by_desc(event::Column::Id)
        .all(db)
        .await
}
