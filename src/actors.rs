use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::{
    entities::actor,
    error::{ApiError, ApiResult},
    models::{ActorInput, ActorProjection},
    soft_delete::SoftDelete,
};

#[derive(Clone)]
pub struct ActorService {
    db: DatabaseConnection,
}

impl ActorService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> ApiResult<Vec<ActorProjection>> {
        let actors = actor::Entity::find_live().all(&self.db).await?;
        Ok(actors.into_iter().map(ActorProjection::from).collect())
    }

    pub async fn get(&self, id: i32) -> ApiResult<ActorProjection> {
        let Some(existing) = actor::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("Actor", id));
        };
        Ok(existing.into())
    }

    pub async fn create(&self, input: ActorInput) -> ApiResult<i32> {
        let model = actor::ActiveModel {
            id: Default::default(),
            full_name: Set(input.full_name),
            birth_date: Set(input.birth_date.to_string()),
            biography: Set(input.biography),
            is_deleted: Set(false),
        };
        let res = actor::Entity::insert(model).exec(&self.db).await?;
        tracing::debug!(actor_id = res.last_insert_id, "actor created");
        Ok(res.last_insert_id)
    }

    pub async fn update(&self, id: i32, input: ActorInput) -> ApiResult<ActorProjection> {
        let Some(existing) = actor::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("Actor", id));
        };

        let mut active: actor::ActiveModel = existing.into();
        active.full_name = Set(input.full_name);
        active.birth_date = Set(input.birth_date.to_string());
        active.biography = Set(input.biography);

        let updated = active.update(&self.db).await?;
        Ok(updated.into())
    }

    pub async fn delete(&self, id: i32) -> ApiResult<()> {
        let Some(existing) = actor::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("Actor", id));
        };
        let mut active: actor::ActiveModel = existing.into();
        active.is_deleted = Set(true);
        active.update(&self.db).await?;
        tracing::debug!(actor_id = id, "actor soft deleted");
        Ok(())
    }
}
