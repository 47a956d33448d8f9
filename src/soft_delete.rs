use sea_orm::{ColumnTrait, EntityTrait, PrimaryKeyTrait, QueryFilter, Select};

use crate::entities::{actor, movie, review, review_like, user};

// Deleted rows stay in the store; every normal read goes through find_live
// so they never surface. Restore paths query the entity directly.
pub trait SoftDelete: EntityTrait {
    fn deleted_column() -> Self::Column;

    fn find_live() -> Select<Self> {
        Self::find().filter(Self::deleted_column().eq(false))
    }

    fn find_live_by_id(id: <Self::PrimaryKey as PrimaryKeyTrait>::ValueType) -> Select<Self> {
        Self::find_by_id(id).filter(Self::deleted_column().eq(false))
    }
}

impl SoftDelete for movie::Entity {
    fn deleted_column() -> Self::Column {
        movie::Column::IsDeleted
    }
}

impl SoftDelete for user::Entity {
    fn deleted_column() -> Self::Column {
        user::Column::IsDeleted
    }
}

impl SoftDelete for review::Entity {
    fn deleted_column() -> Self::Column {
        review::Column::IsDeleted
    }
}

impl SoftDelete for review_like::Entity {
    fn deleted_column() -> Self::Column {
        review_like::Column::IsDeleted
    }
}

impl SoftDelete for actor::Entity {
    fn deleted_column() -> Self::Column {
        actor::Column::IsDeleted
    }
}
