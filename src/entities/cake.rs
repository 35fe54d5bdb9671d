use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON-encoded list of references to another table. The cake service
/// validates every id before persisting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct IdList(pub Vec<Uuid>);

impl IdList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Uuid> {
        self.0.iter()
    }
}

impl From<Vec<Uuid>> for IdList {
    fn from(ids: Vec<Uuid>) -> Self {
        Self(ids)
    }
}

/// Product record. `stock = None` means the cake is not stock-tracked and
/// can be ordered in any quantity.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cakes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    #[sea_orm(nullable)]
    pub stock: Option<i32>,
    pub category_id: Uuid,
    pub sponge_type_id: Uuid,
    pub shape_id: Uuid,
    pub availability_id: Uuid,
    #[sea_orm(column_type = "JsonBinary")]
    pub image_ids: IdList,
    #[sea_orm(column_type = "JsonBinary")]
    pub tag_ids: IdList,
    #[sea_orm(column_type = "JsonBinary")]
    pub flavor_ids: IdList,
    #[sea_orm(column_type = "JsonBinary")]
    pub size_ids: IdList,
    #[sea_orm(column_type = "JsonBinary")]
    pub dietary_preference_ids: IdList,
    #[sea_orm(column_type = "JsonBinary")]
    pub delivery_option_ids: IdList,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
