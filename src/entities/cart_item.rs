use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cart line. Identity is the full customization tuple
/// (cake, sponge type, shape, size, flavor, inscription); two lines with
/// the same tuple are merged by summing quantities.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cart_id: Uuid,
    pub cake_id: Uuid,
    pub quantity: i32,
    pub sponge_type_id: Uuid,
    pub shape_id: Uuid,
    pub size_id: Uuid,
    pub flavor_id: Uuid,
    pub inscription: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// True when this line has the given customization identity.
    pub fn matches(
        &self,
        cake_id: Uuid,
        sponge_type_id: Uuid,
        shape_id: Uuid,
        size_id: Uuid,
        flavor_id: Uuid,
        inscription: &str,
    ) -> bool {
        self.cake_id == cake_id
            && self.sponge_type_id == sponge_type_id
            && self.shape_id == shape_id
            && self.size_id == size_id
            && self.flavor_id == flavor_id
            && self.inscription == inscription
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cart::Entity",
        from = "Column::CartId",
        to = "super::cart::Column::Id"
    )]
    Cart,
    #[sea_orm(
        belongs_to = "super::cake::Entity",
        from = "Column::CakeId",
        to = "super::cake::Column::Id"
    )]
    Cake,
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl Related<super::cake::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cake.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
