use crate::{
    entities::{
        availability, category, delivery_option, dietary_preference, flavor, shape, size,
        sponge_type, tag,
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Input shared by every catalog lookup type.
#[derive(Debug, Clone)]
pub struct CatalogEntryInput {
    pub name: String,
    pub description: Option<String>,
}

/// CRUD over the nine lookup tables (categories, flavors, sizes, tags,
/// sponge types, shapes, availabilities, delivery options, dietary
/// preferences). All nine share one row shape, so the per-type methods are
/// generated by `catalog_crud!`.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Inserts the default sponge types and shapes that the storefront
    /// expects. Idempotent: existing names are left alone. Runs once at
    /// startup, never on the read path.
    #[instrument(skip(self))]
    pub async fn seed_defaults(&self) -> Result<(), ServiceError> {
        const SPONGE_TYPES: &[(&str, &str)] = &[
            ("Vanilla", "Classic vanilla sponge"),
            ("Chocolate", "Rich chocolate sponge"),
            ("Red Velvet", "Soft red velvet sponge"),
            ("Black Forest", "Black forest sponge"),
            ("Butterscotch", "Buttery sponge with caramel flavor"),
        ];
        const SHAPES: &[(&str, &str)] = &[
            ("Round", "Traditional round shape"),
            ("Square", "Square shape"),
            ("Heart", "Heart shape for special occasions"),
            ("Rectangle", "Rectangle shape cake"),
            ("Oval", "Oval shape cake"),
        ];

        let mut inserted = 0usize;
        for (name, description) in SPONGE_TYPES {
            let exists = sponge_type::Entity::find()
                .filter(sponge_type::Column::Name.eq(*name))
                .one(&*self.db)
                .await?;
            if exists.is_none() {
                sponge_type::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    name: Set(name.to_string()),
                    description: Set(Some(description.to_string())),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&*self.db)
                .await?;
                inserted += 1;
            }
        }
        for (name, description) in SHAPES {
            let exists = shape::Entity::find()
                .filter(shape::Column::Name.eq(*name))
                .one(&*self.db)
                .await?;
            if exists.is_none() {
                shape::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    name: Set(name.to_string()),
                    description: Set(Some(description.to_string())),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&*self.db)
                .await?;
                inserted += 1;
            }
        }

        if inserted > 0 {
            info!("Seeded {} default catalog entries", inserted);
        }
        Ok(())
    }
}

macro_rules! catalog_crud {
    ($entity:ident, $label:expr, $create:ident, $list:ident, $update:ident, $delete:ident) => {
        impl CatalogService {
            pub async fn $create(
                &self,
                input: CatalogEntryInput,
            ) -> Result<$entity::Model, ServiceError> {
                let name = input.name.trim().to_string();
                if name.is_empty() {
                    return Err(ServiceError::ValidationError(format!(
                        "{} name is required",
                        $label
                    )));
                }

                let existing = $entity::Entity::find()
                    .filter($entity::Column::Name.eq(&name))
                    .one(&*self.db)
                    .await?;
                if existing.is_some() {
                    return Err(ServiceError::InvalidInput(format!(
                        "{} '{}' already exists",
                        $label, name
                    )));
                }

                let model = $entity::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    name: Set(name),
                    description: Set(input.description),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&*self.db)
                .await?;
                Ok(model)
            }

            pub async fn $list(&self) -> Result<Vec<$entity::Model>, ServiceError> {
                Ok($entity::Entity::find()
                    .order_by_asc($entity::Column::Name)
                    .all(&*self.db)
                    .await?)
            }

            pub async fn $update(
                &self,
                id: Uuid,
                input: CatalogEntryInput,
            ) -> Result<$entity::Model, ServiceError> {
                let existing = $entity::Entity::find_by_id(id)
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("{} not found", $label))
                    })?;

                let name = input.name.trim().to_string();
                if name.is_empty() {
                    return Err(ServiceError::ValidationError(format!(
                        "{} name is required",
                        $label
                    )));
                }
                if name != existing.name {
                    let taken = $entity::Entity::find()
                        .filter($entity::Column::Name.eq(&name))
                        .filter($entity::Column::Id.ne(id))
                        .one(&*self.db)
                        .await?;
                    if taken.is_some() {
                        return Err(ServiceError::InvalidInput(format!(
                            "{} '{}' already exists",
                            $label, name
                        )));
                    }
                }

                let mut active: $entity::ActiveModel = existing.into();
                active.name = Set(name);
                active.description = Set(input.description);
                active.updated_at = Set(Utc::now());
                Ok(active.update(&*self.db).await?)
            }

            pub async fn $delete(&self, id: Uuid) -> Result<(), ServiceError> {
                let result = $entity::Entity::delete_by_id(id).exec(&*self.db).await?;
                if result.rows_affected == 0 {
                    return Err(ServiceError::NotFound(format!("{} not found", $label)));
                }
                Ok(())
            }
        }
    };
}

catalog_crud!(
    category,
    "Category",
    create_category,
    list_categories,
    update_category,
    delete_category
);
catalog_crud!(
    flavor,
    "Flavor",
    create_flavor,
    list_flavors,
    update_flavor,
    delete_flavor
);
catalog_crud!(size, "Size", create_size, list_sizes, update_size, delete_size);
catalog_crud!(tag, "Tag", create_tag, list_tags, update_tag, delete_tag);
catalog_crud!(
    sponge_type,
    "Sponge type",
    create_sponge_type,
    list_sponge_types,
    update_sponge_type,
    delete_sponge_type
);
catalog_crud!(
    shape,
    "Shape",
    create_shape,
    list_shapes,
    update_shape,
    delete_shape
);
catalog_crud!(
    availability,
    "Availability",
    create_availability,
    list_availabilities,
    update_availability,
    delete_availability
);
catalog_crud!(
    delivery_option,
    "Delivery option",
    create_delivery_option,
    list_delivery_options,
    update_delivery_option,
    delete_delivery_option
);
catalog_crud!(
    dietary_preference,
    "Dietary preference",
    create_dietary_preference,
    list_dietary_preferences,
    update_dietary_preference,
    delete_dietary_preference
);
