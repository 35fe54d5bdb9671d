use crate::{
    entities::{
        availability, cake, category, delivery_option, dietary_preference, flavor, image, shape,
        size, sponge_type, tag,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

const MAX_PRICE: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);
const MAX_STOCK: i32 = 10_000;
const MAX_DESCRIPTION_LEN: usize = 500;

/// Cake catalog: admin CRUD with full cross-reference validation, plus the
/// joined storefront views.
#[derive(Clone)]
pub struct CakeService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone)]
pub struct CakeInput {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: Option<i32>,
    pub category_id: Uuid,
    pub sponge_type_id: Uuid,
    pub shape_id: Uuid,
    pub availability_id: Uuid,
    pub image_ids: Vec<Uuid>,
    pub tag_ids: Vec<Uuid>,
    pub flavor_ids: Vec<Uuid>,
    pub size_ids: Vec<Uuid>,
    pub dietary_preference_ids: Vec<Uuid>,
    pub delivery_option_ids: Vec<Uuid>,
}

/// A referenced lookup row resolved to its display name.
#[derive(Debug, Clone, Serialize)]
pub struct NamedRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub id: Uuid,
    pub url: String,
    pub filename: String,
}

/// Fully joined cake as the storefront renders it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CakeView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: Option<i32>,
    pub category: Option<NamedRef>,
    pub sponge_type: Option<NamedRef>,
    pub shape: Option<NamedRef>,
    pub availability: Option<NamedRef>,
    pub images: Vec<ImageRef>,
    pub tags: Vec<NamedRef>,
    pub flavors: Vec<NamedRef>,
    pub sizes: Vec<NamedRef>,
    pub dietary_preferences: Vec<NamedRef>,
    pub delivery_options: Vec<NamedRef>,
    pub created_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CakePage {
    pub cakes: Vec<CakeView>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

pub fn image_url(id: Uuid) -> String {
    format!("/api/images/{}", id)
}

macro_rules! check_ref {
    ($self:ident, $entity:ident, $id:expr, $label:expr) => {{
        if $entity::Entity::find_by_id($id)
            .one(&*$self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::InvalidInput(format!(
                "{} {} does not exist",
                $label, $id
            )));
        }
    }};
}

macro_rules! check_refs {
    ($self:ident, $entity:ident, $ids:expr, $label:expr) => {{
        for id in $ids.iter() {
            check_ref!($self, $entity, *id, $label);
        }
    }};
}

impl CakeService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_cake(
        &self,
        created_by: Uuid,
        input: CakeInput,
    ) -> Result<CakeView, ServiceError> {
        self.validate(&input, None).await?;

        let now = Utc::now();
        let model = cake::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            price: Set(input.price),
            stock: Set(input.stock),
            category_id: Set(input.category_id),
            sponge_type_id: Set(input.sponge_type_id),
            shape_id: Set(input.shape_id),
            availability_id: Set(input.availability_id),
            image_ids: Set(input.image_ids.into()),
            tag_ids: Set(input.tag_ids.into()),
            flavor_ids: Set(input.flavor_ids.into()),
            size_ids: Set(input.size_ids.into()),
            dietary_preference_ids: Set(input.dietary_preference_ids.into()),
            delivery_option_ids: Set(input.delivery_option_ids.into()),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::CakeCreated(model.id))
            .await;
        info!("Created cake {}", model.id);

        self.join_one(model).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_cake(&self, id: Uuid, input: CakeInput) -> Result<CakeView, ServiceError> {
        let existing = cake::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cake not found".to_string()))?;

        self.validate(&input, Some(&existing)).await?;

        let mut active: cake::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.description = Set(input.description);
        active.price = Set(input.price);
        active.stock = Set(input.stock);
        active.category_id = Set(input.category_id);
        active.sponge_type_id = Set(input.sponge_type_id);
        active.shape_id = Set(input.shape_id);
        active.availability_id = Set(input.availability_id);
        active.image_ids = Set(input.image_ids.into());
        active.tag_ids = Set(input.tag_ids.into());
        active.flavor_ids = Set(input.flavor_ids.into());
        active.size_ids = Set(input.size_ids.into());
        active.dietary_preference_ids = Set(input.dietary_preference_ids.into());
        active.delivery_option_ids = Set(input.delivery_option_ids.into());
        active.updated_at = Set(Utc::now());
        let model = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CakeUpdated(model.id))
            .await;

        self.join_one(model).await
    }

    #[instrument(skip(self))]
    pub async fn delete_cake(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = cake::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Cake not found".to_string()));
        }
        self.event_sender.send_or_log(Event::CakeDeleted(id)).await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_cake(&self, id: Uuid) -> Result<CakeView, ServiceError> {
        let model = cake::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cake not found".to_string()))?;
        self.join_one(model).await
    }

    /// Paginated joined listing, newest first.
    #[instrument(skip(self))]
    pub async fn list_cakes(&self, page: u64, limit: u64) -> Result<CakePage, ServiceError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);

        let paginator = cake::Entity::find()
            .order_by_desc(cake::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        let resolver = Resolver::load(&self.db).await?;
        let cakes = models
            .into_iter()
            .map(|model| resolver.join(model))
            .collect();

        Ok(CakePage {
            cakes,
            total,
            page,
            limit,
        })
    }

    async fn join_one(&self, model: cake::Model) -> Result<CakeView, ServiceError> {
        let resolver = Resolver::load(&self.db).await?;
        Ok(resolver.join(model))
    }

    async fn validate(
        &self,
        input: &CakeInput,
        existing: Option<&cake::Model>,
    ) -> Result<(), ServiceError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cake name is required".to_string(),
            ));
        }
        if input.description.len() > MAX_DESCRIPTION_LEN {
            return Err(ServiceError::ValidationError(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
        if input.price <= Decimal::ZERO || input.price > MAX_PRICE {
            return Err(ServiceError::ValidationError(
                "Price must be between 0 and 100000".to_string(),
            ));
        }
        if let Some(stock) = input.stock {
            if !(0..=MAX_STOCK).contains(&stock) {
                return Err(ServiceError::ValidationError(format!(
                    "Stock must be between 0 and {}",
                    MAX_STOCK
                )));
            }
        }

        let mut name_check = cake::Entity::find().filter(cake::Column::Name.eq(name));
        if let Some(existing) = existing {
            name_check = name_check.filter(cake::Column::Id.ne(existing.id));
        }
        if name_check.one(&*self.db).await?.is_some() {
            return Err(ServiceError::InvalidInput(format!(
                "Cake '{}' already exists",
                name
            )));
        }

        check_ref!(self, category, input.category_id, "Category");
        check_ref!(self, sponge_type, input.sponge_type_id, "Sponge type");
        check_ref!(self, shape, input.shape_id, "Shape");
        check_ref!(self, availability, input.availability_id, "Availability");

        if input.flavor_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one flavor is required".to_string(),
            ));
        }
        if input.size_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one size is required".to_string(),
            ));
        }
        if input.delivery_option_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one delivery option is required".to_string(),
            ));
        }
        if input.image_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one image is required".to_string(),
            ));
        }

        check_refs!(self, flavor, input.flavor_ids, "Flavor");
        check_refs!(self, size, input.size_ids, "Size");
        check_refs!(self, tag, input.tag_ids, "Tag");
        check_refs!(
            self,
            dietary_preference,
            input.dietary_preference_ids,
            "Dietary preference"
        );
        check_refs!(
            self,
            delivery_option,
            input.delivery_option_ids,
            "Delivery option"
        );
        check_refs!(self, image, input.image_ids, "Image");

        Ok(())
    }
}

/// Snapshot of every lookup table, used to resolve cake references into
/// display names without per-row queries. The tables are tiny.
pub(crate) struct Resolver {
    categories: HashMap<Uuid, String>,
    sponge_types: HashMap<Uuid, String>,
    shapes: HashMap<Uuid, String>,
    availabilities: HashMap<Uuid, String>,
    tags: HashMap<Uuid, String>,
    flavors: HashMap<Uuid, String>,
    sizes: HashMap<Uuid, String>,
    dietary_preferences: HashMap<Uuid, String>,
    delivery_options: HashMap<Uuid, String>,
    image_files: HashMap<Uuid, String>,
}

macro_rules! name_map {
    ($db:expr, $entity:ident) => {{
        $entity::Entity::find()
            .all($db)
            .await?
            .into_iter()
            .map(|row| (row.id, row.name))
            .collect::<HashMap<Uuid, String>>()
    }};
}

impl Resolver {
    pub(crate) async fn load(db: &DatabaseConnection) -> Result<Self, ServiceError> {
        let image_files = image::Entity::find()
            .select_only()
            .column(image::Column::Id)
            .column(image::Column::Filename)
            .into_tuple::<(Uuid, String)>()
            .all(db)
            .await?
            .into_iter()
            .collect();

        Ok(Self {
            categories: name_map!(db, category),
            sponge_types: name_map!(db, sponge_type),
            shapes: name_map!(db, shape),
            availabilities: name_map!(db, availability),
            tags: name_map!(db, tag),
            flavors: name_map!(db, flavor),
            sizes: name_map!(db, size),
            dietary_preferences: name_map!(db, dietary_preference),
            delivery_options: name_map!(db, delivery_option),
            image_files,
        })
    }

    pub(crate) fn named(&self, map: &HashMap<Uuid, String>, id: Uuid) -> Option<NamedRef> {
        map.get(&id).map(|name| NamedRef {
            id,
            name: name.clone(),
        })
    }

    pub(crate) fn sponge_type_name(&self, id: Uuid) -> Option<String> {
        self.sponge_types.get(&id).cloned()
    }

    pub(crate) fn shape_name(&self, id: Uuid) -> Option<String> {
        self.shapes.get(&id).cloned()
    }

    pub(crate) fn size_name(&self, id: Uuid) -> Option<String> {
        self.sizes.get(&id).cloned()
    }

    pub(crate) fn flavor_name(&self, id: Uuid) -> Option<String> {
        self.flavors.get(&id).cloned()
    }

    pub(crate) fn first_image_url(&self, cake: &cake::Model) -> Option<String> {
        cake.image_ids.iter().next().map(|id| image_url(*id))
    }

    fn named_list(&self, map: &HashMap<Uuid, String>, ids: &cake::IdList) -> Vec<NamedRef> {
        ids.iter().filter_map(|id| self.named(map, *id)).collect()
    }

    pub(crate) fn join(&self, model: cake::Model) -> CakeView {
        let images = model
            .image_ids
            .iter()
            .map(|id| ImageRef {
                id: *id,
                url: image_url(*id),
                filename: self.image_files.get(id).cloned().unwrap_or_default(),
            })
            .collect();

        CakeView {
            category: self.named(&self.categories, model.category_id),
            sponge_type: self.named(&self.sponge_types, model.sponge_type_id),
            shape: self.named(&self.shapes, model.shape_id),
            availability: self.named(&self.availabilities, model.availability_id),
            images,
            tags: self.named_list(&self.tags, &model.tag_ids),
            flavors: self.named_list(&self.flavors, &model.flavor_ids),
            sizes: self.named_list(&self.sizes, &model.size_ids),
            dietary_preferences: self
                .named_list(&self.dietary_preferences, &model.dietary_preference_ids),
            delivery_options: self.named_list(&self.delivery_options, &model.delivery_option_ids),
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            stock: model.stock,
            created_at: model.created_at,
        }
    }
}
