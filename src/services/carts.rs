use crate::{
    entities::{cake, cart, cart_item, flavor, shape, size, sponge_type},
    errors::ServiceError,
    events::{Event, EventSender},
    services::cakes::Resolver,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub const MAX_INSCRIPTION_LEN: usize = 100;

/// Per-user shopping cart. A line's identity is the full customization
/// tuple; add merges into an identical line, update and remove match the
/// same tuple.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Customization selection identifying a line together with the cake id.
#[derive(Debug, Clone)]
pub struct Customization {
    pub sponge_type_id: Uuid,
    pub shape_id: Uuid,
    pub size_id: Uuid,
    pub flavor_id: Uuid,
    pub inscription: String,
}

#[derive(Debug, Clone)]
pub struct AddToCartInput {
    pub cake_id: Uuid,
    pub quantity: i32,
    pub customization: Customization,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub cake_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub stock: Option<i32>,
    pub quantity: i32,
    pub sponge_type: Option<String>,
    pub shape: Option<String>,
    pub size: Option<String>,
    pub flavor: Option<String>,
    pub inscription: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub subtotal: Decimal,
}

impl CartView {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            subtotal: Decimal::ZERO,
        }
    }
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds a cake with its customization, merging into an existing
    /// identical line by summing quantities.
    #[instrument(skip(self, input), fields(cake_id = %input.cake_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartView, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        validate_inscription(&input.customization.inscription)?;

        let cake = cake::Entity::find_by_id(input.cake_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cake not found".to_string()))?;
        self.check_customization(&input.customization).await?;

        let txn = self.db.begin().await?;

        let cart = self.find_or_create_cart(&txn, user_id).await?;
        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&txn)
            .await?;

        let existing = items.into_iter().find(|item| {
            item.matches(
                input.cake_id,
                input.customization.sponge_type_id,
                input.customization.shape_id,
                input.customization.size_id,
                input.customization.flavor_id,
                &input.customization.inscription,
            )
        });

        let new_quantity = existing
            .as_ref()
            .map(|item| item.quantity + input.quantity)
            .unwrap_or(input.quantity);
        check_stock(&cake, new_quantity)?;

        match existing {
            Some(item) => {
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(new_quantity);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    cake_id: Set(input.cake_id),
                    quantity: Set(input.quantity),
                    sponge_type_id: Set(input.customization.sponge_type_id),
                    shape_id: Set(input.customization.shape_id),
                    size_id: Set(input.customization.size_id),
                    flavor_id: Set(input.customization.flavor_id),
                    inscription: Set(input.customization.inscription.clone()),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                cake_id: input.cake_id,
            })
            .await;
        info!("Added cake {} to cart {}", input.cake_id, cart.id);

        self.get_cart(user_id).await
    }

    /// Joined cart view; a missing or empty cart yields an empty view.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(CartView::empty());
        };

        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        if items.is_empty() {
            return Ok(CartView::empty());
        }

        let cake_ids: Vec<Uuid> = items.iter().map(|i| i.cake_id).collect();
        let cakes: HashMap<Uuid, cake::Model> = cake::Entity::find()
            .filter(cake::Column::Id.is_in(cake_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let resolver = Resolver::load(&self.db).await?;

        let mut subtotal = Decimal::ZERO;
        let lines = items
            .into_iter()
            .map(|item| {
                let cake = cakes.get(&item.cake_id);
                if let Some(cake) = cake {
                    subtotal += cake.price * Decimal::from(item.quantity);
                }
                CartLineView {
                    cake_id: item.cake_id,
                    name: cake.map(|c| c.name.clone()).unwrap_or_default(),
                    price: cake.map(|c| c.price).unwrap_or(Decimal::ZERO),
                    image_url: cake.and_then(|c| resolver.first_image_url(c)),
                    stock: cake.and_then(|c| c.stock),
                    quantity: item.quantity,
                    sponge_type: resolver.sponge_type_name(item.sponge_type_id),
                    shape: resolver.shape_name(item.shape_id),
                    size: resolver.size_name(item.size_id),
                    flavor: resolver.flavor_name(item.flavor_id),
                    inscription: item.inscription,
                }
            })
            .collect();

        Ok(CartView {
            items: lines,
            subtotal,
        })
    }

    /// Total quantity across all lines; 0 when there is no cart.
    #[instrument(skip(self))]
    pub async fn count(&self, user_id: Uuid) -> Result<i64, ServiceError> {
        let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(0);
        };

        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&*self.db)
            .await?;
        Ok(items.iter().map(|i| i.quantity as i64).sum())
    }

    /// Sets the quantity of the line matching the full customization
    /// tuple, after a stock re-check.
    #[instrument(skip(self, customization))]
    pub async fn update_item(
        &self,
        user_id: Uuid,
        cake_id: Uuid,
        quantity: i32,
        customization: Customization,
    ) -> Result<CartView, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let item = self.find_line(user_id, cake_id, &customization).await?;

        let cake = cake::Entity::find_by_id(cake_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cake not found".to_string()))?;
        check_stock(&cake, quantity)?;

        let cart_id = item.cart_id;
        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated { cart_id, cake_id })
            .await;

        self.get_cart(user_id).await
    }

    /// Removes the line matching the full customization tuple.
    #[instrument(skip(self, customization))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        cake_id: Uuid,
        customization: Customization,
    ) -> Result<CartView, ServiceError> {
        let item = self.find_line(user_id, cake_id, &customization).await?;

        let cart_id = item.cart_id;
        cart_item::Entity::delete_by_id(item.id)
            .exec(&*self.db)
            .await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved { cart_id, cake_id })
            .await;

        self.get_cart(user_id).await
    }

    async fn find_line(
        &self,
        user_id: Uuid,
        cake_id: Uuid,
        customization: &Customization,
    ) -> Result<cart_item::Model, ServiceError> {
        let cart = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::CakeId.eq(cake_id))
            .all(&*self.db)
            .await?;

        items
            .into_iter()
            .find(|item| {
                item.matches(
                    cake_id,
                    customization.sponge_type_id,
                    customization.shape_id,
                    customization.size_id,
                    customization.flavor_id,
                    &customization.inscription,
                )
            })
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))
    }

    async fn find_or_create_cart<C>(&self, conn: &C, user_id: Uuid) -> Result<cart::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        if let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(conn)
            .await?
        {
            return Ok(cart);
        }

        Ok(cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?)
    }

    async fn check_customization(&self, customization: &Customization) -> Result<(), ServiceError> {
        if sponge_type::Entity::find_by_id(customization.sponge_type_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::InvalidInput(format!(
                "Sponge type {} does not exist",
                customization.sponge_type_id
            )));
        }
        if shape::Entity::find_by_id(customization.shape_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::InvalidInput(format!(
                "Shape {} does not exist",
                customization.shape_id
            )));
        }
        if size::Entity::find_by_id(customization.size_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::InvalidInput(format!(
                "Size {} does not exist",
                customization.size_id
            )));
        }
        if flavor::Entity::find_by_id(customization.flavor_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::InvalidInput(format!(
                "Flavor {} does not exist",
                customization.flavor_id
            )));
        }
        Ok(())
    }
}

fn validate_inscription(inscription: &str) -> Result<(), ServiceError> {
    // Characters, not bytes: inscriptions may carry accents or emoji.
    if inscription.chars().count() > MAX_INSCRIPTION_LEN {
        return Err(ServiceError::ValidationError(format!(
            "Inscription must be at most {} characters",
            MAX_INSCRIPTION_LEN
        )));
    }
    Ok(())
}

fn check_stock(cake: &cake::Model, quantity: i32) -> Result<(), ServiceError> {
    if let Some(stock) = cake.stock {
        if quantity > stock {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} of '{}' available",
                stock, cake.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cake_with_stock(stock: Option<i32>) -> cake::Model {
        cake::Model {
            id: Uuid::new_v4(),
            name: "Midnight Truffle".to_string(),
            description: String::new(),
            price: dec!(24.5),
            stock,
            category_id: Uuid::new_v4(),
            sponge_type_id: Uuid::new_v4(),
            shape_id: Uuid::new_v4(),
            availability_id: Uuid::new_v4(),
            image_ids: Default::default(),
            tag_ids: Default::default(),
            flavor_ids: Default::default(),
            size_ids: Default::default(),
            dietary_preference_ids: Default::default(),
            delivery_option_ids: Default::default(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn untracked_stock_allows_any_quantity() {
        assert!(check_stock(&cake_with_stock(None), 1_000).is_ok());
    }

    #[test]
    fn tracked_stock_enforces_ceiling() {
        let cake = cake_with_stock(Some(3));
        assert!(check_stock(&cake, 3).is_ok());
        let err = check_stock(&cake, 4).unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientStock(_)));
        assert!(err.to_string().contains("Midnight Truffle"));
    }

    #[test]
    fn inscription_length_is_bounded() {
        assert!(validate_inscription(&"a".repeat(100)).is_ok());
        assert!(validate_inscription(&"a".repeat(101)).is_err());
    }

    #[test]
    fn inscription_bound_counts_characters_not_bytes() {
        // 100 two-byte characters are exactly at the limit.
        assert!(validate_inscription(&"é".repeat(100)).is_ok());
        assert!(validate_inscription(&"é".repeat(101)).is_err());
    }

    #[test]
    fn line_identity_uses_the_full_tuple() {
        let cake_id = Uuid::new_v4();
        let sponge = Uuid::new_v4();
        let shape = Uuid::new_v4();
        let size = Uuid::new_v4();
        let flavor = Uuid::new_v4();

        let line = cart_item::Model {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            cake_id,
            quantity: 1,
            sponge_type_id: sponge,
            shape_id: shape,
            size_id: size,
            flavor_id: flavor,
            inscription: "Happy Birthday".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(line.matches(cake_id, sponge, shape, size, flavor, "Happy Birthday"));
        // Any differing component breaks identity.
        assert!(!line.matches(cake_id, sponge, shape, size, flavor, "Happy Anniversary"));
        assert!(!line.matches(cake_id, Uuid::new_v4(), shape, size, flavor, "Happy Birthday"));
    }
}
