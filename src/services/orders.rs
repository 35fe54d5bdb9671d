use crate::{
    entities::{
        address, cake, cart, cart_item,
        order::{self, OrderStatus},
        order_item, profile,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{cakes::Resolver, coupons::CouponService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Order placement and history.
///
/// Placement runs as one transaction: order + item snapshots, per-line
/// conditional stock decrement, cart clearing and coupon redemption either
/// all land or none do.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    coupons: Arc<CouponService>,
}

#[derive(Debug, Clone)]
pub struct ShippingAddressInput {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderInput {
    pub address_id: Option<Uuid>,
    pub shipping_address: Option<ShippingAddressInput>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingView {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub date: chrono::DateTime<Utc>,
    pub status: OrderStatus,
    pub total: Decimal,
    pub final_total: Decimal,
    pub coupon_code: Option<String>,
    pub discount_amount: Decimal,
    pub shipping_address: ShippingView,
    pub items: Vec<order_item::Model>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        coupons: Arc<CouponService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            coupons,
        }
    }

    /// Places an order from the user's cart.
    #[instrument(skip(self, input))]
    pub async fn place_order(
        &self,
        user_id: Uuid,
        input: PlaceOrderInput,
    ) -> Result<OrderView, ServiceError> {
        let resolver = Resolver::load(&self.db).await?;

        let txn = self.db.begin().await?;

        let profile = profile::Entity::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(
                    "User profile not found. Please complete your profile first".to_string(),
                )
            })?;

        let shipping = self.resolve_address(&txn, profile.id, &input).await?;
        if shipping.street.trim().is_empty()
            || shipping.city.trim().is_empty()
            || shipping.state.trim().is_empty()
            || shipping.zip.trim().is_empty()
        {
            return Err(ServiceError::InvalidInput(
                "Shipping address is incomplete".to_string(),
            ));
        }

        let cart = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::InvalidInput("Cart is empty".to_string()))?;
        let lines = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidInput("Cart is empty".to_string()));
        }

        let cake_ids: Vec<Uuid> = lines.iter().map(|l| l.cake_id).collect();
        let cakes: HashMap<Uuid, cake::Model> = cake::Entity::find()
            .filter(cake::Column::Id.is_in(cake_ids))
            .all(&txn)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let mut subtotal = Decimal::ZERO;
        for line in &lines {
            let cake = cakes.get(&line.cake_id).ok_or_else(|| {
                ServiceError::InvalidInput(
                    "A cart item refers to a cake that no longer exists".to_string(),
                )
            })?;
            if cake.name.trim().is_empty() {
                return Err(ServiceError::InvalidInput(format!(
                    "Cake {} has no name or price",
                    cake.id
                )));
            }
            if let Some(stock) = cake.stock {
                if line.quantity > stock {
                    return Err(ServiceError::InsufficientStock(format!(
                        "Insufficient stock for {}",
                        cake.name
                    )));
                }
            }
            subtotal += cake.price * Decimal::from(line.quantity);
        }
        if subtotal <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Order total must be positive".to_string(),
            ));
        }

        // Coupon is re-evaluated here; a preview result is never trusted.
        let coupon = match &input.coupon_code {
            Some(code) => Some(
                self.coupons
                    .evaluate_code(&txn, user_id, code, subtotal)
                    .await?,
            ),
            None => None,
        };
        let discount_amount = coupon
            .as_ref()
            .map(|(_, eval)| eval.discount_amount)
            .unwrap_or(Decimal::ZERO);
        let final_amount = subtotal - discount_amount;
        if final_amount < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Final amount cannot be negative".to_string(),
            ));
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            total_amount: Set(subtotal),
            final_amount: Set(final_amount),
            coupon_code: Set(coupon.as_ref().map(|(c, _)| c.code.clone())),
            discount_amount: Set(discount_amount),
            shipping_street: Set(shipping.street.clone()),
            shipping_city: Set(shipping.city.clone()),
            shipping_state: Set(shipping.state.clone()),
            shipping_zip: Set(shipping.zip.clone()),
            status: Set(OrderStatus::Pending),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let cake = &cakes[&line.cake_id];

            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                cake_id: Set(cake.id),
                name: Set(cake.name.clone()),
                price: Set(cake.price),
                image_url: Set(resolver.first_image_url(cake)),
                quantity: Set(line.quantity),
                sponge_type: Set(resolver.sponge_type_name(line.sponge_type_id)),
                shape: Set(resolver.shape_name(line.shape_id)),
                size: Set(resolver.size_name(line.size_id)),
                flavor: Set(resolver.flavor_name(line.flavor_id)),
                inscription: Set(line.inscription.clone()),
            }
            .insert(&txn)
            .await?;
            items.push(item);

            // Conditional decrement: the WHERE clause re-checks the floor so
            // a concurrent order cannot drive stock negative. Zero rows
            // affected aborts the whole transaction.
            if cake.stock.is_some() {
                let result = cake::Entity::update_many()
                    .col_expr(
                        cake::Column::Stock,
                        Expr::col(cake::Column::Stock).sub(line.quantity),
                    )
                    .filter(cake::Column::Id.eq(cake.id))
                    .filter(cake::Column::Stock.is_not_null())
                    .filter(cake::Column::Stock.gte(line.quantity))
                    .exec(&txn)
                    .await?;
                if result.rows_affected == 0 {
                    warn!("Stock raced to zero for cake {}", cake.id);
                    return Err(ServiceError::InsufficientStock(format!(
                        "Insufficient stock for {}",
                        cake.name
                    )));
                }
            }
        }

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        if let Some((coupon_model, _)) = &coupon {
            self.coupons.redeem(&txn, coupon_model, user_id).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderPlaced { order_id, user_id })
            .await;
        if let Some((coupon_model, _)) = &coupon {
            self.event_sender
                .send_or_log(Event::CouponRedeemed {
                    coupon_id: coupon_model.id,
                    user_id,
                    order_id,
                })
                .await;
        }
        info!("Placed order {} for user {}", order_id, user_id);

        Ok(view_of(order, items))
    }

    /// The caller's orders, newest first, with item snapshots.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, user_id: Uuid) -> Result<Vec<OrderView>, ServiceError> {
        let rows = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(order, items)| view_of(order, items))
            .collect())
    }

    /// Resolves the shipping address per the storefront rules: an explicit
    /// `addressId` must exist in the book; an inline address is merged into
    /// the book unless an entry with equal street+zip already exists.
    async fn resolve_address<C>(
        &self,
        conn: &C,
        profile_id: Uuid,
        input: &PlaceOrderInput,
    ) -> Result<ShippingAddressInput, ServiceError>
    where
        C: ConnectionTrait,
    {
        if let Some(address_id) = input.address_id {
            let found = address::Entity::find_by_id(address_id)
                .filter(address::Column::ProfileId.eq(profile_id))
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::InvalidInput("Address not found".to_string()))?;
            return Ok(ShippingAddressInput {
                street: found.street,
                city: found.city,
                state: found.state,
                zip: found.zip,
            });
        }

        let Some(inline) = &input.shipping_address else {
            return Err(ServiceError::InvalidInput(
                "A shipping address or addressId is required".to_string(),
            ));
        };

        let existing = address::Entity::find()
            .filter(address::Column::ProfileId.eq(profile_id))
            .filter(address::Column::Street.eq(&inline.street))
            .filter(address::Column::Zip.eq(&inline.zip))
            .one(conn)
            .await?;
        if existing.is_none() {
            address::ActiveModel {
                id: Set(Uuid::new_v4()),
                profile_id: Set(profile_id),
                street: Set(inline.street.clone()),
                city: Set(inline.city.clone()),
                state: Set(inline.state.clone()),
                zip: Set(inline.zip.clone()),
                is_default: Set(false),
                created_at: Set(Utc::now()),
            }
            .insert(conn)
            .await?;
        }

        Ok(inline.clone())
    }
}

fn view_of(order: order::Model, items: Vec<order_item::Model>) -> OrderView {
    OrderView {
        id: order.id,
        date: order.created_at,
        status: order.status,
        total: order.total_amount,
        final_total: order.final_amount,
        coupon_code: order.coupon_code,
        discount_amount: order.discount_amount,
        shipping_address: ShippingView {
            street: order.shipping_street,
            city: order.shipping_city,
            state: order.shipping_state,
            zip: order.shipping_zip,
        },
        items,
    }
}
