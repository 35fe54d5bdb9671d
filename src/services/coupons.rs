use crate::{
    entities::{
        coupon::{self, DiscountType},
        coupon_usage,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]+$").expect("valid regex"));

const HUNDRED: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Result of evaluating a coupon against a subtotal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponEvaluation {
    pub code: String,
    pub discount_amount: Decimal,
    pub total_after_discount: Decimal,
}

/// Applies the coupon rules in their fixed order and computes the discount.
///
/// Percentage discounts are clamped to `max_discount_amount` when set;
/// fixed discounts are applied as-is. The returned total may be negative,
/// order placement rejects that case separately.
pub fn evaluate(
    coupon: &coupon::Model,
    subtotal: Decimal,
    used_by_user: bool,
    now: DateTime<Utc>,
) -> Result<CouponEvaluation, ServiceError> {
    if !coupon.is_active {
        return Err(ServiceError::InvalidInput(
            "Invalid or inactive coupon code".to_string(),
        ));
    }
    if now < coupon.valid_from {
        return Err(ServiceError::InvalidInput(
            "Coupon is not yet valid".to_string(),
        ));
    }
    if let Some(valid_until) = coupon.valid_until {
        if now > valid_until {
            return Err(ServiceError::InvalidInput("Coupon has expired".to_string()));
        }
    }
    if let Some(limit) = coupon.usage_limit {
        if coupon.used_count >= limit {
            return Err(ServiceError::InvalidInput(
                "Coupon usage limit reached".to_string(),
            ));
        }
    }
    if used_by_user {
        return Err(ServiceError::InvalidInput(
            "Coupon already used by this user".to_string(),
        ));
    }
    if subtotal < coupon.min_order_amount {
        return Err(ServiceError::InvalidInput(format!(
            "Minimum order amount of {} required for this coupon",
            coupon.min_order_amount
        )));
    }

    let discount_amount = match coupon.discount_type {
        DiscountType::Percentage => {
            let raw = subtotal * coupon.discount_value / HUNDRED;
            match coupon.max_discount_amount {
                Some(cap) if raw > cap => cap,
                _ => raw,
            }
        }
        DiscountType::Fixed => coupon.discount_value,
    };

    Ok(CouponEvaluation {
        code: coupon.code.clone(),
        discount_amount,
        total_after_discount: subtotal - discount_amount,
    })
}

#[derive(Debug, Clone)]
pub struct CouponInput {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_order_amount: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub is_active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
}

/// Coupon lookup, evaluation and admin CRUD. Redemption happens inside
/// the order-placement transaction via [`CouponService::redeem`].
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Normalizes a raw code: trimmed, uppercased, `A-Z0-9` only.
    pub fn normalize_code(raw: &str) -> Result<String, ServiceError> {
        let code = raw.trim().to_uppercase();
        if code.is_empty() || !CODE_RE.is_match(&code) {
            return Err(ServiceError::ValidationError(
                "Coupon code must contain only letters and digits".to_string(),
            ));
        }
        Ok(code)
    }

    /// Evaluates a code for a user against a subtotal without mutating
    /// anything. Shared by the cart preview and order placement.
    #[instrument(skip(self, conn))]
    pub async fn evaluate_code<C>(
        &self,
        conn: &C,
        user_id: Uuid,
        raw_code: &str,
        subtotal: Decimal,
    ) -> Result<(coupon::Model, CouponEvaluation), ServiceError>
    where
        C: ConnectionTrait,
    {
        let code = Self::normalize_code(raw_code)?;

        let coupon = coupon::Entity::find()
            .filter(coupon::Column::Code.eq(&code))
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidInput("Invalid or inactive coupon code".to_string())
            })?;

        let used = coupon_usage::Entity::find()
            .filter(coupon_usage::Column::CouponId.eq(coupon.id))
            .filter(coupon_usage::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .is_some();

        let evaluation = evaluate(&coupon, subtotal, used, Utc::now())?;
        Ok((coupon, evaluation))
    }

    /// Records a redemption: bumps `used_count` and inserts the usage row.
    /// Must run on the order-placement transaction.
    pub async fn redeem<C>(
        &self,
        conn: &C,
        coupon: &coupon::Model,
        user_id: Uuid,
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut active: coupon::ActiveModel = coupon.clone().into();
        active.used_count = Set(coupon.used_count + 1);
        active.updated_at = Set(Utc::now());
        active.update(conn).await?;

        coupon_usage::ActiveModel {
            id: Set(Uuid::new_v4()),
            coupon_id: Set(coupon.id),
            user_id: Set(user_id),
            used_at: Set(Utc::now()),
        }
        .insert(conn)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_coupons(&self) -> Result<Vec<coupon::Model>, ServiceError> {
        Ok(coupon::Entity::find()
            .order_by_desc(coupon::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_coupon(&self, input: CouponInput) -> Result<coupon::Model, ServiceError> {
        let code = Self::normalize_code(&input.code)?;
        validate_value(&input)?;

        let existing = coupon::Entity::find()
            .filter(coupon::Column::Code.eq(&code))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::InvalidInput(format!(
                "Coupon '{}' already exists",
                code
            )));
        }

        let now = Utc::now();
        let model = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            discount_type: Set(input.discount_type),
            discount_value: Set(input.discount_value),
            min_order_amount: Set(input.min_order_amount),
            max_discount_amount: Set(input.max_discount_amount),
            is_active: Set(input.is_active),
            valid_from: Set(input.valid_from.unwrap_or(now)),
            valid_until: Set(Some(
                input.valid_until.unwrap_or(now + Duration::days(30)),
            )),
            usage_limit: Set(input.usage_limit),
            used_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::CouponCreated(model.id))
            .await;
        info!("Created coupon {}", model.code);

        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update_coupon(
        &self,
        id: Uuid,
        input: CouponInput,
    ) -> Result<coupon::Model, ServiceError> {
        let existing = coupon::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Coupon not found".to_string()))?;

        let code = Self::normalize_code(&input.code)?;
        validate_value(&input)?;

        if code != existing.code {
            let taken = coupon::Entity::find()
                .filter(coupon::Column::Code.eq(&code))
                .filter(coupon::Column::Id.ne(id))
                .one(&*self.db)
                .await?;
            if taken.is_some() {
                return Err(ServiceError::InvalidInput(format!(
                    "Coupon '{}' already exists",
                    code
                )));
            }
        }

        let valid_from = input.valid_from.unwrap_or(existing.valid_from);
        let valid_until = input.valid_until.or(existing.valid_until);

        let mut active: coupon::ActiveModel = existing.into();
        active.code = Set(code);
        active.discount_type = Set(input.discount_type);
        active.discount_value = Set(input.discount_value);
        active.min_order_amount = Set(input.min_order_amount);
        active.max_discount_amount = Set(input.max_discount_amount);
        active.is_active = Set(input.is_active);
        active.valid_from = Set(valid_from);
        active.valid_until = Set(valid_until);
        active.usage_limit = Set(input.usage_limit);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_coupon(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = coupon::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Coupon not found".to_string()));
        }
        Ok(())
    }
}

fn validate_value(input: &CouponInput) -> Result<(), ServiceError> {
    if input.discount_value <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Discount value must be positive".to_string(),
        ));
    }
    if input.min_order_amount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Minimum order amount cannot be negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_coupon() -> coupon::Model {
        let now = Utc::now();
        coupon::Model {
            id: Uuid::new_v4(),
            code: "SWEET10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            min_order_amount: Decimal::ZERO,
            max_discount_amount: None,
            is_active: true,
            valid_from: now - Duration::days(1),
            valid_until: Some(now + Duration::days(30)),
            usage_limit: None,
            used_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn percentage_discount_is_computed() {
        let result = evaluate(&base_coupon(), dec!(200), false, Utc::now()).unwrap();
        assert_eq!(result.discount_amount, dec!(20));
        assert_eq!(result.total_after_discount, dec!(180));
    }

    #[test]
    fn percentage_discount_is_clamped_by_cap() {
        let mut coupon = base_coupon();
        coupon.max_discount_amount = Some(dec!(5));
        let result = evaluate(&coupon, dec!(200), false, Utc::now()).unwrap();
        assert_eq!(result.discount_amount, dec!(5));
        assert_eq!(result.total_after_discount, dec!(195));
    }

    #[test]
    fn fixed_discount_ignores_cap() {
        let mut coupon = base_coupon();
        coupon.discount_type = DiscountType::Fixed;
        coupon.discount_value = dec!(50);
        coupon.max_discount_amount = Some(dec!(5));
        let result = evaluate(&coupon, dec!(200), false, Utc::now()).unwrap();
        assert_eq!(result.discount_amount, dec!(50));
    }

    #[test]
    fn fixed_discount_may_exceed_subtotal() {
        let mut coupon = base_coupon();
        coupon.discount_type = DiscountType::Fixed;
        coupon.discount_value = dec!(50);
        let result = evaluate(&coupon, dec!(30), false, Utc::now()).unwrap();
        assert_eq!(result.total_after_discount, dec!(-20));
    }

    #[test]
    fn inactive_coupon_is_rejected() {
        let mut coupon = base_coupon();
        coupon.is_active = false;
        let err = evaluate(&coupon, dec!(100), false, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("Invalid or inactive"));
    }

    #[test]
    fn not_yet_valid_coupon_is_rejected() {
        let mut coupon = base_coupon();
        coupon.valid_from = Utc::now() + Duration::days(1);
        let err = evaluate(&coupon, dec!(100), false, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("not yet valid"));
    }

    #[test]
    fn expired_coupon_is_rejected() {
        let mut coupon = base_coupon();
        coupon.valid_until = Some(Utc::now() - Duration::hours(1));
        let err = evaluate(&coupon, dec!(100), false, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn usage_limit_is_enforced() {
        let mut coupon = base_coupon();
        coupon.usage_limit = Some(2);
        coupon.used_count = 2;
        let err = evaluate(&coupon, dec!(100), false, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("usage limit"));
    }

    #[test]
    fn repeat_use_by_same_user_is_rejected() {
        let err = evaluate(&base_coupon(), dec!(100), true, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("already used"));
    }

    #[test]
    fn minimum_order_amount_is_enforced() {
        let mut coupon = base_coupon();
        coupon.min_order_amount = dec!(100);
        let err = evaluate(&coupon, dec!(99.5), false, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("Minimum order amount"));

        assert!(evaluate(&coupon, dec!(100), false, Utc::now()).is_ok());
    }

    #[test]
    fn check_order_stops_at_first_failure() {
        // Inactive wins over every later rule.
        let mut coupon = base_coupon();
        coupon.is_active = false;
        coupon.valid_from = Utc::now() + Duration::days(1);
        coupon.min_order_amount = dec!(1000);
        let err = evaluate(&coupon, dec!(1), true, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("Invalid or inactive"));
    }

    #[test]
    fn code_normalization() {
        assert_eq!(
            CouponService::normalize_code(" sweet10 ").unwrap(),
            "SWEET10"
        );
        assert!(CouponService::normalize_code("BAD CODE").is_err());
        assert!(CouponService::normalize_code("").is_err());
        assert!(CouponService::normalize_code("SAVE-10").is_err());
    }
}
