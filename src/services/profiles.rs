use crate::{
    entities::{address, profile, user},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Profile and address-book management.
#[derive(Clone)]
pub struct ProfileService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub addresses: Vec<address::Model>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AddressInput {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub is_default: bool,
}

impl ProfileService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn get_profile(&self, user_id: Uuid) -> Result<ProfileView, ServiceError> {
        let profile = self.find_profile(user_id).await?;
        let addresses = self.addresses_of(profile.id).await?;
        Ok(view_of(profile, addresses))
    }

    /// Updates name/phone/email. An email change re-checks account
    /// uniqueness and updates both the user row and the profile copy.
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<ProfileView, ServiceError> {
        let profile = self.find_profile(user_id).await?;

        let txn = self.db.begin().await?;

        if let Some(email) = &input.email {
            let email = email.trim().to_lowercase();
            if email != profile.email {
                let taken = user::Entity::find()
                    .filter(user::Column::Email.eq(&email))
                    .filter(user::Column::Id.ne(user_id))
                    .one(&txn)
                    .await?;
                if taken.is_some() {
                    return Err(ServiceError::InvalidInput(
                        "Email already in use".to_string(),
                    ));
                }

                let user = user::Entity::find_by_id(user_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
                let mut active: user::ActiveModel = user.into();
                active.email = Set(email);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?;
            }
        }

        let profile_id = profile.id;
        let mut active: profile::ActiveModel = profile.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(phone) = input.phone {
            active.phone = Set(phone);
        }
        if let Some(email) = input.email {
            active.email = Set(email.trim().to_lowercase());
        }
        active.updated_at = Set(Utc::now());
        let profile = active.update(&txn).await?;

        txn.commit().await?;

        let addresses = self.addresses_of(profile_id).await?;
        Ok(view_of(profile, addresses))
    }

    /// Adds an address. Setting it as default clears every other default
    /// in the same transaction.
    #[instrument(skip(self, input))]
    pub async fn add_address(
        &self,
        user_id: Uuid,
        input: AddressInput,
    ) -> Result<ProfileView, ServiceError> {
        let profile = self.find_profile(user_id).await?;

        let txn = self.db.begin().await?;
        if input.is_default {
            self.clear_defaults(&txn, profile.id).await?;
        }

        address::ActiveModel {
            id: Set(Uuid::new_v4()),
            profile_id: Set(profile.id),
            street: Set(input.street),
            city: Set(input.city),
            state: Set(input.state),
            zip: Set(input.zip),
            is_default: Set(input.is_default),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        let addresses = self.addresses_of(profile.id).await?;
        Ok(view_of(profile, addresses))
    }

    #[instrument(skip(self, input))]
    pub async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        input: AddressInput,
    ) -> Result<ProfileView, ServiceError> {
        let profile = self.find_profile(user_id).await?;

        let existing = address::Entity::find_by_id(address_id)
            .filter(address::Column::ProfileId.eq(profile.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))?;

        let txn = self.db.begin().await?;
        if input.is_default && !existing.is_default {
            self.clear_defaults(&txn, profile.id).await?;
        }

        let mut active: address::ActiveModel = existing.into();
        active.street = Set(input.street);
        active.city = Set(input.city);
        active.state = Set(input.state);
        active.zip = Set(input.zip);
        active.is_default = Set(input.is_default);
        active.update(&txn).await?;
        txn.commit().await?;

        let addresses = self.addresses_of(profile.id).await?;
        Ok(view_of(profile, addresses))
    }

    #[instrument(skip(self))]
    pub async fn delete_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<ProfileView, ServiceError> {
        let profile = self.find_profile(user_id).await?;

        let existing = address::Entity::find_by_id(address_id)
            .filter(address::Column::ProfileId.eq(profile.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))?;

        address::Entity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;

        let addresses = self.addresses_of(profile.id).await?;
        Ok(view_of(profile, addresses))
    }

    pub(crate) async fn find_profile(&self, user_id: Uuid) -> Result<profile::Model, ServiceError> {
        profile::Entity::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User profile not found".to_string()))
    }

    pub(crate) async fn addresses_of(
        &self,
        profile_id: Uuid,
    ) -> Result<Vec<address::Model>, ServiceError> {
        Ok(address::Entity::find()
            .filter(address::Column::ProfileId.eq(profile_id))
            .order_by_asc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    async fn clear_defaults<C>(&self, conn: &C, profile_id: Uuid) -> Result<(), ServiceError>
    where
        C: sea_orm::ConnectionTrait,
    {
        address::Entity::update_many()
            .col_expr(
                address::Column::IsDefault,
                sea_orm::sea_query::Expr::value(false),
            )
            .filter(address::Column::ProfileId.eq(profile_id))
            .filter(address::Column::IsDefault.eq(true))
            .exec(conn)
            .await?;
        Ok(())
    }
}

fn view_of(profile: profile::Model, addresses: Vec<address::Model>) -> ProfileView {
    ProfileView {
        id: profile.id,
        name: profile.name,
        email: profile.email,
        phone: profile.phone,
        addresses,
    }
}
