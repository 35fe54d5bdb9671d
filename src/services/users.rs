use crate::{
    auth::{self, AuthService, ROLE_ADMIN, ROLE_USER},
    entities::{address, cart, cart_item, profile, user},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Account lifecycle: signup, login, password changes and the admin-only
/// user management surface.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
    event_sender: Arc<EventSender>,
}

/// Public view of a user, shared by signup/login responses and the admin
/// listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth: Arc<AuthService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            auth,
            event_sender,
        }
    }

    /// Registers a new user with its linked profile and returns a bearer
    /// token for the fresh account.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn signup(&self, input: SignupInput) -> Result<AuthResponse, ServiceError> {
        let email = input.email.trim().to_lowercase();

        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(&email))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::InvalidInput(
                "User already exists".to_string(),
            ));
        }

        let password_hash = auth::hash_password(&input.password)?;
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let txn = self.db.begin().await?;

        let user = user::ActiveModel {
            id: Set(user_id),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            role: Set(ROLE_USER.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let profile = profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            name: Set(input.name.trim().to_string()),
            email: Set(email),
            phone: Set(input.phone.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        let token = self.auth.generate_token(user.id, &user.role)?;
        self.event_sender
            .send_or_log(Event::UserRegistered(user.id))
            .await;
        info!("Registered user {}", user.id);

        Ok(AuthResponse {
            token,
            user: view_of(&user, &profile),
        })
    }

    /// Verifies credentials and issues a token. An unknown email is a 404,
    /// a wrong password a 400, matching the storefront contract.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ServiceError> {
        let email = email.trim().to_lowercase();

        let user = user::Entity::find()
            .filter(user::Column::Email.eq(&email))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        if !auth::verify_password(password, &user.password_hash)? {
            return Err(ServiceError::InvalidInput(
                "Invalid credentials".to_string(),
            ));
        }

        let profile = profile::Entity::find()
            .filter(profile::Column::UserId.eq(user.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User profile not found".to_string()))?;

        let token = self.auth.generate_token(user.id, &user.role)?;
        self.event_sender
            .send_or_log(Event::UserLoggedIn(user.id))
            .await;

        Ok(AuthResponse {
            token,
            user: view_of(&user, &profile),
        })
    }

    /// Re-hashes the password after verifying the current one.
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        if new_password.len() < 6 {
            return Err(ServiceError::ValidationError(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        if !auth::verify_password(current_password, &user.password_hash)? {
            return Err(ServiceError::InvalidInput(
                "Current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(auth::hash_password(new_password)?);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        Ok(())
    }

    /// Admin listing of all users joined with their profiles.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<UserView>, ServiceError> {
        let rows = user::Entity::find()
            .find_also_related(profile::Entity)
            .order_by_asc(user::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(user, profile)| match profile {
                Some(profile) => view_of(&user, &profile),
                None => UserView {
                    id: user.id,
                    name: String::new(),
                    email: user.email,
                    phone: String::new(),
                    role: user.role,
                },
            })
            .collect())
    }

    /// Admin role change; only `user` and `admin` are accepted.
    #[instrument(skip(self))]
    pub async fn set_role(&self, user_id: Uuid, role: &str) -> Result<UserView, ServiceError> {
        if role != ROLE_USER && role != ROLE_ADMIN {
            return Err(ServiceError::ValidationError(format!(
                "Invalid role '{}'",
                role
            )));
        }

        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let mut active: user::ActiveModel = user.into();
        active.role = Set(role.to_string());
        active.updated_at = Set(Utc::now());
        let user = active.update(&*self.db).await?;

        let profile = profile::Entity::find()
            .filter(profile::Column::UserId.eq(user.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User profile not found".to_string()))?;

        Ok(view_of(&user, &profile))
    }

    /// Admin delete; cascades the profile, its addresses and any cart.
    /// Placed orders are kept for the books.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let txn = self.db.begin().await?;

        if let Some(profile) = profile::Entity::find()
            .filter(profile::Column::UserId.eq(user.id))
            .one(&txn)
            .await?
        {
            address::Entity::delete_many()
                .filter(address::Column::ProfileId.eq(profile.id))
                .exec(&txn)
                .await?;
            profile::Entity::delete_by_id(profile.id).exec(&txn).await?;
        }

        if let Some(cart) = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user.id))
            .one(&txn)
            .await?
        {
            cart_item::Entity::delete_many()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .exec(&txn)
                .await?;
            cart::Entity::delete_by_id(cart.id).exec(&txn).await?;
        }

        user::Entity::delete_by_id(user.id).exec(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::UserDeleted(user_id))
            .await;
        info!("Deleted user {}", user_id);

        Ok(())
    }
}

fn view_of(user: &user::Model, profile: &profile::Model) -> UserView {
    UserView {
        id: user.id,
        name: profile.name.clone(),
        email: user.email.clone(),
        phone: profile.phone.clone(),
        role: user.role.clone(),
    }
}
