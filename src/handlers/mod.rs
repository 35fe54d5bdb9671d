pub mod auth;
pub mod cakes;
pub mod carts;
pub mod catalog;
pub mod common;
pub mod coupons;
pub mod images;
pub mod orders;
pub mod profile;
pub mod users;
