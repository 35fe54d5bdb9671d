pub mod cakes;
pub mod carts;
pub mod catalog;
pub mod coupons;
pub mod images;
pub mod orders;
pub mod profiles;
pub mod users;
