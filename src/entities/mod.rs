//! sea-orm entity definitions, one module per table.

pub mod address;
pub mod availability;
pub mod cake;
pub mod cart;
pub mod cart_item;
pub mod category;
pub mod coupon;
pub mod coupon_usage;
pub mod delivery_option;
pub mod dietary_preference;
pub mod flavor;
pub mod image;
pub mod order;
pub mod order_item;
pub mod profile;
pub mod shape;
pub mod size;
pub mod sponge_type;
pub mod tag;
pub mod user;
