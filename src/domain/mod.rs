//! Domain types and workflows.

pub mod cart;
pub mod category;
pub mod checkout;
pub mod inventory;
pub mod order;
pub mod product;
pub mod user;
