pub mod chat;
pub mod description;
pub mod events;
pub mod rarity;
pub mod store;
