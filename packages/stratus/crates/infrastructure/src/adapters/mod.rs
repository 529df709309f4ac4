pub mod asset_storage;
pub mod parameter_store;
