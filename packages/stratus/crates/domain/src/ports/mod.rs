pub mod asset_storage;
pub mod backend;
pub mod parameter_store;

pub use asset_storage::AssetStorage;
pub use backend::{
    ProvisioningBackend, ResourceArgs, ResourceOptions, ResourceRef, ResourceRegistration,
};
pub use parameter_store::ParameterStore;
