pub mod bootstrap;
pub mod component;
pub mod deferred;
pub mod dynamic;
pub mod error;
pub mod graph;
pub mod link;
pub mod naming;
pub mod ports;
pub mod state;
pub mod transform;

pub use bootstrap::{BootstrapRecord, RegistryRecord};
pub use component::{
    ComponentHandle, ComponentSpec, ComponentVersion, RemovalPolicy, Synthesis, SynthesisConfig,
    SynthesisOutput,
};
pub use deferred::{Deferred, Input, Inputs, Resolver, Template};
pub use dynamic::{CreateResult, DynamicProvider, UpdateResult};
pub use error::{Result, SynthError};
pub use graph::ExecutionDag;
pub use link::{
    permission, LinkBundle, LinkDefinition, LinkRef, Linkable, LinkableComponent,
    PermissionSource, PermissionStatement,
};
pub use naming::{NamingAuthority, NamingTable};
pub use ports::{AssetStorage, ParameterStore, ProvisioningBackend, ResourceArgs, ResourceRef};
pub use state::{Change, ChangeKind, StateSnapshot};
pub use transform::{transform, Transform, Transformation};
