pub mod bootstrap_service;
pub mod components;
pub mod synth_service;

pub use bootstrap_service::BootstrapProvisioner;
pub use components::{Bucket, BucketArgs, Function, FunctionArgs, Queue, QueueArgs};
pub use synth_service::{deploy, diff, remove, synthesize, DeclaredApp};
