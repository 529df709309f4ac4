pub mod bucket;
pub mod function;
pub mod queue;

pub use bucket::{Bucket, BucketArgs};
pub use function::{Function, FunctionArgs};
pub use queue::{Queue, QueueArgs};
