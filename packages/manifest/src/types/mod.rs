pub mod app;
pub mod component;
pub mod validation;

pub use app::*;
pub use component::*;
pub use validation::*;
