//! Resource graph compiler: declare components, link them, deploy the graph.

pub use application;
pub use domain;
pub use infrastructure;
