pub mod model;
pub mod scheduler;
pub mod store;
