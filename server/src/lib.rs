pub mod classes;
pub mod config;
pub mod context;
pub mod error;
pub mod inference;
pub mod routes;

pub use classes::{ClassLabel, ClassTable};
pub use config::Config;
pub use context::AppContext;
pub use error::ServiceErr;
pub use routes::router;
