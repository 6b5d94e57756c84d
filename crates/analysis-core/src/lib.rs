pub mod decision;
pub mod error;
pub mod schema;
pub mod summaries;
pub mod traits;
pub mod types;


pub use decision::*;
pub use error::*;
pub use schema::{FromSchema, Model};
pub use summaries::*;
pub use traits::*;
pub use types::*;
