pub mod category;
pub mod product;
pub mod user;

pub use category::Category;
pub use product::{Dimensions, Product};
pub use user::{normalize_email, Role, User, UserProfile};
