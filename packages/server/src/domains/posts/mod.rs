//! Stored channel posts.

pub mod model;
pub mod store;

pub use model::{Post, PostView, PostsPage};
pub use store::{PgPostStore, PostStore};
