mod feeds;
mod posts;
mod schema;
mod store;
mod types;
mod users;

pub use schema::Database;
pub use store::FeedStore;
pub use types::{DatabaseError, Feed, InsertPostError, NewPost, Post, User};
