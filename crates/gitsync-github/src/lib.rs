pub mod blob;
pub mod client;
pub mod commit;
pub mod refs;
pub mod repo;
pub mod tree;

pub use client::{GitHubClient, GitHubClientConfig};
