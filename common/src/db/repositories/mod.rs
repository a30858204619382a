// Repository layer for database operations

pub mod article;

pub use article::ArticleRepository;
