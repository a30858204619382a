// Database layer module: PostgreSQL pool, migrations and repositories

pub mod pool;
pub mod repositories;

pub use pool::DbPool;
pub use repositories::ArticleRepository;
