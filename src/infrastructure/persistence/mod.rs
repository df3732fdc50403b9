//! Interaction and conversation persistence

mod in_memory;
mod migrations;
mod postgres;

pub use in_memory::{InMemoryConversationRepository, InMemoryInteractionRepository};
pub use migrations::{run_migrations, Migration, PostgresMigrator};
pub use postgres::{
    connect_pool, PostgresConfig, PostgresConversationRepository, PostgresInteractionRepository,
};
