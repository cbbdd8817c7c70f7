pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;

pub use memory::{InMemoryContentRepository, InMemoryScheduleRepository};
pub use models::{ContentItem, ContentKind, GenerationParams, ScheduleDefinition, TranslatedFields};
pub use postgres::{PgContentRepository, PgScheduleRepository};
pub use repository::{ContentRepository, ScheduleRepository};
