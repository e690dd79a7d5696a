mod memory;
mod surreal;

pub use memory::InMemoryAchievementStore;
pub use surreal::SurrealAchievementStore;
