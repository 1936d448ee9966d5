mod compiler;
mod database;
mod discovery;
mod types;

pub use compiler::{compile_def_database, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{DefDatabase, EnemyDef, EnemyDefId};
pub use types::{ContentPaths, ContentPlanError, ContentPlanRequest};
