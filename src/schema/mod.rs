mod migration;
mod registry;
mod revision;

pub use migration::{AppliedRevision, MigrationRunner};
pub use registry::{list_tables, SchemaRegistry, TableSpec};
pub use revision::{find_revision, revision_history, validate_history, MigrationStep, Revision};
