//! Audit log database migrations
//!
//! Applied to logs.duckdb by the logging service, tracked in that
//! database's own sys_migrations table.

/// Log migrations in application order, embedded at compile time.
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
