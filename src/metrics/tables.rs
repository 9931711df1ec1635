//! Tracked tables
//!
//! The fixed list of SORMAS tables whose row counts are exported. Entries are
//! kept sorted by metric name; that order is the render order everywhere.

/// A table (or view) counted on every refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedTable {
    /// Short name, as used in logs
    pub name: &'static str,
    /// Full exported metric name
    pub metric: &'static str,
    /// Database relation the rows are counted in
    pub table: &'static str,
    /// `# HELP` text
    pub help: &'static str,
}

/// Number of tracked tables
pub const TRACKED_COUNT: usize = 7;

/// All tracked tables, sorted by metric name
pub static TRACKED_TABLES: [TrackedTable; TRACKED_COUNT] = [
    TrackedTable {
        name: "cases",
        metric: "sormas_usage_cases",
        table: "cases",
        help: "The cases in sormas database.",
    },
    TrackedTable {
        name: "contacts",
        metric: "sormas_usage_contacts",
        table: "contact",
        help: "The contacts in sormas database.",
    },
    TrackedTable {
        name: "events",
        metric: "sormas_usage_events",
        table: "events",
        help: "The events in sormas database.",
    },
    TrackedTable {
        name: "persons",
        metric: "sormas_usage_persons",
        table: "person",
        help: "The persons in sormas database.",
    },
    TrackedTable {
        name: "sessions",
        metric: "sormas_usage_sessions",
        table: "pg_stat_activity",
        help: "The sessions in sormas database.",
    },
    TrackedTable {
        name: "tasks",
        metric: "sormas_usage_tasks",
        table: "task",
        help: "The tasks in sormas database.",
    },
    TrackedTable {
        name: "users",
        metric: "sormas_usage_users",
        table: "users",
        help: "The users in sormas database.",
    },
];

/// Position of a tracked table by short name
pub fn index_of(name: &str) -> Option<usize> {
    TRACKED_TABLES.iter().position(|t| t.name == name)
}
