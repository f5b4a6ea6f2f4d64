// SQL query constants for repositories
// Single source of truth for the SELECT column lists

/// SQL query fragments for the triggers table
pub mod trigger_queries {
    pub const SELECT_ALL_COLUMNS: &str =
        "id, type, name, schedule, endpoint, is_active, created_at, updated_at";
}

/// SQL query fragments for the event_logs table
pub mod event_log_queries {
    pub const SELECT_ALL_COLUMNS: &str =
        "id, trigger_id, status, payload, is_archived, executed_at";
}
