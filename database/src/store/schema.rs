//! DDL for the two tables. JSON payloads are stored as serialized text.

pub fn create_metadata_table(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            round_id INTEGER PRIMARY KEY,
            init_datetime TEXT,
            start_datetime TEXT,
            shutdown_datetime TEXT,
            end_datetime TEXT,
            commit_hash TEXT,
            game_mode TEXT,
            game_mode_result TEXT,
            end_state TEXT,
            map_name TEXT,
            server_id TEXT
        )"
    )
}

pub fn create_rounds_table(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            round_id INTEGER PRIMARY KEY,
            init_datetime TEXT,
            start_datetime TEXT,
            shutdown_datetime TEXT,
            end_datetime TEXT,
            commit_hash TEXT,
            game_mode TEXT,
            game_mode_result TEXT,
            end_state TEXT,
            map_name TEXT,
            server_id TEXT,
            playercounts TEXT,
            stats TEXT
        )"
    )
}
