use std::path::PathBuf;

use crate::db::validate_query;
use crate::error::Result;
use crate::settings::{load_settings, settings_path};

pub fn run() -> Result<()> {
    let settings = load_settings();

    println!("Settings:   {}", settings_path().display());
    match &settings.database {
        Some(db) => {
            let state = if PathBuf::from(db).exists() { "" } else { " (not found)" };
            println!("Database:   {db}{state}");
        }
        None => println!("Database:   (not set)"),
    }
    match &settings.query {
        Some(q) => {
            let state = match validate_query(q) {
                Ok(()) => "ok".to_string(),
                Err(e) => e.to_string(),
            };
            println!("Query:      {} lines, {state}", q.lines().count());
        }
        None => println!("Query:      (not set)"),
    }
    match settings.default_org_id {
        Some(id) => println!("Org:        {id}"),
        None => println!("Org:        all organizations"),
    }
    println!("Cache TTL:  {}s", settings.cache_ttl_secs);
    println!("Exports:    {}", settings.export_dir);

    if settings.database.is_none() || settings.query.is_none() {
        println!();
        println!("Run `conferencia init --database <file> --query-file <file>` to set up.");
    }
    Ok(())
}
