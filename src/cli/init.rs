use std::path::PathBuf;

use crate::db::validate_query;
use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_path, shellexpand_path};

pub fn run(
    database: Option<String>,
    query_file: Option<String>,
    org: Option<i64>,
    export_dir: Option<String>,
    cache_ttl: Option<u64>,
) -> Result<()> {
    let mut settings = load_settings();

    if let Some(db) = database {
        let resolved = shellexpand_path(&db);
        if !PathBuf::from(&resolved).exists() {
            println!("Note: {resolved} does not exist yet.");
        }
        settings.database = Some(resolved);
    }
    if let Some(file) = query_file {
        let query = std::fs::read_to_string(shellexpand_path(&file))?;
        validate_query(&query)?;
        settings.query = Some(query);
    }
    if let Some(id) = org {
        settings.default_org_id = Some(id);
    }
    if let Some(dir) = export_dir {
        settings.export_dir = shellexpand_path(&dir);
    }
    if let Some(ttl) = cache_ttl {
        settings.cache_ttl_secs = ttl;
    }

    save_settings(&settings)?;
    std::fs::create_dir_all(&settings.export_dir)?;

    println!("Saved settings to {}", settings_path().display());
    Ok(())
}
