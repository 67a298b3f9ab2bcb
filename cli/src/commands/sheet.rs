use std::path::Path;

use anyhow::Result;
use tabled::{builder::Builder, settings::Style};

use slank_core::cache::SheetCache;
use slank_core::service::Tracker;
use slank_core::table::Table;

pub(crate) fn cmd_sheet_show(tracker: &Tracker, name: &str, json: bool) -> Result<()> {
    let table = tracker.sheet(name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    let mut builder = Builder::default();
    builder.push_record(table.columns());
    for row in table.rows() {
        builder.push_record(row);
    }
    let rendered = builder.build().with(Style::rounded()).to_string();
    println!("{rendered}");
    Ok(())
}

/// Overwrite a remote sheet with the contents of a local CSV file.
pub(crate) fn cmd_sheet_push(tracker: &Tracker, name: &str, file: &Path, json: bool) -> Result<()> {
    let table = Table::read_csv_file(file)?;
    tracker.save_sheet(name, &table)?;

    let rows = table.len();
    if json {
        println!("{}", serde_json::json!({ "sheet": name, "rows": rows }));
        return Ok(());
    }
    println!("Pushed {rows} row(s) to sheet '{name}'");
    Ok(())
}

pub(crate) fn cmd_cache_clear(cache: &SheetCache, json: bool) -> Result<()> {
    let removed = cache.clear_all()?;

    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
        return Ok(());
    }
    println!("Removed {removed} cached sheet file(s)");
    Ok(())
}
