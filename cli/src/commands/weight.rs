use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use slank_core::models::WeightEntry;
use slank_core::service::Tracker;

use super::helpers::parse_date;

pub(crate) fn cmd_weight_log(
    tracker: &Tracker,
    person: &str,
    value: f64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let entry = WeightEntry {
        date: parse_date(date)?,
        weight: value,
    };
    tracker.add_weight(person, &entry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }
    let date = entry.date;
    println!("Logged {value} kg for {person} on {date}");
    Ok(())
}

pub(crate) fn cmd_weight_history(tracker: &Tracker, person: &str, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight (kg)")]
        weight: String,
        #[tabled(rename = "Change (kg)")]
        delta: String,
    }

    let progress = tracker.weight_progress(person)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
        return Ok(());
    }

    if progress.is_empty() {
        eprintln!("No weight entries for '{person}'");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = progress
        .iter()
        .map(|p| HistoryRow {
            date: p.date.to_string(),
            weight: format!("{:.1}", p.weight),
            delta: format!("{:+.1}", p.delta),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_weight_challenge(
    tracker: &Tracker,
    person_a: &str,
    person_b: &str,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct StandingRow {
        #[tabled(rename = "Person")]
        person: String,
        #[tabled(rename = "Start (kg)")]
        start: String,
        #[tabled(rename = "Current (kg)")]
        current: String,
        #[tabled(rename = "Change (kg)")]
        delta: String,
    }

    let challenge = tracker.challenge(person_a, person_b)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&challenge)?);
        return Ok(());
    }

    let rows: Vec<StandingRow> = challenge
        .standings
        .iter()
        .map(|s| StandingRow {
            person: s.person.clone(),
            start: format!("{:.1}", s.start_weight),
            current: format!("{:.1}", s.current_weight),
            delta: format!("{:+.1}", s.delta),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    let leader = &challenge.leader;
    println!("\n{leader} is in the lead!");
    Ok(())
}
