use rand::Rng;
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const RULES_HEADER: [&str; 8] = [
    "name",
    "scope",
    "alliance_id",
    "project_type",
    "product",
    "percent",
    "applies_on",
    "active",
];

pub const EVENTS_HEADER: [&str; 6] = [
    "source_event_id",
    "trigger_type",
    "alliance_id",
    "project_type",
    "product",
    "base_amount",
];

pub fn write_csv(path: &Path, header: &[&str], rows: &[&[&str]]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(*row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `rows` closing events spread over alliances A1..A10 and two project types.
pub fn generate_events(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(EVENTS_HEADER)?;

    let mut rng = rand::thread_rng();
    for i in 1..=rows {
        let alliance = format!("A{}", rng.gen_range(1..=10));
        let project_type = if rng.gen_bool(0.5) { "casa" } else { "departamento" };
        let amount = format!("{}.{:02}", rng.gen_range(1..1_000_000), rng.gen_range(0..100));
        wtr.write_record([
            format!("deal-{i}").as_str(),
            "on_close",
            alliance.as_str(),
            project_type,
            "",
            amount.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
