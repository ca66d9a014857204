//! # CLI Execution Functions
//!
//! Execution logic for each subcommand, kept out of `main.rs`. Server-side
//! commands open the workbook directly; the rest go through a `DataClient`
//! against a running endpoint, exactly as the dashboard does.

use anyhow::Result;
use lifeflow::client::DataClient;
use lifeflow::config::LifeflowConfig;
use lifeflow::export::{self, ExportRange};
use lifeflow::query::{self, RecordQuery, SortDir, SortKey, StatusFilter};
use lifeflow::records::{DonorDraft, DonorRecord, InventoryLevels};
use lifeflow::sheet::SheetStore;
use std::path::PathBuf;
use tracing::info;

use super::{Cli, Commands};

/// Settings file plus command-line overrides, validated.
pub fn load_config(cli: &Cli) -> Result<LifeflowConfig> {
    let mut config = LifeflowConfig::load(&cli.config)?;
    if let Some(endpoint) = &cli.endpoint {
        config.client.endpoint = endpoint.clone();
    }
    config.validate()?;
    Ok(config)
}

// ── Server side ─────────────────────────────────────────────────

pub fn run_serve(
    mut config: LifeflowConfig,
    port: Option<u16>,
    workbook: Option<PathBuf>,
    bind: Option<String>,
) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(workbook) = workbook {
        config.server.workbook = workbook;
    }
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    info!(
        workbook = %config.server.workbook.display(),
        donor_sheet = %config.server.donor_sheet,
        inventory_sheet = %config.server.inventory_sheet,
        "lifeflow starting"
    );
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(lifeflow::endpoint::run(config.server))
}

pub fn run_init(cli: &Cli, config: LifeflowConfig, workbook: Option<PathBuf>) -> Result<()> {
    let path = workbook.unwrap_or_else(|| config.server.workbook.clone());
    let existed = path.exists();
    let store = SheetStore::open(&path, config.server.layout())?;
    let donors = store.donor_records()?.len();
    if existed {
        eprintln!("Workbook {} already exists ({} donors)", path.display(), donors);
    } else {
        eprintln!("Created workbook {}", path.display());
    }
    if !cli.config.exists() {
        config.save(&cli.config)?;
        eprintln!("Wrote default settings to {}", cli.config.display());
    }
    Ok(())
}

// ── Client side ─────────────────────────────────────────────────

/// The full record for `(name, phone)` if listed, else a bare identity that reconciles to nothing.
fn target_record(records: &[DonorRecord], name: &str, phone: &str) -> DonorRecord {
    records
        .iter()
        .find(|r| r.donor_name == name && r.phone_number == phone)
        .cloned()
        .unwrap_or_else(|| DonorRecord {
            donor_name: name.to_string(),
            phone_number: phone.to_string(),
            ..Default::default()
        })
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}

fn print_table(page: &query::Page<'_, &DonorRecord>) {
    println!(
        "{:<22} {:<14} {:<10} {:<10} {:<12} {:<6} STATUS",
        "NAME", "PHONE", "CHANNEL", "TYPE", "DATE", "TIME"
    );
    for r in page.items {
        println!(
            "{:<22} {:<14} {:<10} {:<10} {:<12} {:<6} {}",
            truncate(&r.donor_name, 22),
            truncate(&r.phone_number, 14),
            truncate(&r.channel, 10),
            truncate(&r.donation_type, 10),
            truncate(&r.appointment_date, 12),
            truncate(&r.time, 6),
            r.status
        );
    }
    let (first, last) = page.showing();
    println!(
        "Showing {} to {} of {} donors (page {} of {})",
        first,
        last,
        page.total_items,
        page.page,
        page.total_pages.max(1)
    );
}

pub fn run_client_command(cli: &Cli, config: LifeflowConfig) -> Result<()> {
    // Parse local arguments before touching the network.
    let list_query = match &cli.command {
        Commands::List {
            search,
            status,
            sort,
            desc,
            ..
        } => {
            let status: StatusFilter = status.parse().map_err(anyhow::Error::msg)?;
            let sort = match sort {
                Some(key) => {
                    let key: SortKey = key.parse().map_err(anyhow::Error::msg)?;
                    Some((key, if *desc { SortDir::Desc } else { SortDir::Asc }))
                }
                None => None,
            };
            Some(RecordQuery {
                search: search.clone(),
                status,
                sort,
            })
        }
        _ => None,
    };
    let export_range = match &cli.command {
        Commands::Export { days, .. } => days.parse::<ExportRange>().map_err(anyhow::Error::msg)?,
        _ => ExportRange::All,
    };

    let client = DataClient::new(&config.client)?;
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        match &cli.command {
            Commands::List {
                page, page_size, ..
            } => {
                let snapshot = client.fetch_snapshot().await?;
                let view = list_query.unwrap_or_default();
                let rows = view.apply(&snapshot.donor_records);
                let size = page_size.unwrap_or(config.client.page_size);
                print_table(&query::paginate(&rows, *page, size));
            }
            Commands::Summary => {
                let summary = client.fetch_summary().await?;
                let snapshot = client.fetch_snapshot().await?;
                let inv = &snapshot.inventory;
                println!("Total donors:           {}", summary.total_donors);
                println!("Confirmed appointments: {}", summary.confirmed_appointments);
                println!("Pending appointments:   {}", summary.pending_appointments);
                println!("Confirmation rate:      {}%", summary.confirmation_rate);
                println!(
                    "Inventory:              {} units (blood {}, plasma {}, platelets {})",
                    summary.total_units,
                    inv.blood_units_available,
                    inv.plasma_units_available,
                    inv.platelet_units_available
                );
                if !inv.last_updated.is_empty() {
                    println!("Last updated:           {}", inv.last_updated);
                }
            }
            Commands::Add {
                name,
                phone,
                channel,
                donation_type,
                date,
                time,
                status,
            } => {
                let snapshot = client.fetch_snapshot().await?;
                let draft = DonorDraft {
                    donor_name: Some(name.clone()),
                    phone_number: Some(phone.clone()),
                    channel: Some(channel.clone()),
                    donation_type: Some(donation_type.clone()),
                    appointment_date: Some(date.clone()),
                    time: Some(time.clone()),
                    status: Some(status.clone()),
                };
                let added = client.add_record(&snapshot.donor_records, &draft).await?;
                let row = added.ack.row_index().unwrap_or(added.expected_row);
                eprintln!("Added {} on row {}", name, row);
            }
            Commands::SetStatus {
                name,
                phone,
                status,
            } => {
                let snapshot = client.fetch_snapshot().await?;
                let target = target_record(&snapshot.donor_records, name, phone);
                client
                    .set_record_status(&snapshot.donor_records, &target, status)
                    .await?;
                eprintln!("{} is now {}", name, status);
            }
            Commands::Edit {
                name,
                phone,
                new_name,
                new_phone,
                channel,
                donation_type,
                date,
                time,
                status,
            } => {
                let snapshot = client.fetch_snapshot().await?;
                let target = target_record(&snapshot.donor_records, name, phone);
                let mut draft = DonorDraft::from(&target);
                let overrides = [
                    (&mut draft.donor_name, new_name),
                    (&mut draft.phone_number, new_phone),
                    (&mut draft.channel, channel),
                    (&mut draft.donation_type, donation_type),
                    (&mut draft.appointment_date, date),
                    (&mut draft.time, time),
                    (&mut draft.status, status),
                ];
                for (field, value) in overrides {
                    if let Some(v) = value {
                        *field = Some(v.clone());
                    }
                }
                client
                    .edit_record(&snapshot.donor_records, &target, &draft)
                    .await?;
                eprintln!("Updated {}", name);
            }
            Commands::Delete { name, phone } => {
                let snapshot = client.fetch_snapshot().await?;
                let target = target_record(&snapshot.donor_records, name, phone);
                client.remove_record(&snapshot.donor_records, &target).await?;
                eprintln!("Deleted {}", name);
            }
            Commands::Inventory {
                blood,
                plasma,
                platelets,
            } => {
                let ack = client
                    .update_inventory(InventoryLevels {
                        blood_units: *blood,
                        plasma_units: *plasma,
                        platelet_units: *platelets,
                    })
                    .await?;
                match ack.inventory() {
                    Some(inv) => eprintln!(
                        "Inventory: blood {}, plasma {}, platelets {} (updated {})",
                        inv.blood_units, inv.plasma_units, inv.platelet_units, inv.last_updated
                    ),
                    None => eprintln!("Inventory update sent"),
                }
            }
            Commands::Export { out, .. } => {
                let snapshot = client.fetch_snapshot().await?;
                let today = export::today();
                let selected = export::select(&snapshot.donor_records, export_range, today);
                let count = selected.len();
                let path = out
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(export::export_filename(today)));
                std::fs::write(&path, export::render_csv(selected))?;
                eprintln!("Exported {} donors to {}", count, path.display());
            }
            Commands::Serve { .. } | Commands::Init { .. } => {
                anyhow::bail!("not a client command")
            }
        }
        Ok::<(), anyhow::Error>(())
    })
}
