use crate::infra::{
    in_memory_service, intake, parse_amount, parse_date, property, seed_portfolio,
    start_of_day, SharedService,
};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use letting_crm::config::{AppConfig, LettingsConfig};
use letting_crm::error::AppError;
use letting_crm::workflows::enquiries::{LeadCsvImporter, LeadImport};
use letting_crm::workflows::lettings::{
    AdvertisingDetails, CustomerId, InstructionBoard, InstructionStatus, InstructionSummary,
    LeadId, LeadStatus, LeaseConversion, LettingInstruction,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::PathBuf;

const SAMPLE_ENQUIRIES: &str = "Name,Email,Phone,Status,Enquired At\n\
Priya Shah,priya.shah@example.com,07700 900123,application-submitted,\n\
Tom Reid,tom.reid@example.com,07700 900456,viewing-scheduled,\n\
Amelia Hart,amelia.hart@example.com,,enquiry,\n\
Jonas Berg,jonas.berg@example.com,,lost,\n";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the demo date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Enquiry CSV to attach instead of the built-in sample.
    #[arg(long)]
    pub(crate) leads_csv: Option<PathBuf>,
    /// Agreed monthly rent.
    #[arg(long, value_parser = parse_amount)]
    pub(crate) rent: Option<Decimal>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct BoardArgs {
    /// Reporting date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct LeadImportArgs {
    /// Portal enquiry export (Name, Email, Phone, Status, Enquired At)
    #[arg(long)]
    pub(crate) file: PathBuf,
    /// Id given to the first imported lead
    #[arg(long, default_value_t = 1)]
    pub(crate) first_id: u64,
    /// Date used for rows without an enquiry time (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) imported_on: Option<NaiveDate>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        leads_csv,
        rent,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let rent = rent.unwrap_or_else(|| Decimal::new(1250, 0));
    let service = in_memory_service(Some(today));

    println!("Letting instruction demo ({today})");
    let created = service.create(intake(
        property(42, "Flat 3, Boden House", "14 Canal Street"),
        rent,
    ))?;
    let id = created.id();
    println!(
        "- Instruction {} received for {}",
        created.instruction_reference.as_deref().unwrap_or("-"),
        created.property().name
    );

    let advertised = service.advertise(
        id,
        AdvertisingDetails {
            start_date: Some(today - Duration::days(21)),
            key_features: Some("Two double bedrooms, allocated parking".to_string()),
            marketing_notes: Some("Portal listing and window card".to_string()),
        },
    )?;
    print_step(&advertised);
    if let Some(features) = advertised.target.key_features.as_deref() {
        println!("  Key features: {features}");
    }

    let import = match leads_csv {
        Some(path) => LeadCsvImporter::from_path(path, LeadId(1), start_of_day(today))?,
        None => LeadCsvImporter::from_reader(
            SAMPLE_ENQUIRIES.as_bytes(),
            LeadId(1),
            start_of_day(today),
        )?,
    };
    let applicant = import
        .leads
        .iter()
        .find(|lead| lead.status() == LeadStatus::ApplicationSubmitted)
        .map(|lead| lead.id);
    let skipped = import.skipped;
    let with_leads = import.attach_to(&service, id)?;
    println!(
        "- Attached {} enquiries ({} skipped)",
        with_leads.leads().len(),
        skipped
    );

    match service.transition(id, InstructionStatus::ActiveLease) {
        Ok(_) => println!("  Unexpected: skipped straight to an active lease"),
        Err(err) => println!("  Guard check: {err}"),
    }

    print_step(&service.accept_offer(id, rent, Some("Offer accepted at asking rent"))?);
    for status in [
        InstructionStatus::Referencing,
        InstructionStatus::InContracts,
        InstructionStatus::ContractsComplete,
    ] {
        print_step(&service.transition(id, status)?);
    }

    if let Some(lead_id) = applicant {
        for status in [
            LeadStatus::Referencing,
            LeadStatus::InContracts,
            LeadStatus::ContractsComplete,
        ] {
            service.update_lead_status(id, lead_id, status)?;
        }
        let current = service.get(id)?;
        if let Some(lead) = current.leads().iter().find(|lead| lead.id == lead_id) {
            let readiness = lead.conversion_readiness();
            println!(
                "- {} ready to convert: {}",
                lead.name,
                if readiness.is_ready() { "yes" } else { "no" }
            );
            for issue in &readiness.issues {
                println!("    - {}", issue.summary());
            }
        }
        service.update_lead_status(id, lead_id, LeadStatus::Converted)?;
    }

    let lease_start = today + Duration::days(7);
    let let_out = service.convert_to_active_lease(
        id,
        LeaseConversion {
            tenant: CustomerId(5001),
            lease_start,
            lease_end: lease_start + Duration::days(364),
            rent,
            deposit: (rent * Decimal::new(12, 0) / Decimal::new(52, 0) * Decimal::new(5, 0))
                .round_dp(2),
        },
    )?;
    print_step(&let_out);
    print_metrics(&let_out);

    println!();
    render_board(&service.board()?);
    Ok(())
}

pub(crate) fn run_board(args: BoardArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let thresholds = AppConfig::load()?.lettings;
    let service = in_memory_service(Some(today));
    seed_portfolio(&service)?;

    println!("Instruction board ({today})");
    render_board(&service.board()?);
    println!();
    render_summary(&service.summary()?);
    println!();
    render_alerts(&service, &thresholds)?;
    Ok(())
}

pub(crate) fn run_lead_import(args: LeadImportArgs) -> Result<(), AppError> {
    let imported_on = args
        .imported_on
        .unwrap_or_else(|| Local::now().date_naive());
    let import =
        LeadCsvImporter::from_path(&args.file, LeadId(args.first_id), start_of_day(imported_on))?;

    println!(
        "Parsed {} leads from {} ({} rows skipped)",
        import.leads.len(),
        args.file.display(),
        import.skipped
    );
    for lead in &import.leads {
        println!(
            "  - #{} {} [{}] {}",
            lead.id,
            lead.name,
            lead.status().label(),
            lead.email.as_deref().unwrap_or("no email")
        );
    }

    println!("Pipeline:");
    for (status, count) in pipeline_counts(&import) {
        println!("  - {}: {}", status.label(), count);
    }
    Ok(())
}

fn pipeline_counts(import: &LeadImport) -> BTreeMap<LeadStatus, usize> {
    let mut counts = BTreeMap::new();
    for lead in &import.leads {
        *counts.entry(lead.status()).or_insert(0) += 1;
    }
    counts
}

fn print_step(instruction: &LettingInstruction) {
    println!(
        "- {} -> {} (v{})",
        instruction.instruction_reference.as_deref().unwrap_or("-"),
        instruction.status().label(),
        instruction.version()
    );
}

fn print_metrics(instruction: &LettingInstruction) {
    let metrics = instruction.metrics();
    println!("Metrics:");
    match metrics.days_to_fill {
        Some(days) => println!("  - Days to fill: {days}"),
        None => println!("  - Days to fill: n/a"),
    }
    println!(
        "  - Enquiries: {} | Viewings: {}",
        metrics.number_of_enquiries, metrics.number_of_viewings
    );
    match metrics.conversion_rate {
        Some(rate) => println!("  - Conversion rate: {rate:.1}%"),
        None => println!("  - Conversion rate: n/a"),
    }
}

fn render_board(board: &InstructionBoard) {
    for column in &board.columns {
        println!("{} ({})", column.column_label, column.cards.len());
        for card in &column.cards {
            println!(
                "  - {} | {} | {} | {} enquiries | {} days advertising",
                card.reference.as_deref().unwrap_or("-"),
                card.property_name,
                card.status_label,
                card.enquiries,
                card.days_advertising
            );
        }
    }
}

fn render_summary(summary: &InstructionSummary) {
    println!(
        "Summary: {} instructions | {} marketing | {} active leases",
        summary.total, summary.active_marketing, summary.active_leases
    );
    for entry in summary.by_status.iter().filter(|entry| entry.count > 0) {
        println!("  - {}: {}", entry.status_label, entry.count);
    }
    if let Some(days) = summary.average_days_to_fill {
        println!("  Average days to fill: {days:.1}");
    }
    if let Some(rate) = summary.average_conversion_rate {
        println!("  Average conversion rate: {rate:.1}%");
    }
}

fn render_alerts(service: &SharedService, thresholds: &LettingsConfig) -> Result<(), AppError> {
    println!("Alerts:");
    for instruction in service.stale_listings(thresholds.stale_listing_days)? {
        println!(
            "  - Stale listing: {} ({} days advertising)",
            instruction.property().name,
            instruction.days_advertising(service.today())
        );
    }
    for instruction in service.low_performing(thresholds.low_conversion_threshold)? {
        println!(
            "  - Low conversion: {} ({:.1}%)",
            instruction.property().name,
            instruction.metrics().conversion_rate.unwrap_or_default()
        );
    }
    for instruction in service.leases_expiring(thresholds.lease_expiry_window_days)? {
        if let Some(lease) = instruction.lease() {
            println!(
                "  - Lease ending: {} on {}",
                instruction.property().name,
                lease.end_date
            );
        }
    }
    Ok(())
}
