use chrono::{Duration, NaiveDate, NaiveDateTime};
use letting_crm::config::LettingsConfig;
use letting_crm::workflows::lettings::{
    Clock, CustomerId, FixedClock, InMemoryInstructionRepository, InstructionId,
    InstructionStatus, Lead, LeadId, LeadStatus, LeaseConversion, LettingInstructionService,
    LettingServiceError, NewInstruction, PropertyId, PropertyRef, SystemClock,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type SharedService = Arc<LettingInstructionService<InMemoryInstructionRepository>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) lettings: LettingsConfig,
    pub(crate) service: SharedService,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_amount(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw.trim()).map_err(|err| format!("failed to parse '{raw}' as an amount ({err})"))
}

pub(crate) fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

/// Service over a fresh in-memory repository, pinned to `today` when given.
pub(crate) fn in_memory_service(today: Option<NaiveDate>) -> SharedService {
    let clock: Arc<dyn Clock> = match today {
        Some(day) => Arc::new(FixedClock(day.and_hms_opt(9, 0, 0).unwrap_or(start_of_day(day)))),
        None => Arc::new(SystemClock),
    };
    Arc::new(LettingInstructionService::with_clock(
        Arc::new(InMemoryInstructionRepository::default()),
        clock,
    ))
}

pub(crate) fn property(id: u64, name: &str, address: &str) -> PropertyRef {
    PropertyRef {
        id: PropertyId(id),
        name: name.to_string(),
        address_line1: Some(address.to_string()),
    }
}

pub(crate) fn intake(property: PropertyRef, target_rent: Decimal) -> NewInstruction {
    NewInstruction {
        property,
        target_rent: Some(target_rent),
        target_lease_length_months: Some(12),
        expected_vacancy_date: None,
        description: None,
        created_by: None,
    }
}

/// Loads a small portfolio spread across every board column.
pub(crate) fn seed_portfolio(service: &SharedService) -> Result<Vec<InstructionId>, LettingServiceError> {
    let today = service.today();
    let days_ago = |days: i64| today - Duration::days(days);
    let mut lead_ids = 1..;
    let mut lead = |name: &str, status: LeadStatus| {
        let id = LeadId(lead_ids.next().unwrap_or_default());
        Lead::new(id, name, start_of_day(today)).with_status(status)
    };
    let mut seeded = Vec::new();

    let slow = service.create(intake(
        property(101, "Flat 1, Boden House", "14 Canal Street"),
        Decimal::new(1250, 0),
    ))?;
    service.start_advertising(slow.id(), Some(days_ago(45)))?;
    service.add_lead(slow.id(), lead("Tom Reid", LeadStatus::Enquiry))?;
    service.add_lead(slow.id(), lead("Amelia Hart", LeadStatus::ViewingScheduled))?;
    service.add_lead(slow.id(), lead("Jonas Berg", LeadStatus::Lost))?;
    seeded.push(slow.id());

    let offer = service.create(intake(
        property(102, "12 Mill Lane", "12 Mill Lane"),
        Decimal::new(1100, 0),
    ))?;
    service.start_advertising(offer.id(), Some(days_ago(6)))?;
    service.add_lead(offer.id(), lead("Priya Shah", LeadStatus::ApplicationSubmitted))?;
    service.accept_offer(offer.id(), Decimal::new(1090, 0), Some("Holding deposit received"))?;
    seeded.push(offer.id());

    let let_out = service.create(intake(
        property(103, "The Old Forge", "2 Forge Yard"),
        Decimal::new(1650, 0),
    ))?;
    service.start_advertising(let_out.id(), Some(days_ago(360)))?;
    let tenant_lead = lead("Grace Okafor", LeadStatus::ContractsComplete);
    let tenant_lead_id = tenant_lead.id;
    service.add_lead(let_out.id(), tenant_lead)?;
    service.accept_offer(let_out.id(), Decimal::new(1600, 0), None)?;
    for status in [
        InstructionStatus::Referencing,
        InstructionStatus::InContracts,
        InstructionStatus::ContractsComplete,
    ] {
        service.transition(let_out.id(), status)?;
    }
    service.update_lead_status(let_out.id(), tenant_lead_id, LeadStatus::Converted)?;
    service.convert_to_active_lease(
        let_out.id(),
        LeaseConversion {
            tenant: CustomerId(9001),
            lease_start: days_ago(325),
            lease_end: today + Duration::days(40),
            rent: Decimal::new(1600, 0),
            deposit: Decimal::new(1846, 0),
        },
    )?;
    seeded.push(let_out.id());

    let fresh = service.create(intake(
        property(104, "Unit 4, Canal Wharf", "Canal Wharf"),
        Decimal::new(980, 0),
    ))?;
    seeded.push(fresh.id());

    let withdrawn = service.create(intake(
        property(105, "9 Harbour Row", "9 Harbour Row"),
        Decimal::new(1400, 0),
    ))?;
    service.cancel(withdrawn.id(), "Owner withdrew instruction")?;
    seeded.push(withdrawn.id());

    Ok(seeded)
}
