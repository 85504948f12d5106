use super::common::*;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::workflows::lettings::domain::{CustomerId, InstructionId, LeadId, PropertyId};
use crate::workflows::lettings::instruction::LettingInstruction;
use crate::workflows::lettings::instruction_status::InstructionStatus;
use crate::workflows::lettings::lead_status::LeadStatus;
use crate::workflows::lettings::repository::{
    InMemoryInstructionRepository, InstructionRepository, RepositoryError,
};
use crate::workflows::lettings::service::{
    AdvertisingDetails, FixedClock, LeaseConversion, LettingInstructionService,
    LettingServiceError,
};

fn lease_from(start: chrono::NaiveDate, end: chrono::NaiveDate) -> LeaseConversion {
    LeaseConversion {
        tenant: CustomerId(900),
        lease_start: start,
        lease_end: end,
        rent: Decimal::new(1200, 0),
        deposit: Decimal::new(1384, 0),
    }
}

fn let_instruction(
    service: &LettingInstructionService<
        crate::workflows::lettings::repository::InMemoryInstructionRepository,
    >,
    id: InstructionId,
    lease: LeaseConversion,
) {
    service
        .start_advertising(id, Some(date(2025, 4, 1)))
        .expect("advertise");
    service
        .accept_offer(id, Decimal::new(1200, 0), Some("holding deposit paid"))
        .expect("accept");
    for status in [
        InstructionStatus::Referencing,
        InstructionStatus::InContracts,
        InstructionStatus::ContractsComplete,
    ] {
        service.transition(id, status).expect("pipeline step");
    }
    service
        .convert_to_active_lease(id, lease)
        .expect("lease conversion");
}

#[test]
fn create_assigns_reference_and_audit_stamps() {
    let (service, repository) = build_service();

    let created = service.create(new_instruction(42)).expect("create");

    assert_eq!(
        created.instruction_reference.as_deref(),
        Some("INST-42-20250602")
    );
    assert_eq!(created.status(), InstructionStatus::InstructionReceived);
    assert_eq!(created.created_at(), at(today()));
    assert_eq!(created.updated_at(), Some(at(today())));
    assert_eq!(created.target.lease_length_months, Some(12));
    assert!(repository
        .fetch(created.id())
        .expect("fetch")
        .is_some());
}

#[test]
fn create_rejects_second_active_instruction_for_property() {
    let (service, _) = build_service();
    let first = service.create(new_instruction(42)).expect("create");

    match service.create(new_instruction(42)) {
        Err(LettingServiceError::ActiveInstructionExists {
            property,
            reference,
        }) => {
            assert_eq!(property, PropertyId(42));
            assert_eq!(Some(reference), first.instruction_reference);
        }
        other => panic!("expected active instruction conflict, got {other:?}"),
    }
}

#[test]
fn reference_gains_suffix_when_date_repeats() {
    let (service, _) = build_service();
    let first = service.create(new_instruction(42)).expect("create");
    service.close(first.id(), "WITHDRAWN").expect("close");

    let second = service.create(new_instruction(42)).expect("create again");

    assert_eq!(
        second.instruction_reference.as_deref(),
        Some("INST-42-20250602-1")
    );
    let history = service.history(PropertyId(42)).expect("history");
    assert_eq!(history.len(), 2);
}

#[test]
fn create_validates_amounts_and_lease_length() {
    let (service, _) = build_service();

    let mut negative = new_instruction(1);
    negative.target_rent = Some(Decimal::new(-1, 0));
    assert!(matches!(
        service.create(negative),
        Err(LettingServiceError::NegativeAmount {
            field: "target_rent"
        })
    ));

    let mut zero_length = new_instruction(1);
    zero_length.target_lease_length_months = Some(0);
    assert!(matches!(
        service.create(zero_length),
        Err(LettingServiceError::InvalidLeaseLength)
    ));
}

#[test]
fn illegal_transition_leaves_stored_row_untouched() {
    let (service, repository) = build_service();
    let created = service.create(new_instruction(42)).expect("create");

    assert!(matches!(
        service.mark_offer_made(created.id()),
        Err(LettingServiceError::Transition(_))
    ));

    let stored = repository
        .fetch(created.id())
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.status(), InstructionStatus::InstructionReceived);
    assert_eq!(stored.version(), created.version());
}

#[test]
fn racing_writers_from_same_status_let_only_one_through() {
    let (service, _) = build_service();
    let service = Arc::new(service);
    let created = service.create(new_instruction(42)).expect("create");
    let id = created.id();

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = Arc::clone(&service);
                scope.spawn(move || service.start_advertising(id, None))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("writer thread"))
            .collect()
    });

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results.iter().any(|result| matches!(
        result,
        Err(LettingServiceError::Transition(_))
            | Err(LettingServiceError::Repository(
                RepositoryError::StaleVersion { .. }
            ))
    )));
    assert_eq!(
        service.get(id).expect("get").status(),
        InstructionStatus::Advertising
    );
}

#[test]
fn full_lifecycle_through_service_persists_lease() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");

    let_instruction(
        &service,
        created.id(),
        lease_from(date(2025, 5, 31), date(2026, 5, 30)),
    );

    let stored = service.get(created.id()).expect("get");
    assert_eq!(stored.status(), InstructionStatus::ActiveLease);
    assert_eq!(stored.metrics().days_to_fill, Some(60));
    assert_eq!(stored.lease().map(|lease| lease.signed_date), Some(today()));
    assert!(stored
        .internal_notes()
        .unwrap_or_default()
        .contains("Offer Accepted: holding deposit paid"));
    assert!(service
        .active_for_property(PropertyId(42))
        .expect("lookup")
        .is_none());
}

#[test]
fn convert_rejects_lease_ending_before_it_starts() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");

    assert!(matches!(
        service.convert_to_active_lease(
            created.id(),
            lease_from(date(2025, 6, 1), date(2025, 6, 1))
        ),
        Err(LettingServiceError::InvalidLeaseDates { .. })
    ));
}

#[test]
fn relist_reopens_the_same_instruction() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");
    let_instruction(
        &service,
        created.id(),
        lease_from(date(2025, 5, 31), date(2026, 5, 30)),
    );

    let relisted = service.relist(created.id()).expect("relist");

    assert_eq!(relisted.status(), InstructionStatus::InstructionReceived);
    assert!(relisted.previous_lease().is_some());
    assert_eq!(
        service
            .active_for_property(PropertyId(42))
            .expect("lookup")
            .map(|instruction| instruction.id()),
        Some(created.id())
    );
}

#[test]
fn leads_are_only_taken_while_marketing() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");

    assert!(matches!(
        service.add_lead(created.id(), lead(1, LeadStatus::Enquiry)),
        Err(LettingServiceError::LeadsNotAccepted {
            status: InstructionStatus::InstructionReceived
        })
    ));

    service
        .start_advertising(created.id(), None)
        .expect("advertise");
    let updated = service
        .add_lead(created.id(), lead(1, LeadStatus::Enquiry))
        .expect("lead accepted");

    let stored_lead = &updated.leads()[0];
    assert_eq!(stored_lead.property_id, Some(PropertyId(42)));
    assert_eq!(stored_lead.letting_instruction(), Some(created.id()));
    assert_eq!(updated.metrics().number_of_enquiries, 1);
    assert_eq!(updated.metrics().conversion_rate, Some(0.0));
}

#[test]
fn lead_status_updates_follow_the_lead_pipeline() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");
    service
        .start_advertising(created.id(), None)
        .expect("advertise");
    service
        .add_lead(created.id(), lead(1, LeadStatus::Enquiry))
        .expect("lead");

    assert!(matches!(
        service.update_lead_status(created.id(), LeadId(1), LeadStatus::Converted),
        Err(LettingServiceError::Transition(_))
    ));

    let updated = service
        .update_lead_status(created.id(), LeadId(1), LeadStatus::ViewingScheduled)
        .expect("viewing scheduled");
    assert_eq!(updated.leads()[0].status(), LeadStatus::ViewingScheduled);

    assert!(matches!(
        service.update_lead_status(created.id(), LeadId(99), LeadStatus::Lost),
        Err(LettingServiceError::LeadNotFound(LeadId(99)))
    ));

    let removed = service
        .remove_lead(created.id(), LeadId(1))
        .expect("remove lead");
    assert!(removed.leads().is_empty());
}

#[test]
fn reports_flag_stale_low_converting_and_expiring_instructions() {
    let (service, _) = build_service();

    let stale = service.create(new_instruction(1)).expect("create");
    service
        .start_advertising(stale.id(), Some(date(2025, 4, 1)))
        .expect("advertise");
    service
        .add_lead(stale.id(), lead(1, LeadStatus::Enquiry))
        .expect("lead");

    let fresh = service.create(new_instruction(2)).expect("create");
    service
        .start_advertising(fresh.id(), Some(date(2025, 5, 28)))
        .expect("advertise");

    let expiring = service.create(new_instruction(3)).expect("create");
    let_instruction(
        &service,
        expiring.id(),
        lease_from(date(2024, 7, 15), date(2025, 7, 14)),
    );

    let stale_ids: Vec<_> = service
        .stale_listings(30)
        .expect("stale")
        .iter()
        .map(|instruction| instruction.id())
        .collect();
    assert_eq!(stale_ids, vec![stale.id()]);

    let low: Vec<_> = service
        .low_performing(10.0)
        .expect("low performing")
        .iter()
        .map(|instruction| instruction.id())
        .collect();
    assert_eq!(low, vec![stale.id()]);

    let ending: Vec<_> = service
        .leases_expiring(60)
        .expect("expiring")
        .iter()
        .map(|instruction| instruction.id())
        .collect();
    assert_eq!(ending, vec![expiring.id()]);

    let summary = service.summary().expect("summary");
    assert_eq!(summary.total, 3);
    assert_eq!(summary.active_marketing, 2);
    assert_eq!(summary.active_leases, 1);
}

#[test]
fn repository_outage_surfaces_as_service_error() {
    let service = LettingInstructionService::new(Arc::new(UnavailableRepository));

    assert!(matches!(
        service.get(InstructionId(1)),
        Err(LettingServiceError::Repository(
            RepositoryError::Unavailable(_)
        ))
    ));
    assert!(service.create(new_instruction(1)).is_err());
}

#[test]
fn missing_instruction_is_not_found() {
    let (service, _) = build_service();
    assert!(matches!(
        service.get(InstructionId(u64::MAX)),
        Err(LettingServiceError::Repository(RepositoryError::NotFound))
    ));
}

#[test]
fn concurrent_creates_for_one_property_store_a_single_active_row() {
    let repository = Arc::new(GatedRepository::new(2));
    let service =
        LettingInstructionService::with_clock(repository.clone(), Arc::new(FixedClock(at(today()))));

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| scope.spawn(|| service.create(new_instruction(42))))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("creator thread"))
            .collect()
    });

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results.iter().any(|result| matches!(
        result,
        Err(LettingServiceError::ActiveInstructionExists {
            property: PropertyId(42),
            ..
        })
    )));
    let active_rows = repository
        .all()
        .expect("rows")
        .into_iter()
        .filter(|instruction| instruction.status().is_active_instruction())
        .count();
    assert_eq!(active_rows, 1);
}

#[test]
fn relist_is_refused_while_a_newer_instruction_is_active() {
    let (service, _) = build_service();
    let let_out = service.create(new_instruction(42)).expect("create");
    let_instruction(
        &service,
        let_out.id(),
        lease_from(date(2025, 5, 31), date(2026, 5, 30)),
    );
    let next_cycle = service.create(new_instruction(42)).expect("new cycle");

    match service.relist(let_out.id()) {
        Err(LettingServiceError::ActiveInstructionExists {
            property,
            reference,
        }) => {
            assert_eq!(property, PropertyId(42));
            assert_eq!(Some(reference), next_cycle.instruction_reference);
        }
        other => panic!("expected active instruction conflict, got {other:?}"),
    }

    assert_eq!(
        service.get(let_out.id()).expect("get").status(),
        InstructionStatus::ActiveLease
    );
    assert!(matches!(
        service.transition(let_out.id(), InstructionStatus::InstructionReceived),
        Err(LettingServiceError::ActiveInstructionExists { .. })
    ));
    let active: Vec<_> = service
        .active_instructions()
        .expect("active")
        .iter()
        .map(|instruction| instruction.id())
        .collect();
    assert_eq!(active, vec![next_cycle.id()]);
}

#[test]
fn instruction_ids_continue_after_rows_already_stored() {
    let repository = Arc::new(InMemoryInstructionRepository::default());
    repository
        .insert(LettingInstruction::new(
            InstructionId(10),
            property(99),
            date(2025, 1, 6),
            None,
            at(date(2025, 1, 6)),
        ))
        .expect("existing row");
    let service =
        LettingInstructionService::with_clock(repository, Arc::new(FixedClock(at(today()))));

    let created = service.create(new_instruction(42)).expect("create");

    assert_eq!(created.id(), InstructionId(11));
}

#[test]
fn duplicate_lead_ids_are_rejected() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");
    service
        .start_advertising(created.id(), None)
        .expect("advertise");
    service
        .add_lead(created.id(), lead(7, LeadStatus::Interested))
        .expect("first lead");

    assert!(matches!(
        service.add_lead(created.id(), lead(7, LeadStatus::Enquiry)),
        Err(LettingServiceError::DuplicateLead(LeadId(7)))
    ));

    let stored = service.get(created.id()).expect("get");
    assert_eq!(stored.leads().len(), 1);
    assert_eq!(stored.metrics().number_of_enquiries, 1);

    let removed = service
        .remove_lead(created.id(), LeadId(7))
        .expect("remove lead");
    assert!(removed.leads().is_empty());
}

#[test]
fn oversized_report_windows_are_errors() {
    let (service, _) = build_service();
    service.create(new_instruction(42)).expect("create");

    for days in [300_000_000, i64::MAX, i64::MIN] {
        assert!(matches!(
            service.stale_listings(days),
            Err(LettingServiceError::ReportWindowOutOfRange { .. })
        ));
        assert!(matches!(
            service.leases_expiring(days),
            Err(LettingServiceError::ReportWindowOutOfRange { .. })
        ));
    }
}

#[test]
fn advertise_records_marketing_copy() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");

    let advertised = service
        .advertise(
            created.id(),
            AdvertisingDetails {
                start_date: Some(date(2025, 5, 20)),
                key_features: Some("South-facing balcony".to_string()),
                marketing_notes: Some("Lead with the canal view".to_string()),
            },
        )
        .expect("advertise");

    assert_eq!(advertised.status(), InstructionStatus::Advertising);
    assert_eq!(advertised.advertising_start_date(), Some(date(2025, 5, 20)));
    assert_eq!(
        advertised.target.key_features.as_deref(),
        Some("South-facing balcony")
    );
    assert_eq!(
        advertised.marketing_notes.as_deref(),
        Some("Lead with the canal view")
    );
}

#[test]
fn listing_queries_filter_by_status_activity_and_search_term() {
    let (service, _) = build_service();

    let mut mill = new_instruction(1);
    mill.property.name = "12 Mill Lane".to_string();
    mill.property.address_line1 = Some("Mill Lane".to_string());
    let mill = service.create(mill).expect("create");

    let forge = service.create(new_instruction(2)).expect("create");
    service
        .start_advertising(forge.id(), None)
        .expect("advertise");

    let withdrawn = service.create(new_instruction(3)).expect("create");
    service.close(withdrawn.id(), "WITHDRAWN").expect("close");

    let ids = |instructions: Vec<LettingInstruction>| -> Vec<InstructionId> {
        instructions.iter().map(|instruction| instruction.id()).collect()
    };

    assert_eq!(
        ids(service
            .by_status(InstructionStatus::Advertising)
            .expect("by status")),
        vec![forge.id()]
    );

    let mut active = ids(service.active_instructions().expect("active"));
    active.sort();
    let mut expected = vec![mill.id(), forge.id()];
    expected.sort();
    assert_eq!(active, expected);

    assert_eq!(ids(service.search("mill").expect("search")), vec![mill.id()]);
    let mut by_address = ids(service.search("CANAL street").expect("search"));
    by_address.sort();
    assert_eq!(by_address, vec![forge.id(), withdrawn.id()]);
    assert!(service.search("   ").expect("search").is_empty());
}
