use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use supplyline_auth::{Principal, Role};
use supplyline_catalog::SupplyItemId;
use supplyline_core::UserId;
use supplyline_events::{EventEnvelope, InMemoryEventBus};
use supplyline_infra::{InMemorySupplyStore, NewItem, NewParty, RequestFilter, SupplyService};
use supplyline_parties::{PartyId, PartyKind};
use supplyline_requests::RequestStatus;

type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;
type Service = SupplyService<Arc<InMemorySupplyStore>, Bus>;

struct Setup {
    service: Service,
    manager: Principal,
    customer: Principal,
    customer_id: PartyId,
    item_id: SupplyItemId,
}

fn setup(stock: i64) -> Setup {
    let store = Arc::new(InMemorySupplyStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let service = SupplyService::new(store, bus);

    let admin = Principal::new(UserId::new(), Role::Admin);
    let manager = Principal::new(UserId::new(), Role::SupplyManager);
    let customer_user = UserId::new();
    let customer_id = service
        .register_party(
            &admin,
            NewParty {
                kind: PartyKind::Customer,
                name: "Bench Clinic".to_string(),
                contact: None,
                user_id: Some(customer_user),
            },
        )
        .unwrap();
    let customer = Principal::new(customer_user, Role::Customer).with_profile(customer_id.into());

    let item_id = service
        .create_item(
            &manager,
            NewItem {
                sku: "BENCH-001".to_string(),
                name: "Gauze pads".to_string(),
                description: None,
                category: "wound-care".to_string(),
                unit_of_measure: "pack".to_string(),
                reorder_level: None,
                unit_cost: 300,
                lead_time_days: None,
                expiration_date: None,
            },
        )
        .unwrap();
    service.receive_stock(&manager, item_id, stock).unwrap();

    Setup {
        service,
        manager,
        customer,
        customer_id,
        item_id,
    }
}

fn bench_request_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_lifecycle");
    group.sample_size(500);

    group.bench_function("create_request", |b| {
        let s = setup(i64::MAX / 2);
        b.iter(|| {
            s.service
                .create_request(&s.customer, s.item_id, s.customer_id, black_box(1))
                .unwrap()
        });
    });

    group.bench_function("create_and_approve", |b| {
        let s = setup(i64::MAX / 2);
        b.iter(|| {
            let request_id = s
                .service
                .create_request(&s.customer, s.item_id, s.customer_id, 1)
                .unwrap();
            s.service.approve_request(&s.manager, black_box(request_id)).unwrap();
        });
    });

    group.bench_function("create_and_reject", |b| {
        let s = setup(100);
        b.iter(|| {
            let request_id = s
                .service
                .create_request(&s.customer, s.item_id, s.customer_id, 1)
                .unwrap();
            s.service
                .reject_request(&s.manager, black_box(request_id), None)
                .unwrap();
        });
    });

    group.finish();
}

fn bench_request_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_listing");

    for request_count in [100usize, 1_000, 5_000] {
        let s = setup(request_count as i64);
        for _ in 0..request_count {
            s.service
                .create_request(&s.customer, s.item_id, s.customer_id, 1)
                .unwrap();
        }

        group.throughput(Throughput::Elements(request_count as u64));
        group.bench_with_input(
            BenchmarkId::new("pending_for_customer", request_count),
            &request_count,
            |b, _| {
                b.iter(|| {
                    s.service
                        .list_requests(
                            &s.customer,
                            RequestFilter {
                                status: Some(RequestStatus::Pending),
                                ..RequestFilter::default()
                            },
                        )
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_request_lifecycle, bench_request_listing);
criterion_main!(benches);
