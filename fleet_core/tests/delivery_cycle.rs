//! End-to-end delivery cycle tests.
//!
//! These tests drive the full service through a load, the active cycle,
//! and the recharge back to full:
//! - tick by tick, for exact counts
//! - with the real ticker, for the fixed-delay loop

use fleet_core::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DRONE1: &str = "Drone-1";
const MED1: &str = "MED_1";

type Service =
    DronesService<InMemoryDroneRegistry, InMemoryMedicationCatalog, InMemoryEventLogStore>;

fn setup(config: Config) -> Service {
    logging::init_test();
    let service = DronesService::new(
        Arc::new(InMemoryDroneRegistry::new()),
        Arc::new(InMemoryMedicationCatalog::with_defaults()),
        Arc::new(InMemoryEventLogStore::new()),
        config,
    )
    .expect("valid config");

    for number in [DRONE1, "Drone-2", "Drone-3"] {
        service
            .register_drone(DroneSpec {
                number: number.into(),
                model: ModelType::Middleweight,
                weight_limit: 300,
                battery_capacity: 100,
            })
            .unwrap();
    }
    service
}

fn assert_available_battery_logs(service: &Service, available: usize, battery: u8, logs: usize) {
    assert_eq!(service.check_available_drones().unwrap().len(), available);
    assert_eq!(service.check_battery_level(DRONE1).unwrap(), battery);
    assert_eq!(service.check_logs(DRONE1).unwrap().len(), logs);
}

fn assert_battery_in_range(service: &Service) {
    for drone in service.registry().list().unwrap() {
        assert!(drone.battery_capacity <= 100, "{:?}", drone);
    }
}

#[test]
fn test_delivery_cycle_tick_by_tick() {
    let service = setup(Config::default());
    assert_eq!(service.check_available_drones().unwrap().len(), 3);

    service.load_drone(DRONE1, MED1).unwrap();
    assert_eq!(service.check_available_drones().unwrap().len(), 2);

    for _ in 0..5 {
        service.tick();
        assert_battery_in_range(&service);
    }
    assert_eq!(service.check_available_drones().unwrap().len(), 2);

    // Remaining legs of the active cycle
    for _ in 5..11 {
        service.tick();
        assert_battery_in_range(&service);
    }
    assert_available_battery_logs(&service, 3, 78, 12);

    // ceil((100 - 78) / 2) = 11 recharge ticks
    for _ in 0..11 {
        let report = service.tick();
        assert_eq!(report.logs_written, 1);
        assert_battery_in_range(&service);
    }
    assert_available_battery_logs(&service, 3, 100, 23);

    // Fully charged and idle: nothing more to log
    assert_eq!(service.tick().logs_written, 0);
    assert_eq!(service.check_logs(DRONE1).unwrap().len(), 23);
}

#[test]
fn test_every_cycle_entry_carries_the_loaded_medication() {
    let service = setup(Config::default());
    service.load_drone(DRONE1, "MED_4").unwrap();
    for _ in 0..30 {
        service.tick();
    }

    let logs = service.check_logs(DRONE1).unwrap();
    assert!(logs.iter().all(|log| log.medication_code == "MED_4"));

    // Newest first: the oldest entry is the load itself
    let oldest = logs.last().unwrap();
    assert_eq!(oldest.state, State::Loading);
    assert_eq!(oldest.battery_capacity, 100);

    let states: Vec<_> = logs.iter().rev().take(12).map(|log| log.state).collect();
    let mut expected = TransitionTable::default().path().to_vec();
    expected.push(State::Idle);
    assert_eq!(states, expected);
}

#[test]
fn test_amounts_count_loading_entries_per_drone() {
    let service = setup(Config::default());
    service.load_drone(DRONE1, MED1).unwrap();
    for _ in 0..11 {
        service.tick();
    }
    service.load_drone(DRONE1, "MED_2").unwrap();
    service.load_drone("Drone-3", MED1).unwrap();

    let amounts = service.check_drones_medication_items_amounts().unwrap();
    let pairs: Vec<_> = amounts.iter().map(|a| (a.number.as_str(), a.amount)).collect();
    assert_eq!(pairs, vec![(DRONE1, 2), ("Drone-3", 1), ("Drone-2", 0)]);

    let codes: Vec<_> = service
        .check_medication_items(DRONE1)
        .unwrap()
        .into_iter()
        .map(|m| m.code)
        .collect();
    assert_eq!(codes, vec![MED1, "MED_2"]);
}

#[test]
fn test_second_load_rejected_mid_cycle() {
    let service = setup(Config::default());
    service.load_drone(DRONE1, MED1).unwrap();
    service.tick();

    let err = service.load_drone(DRONE1, MED1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(service.check_logs(DRONE1).unwrap().len(), 2);
}

#[test]
fn test_delivery_cycle_with_ticker() {
    let mut config = Config::default();
    config.fleet.periodic_unit_millis = 2;
    let service = setup(config);

    service.load_drone(DRONE1, MED1).unwrap();
    let ticker = service.start_ticker().unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let drone = service.registry().find(DRONE1).unwrap().unwrap();
        if drone.state.is_idle() && drone.battery_capacity == 100 {
            break;
        }
        assert!(Instant::now() < deadline, "cycle did not finish: {:?}", drone);
        std::thread::sleep(Duration::from_millis(5));
    }
    let ticks = ticker.stop();

    assert!(ticks >= 22);
    assert_available_battery_logs(&service, 3, 100, 23);
}
