use std::sync::Arc;

use abi::{
    Actor, ActorId, Device, MeetingRoom, NewDevice, NewRoom, Role, Timespan,
};
use chrono::{DateTime, Utc};

use crate::{Catalog, MemoryDirectory, OfficeManager};

pub const E1: ActorId = 1;
pub const E2: ActorId = 2;
pub const BOSS: ActorId = 10;
pub const DEVICE_ADMIN: ActorId = 20;
pub const RETIRED: ActorId = 30;
pub const SUPER_ADMIN: ActorId = 99;

pub fn directory() -> Arc<MemoryDirectory> {
    Arc::new(MemoryDirectory::new([
        Actor::new(E1, Role::Employee).reporting_to(BOSS),
        Actor::new(E2, Role::Employee).reporting_to(BOSS),
        Actor::new(BOSS, Role::Employee).reporting_to(SUPER_ADMIN),
        Actor::new(DEVICE_ADMIN, Role::DeviceAdmin).reporting_to(SUPER_ADMIN),
        Actor::new(RETIRED, Role::Employee).reporting_to(BOSS).deactivated(),
        Actor::new(SUPER_ADMIN, Role::SuperAdmin),
    ]))
}

/// A manager over an empty in-memory store with one device and one room.
pub async fn seeded() -> (OfficeManager, Device, MeetingRoom) {
    let manager = OfficeManager::in_memory(directory());
    let device = manager
        .register_device(DEVICE_ADMIN, NewDevice::new("ThinkPad X1", "14 inch, 32GB"))
        .await
        .unwrap();
    let room = manager
        .register_room(SUPER_ADMIN, NewRoom::new("Fjord", 8, "3F east"))
        .await
        .unwrap();
    (manager, device, room)
}

pub fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

pub fn span(start: &str, end: &str) -> Timespan {
    Timespan::new(at(start), at(end)).unwrap()
}
