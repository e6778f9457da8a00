use abi::{
    ActorId, Device, DeviceId, EntityKind, MeetingRoom, NewDevice, NewRoom, OfficeError, RoomId,
};
use async_trait::async_trait;
use tracing::info;

use crate::{Catalog, OfficeManager, Operation};

#[async_trait]
impl Catalog for OfficeManager {
    async fn register_device(
        &self,
        actor_id: ActorId,
        device: NewDevice,
    ) -> Result<Device, OfficeError> {
        self.authorize(actor_id, Operation::RegisterDevice).await?;
        device.validate()?;
        let device = self.store.insert_device(device).await?;
        info!(device_id = device.id, name = %device.name, actor_id, "device registered");
        Ok(device)
    }

    async fn register_room(
        &self,
        actor_id: ActorId,
        room: NewRoom,
    ) -> Result<MeetingRoom, OfficeError> {
        self.authorize(actor_id, Operation::RegisterRoom).await?;
        room.validate()?;
        let room = self.store.insert_room(room).await?;
        info!(room_id = room.id, name = %room.name, actor_id, "room registered");
        Ok(room)
    }

    async fn get_device(&self, actor_id: ActorId, id: DeviceId) -> Result<Device, OfficeError> {
        self.authorize(actor_id, Operation::ViewCatalog).await?;
        self.store
            .get_device(id)
            .await?
            .ok_or_else(|| OfficeError::not_found(EntityKind::Device, id))
    }

    async fn list_devices(&self, actor_id: ActorId) -> Result<Vec<Device>, OfficeError> {
        self.authorize(actor_id, Operation::ViewCatalog).await?;
        self.store.list_devices().await
    }

    async fn get_room(&self, actor_id: ActorId, id: RoomId) -> Result<MeetingRoom, OfficeError> {
        self.authorize(actor_id, Operation::ViewCatalog).await?;
        self.store
            .get_room(id)
            .await?
            .ok_or_else(|| OfficeError::not_found(EntityKind::Room, id))
    }

    async fn list_rooms(&self, actor_id: ActorId) -> Result<Vec<MeetingRoom>, OfficeError> {
        self.authorize(actor_id, Operation::ViewCatalog).await?;
        self.store.list_rooms().await
    }
}
