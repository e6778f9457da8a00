use abi::{
    Actor, ActorId, DeviceId, DeviceRequest, DeviceRequestId, DeviceRequestQueryBuilder,
    DeviceRequestStatus, EntityKind, OfficeError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{ApprovalGate, DeviceLending, OfficeManager, Operation};

/// Transitions of an existing device request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceAction {
    Approve,
    Reject,
    Collect,
    InitiateReturn,
    ConfirmReturn,
    Cancel,
}

impl DeviceAction {
    fn verb(&self) -> &'static str {
        match self {
            DeviceAction::Approve => "approve",
            DeviceAction::Reject => "reject",
            DeviceAction::Collect => "collect",
            DeviceAction::InitiateReturn => "return",
            DeviceAction::ConfirmReturn => "confirm return of",
            DeviceAction::Cancel => "cancel",
        }
    }

    fn operation(&self) -> Operation {
        match self {
            DeviceAction::Approve => Operation::ApproveDevice,
            DeviceAction::Reject => Operation::RejectDevice,
            DeviceAction::Collect => Operation::CollectDevice,
            DeviceAction::InitiateReturn => Operation::ReturnDevice,
            DeviceAction::ConfirmReturn => Operation::ConfirmReturn,
            DeviceAction::Cancel => Operation::CancelDeviceRequest,
        }
    }

    /// Actions only the original requester may take.
    fn requester_only(&self) -> bool {
        matches!(
            self,
            DeviceAction::Collect | DeviceAction::InitiateReturn | DeviceAction::Cancel
        )
    }
}

/// The device request state machine. `None` means the action is not legal
/// from `from`; terminal states accept nothing.
pub fn next_status(from: DeviceRequestStatus, action: DeviceAction) -> Option<DeviceRequestStatus> {
    use DeviceAction::*;
    use DeviceRequestStatus::*;

    match (from, action) {
        (Pending, Approve) => Some(Approved),
        (Pending, Reject) => Some(Rejected),
        (Approved, Collect) => Some(Collected),
        (Collected, InitiateReturn) => Some(ReturnPending),
        (ReturnPending, ConfirmReturn) => Some(Returned),
        (Pending | Approved, Cancel) => Some(Cancelled),
        _ => None,
    }
}

fn apply(
    mut request: DeviceRequest,
    actor: &Actor,
    action: DeviceAction,
    now: DateTime<Utc>,
) -> Result<DeviceRequest, OfficeError> {
    if action.requester_only() {
        ApprovalGate::check_owner(actor, request.requester_id, EntityKind::DeviceRequest)?;
    }

    let next = next_status(request.status, action).ok_or_else(|| {
        OfficeError::invalid_transition(EntityKind::DeviceRequest, request.status, action.verb())
    })?;
    request.status = next;

    match action {
        DeviceAction::Approve | DeviceAction::Reject => {
            request.decided_by = Some(actor.id);
            request.decided_at = Some(now);
        }
        DeviceAction::Collect => request.collected_at = Some(now),
        DeviceAction::InitiateReturn => request.return_requested_at = Some(now),
        DeviceAction::ConfirmReturn => {
            request.return_confirmed_by = Some(actor.id);
            request.returned_at = Some(now);
        }
        DeviceAction::Cancel => request.cancelled_at = Some(now),
    }
    Ok(request)
}

impl OfficeManager {
    async fn transition_device_request(
        &self,
        actor_id: ActorId,
        id: DeviceRequestId,
        action: DeviceAction,
    ) -> Result<DeviceRequest, OfficeError> {
        let actor = self.authorize(actor_id, action.operation()).await?;
        let now = Utc::now();

        let request = self
            .store
            .update_device_request(id, Box::new(move |r| apply(r, &actor, action, now)))
            .await?;

        info!(
            request_id = request.id,
            device_id = request.device_id,
            actor_id,
            status = %request.status,
            "device request transitioned"
        );
        Ok(request)
    }

    async fn device_queue(
        &self,
        actor_id: ActorId,
        status: DeviceRequestStatus,
    ) -> Result<Vec<DeviceRequest>, OfficeError> {
        self.authorize(actor_id, Operation::ViewDeviceQueue).await?;
        let query = DeviceRequestQueryBuilder::default().status(status).build()?;
        let requests = self.store.query_device_requests(query).await?;
        debug!(%status, count = requests.len(), "listed device queue");
        Ok(requests)
    }
}

#[async_trait]
impl DeviceLending for OfficeManager {
    async fn request_device(
        &self,
        actor_id: ActorId,
        device: DeviceId,
    ) -> Result<DeviceRequest, OfficeError> {
        let actor = self.authorize(actor_id, Operation::RequestDevice).await?;
        let request = self
            .store
            .create_device_request(DeviceRequest::new_pending(device, actor.id, Utc::now()))
            .await?;

        info!(
            request_id = request.id,
            device_id = device,
            actor_id,
            "device requested"
        );
        Ok(request)
    }

    async fn approve_device_request(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError> {
        self.transition_device_request(actor, id, DeviceAction::Approve)
            .await
    }

    async fn reject_device_request(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError> {
        self.transition_device_request(actor, id, DeviceAction::Reject)
            .await
    }

    async fn collect_device(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError> {
        self.transition_device_request(actor, id, DeviceAction::Collect)
            .await
    }

    async fn initiate_return(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError> {
        self.transition_device_request(actor, id, DeviceAction::InitiateReturn)
            .await
    }

    async fn confirm_return(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError> {
        self.transition_device_request(actor, id, DeviceAction::ConfirmReturn)
            .await
    }

    async fn cancel_device_request(
        &self,
        actor: ActorId,
        id: DeviceRequestId,
    ) -> Result<DeviceRequest, OfficeError> {
        self.transition_device_request(actor, id, DeviceAction::Cancel)
            .await
    }

    async fn my_device_requests(
        &self,
        actor_id: ActorId,
    ) -> Result<Vec<DeviceRequest>, OfficeError> {
        let actor = self.authorize(actor_id, Operation::ListOwnRequests).await?;
        let query = DeviceRequestQueryBuilder::default()
            .requester_id(actor.id)
            .desc(true)
            .build()?;
        self.store.query_device_requests(query).await
    }

    async fn pending_device_requests(
        &self,
        actor: ActorId,
    ) -> Result<Vec<DeviceRequest>, OfficeError> {
        self.device_queue(actor, DeviceRequestStatus::Pending).await
    }

    async fn return_pending_device_requests(
        &self,
        actor: ActorId,
    ) -> Result<Vec<DeviceRequest>, OfficeError> {
        self.device_queue(actor, DeviceRequestStatus::ReturnPending)
            .await
    }
}

#[cfg(test)]
mod tests {
    use abi::{ConflictInfo, DeviceStatus, ErrorKind};

    use super::*;
    use crate::{test_utils::*, Catalog};

    const ALL_ACTIONS: [DeviceAction; 6] = [
        DeviceAction::Approve,
        DeviceAction::Reject,
        DeviceAction::Collect,
        DeviceAction::InitiateReturn,
        DeviceAction::ConfirmReturn,
        DeviceAction::Cancel,
    ];

    #[test]
    fn terminal_states_should_accept_no_action() {
        for from in [
            DeviceRequestStatus::Rejected,
            DeviceRequestStatus::Returned,
            DeviceRequestStatus::Cancelled,
        ] {
            for action in ALL_ACTIONS {
                assert_eq!(next_status(from, action), None, "{} / {:?}", from, action);
            }
        }
    }

    #[test]
    fn collected_device_should_not_be_cancelled() {
        assert_eq!(
            next_status(DeviceRequestStatus::Collected, DeviceAction::Cancel),
            None
        );
        assert_eq!(
            next_status(DeviceRequestStatus::Approved, DeviceAction::Cancel),
            Some(DeviceRequestStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn borrow_lifecycle_should_drive_device_status() {
        let (manager, device, _) = seeded().await;

        let request = manager.request_device(E1, device.id).await.unwrap();
        assert_eq!(request.status, DeviceRequestStatus::Pending);
        assert_eq!(
            manager.get_device(E1, device.id).await.unwrap().status,
            DeviceStatus::UnderRequest
        );

        let request = manager
            .approve_device_request(DEVICE_ADMIN, request.id)
            .await
            .unwrap();
        assert_eq!(request.status, DeviceRequestStatus::Approved);
        assert_eq!(request.decided_by, Some(DEVICE_ADMIN));
        assert!(request.decided_at.is_some());

        let request = manager.collect_device(E1, request.id).await.unwrap();
        assert_eq!(request.status, DeviceRequestStatus::Collected);
        assert_eq!(
            manager.get_device(E1, device.id).await.unwrap().status,
            DeviceStatus::Borrowed
        );

        let request = manager.initiate_return(E1, request.id).await.unwrap();
        assert_eq!(request.status, DeviceRequestStatus::ReturnPending);
        assert_eq!(
            manager.get_device(E1, device.id).await.unwrap().status,
            DeviceStatus::Borrowed
        );

        let request = manager.confirm_return(DEVICE_ADMIN, request.id).await.unwrap();
        assert_eq!(request.status, DeviceRequestStatus::Returned);
        assert_eq!(request.return_confirmed_by, Some(DEVICE_ADMIN));
        assert_eq!(
            manager.get_device(E1, device.id).await.unwrap().status,
            DeviceStatus::Available
        );
    }

    #[tokio::test]
    async fn employee_should_not_approve() {
        let (manager, device, _) = seeded().await;
        let request = manager.request_device(E1, device.id).await.unwrap();

        let err = manager
            .approve_device_request(E2, request.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        // a denied call must not have moved the request
        let pending = manager.pending_device_requests(DEVICE_ADMIN).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, DeviceRequestStatus::Pending);
    }

    #[tokio::test]
    async fn employee_should_not_reject_confirm_or_view_queues() {
        let (manager, device, _) = seeded().await;
        let request = manager.request_device(E1, device.id).await.unwrap();

        let err = manager
            .reject_device_request(E2, request.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        manager
            .approve_device_request(DEVICE_ADMIN, request.id)
            .await
            .unwrap();
        manager.collect_device(E1, request.id).await.unwrap();
        manager.initiate_return(E1, request.id).await.unwrap();

        // the requester cannot sign off their own return either
        for actor in [E1, E2] {
            let err = manager.confirm_return(actor, request.id).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden);
        }

        let err = manager.pending_device_requests(E1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = manager
            .return_pending_device_requests(E1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let queue = manager
            .return_pending_device_requests(DEVICE_ADMIN)
            .await
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, DeviceRequestStatus::ReturnPending);
    }

    #[tokio::test]
    async fn only_requester_should_return_or_cancel() {
        let (manager, device, _) = seeded().await;
        let request = manager.request_device(E1, device.id).await.unwrap();

        let err = manager
            .cancel_device_request(E2, request.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        manager
            .approve_device_request(DEVICE_ADMIN, request.id)
            .await
            .unwrap();
        manager.collect_device(E1, request.id).await.unwrap();

        let err = manager.initiate_return(E2, request.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let mine = manager.my_device_requests(E1).await.unwrap();
        assert_eq!(mine[0].status, DeviceRequestStatus::Collected);
    }

    #[tokio::test]
    async fn only_requester_should_collect() {
        let (manager, device, _) = seeded().await;
        let request = manager.request_device(E1, device.id).await.unwrap();
        manager
            .approve_device_request(DEVICE_ADMIN, request.id)
            .await
            .unwrap();

        let err = manager.collect_device(E2, request.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = manager
            .collect_device(SUPER_ADMIN, request.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn second_request_should_conflict_until_first_ends() {
        let (manager, device, _) = seeded().await;
        let first = manager.request_device(E1, device.id).await.unwrap();

        let err = manager.request_device(E2, device.id).await.unwrap_err();
        assert_eq!(
            err,
            OfficeError::Conflict(ConflictInfo::ActiveDeviceRequest {
                device_id: device.id
            })
        );

        let rejected = manager
            .reject_device_request(DEVICE_ADMIN, first.id)
            .await
            .unwrap();
        assert_eq!(rejected.status, DeviceRequestStatus::Rejected);
        assert_eq!(
            manager.get_device(E2, device.id).await.unwrap().status,
            DeviceStatus::Available
        );

        let second = manager.request_device(E2, device.id).await.unwrap();
        assert_eq!(second.status, DeviceRequestStatus::Pending);
    }

    #[tokio::test]
    async fn cancelled_request_should_reject_further_actions() {
        let (manager, device, _) = seeded().await;
        let request = manager.request_device(E1, device.id).await.unwrap();
        let request = manager.cancel_device_request(E1, request.id).await.unwrap();
        assert_eq!(request.status, DeviceRequestStatus::Cancelled);
        assert!(request.cancelled_at.is_some());

        let err = manager
            .approve_device_request(DEVICE_ADMIN, request.id)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OfficeError::invalid_transition(EntityKind::DeviceRequest, "cancelled", "approve")
        );
        let err = manager.cancel_device_request(E1, request.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[tokio::test]
    async fn collect_before_approval_should_be_invalid() {
        let (manager, device, _) = seeded().await;
        let request = manager.request_device(E1, device.id).await.unwrap();
        let err = manager.collect_device(E1, request.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[tokio::test]
    async fn unknown_ids_should_be_not_found() {
        let (manager, _, _) = seeded().await;
        let err = manager.request_device(E1, 777).await.unwrap_err();
        assert_eq!(err, OfficeError::not_found(EntityKind::Device, 777));

        let err = manager
            .approve_device_request(DEVICE_ADMIN, 888)
            .await
            .unwrap_err();
        assert_eq!(err, OfficeError::not_found(EntityKind::DeviceRequest, 888));
    }

    #[tokio::test]
    async fn queues_should_be_admin_only_projections() {
        let (manager, device, _) = seeded().await;
        let other = manager
            .register_device(DEVICE_ADMIN, abi::NewDevice::new("iPad", ""))
            .await
            .unwrap();

        let first = manager.request_device(E1, device.id).await.unwrap();
        manager.request_device(E1, other.id).await.unwrap();
        manager
            .approve_device_request(DEVICE_ADMIN, first.id)
            .await
            .unwrap();
        manager.collect_device(E1, first.id).await.unwrap();
        manager.initiate_return(E1, first.id).await.unwrap();

        let pending = manager.pending_device_requests(DEVICE_ADMIN).await.unwrap();
        assert_eq!(pending.iter().map(|r| r.device_id).collect::<Vec<_>>(), vec![other.id]);

        let returning = manager
            .return_pending_device_requests(SUPER_ADMIN)
            .await
            .unwrap();
        assert_eq!(returning.len(), 1);
        assert_eq!(returning[0].id, first.id);

        let err = manager.pending_device_requests(E1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let mine = manager.my_device_requests(E1).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(manager.my_device_requests(E2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn inactive_actor_should_not_request() {
        let (manager, device, _) = seeded().await;
        let err = manager.request_device(RETIRED, device.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
