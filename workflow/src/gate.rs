use abi::{Actor, ActorId, EntityKind, OfficeError, Role};
use tracing::warn;

/// Every call the core accepts, named for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RequestDevice,
    ApproveDevice,
    RejectDevice,
    CollectDevice,
    ReturnDevice,
    ConfirmReturn,
    CancelDeviceRequest,
    ViewDeviceQueue,
    RegisterDevice,
    RegisterRoom,
    ViewCatalog,
    BookRoom,
    CompleteBooking,
    CancelBooking,
    ViewSchedule,
    ListOwnRequests,
    FileLeave,
    CancelLeave,
    /// further restricted per request by [`ApprovalGate::check_supervisor`]
    DecideLeave,
}

impl Operation {
    /// Roles allowed to perform the operation; empty means any active actor.
    /// `super_admin` satisfies every non-empty set.
    pub fn required_roles(&self) -> &'static [Role] {
        match self {
            Operation::ApproveDevice
            | Operation::RejectDevice
            | Operation::ConfirmReturn
            | Operation::ViewDeviceQueue
            | Operation::RegisterDevice => &[Role::DeviceAdmin],
            Operation::RegisterRoom => &[Role::SuperAdmin],
            _ => &[],
        }
    }
}

/// Stateless authorization predicates. Nothing here touches storage.
pub struct ApprovalGate;

impl ApprovalGate {
    pub fn check(actor: &Actor, op: Operation) -> Result<(), OfficeError> {
        if !actor.active {
            warn!(actor_id = actor.id, ?op, "inactive actor denied");
            return Err(OfficeError::Forbidden(format!(
                "actor {} is inactive",
                actor.id
            )));
        }

        let required = op.required_roles();
        if required.is_empty() || actor.has_any_role(required) {
            return Ok(());
        }

        warn!(actor_id = actor.id, role = %actor.role, ?op, "role check denied");
        let roles: Vec<_> = required.iter().map(Role::as_str).collect();
        Err(OfficeError::Forbidden(format!(
            "{:?} requires role {}, actor {} is {}",
            op,
            roles.join(" or "),
            actor.id,
            actor.role
        )))
    }

    /// Self-service mutations are open only to the entity's requester.
    pub fn check_owner(actor: &Actor, owner: ActorId, entity: EntityKind) -> Result<(), OfficeError> {
        if actor.id == owner {
            return Ok(());
        }
        warn!(actor_id = actor.id, owner, %entity, "ownership check denied");
        Err(OfficeError::Forbidden(format!(
            "actor {} does not own this {}",
            actor.id, entity
        )))
    }

    /// The subject's direct supervisor or a super admin may decide; nobody
    /// decides their own request.
    pub fn may_decide_for(
        actor: &Actor,
        subject_id: ActorId,
        subject_supervisor: Option<ActorId>,
    ) -> bool {
        actor.id != subject_id
            && (actor.role == Role::SuperAdmin || subject_supervisor == Some(actor.id))
    }

    pub fn check_supervisor(
        actor: &Actor,
        subject_id: ActorId,
        subject_supervisor: Option<ActorId>,
    ) -> Result<(), OfficeError> {
        if actor.id == subject_id {
            return Err(OfficeError::Forbidden(format!(
                "actor {} cannot decide their own request",
                actor.id
            )));
        }
        if Self::may_decide_for(actor, subject_id, subject_supervisor) {
            return Ok(());
        }
        warn!(actor_id = actor.id, subject_id, "supervisor check denied");
        Err(OfficeError::Forbidden(format!(
            "actor {} is not the supervisor of {}",
            actor.id, subject_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use abi::ErrorKind;

    use super::*;

    #[test]
    fn employee_should_not_approve_devices() {
        let employee = Actor::new(1, Role::Employee);
        let err = ApprovalGate::check(&employee, Operation::ApproveDevice).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let admin = Actor::new(2, Role::DeviceAdmin);
        assert!(ApprovalGate::check(&admin, Operation::ApproveDevice).is_ok());
        assert!(ApprovalGate::check(&Actor::new(3, Role::SuperAdmin), Operation::ApproveDevice).is_ok());
    }

    #[test]
    fn only_super_admin_should_register_rooms() {
        let device_admin = Actor::new(2, Role::DeviceAdmin);
        assert!(ApprovalGate::check(&device_admin, Operation::RegisterRoom).is_err());
        assert!(ApprovalGate::check(&Actor::new(3, Role::SuperAdmin), Operation::RegisterRoom).is_ok());
    }

    #[test]
    fn inactive_actor_should_be_denied_everything() {
        let gone = Actor::new(4, Role::SuperAdmin).deactivated();
        for op in [Operation::BookRoom, Operation::ViewCatalog, Operation::ApproveDevice] {
            assert_eq!(
                ApprovalGate::check(&gone, op).unwrap_err().kind(),
                ErrorKind::Forbidden
            );
        }
    }

    #[test]
    fn ownership_should_be_identity_only() {
        let admin = Actor::new(3, Role::SuperAdmin);
        assert!(ApprovalGate::check_owner(&admin, 1, EntityKind::Booking).is_err());
        assert!(ApprovalGate::check_owner(&Actor::new(1, Role::Employee), 1, EntityKind::Booking).is_ok());
    }

    #[test]
    fn leave_decisions_should_follow_reporting_line() {
        let boss = Actor::new(10, Role::Employee);
        let peer = Actor::new(11, Role::Employee);
        let admin = Actor::new(99, Role::SuperAdmin);

        assert!(ApprovalGate::check_supervisor(&boss, 1, Some(10)).is_ok());
        assert!(ApprovalGate::check_supervisor(&peer, 1, Some(10)).is_err());
        assert!(ApprovalGate::check_supervisor(&admin, 1, Some(10)).is_ok());
        assert!(ApprovalGate::check_supervisor(&admin, 1, None).is_ok());
        // not even a super admin approves their own leave
        assert!(ApprovalGate::check_supervisor(&admin, 99, None).is_err());
    }

    #[test]
    fn listing_predicate_should_agree_with_check() {
        let boss = Actor::new(10, Role::Employee);
        let admin = Actor::new(99, Role::SuperAdmin);
        for (actor, subject, supervisor) in [
            (&boss, 1, Some(10)),
            (&boss, 1, Some(12)),
            (&boss, 10, Some(99)),
            (&admin, 1, None),
            (&admin, 99, None),
        ] {
            assert_eq!(
                ApprovalGate::may_decide_for(actor, subject, supervisor),
                ApprovalGate::check_supervisor(actor, subject, supervisor).is_ok()
            );
        }
    }
}
