use abi::{
    Actor, ActorId, EntityKind, LeaveQueryBuilder, LeaveRequest, LeaveRequestId, LeaveStatus,
    NewLeaveRequest, OfficeError,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::{ApprovalGate, LeaveApproval, OfficeManager, Operation};

impl OfficeManager {
    /// Supervisor of `subject`, or `None` when the subject is no longer in
    /// the directory or reports to nobody.
    async fn supervisor_of(&self, subject: ActorId) -> Result<Option<ActorId>, OfficeError> {
        Ok(self
            .directory
            .resolve(subject)
            .await?
            .and_then(|a| a.supervisor_id))
    }

    async fn decide_leave(
        &self,
        actor_id: ActorId,
        id: LeaveRequestId,
        outcome: LeaveStatus,
    ) -> Result<LeaveRequest, OfficeError> {
        let actor = self.authorize(actor_id, Operation::DecideLeave).await?;
        let leave = self
            .store
            .get_leave_request(id)
            .await?
            .ok_or_else(|| OfficeError::not_found(EntityKind::LeaveRequest, id))?;

        let supervisor = self.supervisor_of(leave.requester_id).await?;
        ApprovalGate::check_supervisor(&actor, leave.requester_id, supervisor)?;

        let verb = match outcome {
            LeaveStatus::Approved => "approve",
            _ => "reject",
        };
        let now = Utc::now();
        let leave = self
            .store
            .update_leave_request(
                id,
                Box::new(move |mut leave| {
                    if leave.status != LeaveStatus::Pending {
                        return Err(OfficeError::invalid_transition(
                            EntityKind::LeaveRequest,
                            leave.status,
                            verb,
                        ));
                    }
                    leave.status = outcome;
                    leave.decided_by = Some(actor.id);
                    leave.decided_at = Some(now);
                    Ok(leave)
                }),
            )
            .await?;

        info!(leave_id = id, actor_id, status = %leave.status, "leave decided");
        Ok(leave)
    }

    async fn may_decide(&self, actor: &Actor, leave: &LeaveRequest) -> Result<bool, OfficeError> {
        let supervisor = self.supervisor_of(leave.requester_id).await?;
        Ok(ApprovalGate::may_decide_for(
            actor,
            leave.requester_id,
            supervisor,
        ))
    }
}

#[async_trait]
impl LeaveApproval for OfficeManager {
    async fn file_leave(
        &self,
        actor_id: ActorId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: String,
    ) -> Result<LeaveRequest, OfficeError> {
        let actor = self.authorize(actor_id, Operation::FileLeave).await?;
        let leave = NewLeaveRequest {
            requester_id: actor.id,
            start_date,
            end_date,
            reason,
        };
        leave.validate()?;

        let leave = self.store.insert_leave_request(leave).await?;
        info!(leave_id = leave.id, actor_id, %start_date, %end_date, "leave filed");
        Ok(leave)
    }

    async fn approve_leave(
        &self,
        actor: ActorId,
        id: LeaveRequestId,
    ) -> Result<LeaveRequest, OfficeError> {
        self.decide_leave(actor, id, LeaveStatus::Approved).await
    }

    async fn reject_leave(
        &self,
        actor: ActorId,
        id: LeaveRequestId,
    ) -> Result<LeaveRequest, OfficeError> {
        self.decide_leave(actor, id, LeaveStatus::Rejected).await
    }

    async fn cancel_leave(
        &self,
        actor_id: ActorId,
        id: LeaveRequestId,
    ) -> Result<LeaveRequest, OfficeError> {
        let actor = self.authorize(actor_id, Operation::CancelLeave).await?;
        let leave = self
            .store
            .update_leave_request(
                id,
                Box::new(move |mut leave| {
                    ApprovalGate::check_owner(&actor, leave.requester_id, EntityKind::LeaveRequest)?;
                    if leave.status != LeaveStatus::Pending {
                        return Err(OfficeError::invalid_transition(
                            EntityKind::LeaveRequest,
                            leave.status,
                            "cancel",
                        ));
                    }
                    leave.status = LeaveStatus::Cancelled;
                    Ok(leave)
                }),
            )
            .await?;

        info!(leave_id = id, actor_id, "leave cancelled");
        Ok(leave)
    }

    async fn my_leave_requests(&self, actor_id: ActorId) -> Result<Vec<LeaveRequest>, OfficeError> {
        let actor = self.authorize(actor_id, Operation::ListOwnRequests).await?;
        let query = LeaveQueryBuilder::default()
            .requester_id(actor.id)
            .desc(true)
            .build()?;
        self.store.query_leave_requests(query).await
    }

    async fn leave_awaiting_decision(
        &self,
        actor_id: ActorId,
    ) -> Result<Vec<LeaveRequest>, OfficeError> {
        let actor = self.authorize(actor_id, Operation::DecideLeave).await?;
        let query = LeaveQueryBuilder::default()
            .status(LeaveStatus::Pending)
            .build()?;

        let mut awaiting = Vec::new();
        for leave in self.store.query_leave_requests(query).await? {
            if self.may_decide(&actor, &leave).await? {
                awaiting.push(leave);
            }
        }
        Ok(awaiting)
    }
}
