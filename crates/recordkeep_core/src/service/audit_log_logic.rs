//! Audit log write path.
//!
//! # Responsibility
//! - Record one audit entry per action reported by the transport boundary.
//! - Apply the configured failure policy to failed writes.
//!
//! # Invariants
//! - Each entry is its own operation with its own commit; it can neither
//!   roll back nor be rolled back by the action it describes.
//! - A missing caller IP never fails the write; the field is just omitted.

use super::crud::CrudLogic;
use crate::config::AuditFailurePolicy;
use crate::model::audit_log::AuditLog;
use crate::repo::ListQuery;
use crate::result::{ActionResult, DataResult};
use crate::uow::RecordUnitOfWork;
use log::warn;

/// Request metadata of the action being audited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_uri: String,
    pub method: String,
    pub ip_address: Option<String>,
}

/// Supplies the acting caller's request metadata, when known.
pub trait RequestContextAccessor {
    fn current(&self) -> Option<RequestContext>;
}

/// Audit operations bound to one Unit of Work.
pub struct AuditLogLogic<'u, U: RecordUnitOfWork> {
    crud: CrudLogic<'u, AuditLog, U, U::AuditLogs>,
    policy: AuditFailurePolicy,
    context: Option<&'u dyn RequestContextAccessor>,
}

impl<'u, U: RecordUnitOfWork> AuditLogLogic<'u, U> {
    pub fn new(uow: &'u U) -> Self {
        Self {
            crud: CrudLogic::new(uow),
            policy: AuditFailurePolicy::default(),
            context: None,
        }
    }

    pub fn with_policy(mut self, policy: AuditFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_context_accessor(mut self, accessor: &'u dyn RequestContextAccessor) -> Self {
        self.context = Some(accessor);
        self
    }

    pub fn crud(&self) -> &CrudLogic<'u, AuditLog, U, U::AuditLogs> {
        &self.crud
    }

    /// Records one action.
    ///
    /// Without an explicit `ip_address` the caller IP comes from the context
    /// accessor, if one is attached.
    pub fn add_action_audit_log_entry(
        &self,
        request_uri: &str,
        status_code: i32,
        method: &str,
        ip_address: Option<&str>,
    ) -> ActionResult {
        let fallback_ip = match ip_address {
            Some(_) => None,
            None => self.context.and_then(|accessor| accessor.current()?.ip_address),
        };
        let ip_address = ip_address.or(fallback_ip.as_deref());

        let result = self
            .crud
            .create_single_entity_and_save(|_| {
                Ok(AuditLog::create(request_uri, status_code, method, ip_address)?)
            })
            .into_action();
        self.apply_policy(result)
    }

    /// Records the current request taken from the context accessor.
    pub fn add_entry_for_current_request(&self, status_code: i32) -> ActionResult {
        match self.context.and_then(|accessor| accessor.current()) {
            Some(context) => self.add_action_audit_log_entry(
                &context.request_uri,
                status_code,
                &context.method,
                context.ip_address.as_deref(),
            ),
            None => self.apply_policy(ActionResult::fail(
                "No request context is available for the audit entry.",
            )),
        }
    }

    /// Newest entries first.
    pub fn recent_entries(&self, limit: u32) -> DataResult<Vec<AuditLog>> {
        self.crud.get_all(&ListQuery::first(limit))
    }

    fn apply_policy(&self, result: ActionResult) -> ActionResult {
        match (self.policy, result.error_message()) {
            (AuditFailurePolicy::Suppress, Some(message)) => {
                warn!(
                    "event=audit_write module=service status=suppressed reason={}",
                    message
                );
                ActionResult::ok()
            }
            _ => result,
        }
    }
}
