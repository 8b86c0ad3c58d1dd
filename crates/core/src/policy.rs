//! Authorization policy for the quote-to-booking lifecycle.
//!
//! Every capability is a pure predicate over the acting principal and the
//! minimal resource facts it needs, so the rules are testable without HTTP
//! or database plumbing.

use crate::domain::party::{Actor, CompanyId, Role, UserId, VendorId};

/// Ownership facts about a quote request that authorization decisions need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuoteOwnership {
    pub created_by_user_id: UserId,
    pub creator_company_id: Option<CompanyId>,
}

/// Visibility scope for list endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListScope {
    All,
    Company(CompanyId),
    Own(UserId),
}

pub fn is_platform_admin(actor: &Actor) -> bool {
    matches!(actor.role, Role::Admin | Role::SuperAdmin)
}

pub fn is_company_scoped_admin(actor: &Actor) -> bool {
    actor.role == Role::CompanyAdmin && actor.company_id.is_some()
}

/// Admins and company admins may act on transporter surfaces without a vendor
/// link of their own.
pub fn has_transporter_privileges(actor: &Actor) -> bool {
    matches!(actor.role, Role::Admin | Role::SuperAdmin | Role::CompanyAdmin)
}

/// Approve, view, or otherwise manage a quote request: platform admins, the
/// requester, or a company admin of the requester's company.
pub fn can_manage_quote(actor: &Actor, quote: QuoteOwnership) -> bool {
    if is_platform_admin(actor) {
        return true;
    }
    if quote.created_by_user_id == actor.user_id {
        return true;
    }
    if is_company_scoped_admin(actor) {
        return quote.creator_company_id.is_some()
            && quote.creator_company_id == actor.company_id;
    }
    false
}

/// Submit consent or an assignment response on behalf of a vendor.
pub fn can_act_for_vendor(actor: &Actor, vendor_id: VendorId) -> bool {
    if is_platform_admin(actor) {
        return true;
    }
    actor.vendor_id == Some(vendor_id)
}

/// Consent history is visible to everyone with a stake in the booking.
pub fn can_view_consent_history(
    actor: &Actor,
    quote: QuoteOwnership,
    vendor_id: VendorId,
) -> bool {
    can_manage_quote(actor, quote) || actor.vendor_id == Some(vendor_id)
}

/// Scope applied to quote-request listings. `None` means the caller has no
/// usable scope (a company admin without company context).
pub fn quote_list_scope(actor: &Actor) -> Option<ListScope> {
    if is_platform_admin(actor) {
        return Some(ListScope::All);
    }
    if actor.role == Role::CompanyAdmin {
        return actor.company_id.map(ListScope::Company);
    }
    Some(ListScope::Own(actor.user_id))
}
