//! Core marketplace records: leads, vendors, and the transient assignment result.
//!
//! Leads and vendors are stored as whole JSON documents. Everything that mutates
//! them outside of creation goes through a patch ([`LeadPatch`]) or a quota
//! history entry ([`VendorHistoryEntry`]) so the store can apply the change as a
//! single-document atomic write.

mod ids;
mod lead;
mod result;
mod vendor;

pub use ids::{LeadId, VendorId};
pub use lead::{
    Customer, Lead, LeadNote, LeadPatch, LeadStatus, NewLead, ParseEnumError, Priority,
    ProgressEntry, Transition, parse_city,
};
pub use result::{AssignmentFailure, AssignmentResult, FailureReason, VendorTally};
pub use vendor::{HistoryKind, NewVendor, Vendor, VendorHistoryEntry, VendorUser};
