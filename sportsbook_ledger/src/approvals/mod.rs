//! Administrator approval of deposit and withdrawal requests.
//!
//! A request is recorded as a `Pending` audit entry with no balance effect.
//! An administrator then either approves it (the balance moves and the entry
//! becomes `Completed`) or rejects it (`Rejected`, nothing moves). A
//! withdrawal that no longer fits the balance at approval time is resolved as
//! `Rejected` so no request stays pending forever.

pub mod workflow;

pub use workflow::ApprovalWorkflow;
