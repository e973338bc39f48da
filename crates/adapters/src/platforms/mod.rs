//! Platform publish adapters
//!
//! Each adapter implements the `PublishAdapter` port for one platform. The
//! dry-run flag is honored inside the adapter: a dry-run publish simulates
//! success with a synthetic external id and never touches the network, so the
//! whole pipeline works without credentials.

pub mod linkedin;
pub mod threads;
pub mod x;

pub use linkedin::LinkedinPublisher;
pub use threads::ThreadsPublisher;
pub use x::XPublisher;

use draftsmith_domain::{Platform, PublishReceipt};

/// Synthetic receipt shared by all adapters in dry-run mode
pub(crate) fn dry_run_receipt(platform: Platform) -> PublishReceipt {
    PublishReceipt {
        external_id: format!("dryrun-{}", platform),
        url: None,
        dry_run: true,
    }
}

/// Default per-call HTTP timeout in seconds for platform APIs
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
