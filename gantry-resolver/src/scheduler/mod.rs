//! Scheduler layer for the resolver
//!
//! [`ResolutionPoller`] finds GitArtifactResolution tickets that are not
//! resolved yet, runs the matching resolver for each, and records the
//! outcome on the Artifact. [`SourcePoller`] watches GitSource branches and
//! starts a Pipeline for every new head commit.

pub mod poller;
pub mod source_poller;

pub use poller::ResolutionPoller;
pub use source_poller::SourcePoller;

use gantry_core::domain::{ObjectKey, Resource};
use gantry_store::{ObjectStore, StoreExt};
use tracing::debug;

use crate::error::ResolveError;

const UPDATE_ATTEMPTS: u32 = 5;

/// Fetch, change, write back; refetches on version conflicts. `change`
/// returns false when there is nothing to write. Returns whether a write
/// happened; a missing object is not an error.
pub(crate) async fn modify<R, F>(
    store: &dyn ObjectStore,
    key: &ObjectKey,
    change: F,
) -> Result<bool, ResolveError>
where
    R: Resource,
    F: Fn(&mut R) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let Some(mut resource) = store.fetch::<R>(key).await? else {
            return Ok(false);
        };
        if !change(&mut resource) {
            return Ok(false);
        }

        match store.update_resource(resource).await {
            Ok(_) => return Ok(true),
            Err(e) if e.is_conflict() && attempt < UPDATE_ATTEMPTS => {
                debug!(kind = %R::KIND, %key, attempt, "Version conflict, retrying");
            }
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e.into()),
        }
    }
}
