//! Generation publication
//!
//! A crawl run writes into its own generation index. Once every unit of work
//! has finished, the live alias is moved from whatever it pointed at to the
//! new generation.

use crate::index::SearchIndex;
use crate::CrawlerError;

/// Outcome of moving the live alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The alias now points at the new generation only
    Published { previous: Vec<String> },

    /// The swap failed; readers still see the previous generations
    SwapFailed { previous: Vec<String>, message: String },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

/// Points `alias` at `generation`
///
/// Listing the current targets of the alias is a hard error: without it the
/// swap cannot know what to retire. A failure of the swap itself is logged
/// and reported as [`PublishOutcome::SwapFailed`]; the run still completes.
/// Publishing the same generation twice is a no-op.
pub fn publish_generation(
    index: &dyn SearchIndex,
    alias: &str,
    generation: &str,
) -> Result<PublishOutcome, CrawlerError> {
    let previous = index
        .indices_for_alias(alias)
        .map_err(|source| CrawlerError::AliasListing {
            alias: alias.to_string(),
            source,
        })?;

    if previous.len() == 1 && previous[0] == generation {
        tracing::info!("Alias {} already points at {}", alias, generation);
        return Ok(PublishOutcome::Published { previous });
    }

    // An empty generation still has to exist to carry the alias
    if let Err(e) = index.create_index(generation) {
        tracing::warn!("Failed to create generation {}: {}", generation, e);
        return Ok(PublishOutcome::SwapFailed {
            previous,
            message: e.to_string(),
        });
    }

    match index.swap_alias(alias, &previous, generation) {
        Ok(()) => {
            tracing::info!(
                "Alias {} moved to {} (was: {})",
                alias,
                generation,
                if previous.is_empty() {
                    "none".to_string()
                } else {
                    previous.join(", ")
                }
            );
            Ok(PublishOutcome::Published { previous })
        }
        Err(e) => {
            tracing::warn!(
                "Alias {} was not moved to {}, previous generation stays live: {}",
                alias,
                generation,
                e
            );
            Ok(PublishOutcome::SwapFailed {
                previous,
                message: e.to_string(),
            })
        }
    }
}
