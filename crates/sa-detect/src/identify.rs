//! Instrument identification
//!
//! Sends the family's identity query until a usable reply arrives, then maps
//! it onto a dialect. Instruments that have just been addressed often answer
//! with a stale status fragment first; replies of three characters or fewer
//! are discarded and the query repeated.

use std::thread;
use std::time::{Duration, Instant};

use sa_protocol::{CancelToken, Dialect, Family, InstrumentDatabase, Transport, TransportError};
use tracing::{debug, info, warn};

use crate::error::DetectError;

/// Replies this short are never an identity
const MIN_IDENTITY_LEN: usize = 4;

/// Configuration for identification
#[derive(Debug, Clone)]
pub struct IdentifyConfig {
    /// Give up after this long without a usable reply
    pub timeout: Duration,
    /// Delay between attempts
    pub retry_interval: Duration,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(100),
        }
    }
}

/// Result of identifying an instrument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Matched dialect
    pub dialect: Dialect,
    /// Identity reply, trimmed
    pub id: String,
}

/// Identify the instrument on `transport` using `family`'s identity query
pub fn identify<T: Transport + ?Sized>(
    transport: &mut T,
    family: Family,
    config: &IdentifyConfig,
    cancel: &CancelToken,
) -> Result<Identity, DetectError> {
    let query = family
        .identity_query()
        .ok_or(DetectError::NoIdentityQuery(family.name()))?;

    let started = Instant::now();
    loop {
        if cancel.is_cancelled() {
            return Err(DetectError::Cancelled);
        }

        match transport.query(query) {
            Ok(reply) => {
                let id = reply.trim();
                if id.len() >= MIN_IDENTITY_LEN {
                    return match InstrumentDatabase::identify(family, id) {
                        Some(dialect) => {
                            info!("Identified {} from {:?}", dialect.name(), id);
                            Ok(Identity {
                                dialect,
                                id: id.to_string(),
                            })
                        }
                        None => Err(DetectError::Unrecognized {
                            family,
                            id: id.to_string(),
                        }),
                    };
                }
                warn!("Discarding short reply {:?} to {}", id, query);
            }
            // A slow instrument may time out on the first attempts
            Err(TransportError::Timeout(_)) => debug!("No reply to {} yet", query),
            Err(e) => return Err(e.into()),
        }

        if started.elapsed() >= config.timeout {
            return Err(DetectError::Timeout {
                query,
                waited: started.elapsed(),
            });
        }
        thread::sleep(config.retry_interval);
    }
}
