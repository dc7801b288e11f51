use tracing::warn;

use crate::types::SensorSnapshot;
use crate::{Error, Result};

/// Unify the two protocol generations into one snapshot.
///
/// The status endpoint is authoritative: legacy rows only fill keys it
/// did not produce. A legacy failure is fatal only when no status data
/// survived, since on older devices the legacy pair is the sole source.
pub(crate) fn combine(
    status: Option<SensorSnapshot>,
    legacy: std::result::Result<SensorSnapshot, Error>,
) -> Result<SensorSnapshot> {
    let mut snapshot = status.unwrap_or_default();

    match legacy {
        Ok(extra) => {
            for (key, record) in extra {
                snapshot.insert_missing(key, record);
            }
            Ok(snapshot)
        }
        Err(err) if !snapshot.is_empty() => {
            warn!(error = %err, "legacy endpoints failed, keeping status data");
            Ok(snapshot)
        }
        Err(err) => Err(err),
    }
}
