//! Payload decoding, one schema per record kind.

use crate::error::DecodeError;
use crate::records::{EnrichedRecord, EventLog, PageViewLog, RawEvent, RawPageView, RecordKind};

/// Decodes a queue payload into the stored shape of its kind.
///
/// Derived page view fields are left empty for enrichment to fill in.
/// Nothing partially decoded is ever returned.
///
/// A record whose natural key is empty or whitespace is rejected with
/// [`DecodeError::MissingKey`] rather than stored, so keyless records never
/// collapse into one row under the empty key.
pub fn decode(kind: RecordKind, payload: &[u8]) -> Result<EnrichedRecord, DecodeError> {
    let malformed = |source| DecodeError::Malformed { kind, source };

    let record = match kind {
        RecordKind::PageView => {
            let raw: RawPageView = serde_json::from_slice(payload).map_err(malformed)?;
            EnrichedRecord::PageView(PageViewLog::from(raw))
        }
        RecordKind::EventLog => {
            let raw: RawEvent = serde_json::from_slice(payload).map_err(malformed)?;
            EnrichedRecord::EventLog(EventLog::from(raw))
        }
    };

    if record.natural_key().trim().is_empty() {
        return Err(DecodeError::MissingKey {
            kind,
            field: kind.key_field(),
        });
    }

    Ok(record)
}
