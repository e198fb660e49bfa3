//! Short random hex identifiers used for plans, steps, and approval requests.

use rand::Rng;

/// Generates an 8-hex-character random id, e.g. `Plan.plan_id` or `ApprovalRequest.request_id`.
pub fn short_hex_id() -> String {
    let bytes: [u8; 4] = rand::thread_rng().gen();
    hex::encode(bytes)
}
