// Content moderation core for the streaming platform.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic): word filtering, the trust-score
//   policy, and the ports the external classifiers plug into.
// - `infra/` = Implementations of core traits (Google NLP, AWS Rekognition,
//   word list files, trust-score stores).
//
// The `moderate` binary in main.rs is the composition root that wires them together.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;
