// =============================================================================
// HTTP API
// =============================================================================
//
// - rest:  JSON routes for health, contract config, plans and order intents
// - error: the single error type every handler returns

pub mod error;
pub mod rest;
