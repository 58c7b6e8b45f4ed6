// Utility module
//
// Small helpers shared by the config, proxy and discovery modules:
// - path: request path splitting and target path joining
// - validation: common validation functions

pub mod path;
pub mod validation;
