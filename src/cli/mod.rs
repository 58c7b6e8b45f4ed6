// CLI module
//
// - arguments: command-line flags for the config file and SSDP advertisement

pub mod arguments;

pub use arguments::ProxyArguments;
