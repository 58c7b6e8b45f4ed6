use clap::Parser;
use std::path::PathBuf;
use stproxy::config::DEFAULT_CONFIG_PATH;
use stproxy::discovery::ssdp::{
    AdvertiseOptions, DEFAULT_ALIVE_INTERVAL_SECS, DEFAULT_MAX_AGE, DEFAULT_SERVICE_TYPE, DEFAULT_USN, alive_interval_from_secs,
};
use stproxy::discovery::{default_location, default_server_header};

#[derive(Parser, Debug, Clone)]
#[command(name = "stproxy", about, version, long_about = None)]
pub struct ProxyArguments {
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_PATH, help = "Path to the JSON configuration file")]
    pub(crate) config_path: PathBuf,

    #[arg(long = "st", default_value = DEFAULT_SERVICE_TYPE, help = "ST: the advertised service type")]
    pub(crate) service_type: String,

    #[arg(long = "usn", default_value = DEFAULT_USN, help = "USN: unique service name")]
    pub(crate) usn: String,

    #[arg(long = "loc", help = "LOCATION header, defaults to http://<local ip>:<port>/")]
    pub(crate) location: Option<String>,

    #[arg(long = "srv", help = "SERVER header, defaults to <os>/<arch> UPnP/1.1 stproxy/<version>")]
    pub(crate) server: Option<String>,

    #[arg(long = "maxage", default_value_t = DEFAULT_MAX_AGE, help = "CACHE-CONTROL max-age in seconds")]
    pub(crate) max_age: u32,

    #[arg(
        long = "ai",
        default_value_t = DEFAULT_ALIVE_INTERVAL_SECS,
        allow_negative_numbers = true,
        help = "Seconds between SSDP alive messages, 0 or less disables them"
    )]
    pub(crate) alive_interval: i64,

    #[arg(long = "no-search", help = "Do not answer SSDP M-SEARCH queries")]
    pub(crate) no_search: bool,

    #[arg(short = 'v', long = "verbose", help = "Enable verbose logging")]
    pub(crate) verbose: bool,
}

impl ProxyArguments {
    /// SSDP options for a proxy listening on `port`
    pub fn advertise_options(&self, port: u16) -> AdvertiseOptions {
        let location = self.location.clone().unwrap_or_else(|| default_location(port));
        let mut options = AdvertiseOptions::new(location);
        options.service_type = self.service_type.clone();
        options.usn = self.usn.clone();
        options.server = self.server.clone().unwrap_or_else(default_server_header);
        options.max_age = self.max_age;
        options.alive_interval = alive_interval_from_secs(self.alive_interval);
        options.answer_searches = !self.no_search;
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let args = ProxyArguments::try_parse_from(["stproxy"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("config.json"));
        assert_eq!(args.max_age, 1800);
        assert_eq!(args.alive_interval, 10);
        assert!(!args.verbose);

        let options = args.advertise_options(8081);
        assert_eq!(options.service_type, DEFAULT_SERVICE_TYPE);
        assert_eq!(options.usn, DEFAULT_USN);
        assert!(options.location.ends_with(":8081/"));
        assert_eq!(options.alive_interval, Some(Duration::from_secs(10)));
        assert!(options.answer_searches);
    }

    #[test]
    fn test_overrides() {
        let args = ProxyArguments::try_parse_from([
            "stproxy",
            "-c",
            "/etc/stproxy.json",
            "--st",
            "urn:example:device:Proxy:2",
            "--loc",
            "http://10.0.0.2:9000/",
            "--srv",
            "custom",
            "--maxage",
            "120",
            "--ai",
            "-1",
            "--no-search",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.config_path, PathBuf::from("/etc/stproxy.json"));
        assert!(args.verbose);

        let options = args.advertise_options(8081);
        assert_eq!(options.service_type, "urn:example:device:Proxy:2");
        assert_eq!(options.location, "http://10.0.0.2:9000/");
        assert_eq!(options.server, "custom");
        assert_eq!(options.max_age, 120);
        assert_eq!(options.alive_interval, None);
        assert!(!options.answer_searches);
    }

    #[test]
    fn test_help_flag_displays_help() {
        let err = ProxyArguments::try_parse_from(["stproxy", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
