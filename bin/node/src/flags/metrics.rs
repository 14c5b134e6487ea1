//! Prometheus metrics flags.

use clap::Args;
use std::net::{IpAddr, Ipv4Addr};

/// Configuration of the Prometheus metrics exporter.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct MetricsArgs {
    /// Serve Prometheus metrics over HTTP.
    #[arg(long = "metrics.enabled", env = "ETHSCRIBE_METRICS_ENABLED", default_value_t = false)]
    pub(crate) enabled: bool,

    /// Address the metrics server listens on.
    #[arg(
        long = "metrics.addr",
        env = "ETHSCRIBE_METRICS_ADDR",
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    )]
    pub(crate) addr: IpAddr,

    /// Port the metrics server listens on. `0` picks a free port.
    #[arg(long = "metrics.port", env = "ETHSCRIBE_METRICS_PORT", default_value_t = 9090)]
    pub(crate) port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        metrics: MetricsArgs,
    }

    #[test]
    fn test_metrics_disabled_by_default() {
        let args = TestCli::try_parse_from(["ethscribe"]).unwrap().metrics;
        assert!(!args.enabled);
        assert_eq!(args.addr, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(args.port, 9090);
    }

    #[test]
    fn test_metrics_flags() {
        let args = TestCli::try_parse_from([
            "ethscribe",
            "--metrics.enabled",
            "--metrics.addr",
            "127.0.0.1",
            "--metrics.port",
            "7300",
        ])
        .unwrap()
        .metrics;
        assert!(args.enabled);
        assert_eq!(args.addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(args.port, 7300);
    }
}
