use clap::Parser;
use hwi_bridge::{run, Chain, Settings};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Loopback bridge between web pages and hardware wallets", long_about = None)]
struct Cli {
    #[arg(
        long,
        default_value = "127.0.0.1:5000",
        help = "Loopback address the bridge listens on"
    )]
    listen: SocketAddr,

    #[arg(
        long,
        default_value_t = 120,
        help = "Seconds to wait for an approval answer before denying (0 waits forever)"
    )]
    approval_timeout_secs: u64,

    #[arg(long, default_value = "hwi", help = "Path or name of the hwi executable")]
    hwi: String,

    #[arg(
        long,
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds a single hwi invocation may run"
    )]
    hwi_timeout_secs: u64,

    #[arg(
        long,
        value_parser = parse_chain,
        help = "Chain passed to every hwi call (main|test|regtest|signet)"
    )]
    chain: Option<Chain>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let settings = Settings {
        listen: cli.listen,
        approval_timeout: (cli.approval_timeout_secs > 0)
            .then(|| Duration::from_secs(cli.approval_timeout_secs)),
        hwi_program: cli.hwi,
        hwi_timeout: Duration::from_secs(cli.hwi_timeout_secs),
        chain: cli.chain,
    };

    run(settings).await
}

fn parse_chain(value: &str) -> Result<Chain, String> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;
    use hwi_bridge::Chain;

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["hwi-bridge"]).expect("default parse");
        assert_eq!(cli.listen.to_string(), "127.0.0.1:5000");
        assert_eq!(cli.approval_timeout_secs, 120);
        assert_eq!(cli.hwi, "hwi");
        assert_eq!(cli.hwi_timeout_secs, 300);
        assert!(cli.chain.is_none());
    }

    #[test]
    fn cli_parses_overrides() {
        let cli = Cli::try_parse_from([
            "hwi-bridge",
            "--listen",
            "127.0.0.1:5050",
            "--approval-timeout-secs",
            "0",
            "--hwi",
            "/opt/hwi/bin/hwi",
            "--chain",
            "test",
        ])
        .expect("override parse");
        assert_eq!(cli.listen.port(), 5050);
        assert_eq!(cli.approval_timeout_secs, 0);
        assert_eq!(cli.hwi, "/opt/hwi/bin/hwi");
        assert_eq!(cli.chain, Some(Chain::Test));
    }

    #[test]
    fn cli_rejects_unknown_chain() {
        let result = Cli::try_parse_from(["hwi-bridge", "--chain", "litecoin"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_rejects_zero_hwi_timeout() {
        let result = Cli::try_parse_from(["hwi-bridge", "--hwi-timeout-secs", "0"]);
        assert!(result.is_err());
        let cli = Cli::try_parse_from(["hwi-bridge", "--hwi-timeout-secs", "1"])
            .expect("one second is allowed");
        assert_eq!(cli.hwi_timeout_secs, 1);
    }
}
