use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "eth-fee-analytics",
    version,
    about = "Hourly fee analytics for Ethereum EOA transfers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Override bind address, e.g. 0.0.0.0:8805
        #[arg(long)]
        addr: Option<String>,
    },
    /// Print the hourly average fee for one day, e.g. 2021-Jan-01
    GasHourly {
        #[arg(long)]
        day: String,
    },
    /// Fetch last N blocks over JSON-RPC and store their transactions
    IngestOnce {
        #[arg(long, default_value_t = 5)]
        blocks: u64,
    },
}
