use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};
use titlescrow_client::EscrowClient;
use titlescrow_core::interface::load_json;
use titlescrow_core::{Action, AgreementParams, Identity};
use tracing_subscriber::EnvFilter;

const DEFAULT_RECORD_PATH: &str = "./agreement.json";
const DEFAULT_PARAMS_PATH: &str = "./templates/agreement_params.json";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let client = EscrowClient::open(&cli.record);

    match cli.command {
        Commands::Create { params, force } => {
            let params: AgreementParams = load_json(&params)?;
            client.create(params, force)?;
        }
        Commands::Show => {
            let record = client.record()?;
            let agreement = &record.agreement;
            println!("{}", serde_json::to_string_pretty(agreement)?);
            println!("state:             {}", agreement.state());
            println!("inspection passed: {}", agreement.inspection_passed());
            println!("appraisal passed:  {}", agreement.appraisal_passed());
        }
        Commands::Log => {
            // Loading verifies the audit chain and replays it.
            let record = client.record()?;
            let genesis = record.log.genesis();
            println!(
                "genesis owner {} asking {}  {}",
                genesis.owner,
                genesis.asking_price,
                hex::encode(genesis.digest()),
            );
            for entry in record.log.entries() {
                println!(
                    "#{:<3} {:<14} {} {} -> {}  {}",
                    entry.sequence,
                    entry.event.tag(),
                    entry.event.caller,
                    entry.event.from,
                    entry.event.to,
                    hex::encode(entry.digest),
                );
            }
            tracing::info!(entries = record.log.len(), "audit chain verified");
        }
        command => {
            if let Some((caller, action)) = command.into_action() {
                let entry = client.submit(&caller, action)?;
                println!("{}", entry.event.to);
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "titlescrow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Agreement record file; a `.bin` extension selects the binary form.
    #[arg(short, long, global = true,
        env = "TITLESCROW_RECORD",
        default_value = DEFAULT_RECORD_PATH,
        value_hint = ValueHint::FilePath)]
    record: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Caller {
    /// Identity submitting the operation.
    #[arg(short, long, env = "TITLESCROW_CALLER")]
    caller: Identity,
}

#[derive(Subcommand)]
enum Commands {
    /// List an asset from a params file.
    Create {
        #[arg(short, long,
            value_parser,
            default_value = DEFAULT_PARAMS_PATH,
            value_hint = ValueHint::FilePath)]
        params: PathBuf,

        /// Replace an existing record.
        #[arg(long)]
        force: bool,
    },
    /// Place an offer (MakeOffer).
    Offer {
        #[command(flatten)]
        caller: Caller,
        #[arg(long)]
        inspector: Identity,
        #[arg(long)]
        appraiser: Identity,
        #[arg(long)]
        price: u64,
    },
    /// Change the price of your outstanding offer (ModifyOffer).
    ModifyOffer {
        #[command(flatten)]
        caller: Caller,
        #[arg(long)]
        price: u64,
    },
    /// Withdraw the outstanding offer (RescindOffer).
    Rescind {
        #[command(flatten)]
        caller: Caller,
    },
    /// Turn down the outstanding offer (Reject).
    Reject {
        #[command(flatten)]
        caller: Caller,
    },
    /// Take the outstanding offer and start certification (AcceptOffer).
    AcceptOffer {
        #[command(flatten)]
        caller: Caller,
    },
    /// Update the listing (Modify).
    Modify {
        #[command(flatten)]
        caller: Caller,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: u64,
    },
    /// Certify the inspection (MarkInspected).
    Inspect {
        #[command(flatten)]
        caller: Caller,
    },
    /// Certify the appraisal (MarkAppraised).
    Appraise {
        #[command(flatten)]
        caller: Caller,
    },
    /// Sign off on the certified sale; both buyer and owner must (Accept).
    Accept {
        #[command(flatten)]
        caller: Caller,
    },
    /// Cancel the agreement for good (Terminate).
    Terminate {
        #[command(flatten)]
        caller: Caller,
    },
    /// Print the agreement.
    Show,
    /// Print and verify the audit log.
    Log,
}

impl Commands {
    fn into_action(self) -> Option<(Identity, Action)> {
        let (caller, action) = match self {
            Self::Offer {
                caller,
                inspector,
                appraiser,
                price,
            } => (
                caller,
                Action::MakeOffer {
                    inspector,
                    appraiser,
                    price,
                },
            ),
            Self::ModifyOffer { caller, price } => (caller, Action::ModifyOffer { price }),
            Self::Rescind { caller } => (caller, Action::RescindOffer),
            Self::Reject { caller } => (caller, Action::Reject),
            Self::AcceptOffer { caller } => (caller, Action::AcceptOffer),
            Self::Modify {
                caller,
                description,
                price,
            } => (caller, Action::Modify { description, price }),
            Self::Inspect { caller } => (caller, Action::MarkInspected),
            Self::Appraise { caller } => (caller, Action::MarkAppraised),
            Self::Accept { caller } => (caller, Action::Accept),
            Self::Terminate { caller } => (caller, Action::Terminate),
            Self::Create { .. } | Self::Show | Self::Log => return None,
        };
        Some((caller.caller, action))
    }
}
