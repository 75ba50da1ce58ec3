//! Command line definition

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use cita_client::BucketPolicy;
use shared::models::AppointmentStatus;

use crate::logger::DEFAULT_FILTER;

#[derive(Debug, Parser)]
#[command(name = "cita", version, about = "Book appointments from the terminal")]
pub struct Cli {
    /// API base URL
    #[arg(long, global = true, env = "CITA_API_URL")]
    pub api_url: Option<String>,

    /// Session file
    #[arg(long, global = true, env = "CITA_SESSION_FILE", default_value = ".cita/session.json")]
    pub session_file: PathBuf,

    /// How slots are grouped
    #[arg(long, global = true, value_enum)]
    pub buckets: Option<BucketArg>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = DEFAULT_FILTER)]
    pub log: String,

    /// JSON log lines
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and keep the session on disk
    Login {
        #[arg(long, env = "CITA_EMAIL")]
        email: String,
        #[arg(long, env = "CITA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Search businesses by text, optionally near a point
    Search {
        query: Option<String>,
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Show a business with its weekly hours and services
    Business { slug: String },
    /// List bookable slots of a service
    Availability {
        slug: String,
        service_id: String,
        /// Only this day; otherwise the server's default window
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Book a slot and pay its deposit
    Book(BookArgs),
    /// List my appointments by status
    Appointments {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Print the ticket of one appointment
    Ticket { appointment_id: String },
    /// Pay the outstanding deposit of an existing appointment
    Pay {
        appointment_id: String,
        #[command(flatten)]
        payment: PaymentArgs,
    },
}

#[derive(Debug, Args)]
pub struct BookArgs {
    pub slug: String,
    pub service_id: String,
    /// Day of the slot; the first day offering `time` when omitted
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// Slot time, `HH:MM`
    #[arg(long)]
    pub time: String,
    /// Staff member; required when several can take the slot
    #[arg(long)]
    pub staff: Option<String>,
    #[command(flatten)]
    pub payment: PaymentArgs,
}

#[derive(Debug, Args)]
pub struct PaymentArgs {
    /// Payment method name as listed by the business
    #[arg(long)]
    pub method: String,
    /// Amount to pay now; defaults to the minimum deposit
    #[arg(long)]
    pub amount: Option<f64>,
    /// Card token issued by the provider's card form
    #[arg(long, requires = "card_method")]
    pub card_token: Option<String>,
    /// Provider payment method id of the card
    #[arg(long)]
    pub card_method: Option<String>,
    #[arg(long)]
    pub issuer: Option<String>,
    #[arg(long, default_value_t = 1)]
    pub installments: u32,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BucketArg {
    Fixed,
    Dynamic,
}

impl From<BucketArg> for BucketPolicy {
    fn from(arg: BucketArg) -> Self {
        match arg {
            BucketArg::Fixed => BucketPolicy::FixedPeriods,
            BucketArg::Dynamic => BucketPolicy::DynamicRanges,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Confirmed,
    Pending,
    Completed,
    Cancelled,
}

impl From<StatusArg> for AppointmentStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Confirmed => AppointmentStatus::Confirmed,
            StatusArg::Pending => AppointmentStatus::Pending,
            StatusArg::Completed => AppointmentStatus::Completed,
            StatusArg::Cancelled => AppointmentStatus::Cancelled,
        }
    }
}
