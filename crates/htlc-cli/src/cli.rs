use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use htlc_crypto::HashAlgorithm;

#[derive(Parser)]
#[command(
    name = "htlc",
    about = "Hashlock/timelock commitments: derive identifiers, check disclosures, reconcile audit trails",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Machine configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Hash algorithm; overrides the configuration file
    #[arg(long, global = true)]
    pub algorithm: Option<HashAlgorithm>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Digest a byte string
    Hash(HashArgs),
    /// Generate a random secret and its hashlock
    Secret,
    /// Aggregate digest of an ordered item list
    Aggregate(AggregateArgs),
    /// Recompute a commitment identifier from its public parameters
    Derive(DeriveArgs),
    /// Check an item list against a committed count and aggregate
    VerifyItems(VerifyItemsArgs),
    /// Validate and replay an exported audit trail
    Audit(AuditArgs),
    /// Run a scripted session against in-memory machines and export its trail
    Demo(DemoArgs),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct HashArgs {
    /// Input as hex
    #[arg(long)]
    pub hex: Option<String>,
    /// Input as UTF-8 text
    #[arg(long)]
    pub text: Option<String>,
}

#[derive(Args)]
pub struct AggregateArgs {
    /// 32-byte hex items, in order
    #[arg(required = true)]
    pub items: Vec<String>,
}

#[derive(Args)]
pub struct DeriveArgs {
    #[command(subcommand)]
    pub target: DeriveTarget,
}

#[derive(Subcommand)]
pub enum DeriveTarget {
    /// Value escrow identifier
    Escrow {
        #[arg(long)]
        locker: String,
        #[arg(long)]
        claimant: String,
        #[arg(long)]
        hashlock: String,
        #[arg(long)]
        deadline: u64,
    },
    /// Log commitment identifier
    Log {
        #[arg(long)]
        locker: String,
        #[arg(long)]
        claimant: String,
        #[arg(long)]
        hashlock: String,
        #[arg(long)]
        message_digest: String,
        #[arg(long)]
        deadline: u64,
    },
    /// Batch identifier, from an aggregate or from the items themselves
    Batch {
        #[arg(long)]
        locker: String,
        #[arg(long)]
        claimant: String,
        #[arg(long, conflicts_with = "item", required_unless_present = "item")]
        aggregate: Option<String>,
        #[arg(long)]
        item: Vec<String>,
        #[arg(long)]
        message_digest: Option<String>,
        #[arg(long)]
        deadline: u64,
    },
}

#[derive(Args)]
pub struct VerifyItemsArgs {
    #[arg(long)]
    pub aggregate: String,
    #[arg(long)]
    pub count: u64,
    pub items: Vec<String>,
}

#[derive(Args)]
pub struct AuditArgs {
    /// JSON array of audit records
    pub file: PathBuf,
}

#[derive(Args)]
pub struct DemoArgs {
    /// Write the resulting trail here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hash_text() {
        let cli = Cli::try_parse_from(["htlc", "hash", "--text", "hello"]).unwrap();
        if let Command::Hash(args) = cli.command {
            assert_eq!(args.text, Some("hello".into()));
            assert_eq!(args.hex, None);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn hash_needs_exactly_one_input() {
        assert!(Cli::try_parse_from(["htlc", "hash"]).is_err());
        assert!(Cli::try_parse_from(["htlc", "hash", "--hex", "00", "--text", "a"]).is_err());
    }

    #[test]
    fn parse_aggregate() {
        let cli = Cli::try_parse_from(["htlc", "aggregate", "aa", "bb"]).unwrap();
        if let Command::Aggregate(args) = cli.command {
            assert_eq!(args.items, vec!["aa", "bb"]);
        } else { panic!("wrong command"); }
        assert!(Cli::try_parse_from(["htlc", "aggregate"]).is_err());
    }

    #[test]
    fn parse_derive_escrow() {
        let cli = Cli::try_parse_from([
            "htlc", "derive", "escrow", "--locker", "0x01", "--claimant", "0x02",
            "--hashlock", "0x03", "--deadline", "300",
        ])
        .unwrap();
        if let Command::Derive(DeriveArgs { target: DeriveTarget::Escrow { deadline, .. } }) = cli.command {
            assert_eq!(deadline, 300);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_derive_batch_items() {
        let cli = Cli::try_parse_from([
            "htlc", "derive", "batch", "--locker", "a", "--claimant", "b",
            "--item", "x", "--item", "y", "--deadline", "9",
        ])
        .unwrap();
        if let Command::Derive(DeriveArgs { target: DeriveTarget::Batch { item, aggregate, .. } }) = cli.command {
            assert_eq!(item, vec!["x", "y"]);
            assert_eq!(aggregate, None);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn derive_batch_rejects_both_sources() {
        assert!(Cli::try_parse_from([
            "htlc", "derive", "batch", "--locker", "a", "--claimant", "b",
            "--item", "x", "--aggregate", "y", "--deadline", "9",
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "htlc", "derive", "batch", "--locker", "a", "--claimant", "b", "--deadline", "9",
        ])
        .is_err());
    }

    #[test]
    fn parse_verify_items() {
        let cli = Cli::try_parse_from([
            "htlc", "verify-items", "--aggregate", "ff", "--count", "2", "aa", "bb",
        ])
        .unwrap();
        if let Command::VerifyItems(args) = cli.command {
            assert_eq!(args.count, 2);
            assert_eq!(args.items.len(), 2);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_audit() {
        let cli = Cli::try_parse_from(["htlc", "audit", "trail.json"]).unwrap();
        if let Command::Audit(args) = cli.command {
            assert_eq!(args.file, PathBuf::from("trail.json"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "htlc", "--verbose", "--format", "json", "--algorithm", "sha256", "secret",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.algorithm, Some(HashAlgorithm::Sha256));
        assert!(matches!(cli.command, Command::Secret));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        assert!(Cli::try_parse_from(["htlc", "--algorithm", "md5", "secret"]).is_err());
    }
}
