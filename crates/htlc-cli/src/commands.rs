use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use htlc_audit::{
    AuditLog, AuditRecord, EscrowOutcome, InMemoryAuditLog, ObservedCommitment, ObservedState,
    ReconciliationProjection, StreamValidator,
};
use htlc_crypto::{AggregateHasher, HashAlgorithm, IdentifierDeriver};
use htlc_machines::{
    BatchAggregationMachine, Clock, Environment, InMemoryValueLedger, LogCommitmentMachine,
    MachineConfig, ManualClock, ValueEscrowMachine,
};
use htlc_types::{Address, BatchTerms, Digest, EscrowTerms, LogTerms, Secret, Timestamp};
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli.config.as_deref(), cli.algorithm)?;
    debug!(algorithm = %config.hash_algorithm, "configuration resolved");
    let json = matches!(cli.format, OutputFormat::Json);
    let algorithm = config.hash_algorithm;

    match cli.command {
        Command::Hash(args) => cmd_hash(algorithm, args, json),
        Command::Secret => cmd_secret(algorithm, json),
        Command::Aggregate(args) => cmd_aggregate(algorithm, args, json),
        Command::Derive(args) => cmd_derive(algorithm, args.target, json),
        Command::VerifyItems(args) => cmd_verify_items(algorithm, args, json),
        Command::Audit(args) => cmd_audit(algorithm, &args.file, json),
        Command::Demo(args) => cmd_demo(config, args),
    }
}

fn resolve_config(path: Option<&Path>, algorithm: Option<HashAlgorithm>) -> anyhow::Result<MachineConfig> {
    let config = match path {
        Some(path) => MachineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => MachineConfig::default(),
    };
    Ok(match algorithm {
        Some(algorithm) => config.with_algorithm(algorithm),
        None => config,
    })
}

fn parse_digest(label: &str, s: &str) -> anyhow::Result<Digest> {
    Digest::from_hex(s).with_context(|| format!("{label}: expected 32-byte hex, got {s:?}"))
}

fn parse_address(label: &str, s: &str) -> anyhow::Result<Address> {
    Address::from_hex(s).with_context(|| format!("{label}: expected 20-byte hex address, got {s:?}"))
}

fn parse_items(items: &[String]) -> anyhow::Result<Vec<Digest>> {
    items
        .iter()
        .enumerate()
        .map(|(i, s)| parse_digest(&format!("item {i}"), s))
        .collect()
}

fn cmd_hash(algorithm: HashAlgorithm, args: HashArgs, json: bool) -> anyhow::Result<()> {
    let bytes = match (args.hex, args.text) {
        (Some(hex_input), _) => {
            let trimmed = hex_input.strip_prefix("0x").unwrap_or(&hex_input);
            hex::decode(trimmed).context("--hex: invalid hex input")?
        }
        (None, Some(text)) => text.into_bytes(),
        (None, None) => bail!("one of --hex or --text is required"),
    };
    let digest = algorithm.digest(&bytes);
    if json {
        println!("{}", json!({ "algorithm": algorithm, "length": bytes.len(), "digest": digest }));
    } else {
        println!("{} {}", format!("{algorithm}:").dimmed(), digest.to_string().cyan());
    }
    Ok(())
}

fn cmd_secret(algorithm: HashAlgorithm, json: bool) -> anyhow::Result<()> {
    let secret = Secret::random();
    let hashlock = algorithm.digest(secret.as_bytes());
    if json {
        println!("{}", json!({ "algorithm": algorithm, "secret": secret, "hashlock": hashlock }));
    } else {
        println!("  Secret:   {}", format!("0x{}", secret.to_hex()).yellow());
        println!("  Hashlock: {}", hashlock.to_string().cyan());
        println!("  {}", "Keep the secret private until withdrawal.".dimmed());
    }
    Ok(())
}

fn cmd_aggregate(algorithm: HashAlgorithm, args: AggregateArgs, json: bool) -> anyhow::Result<()> {
    let items = parse_items(&args.items)?;
    let aggregate = AggregateHasher::new(algorithm).aggregate(&items);
    if json {
        println!("{}", json!({ "count": items.len(), "aggregate": aggregate }));
    } else {
        println!("Aggregate of {} items: {}", items.len().to_string().bold(), aggregate.to_string().cyan());
    }
    Ok(())
}

fn cmd_derive(algorithm: HashAlgorithm, target: DeriveTarget, json: bool) -> anyhow::Result<()> {
    let deriver = IdentifierDeriver::new(algorithm);
    let (kind, id) = match target {
        DeriveTarget::Escrow { locker, claimant, hashlock, deadline } => {
            let terms = EscrowTerms {
                locker: parse_address("--locker", &locker)?,
                claimant: parse_address("--claimant", &claimant)?,
                hashlock: parse_digest("--hashlock", &hashlock)?,
                deadline: Timestamp::from_secs(deadline),
            };
            ("escrow", deriver.escrow_id(&terms))
        }
        DeriveTarget::Log { locker, claimant, hashlock, message_digest, deadline } => {
            let terms = LogTerms {
                locker: parse_address("--locker", &locker)?,
                claimant: parse_address("--claimant", &claimant)?,
                hashlock: parse_digest("--hashlock", &hashlock)?,
                message_digest: parse_digest("--message-digest", &message_digest)?,
                deadline: Timestamp::from_secs(deadline),
            };
            ("log", deriver.log_id(&terms))
        }
        DeriveTarget::Batch { locker, claimant, aggregate, item, message_digest, deadline } => {
            let aggregate_digest = match aggregate {
                Some(hex_digest) => parse_digest("--aggregate", &hex_digest)?,
                None => AggregateHasher::new(algorithm).aggregate(&parse_items(&item)?),
            };
            let message_digest = match message_digest {
                Some(hex_digest) => parse_digest("--message-digest", &hex_digest)?,
                None => Digest::ZERO,
            };
            let terms = BatchTerms {
                locker: parse_address("--locker", &locker)?,
                claimant: parse_address("--claimant", &claimant)?,
                aggregate_digest,
                message_digest,
                deadline: Timestamp::from_secs(deadline),
            };
            ("batch", deriver.batch_id(&terms))
        }
    };

    if json {
        println!("{}", json!({ "kind": kind, "algorithm": algorithm, "id": id }));
    } else {
        println!("{} id: {}", kind.bold(), id.to_string().yellow());
    }
    Ok(())
}

fn cmd_verify_items(algorithm: HashAlgorithm, args: VerifyItemsArgs, json: bool) -> anyhow::Result<()> {
    let expected = parse_digest("--aggregate", &args.aggregate)?;
    let items = parse_items(&args.items)?;
    let outcome = AggregateHasher::new(algorithm).verify(&items, args.count, &expected);

    if json {
        println!(
            "{}",
            json!({
                "valid": outcome.is_ok(),
                "error": outcome.as_ref().err().map(ToString::to_string),
            })
        );
    } else {
        match &outcome {
            Ok(()) => println!("{} {} items match the aggregate", "✓".green().bold(), items.len()),
            Err(e) => println!("{} {}", "✗".red().bold(), e),
        }
    }
    outcome.map_err(anyhow::Error::from)
}

fn cmd_audit(algorithm: HashAlgorithm, file: &Path, json: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let records: Vec<AuditRecord> =
        serde_json::from_str(&text).context("parsing audit records")?;

    let report = StreamValidator::validate(&records);
    let projection = ReconciliationProjection::replay(&records, algorithm);

    if json {
        let commitments: Vec<_> = projection.commitments.values().map(observed_json).collect();
        let stream: Vec<_> = report
            .violations
            .iter()
            .map(|v| json!({ "seq": v.seq, "kind": format!("{:?}", v.kind), "description": v.description }))
            .collect();
        let reconciliation: Vec<_> = projection
            .violations
            .iter()
            .map(|v| {
                json!({
                    "seq": v.seq,
                    "id": v.id,
                    "kind": format!("{:?}", v.kind),
                    "description": v.description,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "records": report.record_count,
                "hash_chain_valid": report.hash_chain_valid,
                "sequence_monotonic": report.sequence_monotonic,
                "timestamps_monotonic": report.timestamps_monotonic,
                "stream_violations": stream,
                "reconciliation_violations": reconciliation,
                "commitments": commitments,
            }))?
        );
    } else {
        println!("Audit trail: {} records", report.record_count.to_string().bold());
        println!("  Hash chain: {}", pass_fail(report.hash_chain_valid, "valid", "broken"));
        println!("  Sequences: {}", pass_fail(report.sequence_monotonic, "monotonic", "gapped"));
        println!("  Timestamps: {}", pass_fail(report.timestamps_monotonic, "monotonic", "regressing"));
        for v in &report.violations {
            println!("    {} seq {}: {:?} — {}", "✗".red(), v.seq, v.kind, v.description);
        }

        println!("\nCommitments ({}):", projection.commitments.len());
        for commitment in projection.commitments.values() {
            let (kind, status) = describe(&commitment.state);
            println!(
                "  {} {:<6} {}  (seq {}..{})",
                commitment.id.short_id().yellow(),
                kind,
                status,
                commitment.created_seq,
                commitment.last_seq
            );
        }
        if !projection.violations.is_empty() {
            println!("\nReconciliation violations ({}):", projection.violations.len());
            for v in &projection.violations {
                println!("  {} seq {} {}: {:?} — {}", "✗".red(), v.seq, v.id.short_id(), v.kind, v.description);
            }
        }
    }

    if !report.is_valid() || !projection.is_consistent() {
        bail!(
            "audit trail failed validation: {} stream violations, {} reconciliation violations",
            report.violations.len(),
            projection.violations.len()
        );
    }
    Ok(())
}

fn pass_fail(ok: bool, good: &str, bad: &str) -> String {
    if ok {
        good.green().to_string()
    } else {
        bad.red().bold().to_string()
    }
}

fn describe(state: &ObservedState) -> (&'static str, String) {
    match state {
        ObservedState::Escrow { amount, outcome, .. } => {
            let status = match outcome {
                EscrowOutcome::Open => format!("open, {amount} locked"),
                EscrowOutcome::Withdrawn { .. } => format!("withdrawn, {amount} paid to claimant"),
                EscrowOutcome::Refunded => format!("refunded, {amount} returned to locker"),
            };
            ("escrow", status)
        }
        ObservedState::Log { verified, .. } => {
            ("log", if *verified { "verified".into() } else { "created".into() })
        }
        ObservedState::Batch { items, released, verified, .. } => (
            "batch",
            format!(
                "{} items, {}, {}",
                items.len(),
                if *released { "released" } else { "sealed" },
                if *verified { "verified" } else { "unverified" }
            ),
        ),
    }
}

fn observed_json(commitment: &ObservedCommitment) -> serde_json::Value {
    let (kind, status) = describe(&commitment.state);
    let mut value = json!({
        "id": commitment.id,
        "kind": kind,
        "status": status,
        "created_seq": commitment.created_seq,
        "last_seq": commitment.last_seq,
    });
    if let ObservedState::Escrow { outcome: EscrowOutcome::Withdrawn { secret }, .. } = &commitment.state {
        value["revealed_secret"] = json!(secret);
    }
    value
}

/// Runs one escrow, one log commitment and one batch end to end on a manual
/// clock, then prints or writes the shared audit trail.
fn cmd_demo(config: MachineConfig, args: DemoArgs) -> anyhow::Result<()> {
    let algorithm = config.hash_algorithm;
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(1_700_000_000)));
    let audit = Arc::new(InMemoryAuditLog::new());
    let ledger = Arc::new(InMemoryValueLedger::new());
    let env = Environment::new(config, clock.clone(), audit.clone());

    let alice = Address::from_label("alice");
    let bob = Address::from_label("bob");
    ledger.fund(alice, 1_000_000)?;
    let deadline = clock.now().saturating_add_secs(300);

    let escrows = ValueEscrowMachine::new(env.clone(), ledger.clone());
    let secret = Secret::random();
    let paid = escrows.create(alice, bob, algorithm.digest(secret.as_bytes()), deadline, 300_000)?;
    escrows.withdraw(bob, &paid, &secret)?;
    let expired = escrows.create(alice, bob, algorithm.digest(&[0u8; 32]), deadline, 50_000)?;
    clock.advance(300);
    escrows.refund(alice, &expired)?;

    let logs = LogCommitmentMachine::new(env.clone());
    let message = b"quarterly reserves attested";
    let log_id = logs.create(
        alice,
        bob,
        algorithm.digest(secret.as_bytes()),
        algorithm.digest(message),
        clock.now().saturating_add_secs(600),
    )?;
    logs.verify(bob, &log_id, message)?;

    let batches = BatchAggregationMachine::new(env);
    let items: Vec<Digest> = ["invoice-1", "invoice-2", "invoice-3"]
        .iter()
        .map(|doc| algorithm.digest(doc.as_bytes()))
        .collect();
    let batch_id = batches.create_batch(
        alice,
        bob,
        &items,
        Some(algorithm.digest(message)),
        clock.now().saturating_add_secs(600),
    )?;
    batches.release(alice, &batch_id)?;
    batches.verify_items(bob, &batch_id, &items)?;

    let trail = audit.to_json()?;
    match args.out {
        Some(path) => {
            std::fs::write(&path, &trail).with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "{} {} records written to {}",
                "✓".green().bold(),
                audit.len()?,
                path.display().to_string().bold()
            );
            for (label, id) in [("escrow", paid), ("escrow", expired), ("log", log_id), ("batch", batch_id)] {
                eprintln!("  {label:<6} {}", id.short_id().yellow());
            }
        }
        None => println!("{trail}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_flag_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"hash_algorithm = \"sha256\"\n").unwrap();

        let from_file = resolve_config(Some(file.path()), None).unwrap();
        assert_eq!(from_file.hash_algorithm, HashAlgorithm::Sha256);

        let overridden = resolve_config(Some(file.path()), Some(HashAlgorithm::Blake3)).unwrap();
        assert_eq!(overridden.hash_algorithm, HashAlgorithm::Blake3);

        assert_eq!(resolve_config(None, None).unwrap(), MachineConfig::default());
    }

    #[test]
    fn demo_trail_passes_audit() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("trail.json");
        cmd_demo(MachineConfig::default(), DemoArgs { out: Some(out.clone()) }).unwrap();
        cmd_audit(HashAlgorithm::Blake3, &out, true).unwrap();

        let records: Vec<AuditRecord> =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(records.len(), 9);
    }

    #[test]
    fn audit_rejects_wrong_algorithm() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("trail.json");
        cmd_demo(MachineConfig::default(), DemoArgs { out: Some(out.clone()) }).unwrap();
        assert!(cmd_audit(HashAlgorithm::Sha256, &out, false).is_err());
    }

    #[test]
    fn item_parsing_reports_position() {
        let err = parse_items(&["00".repeat(32), "zz".into()]).unwrap_err();
        assert!(err.to_string().contains("item 1"));
    }

    #[test]
    fn verify_items_fails_on_mismatch() {
        let items = vec![format!("0x{}", "11".repeat(32))];
        let aggregate = AggregateHasher::new(HashAlgorithm::Blake3)
            .aggregate(&parse_items(&items).unwrap())
            .to_string();
        let ok = VerifyItemsArgs { aggregate: aggregate.clone(), count: 1, items: items.clone() };
        assert!(cmd_verify_items(HashAlgorithm::Blake3, ok, true).is_ok());

        let wrong_count = VerifyItemsArgs { aggregate, count: 2, items };
        assert!(cmd_verify_items(HashAlgorithm::Blake3, wrong_count, true).is_err());
    }
}
