use std::collections::VecDeque;

use serde::Deserialize;

use cert_anchor::domain::{hash_from_hex, Hash256, MerkleProof};
use cert_anchor::infra::{verify_path, LocalStore, SqliteLocalStore};

fn print_help() {
    eprintln!(
        "\
cert-anchor-admin

USAGE:
  cert-anchor-admin <command> [options]

COMMANDS:
  migrate                         Run database migrations
  pending                         List work waiting for the anchoring coordinator
  verify-proof                    Verify a Merkle inclusion proof offline

COMMON OPTIONS:
  --database-url <sqlite_url>     (defaults to env DATABASE_URL)

verify-proof OPTIONS:
  --file <path>                   JSON file with {{\"proof\": {{...}}, \"merkleTreeRoot\": \"..\"}}
  --leaf-hash <hex>               Hex-encoded leaf hash
  --merkle-root <hex>             Hex-encoded Merkle root
  --proof-path <hex,hex,...>      Comma-separated hex sibling hashes
  --leaf-index <n>                Leaf index in the sorted batch
  --leaf-count <n>                Total leaves in the batch
"
    );
}

fn require_database_url(database_url: Option<String>) -> anyhow::Result<String> {
    database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required (or pass --database-url)"))
}

fn next_value(args: &mut VecDeque<String>, flag: &str) -> anyhow::Result<String> {
    args.pop_front()
        .ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

fn hash32(label: &str, raw: &str) -> anyhow::Result<Hash256> {
    hash_from_hex(raw.trim()).ok_or_else(|| anyhow::anyhow!("{label} must be 32 bytes of hex"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProofFile {
    proof: MerkleProof,
    merkle_tree_root: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(command) = args.pop_front() else {
        print_help();
        return Ok(());
    };

    if matches!(command.as_str(), "-h" | "--help" | "help") {
        print_help();
        return Ok(());
    }

    match command.as_str() {
        "migrate" => {
            let mut database_url: Option<String> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--database-url" => {
                        database_url = Some(next_value(&mut args, "--database-url")?);
                    }
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let database_url = require_database_url(database_url)?;
            let store = SqliteLocalStore::connect(&database_url, 1).await?;
            cert_anchor::migrations::run_sqlite(store.pool()).await?;
            println!("ok: migrations applied");
            Ok(())
        }
        "pending" => {
            let mut database_url: Option<String> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--database-url" => {
                        database_url = Some(next_value(&mut args, "--database-url")?);
                    }
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let database_url = require_database_url(database_url)?;
            let store = SqliteLocalStore::connect(&database_url, 1).await?;

            let chains = store.list_chains_with_unbatched().await?;
            println!("local chains with unbatched certificates: {}", chains.len());
            for chain in &chains {
                println!("  {chain}");
            }

            let batches = store.list_pending_write_back().await?;
            println!("batches awaiting write-back: {}", batches.len());
            for batch in &batches {
                println!(
                    "  {}  chain={}  certs={}  root={}  created={}",
                    batch.global_root_id,
                    batch.local_chain_id,
                    batch.cert_id_list.len(),
                    batch.merkle_tree_root,
                    batch.created_at.to_rfc3339(),
                );
            }
            Ok(())
        }
        "verify-proof" => {
            let mut file: Option<String> = None;
            let mut leaf_hash: Option<String> = None;
            let mut merkle_root: Option<String> = None;
            let mut proof_path: Option<String> = None;
            let mut leaf_index: Option<usize> = None;
            let mut leaf_count: Option<usize> = None;

            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--file" => file = Some(next_value(&mut args, "--file")?),
                    "--leaf-hash" => leaf_hash = Some(next_value(&mut args, "--leaf-hash")?),
                    "--merkle-root" => merkle_root = Some(next_value(&mut args, "--merkle-root")?),
                    "--proof-path" => proof_path = Some(next_value(&mut args, "--proof-path")?),
                    "--leaf-index" => {
                        leaf_index = Some(next_value(&mut args, "--leaf-index")?.parse()?);
                    }
                    "--leaf-count" => {
                        leaf_count = Some(next_value(&mut args, "--leaf-count")?.parse()?);
                    }
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let (proof, root) = match file {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)?;
                    let parsed: ProofFile = serde_json::from_str(&raw)?;
                    (parsed.proof, parsed.merkle_tree_root)
                }
                None => {
                    let leaf_hash =
                        leaf_hash.ok_or_else(|| anyhow::anyhow!("--leaf-hash is required"))?;
                    let merkle_root =
                        merkle_root.ok_or_else(|| anyhow::anyhow!("--merkle-root is required"))?;
                    let leaf_index =
                        leaf_index.ok_or_else(|| anyhow::anyhow!("--leaf-index is required"))?;
                    let leaf_count =
                        leaf_count.ok_or_else(|| anyhow::anyhow!("--leaf-count is required"))?;

                    let path = proof_path
                        .as_deref()
                        .unwrap_or_default()
                        .split(',')
                        .filter(|h| !h.trim().is_empty())
                        .map(|h| hash32("proof path entry", h))
                        .collect::<anyhow::Result<Vec<_>>>()?;

                    let proof = MerkleProof::new(
                        hash32("--leaf-hash", &leaf_hash)?,
                        path,
                        leaf_index,
                        leaf_count,
                    );
                    (proof, merkle_root)
                }
            };

            if verify_path(&proof, &root) {
                println!("ok: proof is VALID");
                println!("  leaf_hash:   {}", hex::encode(proof.leaf_hash));
                println!("  leaf_index:  {}", proof.leaf_index);
                println!("  leaf_count:  {}", proof.leaf_count);
                println!("  merkle_root: {}", root);
                println!("  proof_depth: {}", proof.proof_path.len());
            } else {
                println!("FAIL: proof is INVALID");
                std::process::exit(1);
            }
            Ok(())
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}")
        }
    }
}
