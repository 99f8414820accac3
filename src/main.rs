use anyhow::{bail, Context};
use deltastream::metrics::init_metrics;
use deltastream::{
    DeltaProducer, EngineConfig, Fill, PatchSession, SignatureConsumer, SignatureProducer,
};
use std::io::Cursor;
use std::path::PathBuf;

/// Size of the buffers the encoded streams are moved through
const TRANSFER_CHUNK: usize = 8 * 1024;

fn usage() -> &'static str {
    "usage: deltastream [OLD NEW [OUTPUT]] [--config CONFIG.json]"
}

struct Args {
    old: Option<PathBuf>,
    new: Option<PathBuf>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut args = std::env::args_os().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config = Some(PathBuf::from(args.next().context(usage())?));
        } else if arg == "--help" || arg == "-h" {
            println!("{}", usage());
            std::process::exit(0);
        } else {
            positional.push(PathBuf::from(arg));
        }
    }

    if positional.len() == 1 || positional.len() > 3 {
        bail!(usage());
    }
    let mut positional = positional.into_iter();
    Ok(Args {
        old: positional.next(),
        new: positional.next(),
        output: positional.next(),
        config,
    })
}

/// Old and new sample data: a few kilobytes of text with edits scattered
/// through it
fn sample_data() -> (Vec<u8>, Vec<u8>) {
    let old: Vec<u8> = (0..400)
        .flat_map(|i| format!("line {i:04}: the quick brown fox jumps over the lazy dog\n").into_bytes())
        .collect();

    let mut new = old.clone();
    new.splice(1_000..1_040, b"an edited line in the middle of the file\n".iter().copied());
    new.drain(9_000..9_500);
    new.extend_from_slice(b"a line appended at the end\n");
    (old, new)
}

/// Drain a producer into a consumer through a fixed-size buffer, returning
/// the number of bytes moved
fn pump<P, C>(mut fill: P, mut update: C) -> anyhow::Result<u64>
where
    P: FnMut(&mut [u8]) -> anyhow::Result<Fill>,
    C: FnMut(&[u8]) -> anyhow::Result<()>,
{
    let mut buf = vec![0u8; TRANSFER_CHUNK];
    let mut moved = 0u64;
    while let Fill::Filled(n) = fill(&mut buf)? {
        update(&buf[..n])?;
        moved += n as u64;
    }
    Ok(moved)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_metrics();
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let (old, new) = match (&args.old, &args.new) {
        (Some(old_path), Some(new_path)) => {
            let old = tokio::fs::read(old_path)
                .await
                .with_context(|| format!("reading {}", old_path.display()))?;
            let new = tokio::fs::read(new_path)
                .await
                .with_context(|| format!("reading {}", new_path.display()))?;
            (old, new)
        }
        _ => {
            println!("No input files given, using generated sample data\n");
            sample_data()
        }
    };

    println!("deltastream");
    println!("===========\n");
    println!("  old: {} bytes", old.len());
    println!("  new: {} bytes", new.len());

    // Receiver side: describe the old data
    let mut signature_producer = SignatureProducer::new(config.clone());
    signature_producer.start(&old[..], old.len() as u64)?;
    let mut signature_consumer = SignatureConsumer::new();
    signature_consumer.start()?;
    let signature_bytes = pump(
        |buf| Ok(signature_producer.fill(buf)?),
        |chunk| Ok(signature_consumer.update(chunk)?),
    )?;
    let signature = signature_consumer.finish()?;
    println!(
        "\n✓ Signature: {} blocks of {} bytes, {} bytes on the wire",
        signature.block_count(),
        signature.block_size,
        signature_bytes
    );

    // Sender side: compute the delta; receiver side: apply it as it arrives
    let block_size = signature.block_size;
    let mut delta_producer = DeltaProducer::new(signature, &config);
    delta_producer.start(&new[..])?;
    let mut patch = PatchSession::new(&config).expect_block_size(block_size);
    patch.start(Cursor::new(&old[..]), Vec::with_capacity(new.len()))?;
    let delta_bytes = pump(
        |buf| Ok(delta_producer.fill(buf)?),
        |chunk| Ok(patch.update(chunk)?),
    )?;
    let rebuilt = patch.finish()?;

    let stats = delta_producer.stats();
    println!("✓ Delta: {delta_bytes} bytes on the wire");
    println!("  {stats}");

    if rebuilt != new {
        bail!("rebuilt data does not match the new data");
    }
    println!("✓ Rebuilt {} bytes, checksum verified", rebuilt.len());

    if let Some(output) = &args.output {
        tokio::fs::write(output, &rebuilt)
            .await
            .with_context(|| format!("writing {}", output.display()))?;
        println!("✓ Wrote {}", output.display());
    }

    Ok(())
}
