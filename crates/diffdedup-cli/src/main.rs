//! # diffdedup CLI
//!
//! Command-line utilities for inspecting, replaying, and converting event
//! streams.

use anyhow::{bail, Context, Result};
use diffdedup_core::{EmitPolicy, Replica};
use diffdedup_proto::codec::{from_json_line, read_cbor_frame, to_json_line, write_cbor_frame};
use diffdedup_proto::{json_dedup, JsonDedup, WireInput, WireOutput};
use serde_json::Value;
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match args[1].as_str() {
        "trace" => {
            if args.len() < 3 {
                eprintln!(
                    "Usage: diffdedup trace <ops.jsonl> --key <pointer> \
                     [--sort <pointer>] [--policy <update|reinsert>]"
                );
                std::process::exit(1);
            }
            let options = TraceOptions::parse(&args[3..])?;
            let mut dedup = options.build()?;
            trace(open(&args[2])?, &mut out, &mut dedup)?;
        }
        "replay" => {
            if args.len() < 3 {
                eprintln!("Usage: diffdedup replay <events.jsonl>");
                std::process::exit(1);
            }
            let replica = replay(open(&args[2])?)?;
            for (index, item) in replica.items().iter().enumerate() {
                writeln!(out, "{index}\t{item}")?;
            }
        }
        "encode" => {
            if args.len() < 4 {
                eprintln!("Usage: diffdedup encode <in.jsonl> <out.cbor>");
                std::process::exit(1);
            }
            let file = File::create(&args[3])
                .with_context(|| format!("Failed to create {}", args[3]))?;
            let mut writer = BufWriter::new(file);
            let count = encode(open(&args[2])?, &mut writer)?;
            writer.flush()?;
            eprintln!("Encoded {count} events");
        }
        "decode" => {
            if args.len() < 3 {
                eprintln!("Usage: diffdedup decode <in.cbor>");
                std::process::exit(1);
            }
            let file =
                File::open(&args[2]).with_context(|| format!("Failed to open {}", args[2]))?;
            decode(BufReader::new(file), &mut out)?;
        }
        "help" | "--help" | "-h" => {
            print_help();
        }
        cmd => {
            eprintln!("Unknown command: {cmd}");
            print_help();
            std::process::exit(1);
        }
    }

    out.flush()?;
    Ok(())
}

fn print_help() {
    println!(
        r#"diffdedup CLI

USAGE:
    diffdedup <COMMAND> [OPTIONS]

COMMANDS:
    trace <ops.jsonl>              Run input events through the operator and
                                   print each one with the events it causes
        --key <pointer>            JSON pointer to the cluster key (required)
        --sort <pointer>           JSON pointer to an integer sort field
        --policy <update|reinsert> How in-place changes are emitted
    replay <events.jsonl>          Apply output events to an empty list and
                                   print the final view
    encode <in.jsonl> <out.cbor>   Convert JSON lines to length-prefixed CBOR
    decode <in.cbor>               Convert length-prefixed CBOR to JSON lines
    help                           Show this help message

    Use "-" as a JSON-lines input path to read stdin.

EXAMPLES:
    diffdedup trace ops.jsonl --key /group --sort /rank
    diffdedup trace ops.jsonl --key /group | grep '^<' | cut -c3- > events.jsonl
    diffdedup replay events.jsonl
"#
    );
}

/// Options of the `trace` command.
#[derive(Debug, Default, PartialEq, Eq)]
struct TraceOptions {
    key: Option<String>,
    sort: Option<String>,
    policy: EmitPolicy,
}

impl TraceOptions {
    fn parse(args: &[String]) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.iter();

        while let Some(flag) = args.next() {
            let value = args
                .next()
                .with_context(|| format!("Missing value for {flag}"))?;
            match flag.as_str() {
                "--key" => options.key = Some(value.clone()),
                "--sort" => options.sort = Some(value.clone()),
                "--policy" => options.policy = value.parse()?,
                other => bail!("Unknown option: {other}"),
            }
        }

        Ok(options)
    }

    fn build(&self) -> Result<JsonDedup> {
        json_dedup(self.key.as_deref(), self.sort.as_deref(), self.policy)
            .context("Invalid operator options (pass --key <pointer>)")
    }
}

/// Open a JSON-lines source; `-` is stdin.
fn open(path: &str) -> Result<Box<dyn BufRead>> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("Failed to open {path}"))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Parse a JSON-lines source, numbering lines for error messages.
fn events<R: BufRead, T: serde::de::DeserializeOwned>(
    input: R,
) -> impl Iterator<Item = Result<T>> {
    input
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line_no = index + 1;
            let parsed = line
                .with_context(|| format!("Failed to read line {line_no}"))
                .and_then(|line| {
                    from_json_line::<T>(&line)
                        .with_context(|| format!("Invalid event on line {line_no}"))
                });
            parsed.transpose()
        })
}

fn trace<R: BufRead, W: Write>(input: R, out: &mut W, dedup: &mut JsonDedup) -> Result<()> {
    for op in events::<_, WireInput>(input) {
        let op = op?;
        writeln!(out, "> {}", to_json_line(&op)?)?;
        for event in dedup.apply(op)? {
            writeln!(out, "< {}", to_json_line(&event)?)?;
        }
    }
    Ok(())
}

fn replay<R: BufRead>(input: R) -> Result<Replica<Value>> {
    let mut replica = Replica::new();
    for (index, event) in events::<_, WireOutput>(input).enumerate() {
        replica
            .apply(event?)
            .with_context(|| format!("Event {} does not apply", index + 1))?;
    }
    Ok(replica)
}

fn encode<R: BufRead, W: Write>(input: R, out: &mut W) -> Result<usize> {
    let mut count = 0;
    for event in events::<_, WireInput>(input) {
        write_cbor_frame(out, &event?)?;
        count += 1;
    }
    Ok(count)
}

fn decode<R: Read, W: Write>(mut input: R, out: &mut W) -> Result<usize> {
    let mut count = 0;
    while let Some(event) = read_cbor_frame::<_, WireInput>(&mut input)
        .with_context(|| format!("Invalid frame after {count} events"))?
    {
        writeln!(out, "{}", to_json_line(&event)?)?;
        count += 1;
    }
    Ok(count)
}
