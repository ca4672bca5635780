//! PLY CLI - Tool for inspecting and converting PLY files.

use std::env;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::time::Instant;

use plyio::prelude::*;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Verbosity selected by the global flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Verbosity {
    Quiet,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    fn directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

/// `RUST_LOG` wins over the command line flags.
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut verbosity = Verbosity::Info;
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => verbosity = Verbosity::Debug,
            "-vv" | "--trace" => verbosity = Verbosity::Trace,
            "-q" | "--quiet" => verbosity = Verbosity::Quiet,
            _ => filtered_args.push(arg),
        }
    }
    init_tracing(verbosity);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        // Info command - show header summary
        "info" | "i" => {
            let Some(path) = positional(&filtered_args[1..]).first().copied() else {
                usage("ply-cli info <file.ply> [--json]");
            };
            let json = filtered_args.iter().any(|&s| s == "--json" || s == "-j");
            cmd_info(path, json)
        }

        // Read command - request common vertex/face columns
        "read" | "r" => {
            let Some(path) = filtered_args.get(1).copied() else {
                usage("ply-cli read <file.ply>");
            };
            cmd_read(path)
        }

        // Convert command - re-encode every property
        "convert" | "c" => {
            let files = positional(&filtered_args[1..]);
            let &[input, output] = files.as_slice() else {
                usage("ply-cli convert <in.ply> <out.ply> [--ascii|--binary|--big-endian]");
            };
            let encoding = if filtered_args.contains(&"--ascii") {
                Some(Encoding::Ascii)
            } else if filtered_args.contains(&"--big-endian") {
                Some(Encoding::BinaryBigEndian)
            } else if filtered_args.contains(&"--binary") {
                Some(Encoding::BinaryLittleEndian)
            } else {
                None
            };
            cmd_convert(input, output, encoding)
        }

        "version" | "-V" | "--version" => {
            print_version();
            Ok(())
        }

        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        // Passing a .ply file directly is equivalent to 'info'
        path if path.ends_with(".ply") => cmd_info(path, false),

        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Run 'ply-cli help' for usage");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn positional<'a>(args: &[&'a str]) -> Vec<&'a str> {
    args.iter().copied().filter(|s| !s.starts_with('-')).collect()
}

fn usage(text: &str) -> ! {
    eprintln!("Error: missing file argument");
    eprintln!("Usage: {}", text);
    std::process::exit(1);
}

fn print_help() {
    println!("ply-cli - PLY file toolkit");
    println!();
    println!("USAGE:");
    println!("    ply-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info    <file> [--json]        Show header: format, comments, elements, properties");
    println!("    r, read    <file>                 Read common vertex/face columns and report counts");
    println!("    c, convert <in> <out> [ENCODING]  Re-write every property, optionally re-encoded");
    println!("    version                           Show version and build date");
    println!("    h, help                           Show this help");
    println!();
    println!("ENCODING:");
    println!("    --ascii          ASCII body");
    println!("    --binary         Binary little-endian body");
    println!("    --big-endian     Binary big-endian body");
    println!("    (default: keep the input encoding)");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!("    RUST_LOG overrides these when set");
    println!();
    println!("EXAMPLES:");
    println!("    ply-cli info bunny.ply                    # Quick overview");
    println!("    ply-cli info bunny.ply --json             # Header as JSON");
    println!("    ply-cli read scan.ply                     # Time a full read");
    println!("    ply-cli convert in.ply out.ply --ascii    # Binary to ASCII");
}

fn print_version() {
    println!("ply-cli {}", env!("CARGO_PKG_VERSION"));
    println!("Built {} {}", env!("PLY_BUILD_DATE"), env!("PLY_BUILD_TIME"));
}

fn open(path: &str) -> Result<(BufReader<File>, PlyFile)> {
    info!("Opening file: {}", path);
    let mut reader = BufReader::new(File::open(path)?);
    let ply = PlyFile::parse_header(&mut reader)?;
    debug!("Header parsed: {} elements", ply.elements().len());
    Ok((reader, ply))
}

fn cmd_info(path: &str, json: bool) -> Result<()> {
    let (_, ply) = open(path)?;

    if json {
        let elements: Vec<serde_json::Value> = ply
            .elements()
            .iter()
            .map(|e| {
                let properties: Vec<serde_json::Value> = e
                    .properties
                    .iter()
                    .map(|p| match p.kind {
                        PropertyKind::Scalar(ty) => serde_json::json!({
                            "name": p.name,
                            "type": ty.name(),
                        }),
                        PropertyKind::List { count, item } => serde_json::json!({
                            "name": p.name,
                            "type": item.name(),
                            "list_count_type": count.name(),
                        }),
                    })
                    .collect();
                serde_json::json!({
                    "name": e.name,
                    "count": e.count,
                    "properties": properties,
                })
            })
            .collect();
        let doc = serde_json::json!({
            "file": path,
            "format": ply.encoding().token(),
            "binary": ply.encoding().is_binary(),
            "version": ply.schema().version,
            "comments": ply.comments(),
            "obj_info": ply.obj_info(),
            "elements": elements,
        });
        match serde_json::to_string_pretty(&doc) {
            Ok(text) => println!("{}", text),
            Err(e) => return Err(Error::InternalInconsistency(format!("JSON encoding failed: {}", e))),
        }
        return Ok(());
    }

    println!("File:    {}", path);
    println!("Format:  {} {}", ply.encoding(), ply.schema().version);
    for comment in ply.comments() {
        println!("Comment: {}", comment);
    }
    for line in ply.obj_info() {
        println!("Info:    {}", line);
    }
    println!();
    for element in ply.elements() {
        println!("element {} ({} instances)", element.name, element.count);
        for property in &element.properties {
            println!("    {}", property);
        }
    }
    Ok(())
}

fn cmd_read(path: &str) -> Result<()> {
    let (mut reader, mut ply) = open(path)?;

    // Each request is optional; files carry any subset of these.
    let mut try_request = |label: &'static str, element: &str, names: &[&str], list_hint: Option<usize>| {
        let result = match (names, list_hint) {
            ([name], Some(len)) => ply.request_list_properties(element, name, len),
            _ => ply.request_properties(element, names),
        };
        match result {
            Ok(handle) => Some((label, handle)),
            Err(e) => {
                warn!("{}: {}", label, e);
                None
            }
        }
    };

    let requests: Vec<(&str, RequestHandle)> = [
        try_request("vertices", "vertex", &["x", "y", "z"], None),
        try_request("normals", "vertex", &["nx", "ny", "nz"], None),
        try_request("colors", "vertex", &["red", "green", "blue", "alpha"], None),
        try_request("faces", "face", &["vertex_indices"], Some(3)),
        try_request("texcoords", "face", &["texcoord"], Some(6)),
    ]
    .into_iter()
    .flatten()
    .collect();

    let start = Instant::now();
    let data = ply.read(&mut reader)?;
    let elapsed = start.elapsed();

    println!("File: {}", path);
    println!("Read in {:.3} ms", elapsed.as_secs_f64() * 1000.0);
    for (label, handle) in requests {
        if let Some(buffer) = data.get(handle) {
            let layout = match buffer.layout() {
                ListLayout::Scalar { stride } => format!("{} per instance", stride),
                ListLayout::Uniform(n) => format!("{} per list", n),
                ListLayout::Variable(_) => "variable lists".to_string(),
            };
            println!(
                "  {:<10} {:>10} total ({} values, {}, {})",
                label,
                buffer.count(),
                buffer.len(),
                buffer.property_type(),
                layout
            );
        }
    }
    Ok(())
}

fn cmd_convert(input: &str, output: &str, encoding: Option<Encoding>) -> Result<()> {
    let (mut reader, mut source) = open(input)?;
    let encoding = encoding.unwrap_or(source.encoding());

    // One request per declared property, so types and layouts carry over as-is.
    let mut requests: Vec<(String, String, Option<PropertyType>, RequestHandle)> = Vec::new();
    let elements = source.elements().to_vec();
    for element in &elements {
        if element.properties.is_empty() {
            warn!("Element '{}' has no properties and is dropped", element.name);
            continue;
        }
        for (index, property) in element.properties.iter().enumerate() {
            // First declaration wins; later duplicates cannot be requested separately.
            if element.property(&property.name).map(|(i, _)| i) != Some(index) {
                warn!("Duplicate property '{}' of '{}' is dropped", property.name, element.name);
                continue;
            }
            let handle = source.request_properties(&element.name, &[property.name.as_str()])?;
            requests.push((element.name.clone(), property.name.clone(), property.count_type(), handle));
        }
    }

    let start = Instant::now();
    let mut data = source.read(&mut reader)?;
    debug!("Read {} in {:.3} ms", input, start.elapsed().as_secs_f64() * 1000.0);

    let mut target = PlyFile::new();
    for comment in source.comments() {
        target.add_comment(comment.clone());
    }
    for line in source.obj_info() {
        target.add_obj_info(line.clone());
    }
    for (element, property, count_type, handle) in requests {
        let buffer = data.take(handle).ok_or_else(|| {
            Error::InternalInconsistency(format!("no data read for '{}' of '{}'", property, element))
        })?;
        target.add_buffer(&element, &[property.as_str()], buffer, count_type)?;
    }

    let mut out = BufWriter::new(File::create(output)?);
    target.write_encoded(&mut out, encoding)?;
    out.flush()?;

    info!("Wrote {} ({})", output, encoding);
    Ok(())
}
