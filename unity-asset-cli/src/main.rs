//! Unity Asset Parser CLI
//!
//! Command-line interface for inspecting Unity binary assets: bundles, raw
//! SerializedFiles, and `.unitypackage` archives.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use unity_asset_binary::{AssetContext, Mesh, UnityVersion};
use unity_asset_core::get_class_name;

#[derive(Parser)]
#[command(name = "unity-asset")]
#[command(about = "A Rust-based Unity binary asset inspector")]
#[command(version)]
struct Cli {
    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a bundle/SerializedFile/unitypackage and print a summary.
    Inspect {
        /// Input file path
        input: PathBuf,
    },

    /// Decode a single Mesh object by path id and print its geometry counts.
    DumpMesh {
        /// Input file path
        input: PathBuf,

        /// path_id of the Mesh object to decode
        #[arg(long)]
        path_id: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Inspect { input } => inspect_command(input),
        Commands::DumpMesh { input, path_id } => dump_mesh_command(input, path_id),
    }
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn inspect_command(input: PathBuf) -> Result<()> {
    let data = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    let mut ctx = AssetContext::new();
    ctx.ingest(&data, &name)
        .map_err(|e| anyhow!("failed to parse {}: {e}", input.display()))?;

    println!("containers: {}", ctx.containers.len());
    println!("serialized files: {}", ctx.serialized_files.len());

    let mut class_counts: HashMap<i32, usize> = HashMap::new();
    let mut total_objects = 0usize;
    for file in &ctx.serialized_files {
        println!(
            "  {} (unity {}, {} objects)",
            file.source_name,
            file.unity_version,
            file.objects.len()
        );
        for obj in file.objects.values() {
            *class_counts.entry(obj.class_id).or_insert(0) += 1;
            total_objects += 1;
        }
    }

    println!("total objects: {total_objects}");
    let mut classes: Vec<_> = class_counts.into_iter().collect();
    classes.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    for (class_id, count) in classes {
        let name = get_class_name(class_id).unwrap_or_else(|| format!("Class_{class_id}"));
        println!("  {name}: {count}");
    }

    println!("warnings: {}", ctx.warnings.len());
    for warning in &ctx.warnings {
        println!("  [{}] {}", warning.code, warning.message);
    }

    Ok(())
}

fn dump_mesh_command(input: PathBuf, path_id: i64) -> Result<()> {
    let data = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    let mut ctx = AssetContext::new();
    ctx.ingest(&data, &name)
        .map_err(|e| anyhow!("failed to parse {}: {e}", input.display()))?;

    let found = ctx
        .serialized_files
        .iter()
        .find_map(|file| file.object(path_id).map(|obj| (file, obj)));

    let Some((file, obj)) = found else {
        return Err(anyhow!("no object with path_id {path_id} found in {}", input.display()));
    };

    if obj.class_id != 43 {
        return Err(anyhow!(
            "object {path_id} is class {} ({}), not Mesh",
            obj.class_id,
            get_class_name(obj.class_id).unwrap_or_else(|| "Unknown".to_string())
        ));
    }

    let version = UnityVersion::parse_version(&file.unity_version).unwrap_or_default();
    let mesh = Mesh::decode(obj, &version)?;

    println!("mesh: {}", mesh.name);
    println!("vertex count: {}", mesh.vertex_count);
    println!("index count: {}", mesh.indices.len());
    println!("submesh count: {}", mesh.sub_meshes.len());
    for (i, triangles) in mesh.get_triangles().iter().enumerate() {
        println!("  submesh[{i}]: {} triangles", triangles.len());
    }
    if let Some(compressed) = &mesh.compressed_mesh {
        println!("compressed mesh: {} packed vertices", compressed.vertices.num_items);
    }

    Ok(())
}
