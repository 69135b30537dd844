use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use shim_adapter::patch::{
    apply_patches, load_from_path, load_patch_set, serialize_config, ApplicationError,
    ApplyOptions, Format, PatchResult, PatchSet,
};
use shim_adapter::{ClassNode, ClassSet, PatchEnvironment};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, Level};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "shim-adapter")]
#[command(about = "Retarget mixin shims onto a new build", long_about = None)]
#[command(version)]
struct Cli {
    /// Log matching decisions (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patch files to a JSON class set
    Apply {
        /// Class set to patch (JSON)
        #[arg(short, long)]
        classes: PathBuf,

        /// Patch file or directory of patch files (defaults to $SHIM_ADAPTER_PATCHES, then ./patches)
        #[arg(short, long)]
        patches: Option<PathBuf>,

        /// Refmap used to resolve references written inside shims
        #[arg(short, long)]
        refmap: Option<PathBuf>,

        /// Build version checked against each file's version_range
        #[arg(short, long)]
        build_version: Option<String>,

        /// Only patch these classes (internal names, repeatable)
        #[arg(long = "class")]
        only: Vec<String>,

        /// Write the patched class set here instead of in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dry run - report what would change without writing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show a diff of every changed method
        #[arg(short, long)]
        diff: bool,
    },

    /// Validate patch files without applying them
    Check {
        /// Patch file or directory of patch files
        patches: Option<PathBuf>,
    },

    /// List patches and their version constraints
    List {
        /// Patch file or directory of patch files
        patches: Option<PathBuf>,
    },

    /// Convert a patch file between TOML and JSON (by extension)
    Convert { input: PathBuf, output: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Apply {
            classes,
            patches,
            refmap,
            build_version,
            only,
            output,
            dry_run,
            diff,
        } => cmd_apply(ApplyArgs {
            classes,
            patches,
            refmap,
            options: ApplyOptions {
                build_version,
                classes: only,
            },
            output,
            dry_run,
            show_diff: diff,
        }),

        Commands::Check { patches } => cmd_check(patches),

        Commands::List { patches } => cmd_list(patches),

        Commands::Convert { input, output } => cmd_convert(&input, &output),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve the patch location.
///
/// Priority order:
/// 1. Explicit path
/// 2. SHIM_ADAPTER_PATCHES environment variable
/// 3. `./patches`
fn resolve_patches(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    if let Ok(env_path) = env::var("SHIM_ADAPTER_PATCHES") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: SHIM_ADAPTER_PATCHES is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    let local = env::current_dir()?.join("patches");
    if local.exists() {
        return Ok(local);
    }

    anyhow::bail!(
        "{}\n{}\n  {}\n  {}",
        "Could not find any patch files.".red(),
        "Try one of:".bold(),
        "1. Pass a file or directory: shim-adapter apply --patches path/to/patches",
        "2. Set environment variable: export SHIM_ADAPTER_PATCHES=path/to/patches"
    )
}

/// A single file, or every `.toml`/`.json` file directly inside a directory.
fn discover_patch_files(location: &Path) -> Result<Vec<PathBuf>> {
    if location.is_file() {
        return Ok(vec![location.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(location).max_depth(1) {
        let entry = entry?;
        let is_patch = matches!(
            entry.path().extension().and_then(|s| s.to_str()),
            Some("toml") | Some("json")
        );
        if entry.file_type().is_file() && is_patch {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No .toml or .json patch files found in {}", location.display());
    }
    Ok(files)
}

/// Write through a temp file in the destination directory, then rename.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn render_class(class: &ClassNode) -> String {
    class.methods.iter().map(ToString::to_string).collect()
}

/// Helper: Show unified diff between original and patched class text
fn display_diff(class: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", class).dimmed());
    println!("{}", format!("+++ {} (patched)", class).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

struct ApplyArgs {
    classes: PathBuf,
    patches: Option<PathBuf>,
    refmap: Option<PathBuf>,
    options: ApplyOptions,
    output: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
}

#[derive(Default)]
struct Totals {
    applied: usize,
    unchanged: usize,
    skipped: usize,
    failed: usize,
}

fn cmd_apply(args: ApplyArgs) -> Result<()> {
    let patch_files = discover_patch_files(&resolve_patches(args.patches)?)?;

    let input = fs::read_to_string(&args.classes)
        .with_context(|| format!("failed to read {}", args.classes.display()))?;
    let mut classes = ClassSet::from_json(&input)
        .with_context(|| format!("failed to parse class set {}", args.classes.display()))?;

    let env = match &args.refmap {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            PatchEnvironment::from_refmap_json(&raw)?
        }
        None => PatchEnvironment::default(),
    };

    println!("Classes: {} ({} loaded)", args.classes.display(), classes.classes.len());
    if let Some(version) = &args.options.build_version {
        println!("Build: {}", version);
    }
    if args.dry_run {
        println!("{}", "[DRY RUN - nothing will be written]".cyan());
    }
    println!();

    let before: Vec<(String, String)> = if args.show_diff {
        classes
            .classes
            .iter()
            .map(|class| (class.name.clone(), render_class(class)))
            .collect()
    } else {
        Vec::new()
    };

    let mut totals = Totals::default();
    for patch_file in patch_files {
        println!("Loading patches from {}...", patch_file.display());
        let set = load_patch_set(&patch_file)?;
        if set.definitions.is_empty() {
            println!("{}", "  No patches found in file".yellow());
            continue;
        }
        let results = apply_patches(&set, &mut classes, &env, &args.options);
        report(&results, &mut totals);
        println!();
    }

    if args.show_diff {
        for (name, original) in &before {
            if let Some(class) = classes.classes.iter().find(|c| &c.name == name) {
                let patched = render_class(class);
                if &patched != original {
                    display_diff(name, original, &patched);
                }
            }
        }
        println!();
    }

    if !args.dry_run && totals.applied > 0 {
        let destination = args.output.as_deref().unwrap_or(&args.classes);
        write_atomic(destination, &classes.to_json_pretty()?)?;
        debug!(path = %destination.display(), "wrote patched class set");
        println!("Wrote {}", destination.display());
    }

    println!("{}", "Summary:".bold());
    println!("  {} changed", format!("{}", totals.applied).green());
    println!("  {} unchanged", format!("{}", totals.unchanged).yellow());
    println!("  {} skipped", format!("{}", totals.skipped).cyan());
    println!("  {} failed", format!("{}", totals.failed).red());

    if totals.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn report(results: &[(String, Result<PatchResult, ApplicationError>)], totals: &mut Totals) {
    for (patch_id, result) in results {
        match result {
            Ok(outcome @ (PatchResult::Applied { .. } | PatchResult::Disabled { .. })) => {
                println!("{} {}: {}", "✓".green(), patch_id, outcome);
                totals.applied += 1;
            }
            Ok(outcome @ (PatchResult::Passed { .. } | PatchResult::NotMatched)) => {
                println!("{} {}: {}", "⊙".yellow(), patch_id, outcome);
                totals.unchanged += 1;
            }
            Ok(PatchResult::SkippedVersion { reason }) => {
                println!("{} {}: Skipped ({})", "⊘".cyan(), patch_id, reason);
                totals.skipped += 1;
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), patch_id, e);
                totals.failed += 1;

                match e {
                    ApplicationError::ClassNotFound { class } => {
                        eprintln!("  {}", "CONFLICT: requested class is not in the set".red());
                        eprintln!("  Class: {}", class);
                    }
                    ApplicationError::Transform { .. } => {
                        eprintln!("  Possible causes:");
                        eprintln!("    - Target method lost a parameter the shim still reads");
                        eprintln!("    - Descriptor in the class set is malformed");
                    }
                    ApplicationError::Version(_) => {}
                }
            }
        }
    }
}

fn cmd_check(patches: Option<PathBuf>) -> Result<()> {
    let patch_files = discover_patch_files(&resolve_patches(patches)?)?;

    let mut invalid = 0;
    for patch_file in patch_files {
        match load_patch_set(&patch_file) {
            Ok(set) => println!(
                "{} {} ({} patches)",
                "✓".green(),
                patch_file.display(),
                set.definitions.len()
            ),
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                invalid += 1;
            }
        }
    }

    if invalid > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_list(patches: Option<PathBuf>) -> Result<()> {
    let patch_files = discover_patch_files(&resolve_patches(patches)?)?;

    for patch_file in patch_files {
        let set: PatchSet = load_patch_set(&patch_file)?;
        let range = set.meta.version_range.as_deref().unwrap_or("any build");
        println!(
            "{} {}",
            set.meta.name.bold(),
            format!("[{}]", range).dimmed()
        );
        if let Some(description) = &set.meta.description {
            println!("  {}", description.dimmed());
        }
        for definition in &set.definitions {
            let names: Vec<&str> = definition
                .transforms()
                .iter()
                .map(|transform| transform.name())
                .collect();
            println!("  - {} ({})", definition.id(), names.join(", "));
        }
        println!();
    }
    Ok(())
}

fn cmd_convert(input: &Path, output: &Path) -> Result<()> {
    let config = load_from_path(input)?;
    let rendered = serialize_config(&config, Format::from_path(output))?;
    write_atomic(output, &rendered)?;
    println!(
        "{} {} -> {}",
        "✓".green(),
        input.display(),
        output.display()
    );
    Ok(())
}
