use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use spritefuse::selection::SessionState;
use spritefuse::{
    Compositor, DirSpriteSource, DirStateStore, PartTree, Selection, SelectionEngine, StateStore,
    persist,
};

#[derive(Parser, Debug)]
#[command(name = "spritefuse", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a character's selectable part tree.
    Parts(PartsArgs),
    /// Compose the current selection into a WebP image.
    Compose(ComposeArgs),
}

#[derive(Parser, Debug)]
struct PartsArgs {
    /// Character data root (one subdirectory per character).
    #[arg(long)]
    data: PathBuf,

    /// Character id.
    #[arg(long)]
    character: String,
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Character data root (one subdirectory per character).
    #[arg(long)]
    data: PathBuf,

    /// Character id.
    #[arg(long)]
    character: String,

    /// Directory holding persisted selection state. When given, the stored
    /// selection is restored before composing and saved back after.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Discard any persisted selection and start from the defaults.
    #[arg(long)]
    reset: bool,

    /// Output path. Defaults to `<character>.webp` in the working directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Parts(args) => cmd_parts(args),
        Command::Compose(args) => cmd_compose(args),
    }
}

fn load_tree(data: &Path, character: &str) -> anyhow::Result<PartTree> {
    let path = data.join(character).join("GameObject.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("read character definition '{}'", path.display()))?;
    let root = spritefuse::parse_character(&json)?;
    Ok(PartTree::new(root)?)
}

/// Restore persisted selection when available, else apply author defaults.
/// Returns whether a snapshot was used.
fn init_selection(
    tree: &PartTree,
    sel: &mut Selection,
    store: Option<&DirStateStore>,
    character: &str,
    reset: bool,
) -> anyhow::Result<bool> {
    let engine = SelectionEngine::new(tree);
    let mut session = SessionState::default();

    let snapshot = if reset {
        if let Some(store) = store {
            store.clear_selection(character)?;
        }
        None
    } else {
        store.and_then(|s| s.load_selection(character))
    };

    let restored = snapshot.is_some();
    if let Some(snapshot) = &snapshot {
        persist::restore_selection(tree, sel, snapshot);
    }
    engine.ensure_initialized(sel, &mut session, restored);
    Ok(restored)
}

fn cmd_parts(args: PartsArgs) -> anyhow::Result<()> {
    let tree = load_tree(&args.data, &args.character)?;
    let mut sel = Selection::new(&tree);
    let engine = SelectionEngine::new(&tree);
    let mut session = SessionState::default();
    engine.ensure_initialized(&mut sel, &mut session, false);

    let mut stack = vec![(tree.root(), 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let part = tree.part(id);
        if !part.has_drawable_descendant() {
            continue;
        }
        let indent = "  ".repeat(depth);
        if part.is_leaf_sprite() {
            let mark = if sel.is_selected(id) { "x" } else { " " };
            println!("{indent}[{mark}] {}", part.name());
        } else {
            let kind = if spritefuse::selection::is_single_select_group(part.name()) {
                " (single-select)"
            } else {
                ""
            };
            println!("{indent}{}{kind}", part.name());
            for &child in tree.ordered_children(id).iter().rev() {
                stack.push((child, depth + 1));
            }
        }
    }
    Ok(())
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let tree = load_tree(&args.data, &args.character)?;
    let store = args.state.as_ref().map(DirStateStore::new);

    let mut sel = Selection::new(&tree);
    init_selection(&tree, &mut sel, store.as_ref(), &args.character, args.reset)?;

    let source = DirSpriteSource::new(&args.data);
    let compositor = Compositor::new(&source);
    let Some(composite) = compositor.compose(&tree, &sel, &args.character)? else {
        eprintln!("nothing selected; no image written");
        return Ok(());
    };

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(format!("{}.webp", args.character)));
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&out, spritefuse::export::encode_webp(&composite)?)
        .with_context(|| format!("write '{}'", out.display()))?;

    if let Some(store) = &store {
        store.save_selection(&args.character, &persist::selection_snapshot(&tree, &sel))?;
    }

    eprintln!(
        "wrote {} ({}x{})",
        out.display(),
        composite.width,
        composite.height
    );
    Ok(())
}
