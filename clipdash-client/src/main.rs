use clap::{Parser, Subcommand, ValueEnum};
use clipdash_client::{
    ClientError, DragSession, WsStoreClient,
    ui_state::{load_ui_state, save_ui_state_with_retry, ui_state_path},
};
use clipdash_core::{DragDescriptor, DragKind, MoveFlags, TreeNode, pinned_ids};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "clipdash")]
struct ClientArgs {
    /// Overrides the store url saved in ui_state.json.
    #[arg(long)]
    store_url: Option<String>,

    /// Tab to act on; defaults to the last tab used.
    #[arg(long)]
    tab: Option<String>,

    #[arg(long)]
    debounce_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tabs in display order.
    Tabs,
    /// Print the board tree of the current tab and the pinned list.
    Tree,
    /// Drop one entity on another, as a drag would.
    Move {
        #[arg(long)]
        active: String,
        #[arg(long, value_enum)]
        active_kind: KindArg,
        #[arg(long)]
        over: String,
        #[arg(long, value_enum)]
        over_kind: KindArg,
        /// The dragged board is nested inside another board.
        #[arg(long, default_value_t = false)]
        sub_board: bool,
        /// Same as holding Alt while dropping.
        #[arg(long, default_value_t = false)]
        alt: bool,
        /// Disallow moves that change an item's parent.
        #[arg(long, default_value_t = false)]
        locked: bool,
    },
    Pin {
        item_id: String,
    },
    Unpin {
        item_id: String,
    },
    /// Remember a tab as the current one.
    UseTab {
        tab_id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Board,
    Clip,
    Tab,
    Pinned,
}

impl From<KindArg> for DragKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Board => DragKind::Board,
            KindArg::Clip => DragKind::Clip,
            KindArg::Tab => DragKind::Tab,
            KindArg::Pinned => DragKind::Pinned,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = ClientArgs::parse();
    if let Err(err) = run(args).await {
        error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(args: ClientArgs) -> Result<(), ClientError> {
    let mut saved = load_ui_state();
    if let Some(url) = args.store_url {
        saved.store_url = url;
    }
    if let Some(debounce_ms) = args.debounce_ms {
        saved.debounce_ms = debounce_ms;
    }

    if let Command::UseTab { tab_id } = &args.command {
        saved.current_tab_id = Some(tab_id.clone());
        save_state(&saved);
        info!(tab_id = %tab_id, "current tab saved");
        return Ok(());
    }

    let store = WsStoreClient::connect(&saved.store_url).await?;
    let mut session = DragSession::open(store, String::new(), saved.session_config()).await?;

    let tab_id = args
        .tab
        .or_else(|| saved.current_tab_id.clone())
        .or_else(|| {
            session
                .collection()
                .sorted_tabs()
                .first()
                .map(|tab| tab.tab_id.clone())
        });
    let Some(tab_id) = tab_id else {
        warn!("collection has no tabs");
        session.close().await;
        return Ok(());
    };
    session.set_current_tab(tab_id.clone());

    let outcome = execute(&mut session, args.command).await;
    session.close().await;
    if outcome.is_ok() && saved.current_tab_id.as_deref() != Some(tab_id.as_str()) {
        saved.current_tab_id = Some(tab_id);
        save_state(&saved);
    }
    outcome
}

async fn execute(
    session: &mut DragSession<WsStoreClient>,
    command: Command,
) -> Result<(), ClientError> {
    match command {
        Command::Tabs => {
            for tab in session.collection().sorted_tabs() {
                let marker = if tab.tab_id == session.current_tab_id() {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {:>3} {} ({})",
                    tab.tab_order_number, tab.tab_name, tab.tab_id
                );
            }
        }
        Command::Tree => {
            print_nodes(session.tree(), 0);
            let pinned = pinned_ids(session.collection());
            if !pinned.is_empty() {
                println!("pinned:");
                for id in pinned {
                    let name = session
                        .collection()
                        .item(&id)
                        .map(|item| item.name.as_str())
                        .unwrap_or("?");
                    println!("  {name} [{id}]");
                }
            }
        }
        Command::Move {
            active,
            active_kind,
            over,
            over_kind,
            sub_board,
            alt,
            locked,
        } => {
            let mut active = DragDescriptor::new(active, active_kind.into());
            active.is_sub_board = sub_board;
            let over = DragDescriptor::new(over, over_kind.into());
            session.set_flags(MoveFlags {
                alt_pressed: alt,
                reparent_locked: locked,
            });

            session.on_drag_start(active.clone());
            let plan = session.on_drag_end(&active, Some(&over)).await?;
            session.settle().await;
            println!("{plan:?}");
        }
        Command::Pin { item_id } => session.pin(&item_id)?,
        Command::Unpin { item_id } => session.unpin(&item_id)?,
        Command::UseTab { .. } => {}
    }
    Ok(())
}

fn print_nodes(nodes: &[TreeNode], depth: usize) {
    for node in nodes {
        let kind = if node.item.is_board() { "board" } else { "clip" };
        println!(
            "{:indent$}{} {} [{}]",
            "",
            kind,
            node.item.name,
            node.item.id,
            indent = depth * 2
        );
        print_nodes(&node.children, depth + 1);
    }
}

fn save_state(saved: &clipdash_client::ui_state::SavedUiState) {
    let path = ui_state_path();
    if let Err(err) = save_ui_state_with_retry(&path, saved) {
        warn!(path = %path.display(), "failed to save ui state: {}", err);
    }
}
