use clap::{Parser, Subcommand};
use eth_pos_simulator::config::SimulatorConfig;
use eth_pos_simulator::network::Network;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "posim", about = "Educational proof-of-stake chain simulator")]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a network of nodes for a number of slots and print a final summary.
    Run {
        #[clap(short, long, default_value = "4")]
        nodes: usize,
        #[clap(short, long, default_value = "32")]
        slots: u64,
        #[clap(long, default_value = "32")]
        stake: u64,
    },
    /// Print a single node's state snapshot as JSON.
    Inspect {
        #[clap(short, long, default_value = "4")]
        nodes: usize,
        #[clap(short, long, default_value = "32")]
        slots: u64,
        #[clap(long, default_value = "32")]
        stake: u64,
        #[clap(short = 'i', long)]
        node: String,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn node_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("node-{i}")).collect()
}

fn run_network(nodes: usize, slots: u64, stake: u64) -> Network {
    let config = SimulatorConfig::default();
    let seconds_per_slot = config.seconds_per_slot;
    let mut network = Network::new(config, node_ids(nodes), stake, 0).expect("failed to derive node identities");

    for slot in 1..=slots {
        network.tick(slot, slot * seconds_per_slot * 1000);
        if slot % 10 == 0 {
            network.sync_round();
        }
    }
    network
}

fn run(nodes: usize, slots: u64, stake: u64) {
    let network = run_network(nodes, slots, stake);

    println!("ran {nodes} node(s) for {slots} slot(s)\n");
    for id in network.node_ids() {
        let node = network.node(id).expect("node_ids always resolve");
        let state = node.snapshot();
        println!(
            "{id}: head={} blocks={} mempool={}",
            state.tree.ghost_head, state.tree.block_count, state.mempool.pending_count
        );
    }
}

fn inspect(nodes: usize, slots: u64, stake: u64, node_id: &str) {
    let network = run_network(nodes, slots, stake);

    match network.node(node_id) {
        Some(node) => {
            let snapshot = node.snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot).expect("NodeState always serializes"));
        }
        None => eprintln!("no such node: {node_id}"),
    }
}

fn main() {
    init_logging();
    let args = Args::parse();
    match &args.command {
        Commands::Run { nodes, slots, stake } => run(*nodes, *slots, *stake),
        Commands::Inspect { nodes, slots, stake, node } => inspect(*nodes, *slots, *stake, node),
    }
}
