//! Worked example: wiring a handful of node subsystems together through
//! [`signet_events`] instead of direct references.
//!
//! Run with `cargo run --example node_events`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use signet_events::{creator::create, dispatch::PooledDispatcher, manager::SubscriptionManager};

/// Events a node's block-processing subsystem might raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NodeEvent {
    OnProposal,
    OnBlock,
    Timer,
}

/// Lanes this demo's subsystems are willing to be called back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
enum Lane {
    Yac = 0,
    Metrics = 1,
    RequestProposal = 2,
    VoteProcess = 3,
}

const LANE_COUNT: usize = 4;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let manager = SubscriptionManager::new(Arc::new(PooledDispatcher::new(LANE_COUNT)));

    // Metrics subsystem: counts how many blocks it has seen.
    let block_count = Arc::new(AtomicU64::new(0));
    let counter_for_callback = block_count.clone();
    let _metrics = create(
        &manager,
        Lane::Metrics as usize,
        NodeEvent::OnBlock,
        (),
        move |_set_id, _state: &mut (), _key, height: u64| {
            counter_for_callback.fetch_add(1, Ordering::Relaxed);
            tracing::info!(height, "metrics subsystem observed a block");
        },
    );

    // Voting subsystem: reacts to a proposal by tracking the last height it
    // voted on in its own private state.
    let vote_process = create(
        &manager,
        Lane::VoteProcess as usize,
        NodeEvent::OnProposal,
        0_u64,
        |_set_id, last_voted: &mut u64, _key, height: u64| {
            *last_voted = height;
            tracing::info!(height, "vote subsystem cast a vote");
        },
    );

    let engine = manager.get_engine::<NodeEvent, u64>();
    engine.notify(NodeEvent::OnBlock, 100);
    engine.notify(NodeEvent::OnBlock, 101);
    engine.notify(NodeEvent::OnProposal, 101);

    // Give the pooled dispatcher's lanes a moment to drain before reading
    // back state set by their callbacks.
    std::thread::sleep(Duration::from_millis(50));

    println!("blocks observed: {}", block_count.load(Ordering::Relaxed));
    println!("vote subsystem registrations: {}", vote_process.registration_count());

    manager.dispose();
}
