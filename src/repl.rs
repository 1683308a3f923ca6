use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::warn;

use flowtree_core::config::AppConfig;
use flowtree_core::error::FlowError;
use flowtree_core::event::EventBus;
use flowtree_core::traits::SystemClock;
use flowtree_core::types::*;
use flowtree_graph::{GraphStore, LayoutEngine};
use flowtree_workflow::{GestureRouter, Step, WorkflowMachine};

/// Labels longer than this are shortened on screen. The stored label is
/// always complete.
const LABEL_WIDTH: usize = 48;

const HELP: &str = "\
Commands:
  show                 Print the tree
  click <id>           Ask questions about a node and grow outcomes under it
  drag <id> <x> <y>    Move a node
  select <edge-id>     Select an edge (e.g. e1-2)
  help                 Show this help
  quit                 Exit

While answering, type /cancel to abandon the questions.";

/// Indented outline of the tree, roots first, children in edge order.
pub(crate) fn render_tree(snapshot: &GraphSnapshot) -> String {
    let mut out = String::new();
    let mut seen = HashSet::new();
    for root in snapshot.roots() {
        render_node(snapshot, root, None, 0, &mut seen, &mut out);
    }
    out
}

fn render_node<'a>(
    snapshot: &'a GraphSnapshot,
    node: &'a Node,
    via: Option<&Edge>,
    depth: usize,
    seen: &mut HashSet<&'a NodeId>,
    out: &mut String,
) {
    if !seen.insert(&node.id) {
        return;
    }
    let marker = match via {
        Some(edge) if edge.emphasized => "==> ",
        Some(_) => "--> ",
        None => "",
    };
    let tone = match node.tone {
        Some(Tone::Positive) => " (+)",
        Some(Tone::Negative) => " (-)",
        Some(Tone::Mixed) => " (~)",
        None => "",
    };
    let _ = writeln!(
        out,
        "{}{}[{}] {}{}  <{} @ {:.0},{:.0}>",
        "    ".repeat(depth),
        marker,
        node.id,
        node.display_label(LABEL_WIDTH),
        tone,
        node.kind,
        node.position.x,
        node.position.y
    );
    for edge in snapshot.edges.iter().filter(|e| e.source == node.id) {
        if let Some(child) = snapshot.node(&edge.target) {
            render_node(snapshot, child, Some(edge), depth + 1, seen, out);
        }
    }
}

fn render_outcome(analysis: &OutcomeAnalysis) -> String {
    let mut out = String::new();
    if !analysis.summary.is_empty() {
        let _ = writeln!(out, "\n{}\n", analysis.summary);
    }
    let sections = [
        ("Positive", &analysis.positive),
        ("Negative", &analysis.negative),
        ("Mixed", &analysis.mixed),
        ("Consider", &analysis.considerations),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}:", title);
        for item in items {
            let _ = writeln!(out, "  - {}", item);
        }
    }
    if !analysis.recommendation.is_empty() {
        let _ = writeln!(out, "Recommendation: {}", analysis.recommendation);
    }
    out
}

async fn read_line(prompt: String, allow_empty: bool) -> anyhow::Result<String> {
    let text = tokio::task::spawn_blocking(move || {
        dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(allow_empty)
            .interact_text()
    })
    .await??;
    Ok(text)
}

async fn choose(prompt: &'static str, items: &'static [&'static str]) -> anyhow::Result<usize> {
    let index = tokio::task::spawn_blocking(move || {
        dialoguer::Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()
    })
    .await??;
    Ok(index)
}

/// Drive the open workflow session until it closes. Returns `false` when the
/// user asked to quit.
async fn drive_session(machine: &mut WorkflowMachine) -> anyhow::Result<bool> {
    loop {
        match machine.phase() {
            Phase::Idle => return Ok(true),
            Phase::AwaitingScenario { loading: false } => {
                println!("\nThe tree is empty. Describe a scenario or decision to start from (/quit to exit).");
                let text = read_line("Scenario".into(), true).await?;
                if text.trim() == "/quit" {
                    return Ok(false);
                }
                match machine.submit_scenario(&text).await {
                    Err(FlowError::EmptySubmission) => println!("A scenario is required."),
                    other => {
                        other?;
                    }
                }
            }
            Phase::AwaitingAnswer { index, loading: false } => {
                let question = machine
                    .session()
                    .and_then(|s| s.current_question())
                    .unwrap_or_default()
                    .to_string();
                println!("\nQuestion {} of 5: {}", index + 1, question);
                let text = read_line("Answer".into(), true).await?;
                if text.trim() == "/cancel" {
                    if machine.cancel() == Step::Ignored {
                        println!("The first node is required; please keep going.");
                    }
                    continue;
                }
                match machine.submit_answer(&text).await {
                    Err(FlowError::EmptySubmission) => println!("Please enter an answer."),
                    other => {
                        other?;
                    }
                }
            }
            Phase::ShowingOutcome => {
                if let Some(outcome) = machine.session().and_then(|s| s.outcome.as_ref()) {
                    print!("{}", render_outcome(outcome));
                }
                let choice = choose("Next", &["Create flow", "Start over"]).await?;
                if choice == 0 {
                    match machine.confirm().await {
                        Ok(snapshot) => print!("\n{}", render_tree(&snapshot)),
                        Err(e) => println!("Could not add outcomes: {}", e),
                    }
                } else {
                    machine.start_over()?;
                }
            }
            // Loading phases only exist inside an awaited call.
            phase => {
                warn!(phase = %phase, "Unexpected phase between actions");
                return Ok(true);
            }
        }
    }
}

pub(crate) async fn run_repl(config: &AppConfig) -> anyhow::Result<()> {
    let persistence = flowtree_store::from_config(config);
    let predictor = crate::build_predictor(config)?;
    let event_bus = Arc::new(EventBus::default());

    let store = Arc::new(
        GraphStore::hydrate(persistence, LayoutEngine::from(&config.layout), event_bus.clone())
            .await
            .context("could not read the stored tree; fix or move it before editing")?,
    );
    let machine = WorkflowMachine::new(
        store.clone(),
        predictor,
        Arc::new(SystemClock),
        event_bus.clone(),
        config.workflow.clone(),
    );
    let router = GestureRouter::new(store.clone(), Arc::new(Mutex::new(machine)));

    // Surface background save failures without interrupting input.
    let mut rx = event_bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let FlowEvent::SaveFailed { error } = event {
                eprintln!("\n[save failed: {}]", error);
            }
        }
    });

    println!("flowtree v{}", env!("CARGO_PKG_VERSION"));
    println!("Type help for commands, quit to exit.\n");

    'repl: loop {
        {
            let mut machine = router.machine().lock().await;
            loop {
                if !drive_session(&mut machine).await? {
                    break 'repl;
                }
                machine.refresh();
                if machine.auto_prompt_due().is_none() {
                    break;
                }
                machine.wait_for_auto_prompt().await;
            }
        }

        let input = read_line("flowtree".into(), true).await?;
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some(&command) = parts.first() else {
            continue;
        };

        let result = match (command, &parts[1..]) {
            ("quit" | "exit" | "q", _) => break 'repl,
            ("help", _) => {
                println!("{}", HELP);
                Ok(())
            }
            ("show", _) => {
                let snapshot = store.snapshot();
                if snapshot.is_empty() {
                    println!("(empty tree)");
                } else {
                    print!("{}", render_tree(&snapshot));
                }
                Ok(())
            }
            ("click", [id]) => router.on_node_click(&NodeId::from(*id)).await.map(|_| ()),
            ("drag", [id, x, y]) => match (x.parse::<f64>(), y.parse::<f64>()) {
                (Ok(x), Ok(y)) => router
                    .on_node_drag(&NodeId::from(*id), Position::new(x, y))
                    .map(|_| ()),
                _ => {
                    println!("Coordinates must be numbers.");
                    Ok(())
                }
            },
            ("select", [edge]) => router.on_edge_select(&EdgeId::from(*edge)).map(|()| {
                println!("Selected {}", edge);
            }),
            _ => {
                println!("Unknown command. Type help for commands.");
                Ok(())
            }
        };
        if let Err(e) = result {
            println!("{}", e);
        }
    }

    store.flush().await;
    printer.abort();
    println!("Goodbye!");
    Ok(())
}
