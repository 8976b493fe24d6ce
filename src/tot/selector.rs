//! Greedy path selection over a finished tree.

use tracing::debug;

use super::types::Session;

/// Walk from the root, always stepping to the child with the strictly
/// greatest value (the first such child wins ties), until a leaf.
///
/// Clears any earlier selection, marks the visited chain `is_selected`, and
/// stores it as the session's `selected_path`. Values are not recomputed.
pub fn select_best_path(session: &mut Session) -> Vec<String> {
    session.clear_selection();

    let mut path = vec![session.root_node_id.clone()];
    let mut current = session.root_node_id.clone();

    loop {
        let Some(node) = session.node(&current) else {
            break;
        };

        let mut best: Option<(&str, f64)> = None;
        for child_id in &node.children {
            let Some(child) = session.node(child_id) else {
                continue;
            };
            if best.map_or(true, |(_, value)| child.value > value) {
                best = Some((child_id.as_str(), child.value));
            }
        }

        match best {
            Some((next, _)) => {
                let next = next.to_string();
                path.push(next.clone());
                current = next;
            }
            None => break,
        }
    }

    for id in &path {
        if let Some(node) = session.node_mut(id) {
            node.is_selected = true;
        }
    }
    session.selected_path = path.clone();

    debug!(session_id = %session.id, length = path.len(), "Best path selected");
    path
}
