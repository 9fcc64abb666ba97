//! Monte Carlo tree search over workflow variants.
//!
//! Nodes live in an arena (`Vec<SearchNode>`) and refer to each other by
//! index: a child owns nothing, it only records its parent's index.

use crate::application::evaluation::Evaluator;
use crate::application::search::action_space::ActionSpace;
use crate::config::SearchSettings;
use crate::domain::workflow::WorkflowVariant;
use rand::Rng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{debug, warn};

pub const ROOT: usize = 0;

#[derive(Debug, Clone)]
pub struct SearchNode {
    pub variant: WorkflowVariant,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Index into the action space that produced this node
    pub action: Option<usize>,
    pub depth: usize,
    pub visits: u32,
    pub total_score: f64,
}

impl SearchNode {
    pub fn mean_score(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.total_score / self.visits as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchTree {
    nodes: Vec<SearchNode>,
}

impl SearchTree {
    pub fn new(root: WorkflowVariant) -> Self {
        Self {
            nodes: vec![SearchNode {
                variant: root,
                parent: None,
                children: Vec::new(),
                action: None,
                depth: 0,
                visits: 0,
                total_score: 0.0,
            }],
        }
    }

    pub fn node(&self, index: usize) -> &SearchNode {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_child(&mut self, parent: usize, variant: WorkflowVariant, action: usize) -> usize {
        let index = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(SearchNode {
            variant,
            parent: Some(parent),
            children: Vec::new(),
            action: Some(action),
            depth,
            visits: 0,
            total_score: 0.0,
        });
        self.nodes[parent].children.push(index);
        index
    }

    /// Adds `score` to `from` and every ancestor up to the root.
    pub fn backpropagate(&mut self, from: usize, score: f64) {
        let mut cursor = Some(from);
        while let Some(index) = cursor {
            let node = &mut self.nodes[index];
            node.visits += 1;
            node.total_score += score;
            cursor = node.parent;
        }
    }

    /// UCB1 of `child`; unvisited children are infinitely attractive.
    pub fn ucb(&self, child: usize, exploration: f64) -> f64 {
        let node = &self.nodes[child];
        if node.visits == 0 {
            return f64::INFINITY;
        }
        let parent_visits = node
            .parent
            .map(|p| self.nodes[p].visits)
            .unwrap_or(node.visits)
            .max(1) as f64;
        node.mean_score() + exploration * (parent_visits.ln() / node.visits as f64).sqrt()
    }

    /// Child with the highest UCB1, earliest on ties
    pub fn best_child_by_ucb(&self, index: usize, exploration: f64) -> Option<usize> {
        first_max(&self.nodes[index].children, |c| self.ucb(c, exploration))
    }

    /// Child with the highest mean score, earliest on ties
    pub fn best_child_by_mean(&self, index: usize) -> Option<usize> {
        first_max(&self.nodes[index].children, |c| self.nodes[c].mean_score())
    }

    pub fn untried_actions(&self, index: usize, action_count: usize) -> Vec<usize> {
        let node = &self.nodes[index];
        (0..action_count)
            .filter(|a| {
                !node
                    .children
                    .iter()
                    .any(|&c| self.nodes[c].action == Some(*a))
            })
            .collect()
    }
}

fn first_max<F>(candidates: &[usize], key: F) -> Option<usize>
where
    F: Fn(usize) -> f64,
{
    let mut best: Option<(usize, f64)> = None;
    for &candidate in candidates {
        let value = key(candidate);
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((candidate, value)),
        }
    }
    best.map(|(index, _)| index)
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub simulations: usize,
    pub exploration_constant: f64,
    pub terminal_visits: u32,
    pub neutral_score: f64,
}

impl From<&SearchSettings> for SearchConfig {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            simulations: settings.simulations,
            exploration_constant: settings.exploration_constant,
            terminal_visits: settings.terminal_visits,
            neutral_score: settings.neutral_score,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub variant: WorkflowVariant,
    /// `None` when the root never got a child
    pub mean_score: Option<f64>,
    pub visits: u32,
    pub tree_size: usize,
}

pub struct TreeSearch {
    actions: Arc<dyn ActionSpace>,
    evaluator: Arc<dyn Evaluator>,
    config: SearchConfig,
}

impl TreeSearch {
    pub fn new(
        actions: Arc<dyn ActionSpace>,
        evaluator: Arc<dyn Evaluator>,
        config: SearchConfig,
    ) -> Self {
        Self {
            actions,
            evaluator,
            config,
        }
    }

    pub async fn search(
        &self,
        root: &WorkflowVariant,
        instrument: &str,
        rng: &mut StdRng,
    ) -> SearchOutcome {
        let (outcome, _) = self.search_tree(root, instrument, rng).await;
        outcome
    }

    /// Runs the simulation budget and also hands back the tree.
    pub async fn search_tree(
        &self,
        root: &WorkflowVariant,
        instrument: &str,
        rng: &mut StdRng,
    ) -> (SearchOutcome, SearchTree) {
        let mut tree = SearchTree::new(root.clone());

        for _ in 0..self.config.simulations {
            let selected = self.select(&tree);
            let leaf = self.expand(&mut tree, selected, rng);
            let score = self.simulate(&tree.node(leaf).variant, instrument).await;
            tree.backpropagate(leaf, score);
        }

        let outcome = match tree.best_child_by_mean(ROOT) {
            Some(best) => {
                let node = tree.node(best);
                SearchOutcome {
                    variant: node.variant.clone(),
                    mean_score: Some(node.mean_score()),
                    visits: node.visits,
                    tree_size: tree.len(),
                }
            }
            None => SearchOutcome {
                variant: root.clone(),
                mean_score: None,
                visits: 0,
                tree_size: tree.len(),
            },
        };

        debug!(
            "Search [{}]: {} simulations from '{}' -> '{}' ({} nodes)",
            instrument,
            self.config.simulations,
            root.id,
            outcome.variant.id,
            outcome.tree_size
        );

        (outcome, tree)
    }

    fn is_terminal(&self, tree: &SearchTree, index: usize) -> bool {
        tree.node(index).visits >= self.config.terminal_visits
    }

    fn action_count(&self, tree: &SearchTree, index: usize) -> usize {
        if self.actions.expands_at(tree.node(index).depth) {
            self.actions.len()
        } else {
            0
        }
    }

    fn is_fully_expanded(&self, tree: &SearchTree, index: usize) -> bool {
        tree.node(index).children.len() >= self.action_count(tree, index)
    }

    fn select(&self, tree: &SearchTree) -> usize {
        let mut index = ROOT;
        while !self.is_terminal(tree, index) && self.is_fully_expanded(tree, index) {
            match tree.best_child_by_ucb(index, self.config.exploration_constant) {
                Some(child) => index = child,
                None => break,
            }
        }
        index
    }

    /// Attaches one random untried action below `index`, or returns
    /// `index` itself when it is terminal or has nothing left to try.
    fn expand(&self, tree: &mut SearchTree, index: usize, rng: &mut StdRng) -> usize {
        if self.is_terminal(tree, index) {
            return index;
        }
        let untried = tree.untried_actions(index, self.action_count(tree, index));
        if untried.is_empty() {
            return index;
        }

        let action = untried[rng.random_range(0..untried.len())];
        match self.actions.apply(&tree.node(index).variant, action) {
            Some(variant) => tree.add_child(index, variant, action),
            None => index,
        }
    }

    async fn simulate(&self, variant: &WorkflowVariant, instrument: &str) -> f64 {
        match self.evaluator.evaluate(variant, instrument).await {
            Ok(result) if result.score.is_finite() => result.score,
            Ok(result) => {
                warn!(
                    "Search [{}]: non-finite score for '{}', using neutral",
                    instrument, result.variant_id
                );
                self.config.neutral_score
            }
            Err(e) => {
                warn!(
                    "Search [{}]: simulation of '{}' failed: {}",
                    instrument, variant.id, e
                );
                self.config.neutral_score
            }
        }
    }
}
