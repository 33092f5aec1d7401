//! Thread order tree: the fork hierarchy, rooted at the main thread, that
//! yields the depth-first scheduling order (spec.md §4.G).

use crate::ids::ThreadId;

const DEAD: i32 = -1;

struct TreeNode {
    thread: i32,
    children: Vec<usize>,
}

/// A parent/child tree over [`ThreadId`]s. Nodes are stored in a flat arena
/// indexed by position; a finished thread's node is marked dead (`thread =
/// -1`, children cleared) rather than removed, so existing child indices
/// stay valid.
pub struct OrderTree {
    nodes: Vec<TreeNode>,
    index_of: Vec<usize>,
    order_cache: Option<Vec<ThreadId>>,
}

impl OrderTree {
    pub fn new() -> Self {
        let root = TreeNode {
            thread: ThreadId::MAIN.0 as i32,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            index_of: vec![0],
            order_cache: None,
        }
    }

    fn node_index(&self, id: ThreadId) -> usize {
        self.index_of[id.0 as usize]
    }

    /// Appends `id` as the last child of `parent`. Ids must be assigned
    /// strictly increasing starting at 1 by the caller (the scheduler).
    pub fn add_thread(&mut self, parent: ThreadId, id: ThreadId) {
        let node_idx = self.nodes.len();
        self.nodes.push(TreeNode {
            thread: id.0 as i32,
            children: Vec::new(),
        });
        debug_assert_eq!(self.index_of.len(), id.0 as usize);
        self.index_of.push(node_idx);
        let parent_idx = self.node_index(parent);
        self.nodes[parent_idx].children.push(node_idx);
        self.order_cache = None;
    }

    fn has_live_descendant(&self, idx: usize) -> bool {
        self.nodes[idx]
            .children
            .iter()
            .any(|&c| self.nodes[c].thread != DEAD || self.has_live_descendant(c))
    }

    /// Marks `id` finished. Panics if it still has a live descendant — the
    /// scheduler must join every forked child before finishing its parent.
    pub fn finish_thread(&mut self, id: ThreadId) {
        let idx = self.node_index(id);
        assert!(
            !self.has_live_descendant(idx),
            "cannot finish thread {:?} with live descendants",
            id
        );
        self.nodes[idx].thread = DEAD;
        self.nodes[idx].children.clear();
        self.order_cache = None;
    }

    fn rebuild_order(&self) -> Vec<ThreadId> {
        let mut out = Vec::new();
        fn walk(nodes: &[TreeNode], idx: usize, out: &mut Vec<ThreadId>) {
            let node = &nodes[idx];
            if node.thread != DEAD {
                out.push(ThreadId(node.thread as u32));
            }
            for &c in &node.children {
                walk(nodes, c, out);
            }
        }
        walk(&self.nodes, 0, &mut out);
        out
    }

    /// Depth-first pre-order over every live thread, recomputed lazily.
    pub fn order(&mut self) -> &[ThreadId] {
        if self.order_cache.is_none() {
            self.order_cache = Some(self.rebuild_order());
        }
        self.order_cache.as_ref().unwrap()
    }

    /// Whether `ancestor` is a (possibly indirect) ancestor of `descendant`.
    pub fn is_parent_of(&self, ancestor: ThreadId, descendant: ThreadId) -> bool {
        fn contains(nodes: &[TreeNode], idx: usize, target: i32) -> bool {
            nodes[idx].children.iter().any(|&c| {
                nodes[c].thread == target || contains(nodes, c, target)
            })
        }
        contains(&self.nodes, self.node_index(ancestor), descendant.0 as i32)
    }
}

impl Default for OrderTree {
    fn default() -> Self {
        Self::new()
    }
}
