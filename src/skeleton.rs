// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton node layout and adjacency graph.
//!
//! Every component that reads or writes nodes (frame packing, the motion test,
//! the graph convolutions and the capture boundary) goes through the constants
//! in this module, so the node order cannot drift between them:
//!
//! | Nodes   | Group       | Source                              |
//! |---------|-------------|-------------------------------------|
//! | 0..=11  | pose        | `MediaPipe` pose landmarks 11..=22  |
//! | 12..=32 | left hand   | `MediaPipe` hand landmarks 0..=20   |
//! | 33..=53 | right hand  | `MediaPipe` hand landmarks 0..=20   |

use ndarray::{Array2, Array3, ArrayView2};

/// Number of pose nodes kept per frame.
pub const POSE_NODES: usize = 12;

/// Number of nodes per hand.
pub const HAND_NODES: usize = 21;

/// Total nodes per frame.
pub const NUM_NODES: usize = POSE_NODES + 2 * HAND_NODES;

/// Channels packed per node: `x, y, z, visibility`.
pub const NODE_CHANNELS: usize = 4;

/// First node of the left hand.
pub const LEFT_HAND_START: usize = POSE_NODES;

/// First node of the right hand.
pub const RIGHT_HAND_START: usize = POSE_NODES + HAND_NODES;

/// Full-body pose landmark indices selected into nodes 0..=11.
pub const POSE_LANDMARK_SUBSET: [usize; POSE_NODES] = [11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22];

/// Pose links between local pose nodes.
pub const POSE_LINKS: [[usize; 2]; 14] = [
    [0, 2],  // left shoulder to left elbow
    [1, 3],  // right shoulder to right elbow
    [2, 4],  // left elbow to left wrist
    [3, 5],  // right elbow to right wrist
    [4, 6],  // left wrist to left pinky
    [4, 8],  // left wrist to left index
    [4, 10], // left wrist to left thumb
    [5, 7],  // right wrist to right pinky
    [5, 9],  // right wrist to right index
    [5, 11], // right wrist to right thumb
    [6, 8],  // left pinky to left index
    [8, 10], // left index to left thumb
    [7, 9],  // right pinky to right index
    [9, 11], // right index to right thumb
];

/// Pose wrist to hand root bridges.
pub const BRIDGE_LINKS: [[usize; 2]; 2] = [[4, LEFT_HAND_START], [5, RIGHT_HAND_START]];

/// Number of fingers per hand.
const FINGERS: usize = 5;

/// Bones per finger, counted from the wrist.
const BONES_PER_FINGER: usize = 4;

/// Graph partitions used by the spatial kernel.
pub const SPATIAL_KERNEL_SIZE: usize = 3;

/// Finger bone chains of one hand, in local hand indices.
///
/// Finger `f` runs `0 -> 4f+1 -> 4f+2 -> 4f+3 -> 4f+4`.
#[must_use]
pub fn hand_links() -> Vec<[usize; 2]> {
    let mut links = Vec::with_capacity(FINGERS * BONES_PER_FINGER);
    for finger in 0..FINGERS {
        let mut prev = 0;
        for joint in 1..=BONES_PER_FINGER {
            let next = finger * BONES_PER_FINGER + joint;
            links.push([prev, next]);
            prev = next;
        }
    }
    links
}

/// Fixed 54-node skeleton graph.
///
/// Built once, immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonGraph {
    adjacency: Array2<f32>,
    edges: Vec<[usize; 2]>,
}

impl Default for SkeletonGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SkeletonGraph {
    /// Build the adjacency from self-loops, pose links, hand bones and bridges.
    #[must_use]
    pub fn new() -> Self {
        let mut edges: Vec<[usize; 2]> = POSE_LINKS.to_vec();
        for start in [LEFT_HAND_START, RIGHT_HAND_START] {
            edges.extend(hand_links().into_iter().map(|[a, b]| [start + a, start + b]));
        }
        edges.extend(BRIDGE_LINKS);

        let mut adjacency = Array2::<f32>::zeros((NUM_NODES, NUM_NODES));
        for i in 0..NUM_NODES {
            adjacency[[i, i]] = 1.0;
        }
        for &[i, j] in &edges {
            adjacency[[i, j]] = 1.0;
            adjacency[[j, i]] = 1.0;
        }

        Self { adjacency, edges }
    }

    /// Number of nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.adjacency.nrows()
    }

    /// Adjacency matrix (54 x 54), self-loops included.
    #[must_use]
    pub fn adjacency(&self) -> ArrayView2<'_, f32> {
        self.adjacency.view()
    }

    /// Adjacency replicated once per spatial partition, shape `(3, 54, 54)`.
    ///
    /// All partitions share the same matrix.
    #[must_use]
    pub fn partitions(&self) -> Array3<f32> {
        let n = self.num_nodes();
        let mut stacked = Array3::<f32>::zeros((SPATIAL_KERNEL_SIZE, n, n));
        for mut partition in stacked.outer_iter_mut() {
            partition.assign(&self.adjacency);
        }
        stacked
    }

    /// Undirected edges excluding self-loops.
    #[must_use]
    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    /// Whether two nodes share an edge (a node is connected to itself).
    #[must_use]
    pub fn is_connected(&self, i: usize, j: usize) -> bool {
        i < self.num_nodes() && j < self.num_nodes() && self.adjacency[[i, j]] > 0.0
    }

    /// Neighbours of a node, itself included.
    #[must_use]
    pub fn neighbors(&self, node: usize) -> Vec<usize> {
        if node >= self.num_nodes() {
            return Vec::new();
        }
        self.adjacency
            .row(node)
            .iter()
            .enumerate()
            .filter(|&(_, &w)| w > 0.0)
            .map(|(j, _)| j)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(NUM_NODES, 54);
        assert_eq!(LEFT_HAND_START, 12);
        assert_eq!(RIGHT_HAND_START, 33);
    }

    #[test]
    fn test_adjacency_symmetric_with_self_loops() {
        let graph = SkeletonGraph::new();
        let a = graph.adjacency();
        for i in 0..NUM_NODES {
            assert!((a[[i, i]] - 1.0).abs() < f32::EPSILON);
            for j in 0..NUM_NODES {
                assert!((a[[i, j]] - a[[j, i]]).abs() < f32::EPSILON);
            }
        }
    }

    #[test]
    fn test_edge_counts() {
        let graph = SkeletonGraph::new();
        assert_eq!(hand_links().len(), 20);
        assert_eq!(graph.edges().len(), 14 + 40 + 2);

        // 54 self-loops plus both directions of every edge, no duplicates.
        let ones = graph.adjacency().iter().filter(|&&w| w > 0.0).count();
        assert_eq!(ones, 54 + 2 * 56);
    }

    #[test]
    fn test_bridges_and_fingers() {
        let graph = SkeletonGraph::new();
        assert!(graph.is_connected(4, 12));
        assert!(graph.is_connected(5, 33));
        assert!(!graph.is_connected(4, 33));

        // Right index finger: wrist(33) -> 38 -> 39 -> 40 -> 41.
        assert!(graph.is_connected(33, 38));
        assert!(graph.is_connected(40, 41));
        // Thumb tip does not touch the index root.
        assert!(!graph.is_connected(16, 17));
        // Hands never touch each other.
        assert!(!graph.is_connected(32, 33));
    }

    #[test]
    fn test_neighbors() {
        let graph = SkeletonGraph::new();
        assert_eq!(graph.neighbors(0), vec![0, 2]);
        assert_eq!(graph.neighbors(12), vec![4, 12, 13, 17, 21, 25, 29]);
        assert!(graph.neighbors(99).is_empty());
    }

    #[test]
    fn test_partitions_share_adjacency() {
        let graph = SkeletonGraph::new();
        let partitions = graph.partitions();
        assert_eq!(partitions.dim(), (3, 54, 54));
        for partition in partitions.outer_iter() {
            assert_eq!(partition, graph.adjacency());
        }
    }
}
