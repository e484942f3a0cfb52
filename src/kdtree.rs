use crate::bounds::BoundingBox;
use crate::error::{Error, Result};
use crate::store::PointStore;
use crate::store::PointSlice;
use tracing::{debug, debug_span, trace};

/// Maximum number of points in a leaf unless configured otherwise.
pub const DEFAULT_LEAF_SIZE: usize = 20;

/// Subtrees with at least this many points are built on separate rayon tasks.
const PARALLEL_BUILD_THRESHOLD: usize = 2048;

const NO_PARENT: u32 = u32::MAX;

/// Statistic computed for every node while the tree is built.
///
/// Leaves see each of their points through [`accumulate_point`](Self::accumulate_point).
/// Internal nodes see the left child's statistic and then the right child's through
/// [`accumulate`](Self::accumulate). Both end with [`postprocess`](Self::postprocess),
/// which may depend on the final bounds and count.
pub trait TreeStatistic<const D: usize>: Default + Clone + Send + Sync {
    fn accumulate_point(&mut self, _point: &[f64; D]) {}

    fn accumulate(&mut self, _child: &Self, _child_bounds: &BoundingBox<D>, _child_count: usize) {}

    fn postprocess(&mut self, _bounds: &BoundingBox<D>, _count: usize) {}
}

impl<const D: usize> TreeStatistic<D> for () {}

/// A node of a [`KdTree`]: a contiguous range of the reordered points and its tight bounds.
#[derive(Clone, Copy, Debug)]
pub struct KdNode<const D: usize> {
    bounds: BoundingBox<D>,
    begin: usize,
    end: usize,
    // Number of nodes in this subtree, including the node itself. 1 for leaves.
    subtree_len: u32,
    parent: u32,
}

impl<const D: usize> KdNode<D> {
    pub fn bounds(&self) -> &BoundingBox<D> {
        &self.bounds
    }

    pub fn begin(&self) -> usize {
        self.begin
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn count(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_leaf(&self) -> bool {
        self.subtree_len == 1
    }

    pub fn subtree_len(&self) -> usize {
        self.subtree_len as usize
    }

    pub fn parent(&self) -> Option<usize> {
        (self.parent != NO_PARENT).then_some(self.parent as usize)
    }
}

/// Midpoint-split kd-tree over `D`-dimensional points.
///
/// Nodes are stored in pre-order, so the subtree of node `i` occupies the node
/// indices `[i, i + subtree_len)`. The left child of an internal node `i` is `i + 1`
/// and its right child follows the left subtree. The points are reordered so that
/// every node owns a contiguous range of them.
#[derive(Clone, Debug)]
pub struct KdTree<const D: usize, S = ()> {
    nodes: Vec<KdNode<D>>,
    stats: Vec<S>,
    points: Vec<[f64; D]>,
    old_from_new: Vec<usize>,
    new_from_old: Vec<usize>,
    leaf_size: usize,
}

impl<const D: usize> KdTree<D> {
    pub fn builder() -> KdTreeBuilder {
        KdTreeBuilder::new()
    }

    /// Builds a tree without node statistics.
    pub fn build(points: Vec<[f64; D]>, leaf_size: usize) -> Result<Self> {
        KdTreeBuilder::new().leaf_size(leaf_size).build(points)
    }

    /// Builds a tree from interleaved coordinates, `D` values per point.
    pub fn from_flat(coords: &[f64], leaf_size: usize) -> Result<Self> {
        KdTreeBuilder::new()
            .leaf_size(leaf_size)
            .build_store(PointStore::from_flat(coords)?)
    }
}

impl<const D: usize, S> KdTree<D, S> {
    pub fn root(&self) -> usize {
        0
    }

    pub fn node(&self, index: usize) -> &KdNode<D> {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[KdNode<D>] {
        &self.nodes
    }

    pub fn stat(&self, index: usize) -> &S {
        &self.stats[index]
    }

    /// Left and right child of an internal node, `None` for leaves.
    pub fn children(&self, index: usize) -> Option<(usize, usize)> {
        if self.nodes[index].is_leaf() {
            return None;
        }
        let left = index + 1;
        Some((left, left + self.nodes[left].subtree_len()))
    }

    pub fn is_ancestor(&self, ancestor: usize, node: usize) -> bool {
        node > ancestor && node < ancestor + self.nodes[ancestor].subtree_len()
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    pub fn bounds(&self) -> &BoundingBox<D> {
        &self.nodes[0].bounds
    }

    /// Points in tree order.
    pub fn points(&self) -> &[[f64; D]] {
        &self.points
    }

    pub fn node_points(&self, index: usize) -> &[[f64; D]] {
        let node = &self.nodes[index];
        &self.points[node.begin..node.end]
    }

    /// `old_from_new()[i]` is the input index of the point at tree position `i`.
    pub fn old_from_new(&self) -> &[usize] {
        &self.old_from_new
    }

    /// `new_from_old()[j]` is the tree position of input point `j`.
    pub fn new_from_old(&self) -> &[usize] {
        &self.new_from_old
    }

    pub fn leaves(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|&i| self.nodes[i].is_leaf())
    }

    /// Reorders per-point values from tree order back into input order.
    pub fn to_original_order<T>(&self, values: Vec<T>) -> Vec<T> {
        crate::accumulator::unpermute(values, &self.old_from_new)
    }
}

/// Configures and runs tree construction.
#[derive(Clone, Copy, Debug)]
pub struct KdTreeBuilder {
    leaf_size: usize,
    parallel: bool,
}

impl Default for KdTreeBuilder {
    fn default() -> Self {
        Self {
            leaf_size: DEFAULT_LEAF_SIZE,
            parallel: true,
        }
    }
}

impl KdTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    /// Build left and right subtrees of large nodes concurrently.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn build<S: TreeStatistic<D>, const D: usize>(&self, points: Vec<[f64; D]>) -> Result<KdTree<D, S>> {
        self.build_store(PointStore::new(points)?)
    }

    pub fn build_store<S: TreeStatistic<D>, const D: usize>(&self, mut store: PointStore<D>) -> Result<KdTree<D, S>> {
        if self.leaf_size == 0 {
            return Err(Error::InvalidLeafSize);
        }
        let count = store.len();
        let _span = debug_span!("kdtree_build", points = count, leaf_size = self.leaf_size).entered();

        let slice = store.as_slice_mut();
        let bounds = slice.bounds();
        let built = build_subtree::<S, D>(slice, 0, bounds, self.leaf_size, self.parallel);
        let (mut nodes, stats): (Vec<KdNode<D>>, Vec<S>) = built.into_iter().unzip();

        for i in 0..nodes.len() {
            if !nodes[i].is_leaf() {
                let left = i + 1;
                let right = left + nodes[left].subtree_len();
                nodes[left].parent = i as u32;
                nodes[right].parent = i as u32;
            }
        }

        let (points, old_from_new) = store.into_parts();
        let mut new_from_old = vec![0; count];
        for (new, &old) in old_from_new.iter().enumerate() {
            new_from_old[old] = new;
        }

        debug!(nodes = nodes.len(), "built kd-tree");
        Ok(KdTree {
            nodes,
            stats,
            points,
            old_from_new,
            new_from_old,
            leaf_size: self.leaf_size,
        })
    }
}

/// Builds the subtree over `slice`, whose first point sits at tree position `begin`.
/// Returns its nodes in pre-order, paired with their statistics.
fn build_subtree<S: TreeStatistic<D>, const D: usize>(
    mut slice: PointSlice<'_, D>,
    begin: usize,
    bounds: BoundingBox<D>,
    leaf_size: usize,
    parallel: bool,
) -> Vec<(KdNode<D>, S)> {
    let count = slice.len();

    if count > leaf_size {
        let (dim, width) = bounds.widest_dim();
        if width > 0.0 {
            let split_val = bounds.mid(dim);
            let (split_col, left_bounds, right_bounds) = slice.partition(dim, split_val);

            // A midpoint that rounds onto an endpoint can still leave one side empty.
            if split_col > 0 && split_col < count {
                trace!(begin, split = begin + split_col, end = begin + count, dim, split_val, "split");

                let (left_slice, right_slice) = slice.split_at_mut(split_col);
                let right_begin = begin + split_col;
                let (left, right) = if parallel && count >= PARALLEL_BUILD_THRESHOLD {
                    rayon::join(
                        || build_subtree::<S, D>(left_slice, begin, left_bounds, leaf_size, parallel),
                        || build_subtree::<S, D>(right_slice, right_begin, right_bounds, leaf_size, parallel),
                    )
                } else {
                    (
                        build_subtree::<S, D>(left_slice, begin, left_bounds, leaf_size, parallel),
                        build_subtree::<S, D>(right_slice, right_begin, right_bounds, leaf_size, parallel),
                    )
                };

                let bounds = left_bounds.merged(&right_bounds);
                let mut stat = S::default();
                stat.accumulate(&left[0].1, &left[0].0.bounds, left[0].0.count());
                stat.accumulate(&right[0].1, &right[0].0.bounds, right[0].0.count());
                stat.postprocess(&bounds, count);

                let mut nodes = Vec::with_capacity(1 + left.len() + right.len());
                nodes.push((
                    KdNode {
                        bounds,
                        begin,
                        end: begin + count,
                        subtree_len: (1 + left.len() + right.len()) as u32,
                        parent: NO_PARENT,
                    },
                    stat,
                ));
                nodes.extend(left);
                nodes.extend(right);
                return nodes;
            }
        }
        debug!(begin, count, width, "degenerate split, forcing leaf");
    }

    let mut stat = S::default();
    for p in slice.points() {
        stat.accumulate_point(p);
    }
    stat.postprocess(&bounds, count);
    vec![(
        KdNode {
            bounds,
            begin,
            end: begin + count,
            subtree_len: 1,
            parent: NO_PARENT,
        },
        stat,
    )]
}
