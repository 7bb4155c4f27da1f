use crate::core::types::SeqId;
use crate::index::posting::PostingContainer;

/// Arena handle for a trie node.
pub type NodeId = u32;

const NONE: NodeId = u32::MAX;

/// Ranking applied to fuzzy candidates before truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrdering {
    /// By posting length, i.e. how many documents carry the token.
    Frequency,
    /// By the highest default-sort score seen on the posting.
    MaxScore,
}

#[derive(Debug)]
pub struct Leaf {
    pub key: Vec<u8>,
    pub posting: PostingContainer,
    pub max_score: i64,
}

impl Leaf {
    pub fn token(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}

#[derive(Debug)]
enum Node {
    /// Recycled arena slot.
    Free,
    Inner(Inner),
    Leaf(Leaf),
}

#[derive(Debug)]
struct Inner {
    /// Compressed path bytes shared by every key below this node.
    prefix: Vec<u8>,
    children: Children,
}

/// Child tables with fan-out chosen by density. A child keyed by the
/// terminator byte 0 holds the leaf whose key ends at this node.
#[derive(Debug)]
enum Children {
    Node4 {
        keys: [u8; 4],
        ptrs: [NodeId; 4],
        count: u8,
    },
    Node16 {
        keys: [u8; 16],
        ptrs: [NodeId; 16],
        count: u8,
    },
    Node48 {
        index: Box<[u8; 256]>, // 255 marks an empty slot
        ptrs: [NodeId; 48],
        count: u8,
    },
    Node256 {
        ptrs: Box<[NodeId; 256]>,
        count: u16,
    },
}

impl Children {
    fn new() -> Self {
        Children::Node4 {
            keys: [0; 4],
            ptrs: [NONE; 4],
            count: 0,
        }
    }

    fn get(&self, byte: u8) -> Option<NodeId> {
        match self {
            Children::Node4 { keys, ptrs, count } => keys[..*count as usize]
                .iter()
                .position(|&k| k == byte)
                .map(|i| ptrs[i]),
            Children::Node16 { keys, ptrs, count } => keys[..*count as usize]
                .iter()
                .position(|&k| k == byte)
                .map(|i| ptrs[i]),
            Children::Node48 { index, ptrs, .. } => {
                let slot = index[byte as usize];
                (slot != 255).then(|| ptrs[slot as usize])
            }
            Children::Node256 { ptrs, .. } => {
                (ptrs[byte as usize] != NONE).then(|| ptrs[byte as usize])
            }
        }
    }

    fn set(&mut self, byte: u8, child: NodeId) {
        match self {
            Children::Node4 { keys, ptrs, count } => {
                if let Some(i) = keys[..*count as usize].iter().position(|&k| k == byte) {
                    ptrs[i] = child;
                }
            }
            Children::Node16 { keys, ptrs, count } => {
                if let Some(i) = keys[..*count as usize].iter().position(|&k| k == byte) {
                    ptrs[i] = child;
                }
            }
            Children::Node48 { index, ptrs, .. } => {
                let slot = index[byte as usize];
                if slot != 255 {
                    ptrs[slot as usize] = child;
                }
            }
            Children::Node256 { ptrs, .. } => ptrs[byte as usize] = child,
        }
    }

    fn is_full(&self) -> bool {
        match self {
            Children::Node4 { count, .. } => *count == 4,
            Children::Node16 { count, .. } => *count == 16,
            Children::Node48 { count, .. } => *count == 48,
            Children::Node256 { .. } => false,
        }
    }

    /// Caller grows the table first when full.
    fn add(&mut self, byte: u8, child: NodeId) {
        match self {
            Children::Node4 { keys, ptrs, count } => {
                let n = *count as usize;
                let pos = keys[..n].iter().position(|&k| k > byte).unwrap_or(n);
                for i in (pos..n).rev() {
                    keys[i + 1] = keys[i];
                    ptrs[i + 1] = ptrs[i];
                }
                keys[pos] = byte;
                ptrs[pos] = child;
                *count += 1;
            }
            Children::Node16 { keys, ptrs, count } => {
                let n = *count as usize;
                let pos = keys[..n].iter().position(|&k| k > byte).unwrap_or(n);
                for i in (pos..n).rev() {
                    keys[i + 1] = keys[i];
                    ptrs[i + 1] = ptrs[i];
                }
                keys[pos] = byte;
                ptrs[pos] = child;
                *count += 1;
            }
            Children::Node48 { index, ptrs, count } => {
                ptrs[*count as usize] = child;
                index[byte as usize] = *count;
                *count += 1;
            }
            Children::Node256 { ptrs, count } => {
                ptrs[byte as usize] = child;
                *count += 1;
            }
        }
    }

    fn remove(&mut self, byte: u8) {
        match self {
            Children::Node4 { keys, ptrs, count } => {
                let n = *count as usize;
                if let Some(pos) = keys[..n].iter().position(|&k| k == byte) {
                    for i in pos..n - 1 {
                        keys[i] = keys[i + 1];
                        ptrs[i] = ptrs[i + 1];
                    }
                    *count -= 1;
                }
            }
            Children::Node16 { keys, ptrs, count } => {
                let n = *count as usize;
                if let Some(pos) = keys[..n].iter().position(|&k| k == byte) {
                    for i in pos..n - 1 {
                        keys[i] = keys[i + 1];
                        ptrs[i] = ptrs[i + 1];
                    }
                    *count -= 1;
                }
            }
            Children::Node48 { index, ptrs, count } => {
                let slot = index[byte as usize];
                if slot != 255 {
                    let last = *count - 1;
                    // move the last stored pointer into the vacated slot
                    if slot != last {
                        ptrs[slot as usize] = ptrs[last as usize];
                        for idx in index.iter_mut() {
                            if *idx == last {
                                *idx = slot;
                                break;
                            }
                        }
                    }
                    index[byte as usize] = 255;
                    *count -= 1;
                }
            }
            Children::Node256 { ptrs, count } => {
                if ptrs[byte as usize] != NONE {
                    ptrs[byte as usize] = NONE;
                    *count -= 1;
                }
            }
        }
    }

    fn grow(&mut self) {
        let grown = match self {
            Children::Node4 { keys, ptrs, count } => {
                let mut new_keys = [0u8; 16];
                let mut new_ptrs = [NONE; 16];
                new_keys[..4].copy_from_slice(keys);
                new_ptrs[..4].copy_from_slice(ptrs);
                Children::Node16 {
                    keys: new_keys,
                    ptrs: new_ptrs,
                    count: *count,
                }
            }
            Children::Node16 { keys, ptrs, count } => {
                let mut index = Box::new([255u8; 256]);
                let mut new_ptrs = [NONE; 48];
                for i in 0..*count as usize {
                    index[keys[i] as usize] = i as u8;
                    new_ptrs[i] = ptrs[i];
                }
                Children::Node48 {
                    index,
                    ptrs: new_ptrs,
                    count: *count,
                }
            }
            Children::Node48 { index, ptrs, count } => {
                let mut new_ptrs = Box::new([NONE; 256]);
                for byte in 0..256usize {
                    let slot = index[byte];
                    if slot != 255 {
                        new_ptrs[byte] = ptrs[slot as usize];
                    }
                }
                Children::Node256 {
                    ptrs: new_ptrs,
                    count: *count as u16,
                }
            }
            Children::Node256 { .. } => return,
        };
        *self = grown;
    }

    fn len(&self) -> usize {
        match self {
            Children::Node4 { count, .. }
            | Children::Node16 { count, .. }
            | Children::Node48 { count, .. } => *count as usize,
            Children::Node256 { count, .. } => *count as usize,
        }
    }

    /// Children in ascending key-byte order.
    fn iter(&self) -> Vec<(u8, NodeId)> {
        match self {
            Children::Node4 { keys, ptrs, count } => {
                (0..*count as usize).map(|i| (keys[i], ptrs[i])).collect()
            }
            Children::Node16 { keys, ptrs, count } => {
                (0..*count as usize).map(|i| (keys[i], ptrs[i])).collect()
            }
            Children::Node48 { index, ptrs, .. } => (0..256usize)
                .filter(|&b| index[b] != 255)
                .map(|b| (b as u8, ptrs[index[b] as usize]))
                .collect(),
            Children::Node256 { ptrs, .. } => (0..256usize)
                .filter(|&b| ptrs[b] != NONE)
                .map(|b| (b as u8, ptrs[b]))
                .collect(),
        }
    }
}

/// Adaptive radix trie mapping tokens to posting containers. Nodes live
/// in an arena addressed by 32-bit ids; leaves hang off a terminator
/// child so a token may be a strict prefix of another.
#[derive(Debug)]
pub struct Art {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: NodeId,
    len: usize,
}

impl Default for Art {
    fn default() -> Self {
        Art::new()
    }
}

/// A fuzzy candidate: the leaf plus the edit cost at which it matched.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyCandidate {
    pub leaf: NodeId,
    pub cost: u32,
}

impl Art {
    pub fn new() -> Self {
        Art {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NONE,
            len: 0,
        }
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn leaf(&self, id: NodeId) -> &Leaf {
        match &self.nodes[id as usize] {
            Node::Leaf(leaf) => leaf,
            _ => unreachable!("node {} is not a leaf", id),
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut Leaf {
        match &mut self.nodes[id as usize] {
            Node::Leaf(leaf) => leaf,
            _ => unreachable!("node {} is not a leaf", id),
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id as usize] = node;
            id
        } else {
            self.nodes.push(node);
            (self.nodes.len() - 1) as NodeId
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id as usize] = Node::Free;
        self.free.push(id);
    }

    /// Key bytes with the terminator appended; child edges are keyed on
    /// these, so no token byte may be 0 (the tokenizer guarantees this).
    fn with_terminator(key: &[u8]) -> Vec<u8> {
        let mut kz = Vec::with_capacity(key.len() + 1);
        kz.extend_from_slice(key);
        kz.push(0);
        kz
    }

    pub fn insert(&mut self, key: &[u8], seq_id: SeqId, score: i64, offsets: &[u32]) {
        let kz = Self::with_terminator(key);
        if self.root == NONE {
            let leaf = self.new_leaf(key, seq_id, score, offsets);
            self.root = leaf;
            return;
        }
        let root = self.root;
        self.root = self.insert_rec(root, &kz, 0, key, seq_id, score, offsets);
    }

    fn new_leaf(&mut self, key: &[u8], seq_id: SeqId, score: i64, offsets: &[u32]) -> NodeId {
        let mut posting = PostingContainer::new();
        posting.insert(seq_id, offsets);
        self.len += 1;
        self.alloc(Node::Leaf(Leaf {
            key: key.to_vec(),
            posting,
            max_score: score,
        }))
    }

    /// Returns the node id that should occupy this slot after insertion.
    fn insert_rec(
        &mut self,
        node: NodeId,
        kz: &[u8],
        depth: usize,
        key: &[u8],
        seq_id: SeqId,
        score: i64,
        offsets: &[u32],
    ) -> NodeId {
        match &self.nodes[node as usize] {
            Node::Leaf(leaf) => {
                if leaf.key == key {
                    let leaf = self.leaf_mut(node);
                    leaf.posting.insert(seq_id, offsets);
                    leaf.max_score = leaf.max_score.max(score);
                    return node;
                }

                // split into an inner node holding the common suffix path
                let existing = Self::with_terminator(&leaf.key);
                let common = lcp(&existing[depth..], &kz[depth..]);
                let split_depth = depth + common;

                let mut children = Children::new();
                let new_leaf = self.new_leaf(key, seq_id, score, offsets);
                children.add(existing[split_depth], node);
                children.add(kz[split_depth], new_leaf);

                self.alloc(Node::Inner(Inner {
                    prefix: kz[depth..split_depth].to_vec(),
                    children,
                }))
            }
            Node::Inner(inner) => {
                let matched = lcp(&inner.prefix, &kz[depth..]);
                if matched < inner.prefix.len() {
                    // split the compressed prefix at the mismatch
                    let old_byte = inner.prefix[matched];
                    let new_prefix = kz[depth..depth + matched].to_vec();
                    let remainder = inner.prefix[matched + 1..].to_vec();

                    if let Node::Inner(inner) = &mut self.nodes[node as usize] {
                        inner.prefix = remainder;
                    }

                    let mut children = Children::new();
                    let new_leaf = self.new_leaf(key, seq_id, score, offsets);
                    children.add(old_byte, node);
                    children.add(kz[depth + matched], new_leaf);

                    return self.alloc(Node::Inner(Inner {
                        prefix: new_prefix,
                        children,
                    }));
                }

                let next_depth = depth + matched;
                let byte = kz[next_depth];
                match inner.children.get(byte) {
                    Some(child) => {
                        let updated =
                            self.insert_rec(child, kz, next_depth + 1, key, seq_id, score, offsets);
                        if let Node::Inner(inner) = &mut self.nodes[node as usize] {
                            inner.children.set(byte, updated);
                        }
                        node
                    }
                    None => {
                        let new_leaf = self.new_leaf(key, seq_id, score, offsets);
                        if let Node::Inner(inner) = &mut self.nodes[node as usize] {
                            if inner.children.is_full() {
                                inner.children.grow();
                            }
                            inner.children.add(byte, new_leaf);
                        }
                        node
                    }
                }
            }
            Node::Free => unreachable!("dangling node id {}", node),
        }
    }

    /// Exact-match lookup.
    pub fn search(&self, key: &[u8]) -> Option<NodeId> {
        if self.root == NONE {
            return None;
        }
        let kz = Self::with_terminator(key);
        let mut node = self.root;
        let mut depth = 0usize;

        loop {
            match &self.nodes[node as usize] {
                Node::Leaf(leaf) => {
                    return (leaf.key == key).then_some(node);
                }
                Node::Inner(inner) => {
                    let remaining = &kz[depth..];
                    if remaining.len() <= inner.prefix.len()
                        || !remaining.starts_with(&inner.prefix)
                    {
                        return None;
                    }
                    depth += inner.prefix.len();
                    match inner.children.get(kz[depth]) {
                        Some(child) => {
                            node = child;
                            depth += 1;
                        }
                        None => return None,
                    }
                }
                Node::Free => unreachable!(),
            }
        }
    }

    pub fn posting(&self, key: &[u8]) -> Option<&PostingContainer> {
        self.search(key).map(|id| &self.leaf(id).posting)
    }

    /// Remove one document from a token's posting; drops the leaf when
    /// its posting becomes empty. Returns true when the leaf was dropped.
    pub fn remove_doc(&mut self, key: &[u8], seq_id: SeqId) -> bool {
        let Some(leaf_id) = self.search(key) else {
            return false;
        };
        let leaf = self.leaf_mut(leaf_id);
        leaf.posting.remove(seq_id);
        if leaf.posting.is_empty() {
            self.delete(key);
            return true;
        }
        false
    }

    /// Remove a token's leaf entirely.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        if self.root == NONE {
            return false;
        }
        let kz = Self::with_terminator(key);
        let root = self.root;
        let (new_root, removed) = self.delete_rec(root, &kz, 0, key);
        self.root = new_root;
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn delete_rec(&mut self, node: NodeId, kz: &[u8], depth: usize, key: &[u8]) -> (NodeId, bool) {
        match &self.nodes[node as usize] {
            Node::Leaf(leaf) => {
                if leaf.key == key {
                    self.release(node);
                    (NONE, true)
                } else {
                    (node, false)
                }
            }
            Node::Inner(inner) => {
                let remaining = &kz[depth..];
                if remaining.len() <= inner.prefix.len() || !remaining.starts_with(&inner.prefix) {
                    return (node, false);
                }
                let next_depth = depth + inner.prefix.len();
                let byte = kz[next_depth];
                let Some(child) = inner.children.get(byte) else {
                    return (node, false);
                };

                let (updated, removed) = self.delete_rec(child, kz, next_depth + 1, key);
                if !removed {
                    return (node, false);
                }

                if let Node::Inner(inner) = &mut self.nodes[node as usize] {
                    if updated == NONE {
                        inner.children.remove(byte);
                    } else {
                        inner.children.set(byte, updated);
                    }
                }

                // collapse single-child inner nodes back into the path
                let (count, only) = match &self.nodes[node as usize] {
                    Node::Inner(inner) => {
                        let entries = inner.children.iter();
                        (entries.len(), entries.first().copied())
                    }
                    _ => unreachable!(),
                };

                if count == 0 {
                    self.release(node);
                    return (NONE, true);
                }

                if count == 1 {
                    let (byte, child) = only.unwrap();
                    let parent_prefix = match &self.nodes[node as usize] {
                        Node::Inner(inner) => inner.prefix.clone(),
                        _ => unreachable!(),
                    };
                    if let Node::Inner(child_inner) = &mut self.nodes[child as usize] {
                        let mut merged = parent_prefix;
                        merged.push(byte);
                        merged.append(&mut child_inner.prefix);
                        child_inner.prefix = merged;
                        self.release(node);
                        return (child, true);
                    }
                    // a lone leaf child keeps its full key; the inner node
                    // is no longer needed on the path to it
                    self.release(node);
                    return (child, true);
                }

                (node, true)
            }
            Node::Free => unreachable!(),
        }
    }

    /// Leaves whose keys are within edit distance `[min_cost, max_cost]`
    /// of `key`, up to `max_candidates`, ranked by `order`. With `prefix`,
    /// the distance is measured against each key's closest-length prefix.
    /// Subtrees are pruned as soon as the running distance row exceeds
    /// `max_cost` everywhere.
    pub fn fuzzy_search(
        &self,
        key: &[u8],
        min_cost: u32,
        max_cost: u32,
        max_candidates: usize,
        order: TokenOrdering,
        prefix: bool,
    ) -> Vec<FuzzyCandidate> {
        let mut results: Vec<FuzzyCandidate> = Vec::new();
        if self.root == NONE {
            return results;
        }

        // classic edit-distance row against the query, carried down the trie
        let row: Vec<u32> = (0..=key.len() as u32).collect();
        self.fuzzy_rec(
            self.root, 0, key, &row, u32::MAX, min_cost, max_cost, prefix, &mut results,
        );

        results.sort_by(|a, b| {
            a.cost.cmp(&b.cost).then_with(|| match order {
                TokenOrdering::Frequency => self
                    .leaf(b.leaf)
                    .posting
                    .len()
                    .cmp(&self.leaf(a.leaf).posting.len()),
                TokenOrdering::MaxScore => self
                    .leaf(b.leaf)
                    .max_score
                    .cmp(&self.leaf(a.leaf).max_score),
            })
        });
        results.truncate(max_candidates);
        results
    }

    /// `depth` counts the real key bytes already consumed on the path
    /// (terminator edges consume none); the leaf may carry further key
    /// bytes past the last edge (lazy expansion).
    #[allow(clippy::too_many_arguments)]
    fn fuzzy_rec(
        &self,
        node: NodeId,
        depth: usize,
        query: &[u8],
        row: &[u32],
        best_prefix: u32,
        min_cost: u32,
        max_cost: u32,
        prefix: bool,
        results: &mut Vec<FuzzyCandidate>,
    ) {
        match &self.nodes[node as usize] {
            Node::Leaf(leaf) => {
                let mut row = row.to_vec();
                let mut best = best_prefix;
                for &byte in &leaf.key[depth.min(leaf.key.len())..] {
                    row = step_row(&row, query, byte);
                    best = best.min(*row.last().unwrap());
                    if row.iter().min().copied().unwrap_or(u32::MAX) > max_cost {
                        return;
                    }
                }

                let cost = if prefix {
                    best.min(*row.last().unwrap())
                } else {
                    *row.last().unwrap()
                };

                if cost >= min_cost && cost <= max_cost {
                    results.push(FuzzyCandidate { leaf: node, cost });
                }
            }
            Node::Inner(inner) => {
                let mut row = row.to_vec();
                let mut best = best_prefix;
                for &byte in &inner.prefix {
                    row = step_row(&row, query, byte);
                    best = best.min(*row.last().unwrap());
                    if row.iter().min().copied().unwrap_or(u32::MAX) > max_cost {
                        return;
                    }
                }
                let depth = depth + inner.prefix.len();

                for (byte, child) in inner.children.iter() {
                    if byte == 0 {
                        // terminator edge: the key ends here
                        self.fuzzy_rec(
                            child, depth, query, &row, best, min_cost, max_cost, prefix, results,
                        );
                        continue;
                    }
                    let next = step_row(&row, query, byte);
                    if next.iter().min().copied().unwrap_or(u32::MAX) > max_cost {
                        continue;
                    }
                    let next_best = best.min(*next.last().unwrap());
                    self.fuzzy_rec(
                        child,
                        depth + 1,
                        query,
                        &next,
                        next_best,
                        min_cost,
                        max_cost,
                        prefix,
                        results,
                    );
                }
            }
            Node::Free => unreachable!(),
        }
    }

    /// Every leaf in key order; used when rebuilding auxiliary state.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.len);
        if self.root != NONE {
            self.collect_leaves(self.root, &mut out);
        }
        out
    }

    fn collect_leaves(&self, node: NodeId, out: &mut Vec<NodeId>) {
        match &self.nodes[node as usize] {
            Node::Leaf(_) => out.push(node),
            Node::Inner(inner) => {
                for (_, child) in inner.children.iter() {
                    self.collect_leaves(child, out);
                }
            }
            Node::Free => unreachable!(),
        }
    }
}

fn lcp(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// One step of the Levenshtein row: extend the matched key by `byte`.
fn step_row(row: &[u32], query: &[u8], byte: u8) -> Vec<u32> {
    let mut next = Vec::with_capacity(row.len());
    next.push(row[0] + 1);
    for j in 1..row.len() {
        let subst = row[j - 1] + u32::from(query[j - 1] != byte);
        let del = row[j] + 1;
        let ins = next[j - 1] + 1;
        next.push(subst.min(del).min(ins));
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(art: &mut Art, token: &str, seq_id: SeqId) {
        art.insert(token.as_bytes(), seq_id, seq_id as i64, &[0]);
    }

    fn tokens_of(art: &Art, candidates: &[FuzzyCandidate]) -> Vec<String> {
        candidates.iter().map(|c| art.leaf(c.leaf).token()).collect()
    }

    #[test]
    fn exact_search_after_splits() {
        let mut art = Art::new();
        insert(&mut art, "art", 1);
        insert(&mut art, "artist", 2);
        insert(&mut art, "arm", 3);
        insert(&mut art, "banana", 4);

        assert_eq!(art.len(), 4);
        for token in ["art", "artist", "arm", "banana"] {
            let leaf = art.search(token.as_bytes()).expect(token);
            assert_eq!(art.leaf(leaf).token(), token);
        }
        assert!(art.search(b"ar").is_none());
        assert!(art.search(b"artist\xC3\xA9").is_none());
    }

    #[test]
    fn growth_beyond_node4_and_node16() {
        let mut art = Art::new();
        // one child per leading byte forces table growth at the root
        for i in 0..60u32 {
            let token = format!("{}x", (b'a' as u32 + i) as u8 as char);
            insert(&mut art, &token, i);
        }
        assert_eq!(art.len(), 60);
        for i in 0..60u32 {
            let token = format!("{}x", (b'a' as u32 + i) as u8 as char);
            assert!(art.search(token.as_bytes()).is_some(), "{}", token);
        }
    }

    #[test]
    fn delete_collapses_path() {
        let mut art = Art::new();
        insert(&mut art, "trooper", 1);
        insert(&mut art, "train", 2);
        insert(&mut art, "tram", 3);

        assert!(art.delete(b"train"));
        assert!(art.search(b"train").is_none());
        assert!(art.search(b"trooper").is_some());
        assert!(art.search(b"tram").is_some());
        assert_eq!(art.len(), 2);

        assert!(art.delete(b"tram"));
        assert!(art.delete(b"trooper"));
        assert!(art.is_empty());
        assert!(!art.delete(b"trooper"));
    }

    #[test]
    fn remove_doc_drops_empty_leaves() {
        let mut art = Art::new();
        art.insert(b"quick", 1, 10, &[0]);
        art.insert(b"quick", 2, 5, &[3]);

        assert!(!art.remove_doc(b"quick", 1));
        assert!(art.search(b"quick").is_some());
        assert!(art.remove_doc(b"quick", 2));
        assert!(art.search(b"quick").is_none());
    }

    #[test]
    fn fuzzy_finds_single_edits() {
        let mut art = Art::new();
        insert(&mut art, "quick", 1);
        insert(&mut art, "quin", 2);
        insert(&mut art, "brown", 3);

        let hits = art.fuzzy_search(b"quik", 0, 1, 10, TokenOrdering::Frequency, false);
        let tokens = tokens_of(&art, &hits);
        assert!(tokens.contains(&"quick".to_string()), "{:?}", tokens);
        assert!(tokens.contains(&"quin".to_string()), "{:?}", tokens);
        assert!(!tokens.contains(&"brown".to_string()));
    }

    #[test]
    fn fuzzy_exact_cost_band() {
        let mut art = Art::new();
        insert(&mut art, "quick", 1);
        insert(&mut art, "quack", 2);

        // cost band [1, 1] must not return the exact match
        let hits = art.fuzzy_search(b"quick", 1, 1, 10, TokenOrdering::Frequency, false);
        let tokens = tokens_of(&art, &hits);
        assert_eq!(tokens, vec!["quack".to_string()]);
    }

    #[test]
    fn fuzzy_prefix_matches_key_prefix() {
        let mut art = Art::new();
        insert(&mut art, "trooper", 1);
        insert(&mut art, "tremble", 2);

        let hits = art.fuzzy_search(b"troo", 0, 0, 10, TokenOrdering::Frequency, true);
        assert_eq!(tokens_of(&art, &hits), vec!["trooper".to_string()]);

        // one typo in the prefix
        let hits = art.fuzzy_search(b"treo", 0, 1, 10, TokenOrdering::Frequency, true);
        let tokens = tokens_of(&art, &hits);
        assert!(tokens.contains(&"trooper".to_string()));
        assert!(tokens.contains(&"tremble".to_string()));
    }

    #[test]
    fn fuzzy_ranking_by_frequency() {
        let mut art = Art::new();
        art.insert(b"cat", 1, 1, &[0]);
        art.insert(b"cat", 2, 1, &[0]);
        art.insert(b"car", 3, 1, &[0]);

        let hits = art.fuzzy_search(b"caX", 1, 1, 1, TokenOrdering::Frequency, false);
        assert_eq!(hits.len(), 1);
        assert_eq!(art.leaf(hits[0].leaf).token(), "cat");
    }

    #[test]
    fn leaves_are_enumerable() {
        let mut art = Art::new();
        for (i, t) in ["alpha", "beta", "gamma"].iter().enumerate() {
            insert(&mut art, t, i as u32);
        }
        let mut tokens: Vec<String> =
            art.leaves().iter().map(|&l| art.leaf(l).token()).collect();
        tokens.sort();
        assert_eq!(tokens, vec!["alpha", "beta", "gamma"]);
    }
}
