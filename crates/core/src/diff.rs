//! Line diff between two versions of a target's content.
//!
//! Linear-space Myers edit script after trimming the common prefix and suffix, grouped into
//! unified-diff hunks with a fixed context radius.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use crate::normalize::reflow;

/// Default context radius, in lines.
pub const DEFAULT_CONTEXT: usize = 3;

/// Role of a line in a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTag {
    Context,
    Added,
    Removed,
}

impl LineTag {
    /// Unified-diff marker character.
    pub fn marker(&self) -> char {
        match self {
            LineTag::Context => ' ',
            LineTag::Added => '+',
            LineTag::Removed => '-',
        }
    }
}

/// One body line of a diff, with its position on each side (0-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub tag: LineTag,
    pub text: String,
    pub old_index: Option<usize>,
    pub new_index: Option<usize>,
}

/// Contiguous region of change plus surrounding context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// `@@ -a,b +c,d @@` marker.
    pub fn header(&self) -> String {
        format!(
            "@@ -{} +{} @@",
            unified_range(self.old_start, self.old_len),
            unified_range(self.new_start, self.new_len)
        )
    }
}

fn unified_range(start: usize, len: usize) -> String {
    match len {
        0 => format!("{start},0"),
        1 => format!("{}", start + 1),
        _ => format!("{},{}", start + 1, len),
    }
}

/// Line of the display window, keyed by its position in the unified rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowLine {
    pub position: usize,
    pub tag: LineTag,
    pub text: String,
}

/// Result of comparing two different versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    pub target_id: String,
    pub hunks: Vec<Hunk>,
    /// Added and removed lines only, in edit order.
    pub changed_lines: Vec<DiffLine>,
    /// Up to `context` lines around every changed line, deduplicated, headers excluded.
    pub context_window_lines: Vec<WindowLine>,
}

impl DiffResult {
    /// Classic unified rendering with `--- previous` / `+++ current` headers.
    pub fn unified(&self) -> String {
        let mut out = String::from("--- previous\n+++ current\n");
        for hunk in &self.hunks {
            out.push_str(&hunk.header());
            out.push('\n');
            for line in &hunk.lines {
                out.push(line.tag.marker());
                out.push_str(&line.text);
                out.push('\n');
            }
        }
        out
    }

    /// Replays `changed_lines` onto `old`. With a non-normalizing differ this yields the new text.
    pub fn apply(&self, old: &str) -> String {
        let removed: HashSet<usize> = self
            .changed_lines
            .iter()
            .filter(|l| l.tag == LineTag::Removed)
            .filter_map(|l| l.old_index)
            .collect();
        let mut lines: Vec<&str> = old
            .split('\n')
            .enumerate()
            .filter(|(i, _)| !removed.contains(i))
            .map(|(_, l)| l)
            .collect();

        let mut added: Vec<(usize, &str)> = self
            .changed_lines
            .iter()
            .filter(|l| l.tag == LineTag::Added)
            .filter_map(|l| l.new_index.map(|i| (i, l.text.as_str())))
            .collect();
        added.sort_by_key(|(i, _)| *i);
        for (i, text) in added {
            lines.insert(i.min(lines.len()), text);
        }
        lines.join("\n")
    }

    pub fn added(&self) -> usize {
        self.changed_lines.iter().filter(|l| l.tag == LineTag::Added).count()
    }

    pub fn removed(&self) -> usize {
        self.changed_lines.iter().filter(|l| l.tag == LineTag::Removed).count()
    }
}

/// Computes [`DiffResult`]s.
#[derive(Debug, Clone, Copy)]
pub struct Differ {
    context: usize,
    normalize: bool,
}

impl Default for Differ {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT, false)
    }
}

impl Differ {
    pub fn new(context: usize, normalize: bool) -> Self {
        Self { context, normalize }
    }

    /// `None` when `old` and `new` are equal, byte for byte or after reflow when normalizing.
    pub fn compare(&self, target_id: &str, old: &str, new: &str) -> Option<DiffResult> {
        if old == new {
            return None;
        }
        let (old, new): (Cow<str>, Cow<str>) = if self.normalize {
            (Cow::Owned(reflow(old)), Cow::Owned(reflow(new)))
        } else {
            (Cow::Borrowed(old), Cow::Borrowed(new))
        };
        if old == new {
            return None;
        }

        let a: Vec<&str> = old.split('\n').collect();
        let b: Vec<&str> = new.split('\n').collect();
        let ops = edit_script(&a, &b);
        if ops.iter().all(|op| matches!(op, Op::Equal(..))) {
            return None;
        }

        let hunks = build_hunks(&ops, &a, &b, self.context);
        let changed_lines = hunks
            .iter()
            .flat_map(|h| h.lines.iter())
            .filter(|l| l.tag != LineTag::Context)
            .cloned()
            .collect();
        let context_window_lines = window(&hunks, self.context);

        Some(DiffResult {
            target_id: target_id.to_string(),
            hunks,
            changed_lines,
            context_window_lines,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal(usize, usize),
    Delete(usize),
    Insert(usize),
}

// Lines present on only one side can never match, so they are dropped before the search and
// emitted as plain deletes or inserts. A full rewrite then costs a hash pass, not a search.
fn edit_script(a: &[&str], b: &[&str]) -> Vec<Op> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let in_a: HashSet<&str> = a_mid.iter().copied().collect();
    let in_b: HashSet<&str> = b_mid.iter().copied().collect();
    let keep_a: Vec<usize> = (0..a_mid.len()).filter(|&i| in_b.contains(a_mid[i])).collect();
    let keep_b: Vec<usize> = (0..b_mid.len()).filter(|&j| in_a.contains(b_mid[j])).collect();
    let ra: Vec<&str> = keep_a.iter().map(|&i| a_mid[i]).collect();
    let rb: Vec<&str> = keep_b.iter().map(|&j| b_mid[j]).collect();

    let mut common = Vec::new();
    lcs(&ra, &rb, 0, 0, &mut common);

    let matches = (0..prefix)
        .map(|i| (i, i))
        .chain(
            common
                .into_iter()
                .map(|(i, j)| (prefix + keep_a[i], prefix + keep_b[j])),
        )
        .chain((0..suffix).map(|i| (a.len() - suffix + i, b.len() - suffix + i)));

    // Between two matched lines, deletions come before insertions.
    let mut ops = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    for (x, y) in matches {
        ops.extend((i..x).map(Op::Delete));
        ops.extend((j..y).map(Op::Insert));
        ops.push(Op::Equal(x, y));
        i = x + 1;
        j = y + 1;
    }
    ops.extend((i..a.len()).map(Op::Delete));
    ops.extend((j..b.len()).map(Op::Insert));
    ops
}

/// Appends the matched index pairs of a longest common subsequence, offset by `(ao, bo)`,
/// in increasing order. Linear space: recursion splits on the middle snake.
fn lcs(a: &[&str], b: &[&str], ao: usize, bo: usize, out: &mut Vec<(usize, usize)>) {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    out.extend((0..prefix).map(|k| (ao + k, bo + k)));
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a2 = &a[prefix..a.len() - suffix];
    let b2 = &b[prefix..b.len() - suffix];

    if !a2.is_empty() && !b2.is_empty() {
        if let Some((x, y)) = middle_snake(a2, b2) {
            let inside = x <= a2.len() && y <= b2.len();
            if inside && (x, y) != (0, 0) && (x, y) != (a2.len(), b2.len()) {
                lcs(&a2[..x], &b2[..y], ao + prefix, bo + prefix, out);
                lcs(&a2[x..], &b2[y..], ao + prefix + x, bo + prefix + y, out);
            }
        }
    }

    let (a_tail, b_tail) = (ao + a.len() - suffix, bo + b.len() - suffix);
    out.extend((0..suffix).map(|k| (a_tail + k, b_tail + k)));
}

/// Split point on an optimal edit path, found by running Myers forward and backward
/// until the two frontiers overlap. Both frontiers are single `O(n + m)` vectors.
fn middle_snake(a: &[&str], b: &[&str]) -> Option<(usize, usize)> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max_d = (n + m + 1) / 2;
    let offset = max_d;
    let len = (2 * max_d + 2) as usize;
    let mut fwd = vec![-1isize; len];
    let mut rev = vec![-1isize; len];
    fwd[(offset + 1) as usize] = 0;
    rev[(offset + 1) as usize] = 0;

    let delta = n - m;
    let odd = delta % 2 != 0;
    let slot = |k: isize| -> Option<usize> {
        let i = offset + k;
        (i >= 0 && (i as usize) < len).then_some(i as usize)
    };
    let (mut f_start, mut f_end, mut r_start, mut r_end) = (0isize, 0isize, 0isize, 0isize);

    for d in 0..max_d {
        let mut k = -d + f_start;
        while k <= d - f_end {
            let ko = (offset + k) as usize;
            let mut x = if k == -d || (k != d && fwd[ko - 1] < fwd[ko + 1]) {
                fwd[ko + 1]
            } else {
                fwd[ko - 1] + 1
            };
            let mut y = x - k;
            while x >= 0 && y >= 0 && x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            fwd[ko] = x;
            if x > n {
                f_end += 2;
            } else if y > m {
                f_start += 2;
            } else if odd {
                if let Some(ro) = slot(delta - k) {
                    if rev[ro] != -1 && y >= 0 && x >= n - rev[ro] {
                        return Some((x as usize, y as usize));
                    }
                }
            }
            k += 2;
        }

        let mut k = -d + r_start;
        while k <= d - r_end {
            let ko = (offset + k) as usize;
            let mut x = if k == -d || (k != d && rev[ko - 1] < rev[ko + 1]) {
                rev[ko + 1]
            } else {
                rev[ko - 1] + 1
            };
            let mut y = x - k;
            while x >= 0
                && y >= 0
                && x < n
                && y < m
                && a[(n - x - 1) as usize] == b[(m - y - 1) as usize]
            {
                x += 1;
                y += 1;
            }
            rev[ko] = x;
            if x > n {
                r_end += 2;
            } else if y > m {
                r_start += 2;
            } else if !odd {
                if let Some(fo) = slot(delta - k) {
                    let fx = fwd[fo];
                    if fx != -1 {
                        let fy = fx - (delta - k);
                        if fx >= n - x && fx >= 0 && fy >= 0 {
                            return Some((fx as usize, fy as usize));
                        }
                    }
                }
            }
            k += 2;
        }
    }
    None
}

fn build_hunks(ops: &[Op], a: &[&str], b: &[&str], context: usize) -> Vec<Hunk> {
    let changes: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| !matches!(op, Op::Equal(..)))
        .map(|(i, _)| i)
        .collect();

    // Group change positions whose gap fits inside two context windows.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    for &pos in &changes {
        match groups.last_mut() {
            Some((_, last)) if pos - *last <= 2 * context + 1 => *last = pos,
            _ => groups.push((pos, pos)),
        }
    }

    // Side positions before each op.
    let mut starts = Vec::with_capacity(ops.len());
    let (mut oi, mut ni) = (0usize, 0usize);
    for op in ops {
        starts.push((oi, ni));
        match op {
            Op::Equal(..) => {
                oi += 1;
                ni += 1;
            }
            Op::Delete(_) => oi += 1,
            Op::Insert(_) => ni += 1,
        }
    }

    groups
        .into_iter()
        .map(|(first, last)| {
            let from = first.saturating_sub(context);
            let to = (last + context + 1).min(ops.len());
            let (old_start, new_start) = starts[from];
            let lines: Vec<DiffLine> = ops[from..to]
                .iter()
                .map(|op| match *op {
                    Op::Equal(i, j) => DiffLine {
                        tag: LineTag::Context,
                        text: a[i].to_string(),
                        old_index: Some(i),
                        new_index: Some(j),
                    },
                    Op::Delete(i) => DiffLine {
                        tag: LineTag::Removed,
                        text: a[i].to_string(),
                        old_index: Some(i),
                        new_index: None,
                    },
                    Op::Insert(j) => DiffLine {
                        tag: LineTag::Added,
                        text: b[j].to_string(),
                        old_index: None,
                        new_index: Some(j),
                    },
                })
                .collect();
            let old_len = lines.iter().filter(|l| l.tag != LineTag::Added).count();
            let new_len = lines.iter().filter(|l| l.tag != LineTag::Removed).count();
            Hunk {
                old_start,
                old_len,
                new_start,
                new_len,
                lines,
            }
        })
        .collect()
}

// Positions follow the unified rendering: two file headers, then per hunk a marker and its lines.
fn window(hunks: &[Hunk], radius: usize) -> Vec<WindowLine> {
    let mut flat: Vec<Option<&DiffLine>> = vec![None, None];
    for hunk in hunks {
        flat.push(None);
        flat.extend(hunk.lines.iter().map(Some));
    }

    let mut picked: BTreeMap<usize, &DiffLine> = BTreeMap::new();
    for (i, line) in flat.iter().enumerate() {
        let Some(line) = line else { continue };
        if line.tag == LineTag::Context {
            continue;
        }
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(flat.len() - 1);
        for (j, candidate) in flat.iter().enumerate().take(hi + 1).skip(lo) {
            if let Some(l) = candidate {
                picked.insert(j, l);
            }
        }
    }

    picked
        .into_iter()
        .map(|(position, l)| WindowLine {
            position,
            tag: l.tag,
            text: l.text.clone(),
        })
        .collect()
}
