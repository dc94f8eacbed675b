use crate::basic_types::Conflict;
use crate::basic_types::Inconsistency;
use crate::engine::propagation::PropagationContextMut;
use crate::engine::propagation::ReadDomains;
use crate::engine::variables::IntegerVariable;
use crate::engine::ModificationEvent;
use crate::propagators::global_cardinality::partial_sum::PartialSum;

/// Virtual capacity of the escape interval beyond the outermost bound position. Mirrors the
/// width-two sentinel intervals of the compressed bounds: a variable consuming escape capacity
/// has nowhere real to go, which the capacity check detects before the sentinel can exhaust.
const SENTINEL_CAPACITY: i64 = 2;

/// Bounds filtering for the global cardinality constraint, following the critical-capacity
/// sweeps of Quimper et al.: variables are visited in bound order while a union-find structure
/// tracks, per elementary value interval, how much upper-bound capacity is left. An interval
/// whose capacity is exactly consumed by the variables contained in it is a Hall interval;
/// variables overlapping but not contained have their bounds pushed past it.
///
/// The struct only holds scratch buffers so that repeated propagations do not reallocate; all
/// state is rebuilt by [`HallIntervalEngine::prepare`].
#[derive(Clone, Debug, Default)]
pub(crate) struct HallIntervalEngine {
    /// Per-variable `[min, max]` snapshot taken by `prepare`, endpoint-aligned to values with
    /// nonzero capacity.
    intervals: Vec<(i32, i32)>,
    /// Variable indices ordered by ascending interval max.
    max_sorted: Vec<usize>,
    /// Variable indices ordered by ascending interval min.
    min_sorted: Vec<usize>,
    /// The distinct critical points (interval mins and maxes plus one) with a sentinel on either
    /// side.
    bounds: Vec<i32>,
    /// Per variable, the position of its min in `bounds`.
    rank_min: Vec<i32>,
    /// Per variable, the position of its max plus one in `bounds`.
    rank_max: Vec<i32>,
    /// Critical-capacity tree: exhausted elementary intervals point towards the interval that
    /// absorbs further demand.
    t: Vec<i32>,
    /// Remaining capacity per elementary interval.
    d: Vec<i64>,
    /// Hall-interval pointers.
    h: Vec<i32>,
    /// Sorted interval mins and maxes, for counting how many variables reach a value interval.
    sorted_mins: Vec<i32>,
    sorted_maxes: Vec<i32>,
    /// Demand-bearing values and detected tight intervals of the demand pass.
    demand_values: Vec<i32>,
    tight: Vec<(i32, i32)>,
}

impl HallIntervalEngine {
    /// Snapshot the variable ranges, align each endpoint to a value with nonzero upper capacity
    /// (a value no occurrence allows cannot host any variable), and build the compressed bound
    /// positions used by the sweeps.
    pub(crate) fn prepare<Var: IntegerVariable>(
        &mut self,
        context: &mut PropagationContextMut<'_>,
        vars: &[Var],
        upper_sums: &PartialSum,
    ) -> Result<ModificationEvent, Inconsistency> {
        let n = vars.len();
        let mut change = ModificationEvent::None;

        self.intervals.clear();
        for (index, var) in vars.iter().enumerate() {
            change = change.join(align_lower_bound(context, index, var, upper_sums)?);
            change = change.join(align_upper_bound(context, index, var, upper_sums)?);
            self.intervals
                .push((context.lower_bound(var), context.upper_bound(var)));
        }

        self.max_sorted.clear();
        self.max_sorted.extend(0..n);
        self.max_sorted
            .sort_unstable_by_key(|&index| self.intervals[index].1);
        self.min_sorted.clear();
        self.min_sorted.extend(0..n);
        self.min_sorted
            .sort_unstable_by_key(|&index| self.intervals[index].0);

        self.compress_bounds();

        Ok(change)
    }

    /// Merge the sorted mins and maxes-plus-one into the deduplicated `bounds` vector and record
    /// each variable's positions in it.
    fn compress_bounds(&mut self) {
        let n = self.intervals.len();
        self.rank_min.resize(n, 0);
        self.rank_max.resize(n, 0);
        self.bounds.clear();

        let mut last = self.intervals[self.min_sorted[0]].0 - 2;
        self.bounds.push(last);

        let mut i = 0;
        let mut j = 0;
        loop {
            if i < n && self.intervals[self.min_sorted[i]].0 <= self.intervals[self.max_sorted[j]].1 + 1
            {
                let value = self.intervals[self.min_sorted[i]].0;
                if value != last {
                    last = value;
                    self.bounds.push(value);
                }
                self.rank_min[self.min_sorted[i]] = self.bounds.len() as i32 - 1;
                i += 1;
            } else {
                let value = self.intervals[self.max_sorted[j]].1 + 1;
                if value != last {
                    last = value;
                    self.bounds.push(value);
                }
                self.rank_max[self.max_sorted[j]] = self.bounds.len() as i32 - 1;
                j += 1;
                if j == n {
                    break;
                }
            }
        }
        self.bounds.push(last + 2);
    }

    /// Number of compressed bound positions, excluding the two sentinels.
    fn nb(&self) -> i32 {
        self.bounds.len() as i32 - 2
    }

    /// Raise lower bounds with respect to the upper-bound capacities: visit variables by
    /// ascending max, consume one unit of capacity per variable, and push mins past saturated
    /// Hall intervals. Fails when the demand contained in an interval exceeds its capacity.
    pub(crate) fn filter_lower_bounds<Var: IntegerVariable>(
        &mut self,
        context: &mut PropagationContextMut<'_>,
        vars: &[Var],
        upper_sums: &PartialSum,
    ) -> Result<ModificationEvent, Inconsistency> {
        let nb = self.nb();
        let bounds = &self.bounds;
        let size = (nb + 2) as usize;

        self.t.resize(size, 0);
        self.h.resize(size, 0);
        self.d.resize(size, 0);
        self.t[0] = -1;
        self.h[0] = -1;
        self.d[0] = 0;
        for k in 1..size {
            self.t[k] = k as i32 - 1;
            self.h[k] = k as i32 - 1;
            self.d[k] = upper_sums.sum(bounds[k - 1], bounds[k] - 1);
        }
        // the sentinel interval past the largest max carries virtual escape capacity, consumed
        // exactly when everything below is saturated; a consumer there always trips the
        // capacity check below
        self.d[size - 1] += SENTINEL_CAPACITY;

        let mut change = ModificationEvent::None;
        for sorted_index in 0..self.max_sorted.len() {
            let var_index = self.max_sorted[sorted_index];
            let x = self.rank_min[var_index];
            let y = self.rank_max[var_index];

            let mut z = pathmax(&self.t, x + 1);
            let j = self.t[z as usize];
            // jump over elementary intervals without any capacity
            while self.d[z as usize] == 0 {
                self.t[z as usize] = z + 1;
                z = pathmax(&self.t, self.t[z as usize]);
            }
            self.t[z as usize] = j;

            self.d[z as usize] -= 1;
            if self.d[z as usize] == 0 {
                self.t[z as usize] = z + 1;
                z = pathmax(&self.t, self.t[z as usize]);
                self.t[z as usize] = j;
            }
            pathset(&mut self.t, x + 1, z, z);

            let mut interval_capacity = upper_sums.sum(bounds[y as usize], bounds[z as usize] - 1);
            if z as usize == size - 1 {
                interval_capacity += SENTINEL_CAPACITY;
            }
            if self.d[z as usize] < interval_capacity {
                return Err(Conflict::HallIntervalOverflow {
                    lower: bounds[y as usize],
                    upper: bounds[z as usize] - 1,
                }
                .into());
            }

            if self.h[x as usize] > x {
                let w = pathmax(&self.h, self.h[x as usize]);
                let new_min = bounds[w as usize];
                change = change.join(context.set_lower_bound(&vars[var_index], new_min)?);
                pathset(&mut self.h, x, w, w);
            }

            if self.d[z as usize] == interval_capacity {
                // [bounds[j], bounds[y] - 1] is a Hall interval now
                let start = self.h[y as usize];
                pathset(&mut self.h, start, j - 1, y);
                self.h[y as usize] = j - 1;
            }
        }

        Ok(change)
    }

    /// The mirror of [`HallIntervalEngine::filter_lower_bounds`]: visit variables by descending
    /// min and lower upper bounds past saturated Hall intervals.
    pub(crate) fn filter_upper_bounds<Var: IntegerVariable>(
        &mut self,
        context: &mut PropagationContextMut<'_>,
        vars: &[Var],
        upper_sums: &PartialSum,
    ) -> Result<ModificationEvent, Inconsistency> {
        let nb = self.nb();
        let bounds = &self.bounds;
        let size = (nb + 2) as usize;

        self.t.resize(size, 0);
        self.h.resize(size, 0);
        self.d.resize(size, 0);
        for k in 0..size - 1 {
            self.t[k] = k as i32 + 1;
            self.h[k] = k as i32 + 1;
            self.d[k] = upper_sums.sum(bounds[k], bounds[k + 1] - 1);
        }
        self.t[size - 1] = size as i32;
        self.h[size - 1] = size as i32;
        self.d[size - 1] = 0;
        self.d[0] += SENTINEL_CAPACITY;

        let mut change = ModificationEvent::None;
        for sorted_index in (0..self.min_sorted.len()).rev() {
            let var_index = self.min_sorted[sorted_index];
            let x = self.rank_max[var_index];
            let y = self.rank_min[var_index];

            let mut z = pathmin(&self.t, x - 1);
            let j = self.t[z as usize];
            while self.d[z as usize] == 0 {
                self.t[z as usize] = z - 1;
                z = pathmin(&self.t, self.t[z as usize]);
            }
            self.t[z as usize] = j;

            self.d[z as usize] -= 1;
            if self.d[z as usize] == 0 {
                self.t[z as usize] = z - 1;
                z = pathmin(&self.t, self.t[z as usize]);
                self.t[z as usize] = j;
            }
            pathset(&mut self.t, x - 1, z, z);

            let mut interval_capacity = upper_sums.sum(bounds[z as usize], bounds[y as usize] - 1);
            if z == 0 {
                interval_capacity += SENTINEL_CAPACITY;
            }
            if self.d[z as usize] < interval_capacity {
                return Err(Conflict::HallIntervalOverflow {
                    lower: bounds[z as usize],
                    upper: bounds[y as usize] - 1,
                }
                .into());
            }

            if self.h[x as usize] < x {
                let w = pathmin(&self.h, self.h[x as usize]);
                let new_max = bounds[w as usize] - 1;
                change = change.join(context.set_upper_bound(&vars[var_index], new_max)?);
                pathset(&mut self.h, x, w, w);
            }

            if self.d[z as usize] == interval_capacity {
                let start = self.h[y as usize];
                pathset(&mut self.h, start, j + 1, y);
                self.h[y as usize] = j + 1;
            }
        }

        Ok(change)
    }

    /// Filtering with respect to the lower-bound demands: a value interval whose demand equals
    /// the number of variables whose range reaches it is tight, and every variable reaching it
    /// must stay inside it. A demand that exceeds the reaching variables is a failure.
    ///
    /// Candidate endpoints are restricted to demand-bearing values; trimming an interval down to
    /// those endpoints keeps its demand while never gaining variables, so no tight or failing
    /// interval is missed.
    pub(crate) fn filter_demand<Var: IntegerVariable>(
        &mut self,
        context: &mut PropagationContextMut<'_>,
        vars: &[Var],
        lower_sums: &PartialSum,
    ) -> Result<ModificationEvent, Inconsistency> {
        self.sorted_mins.clear();
        self.sorted_maxes.clear();
        for var in vars {
            self.sorted_mins.push(context.lower_bound(var));
            self.sorted_maxes.push(context.upper_bound(var));
        }
        self.sorted_mins.sort_unstable();
        self.sorted_maxes.sort_unstable();

        self.demand_values.clear();
        let mut next = lower_sums.skip_non_zero_right(lower_sums.first_value());
        while let Some(value) = next {
            self.demand_values.push(value);
            next = lower_sums.skip_non_zero_right(value + 1);
        }

        self.tight.clear();
        for (position, &lower) in self.demand_values.iter().enumerate() {
            // variables whose max lies below `lower` cannot serve any interval starting there
            let unreachable_below =
                self.sorted_maxes.partition_point(|&max| max < lower) as i64;
            for &upper in &self.demand_values[position..] {
                let demand = lower_sums.sum(lower, upper);
                let reaching =
                    self.sorted_mins.partition_point(|&min| min <= upper) as i64 - unreachable_below;
                if demand > reaching {
                    return Err(Conflict::DemandExceedsSupport {
                        lower,
                        upper,
                        demand,
                        supported: reaching,
                    }
                    .into());
                }
                if demand == reaching {
                    self.tight.push((lower, upper));
                }
            }
        }

        let mut change = ModificationEvent::None;
        for index in 0..self.tight.len() {
            let (lower, upper) = self.tight[index];
            for var in vars {
                let min = context.lower_bound(var);
                let max = context.upper_bound(var);
                if min <= upper && max >= lower {
                    if min < lower {
                        change = change.join(context.set_lower_bound(var, lower)?);
                    }
                    if max > upper {
                        change = change.join(context.set_upper_bound(var, upper)?);
                    }
                }
            }
        }

        Ok(change)
    }
}

/// Raise the lower bound of `var` until it sits on a value with nonzero capacity.
fn align_lower_bound<Var: IntegerVariable>(
    context: &mut PropagationContextMut<'_>,
    index: usize,
    var: &Var,
    upper_sums: &PartialSum,
) -> Result<ModificationEvent, Inconsistency> {
    let mut change = ModificationEvent::None;
    loop {
        let min = context.lower_bound(var);
        match upper_sums.skip_non_zero_right(min) {
            Some(aligned) if aligned == min => return Ok(change),
            Some(aligned) => change = change.join(context.set_lower_bound(var, aligned)?),
            None => return Err(Conflict::UnmatchableVariable { variable: index }.into()),
        }
    }
}

/// Lower the upper bound of `var` until it sits on a value with nonzero capacity.
fn align_upper_bound<Var: IntegerVariable>(
    context: &mut PropagationContextMut<'_>,
    index: usize,
    var: &Var,
    upper_sums: &PartialSum,
) -> Result<ModificationEvent, Inconsistency> {
    let mut change = ModificationEvent::None;
    loop {
        let max = context.upper_bound(var);
        match upper_sums.skip_non_zero_left(max) {
            Some(aligned) if aligned == max => return Ok(change),
            Some(aligned) => change = change.join(context.set_upper_bound(var, aligned)?),
            None => return Err(Conflict::UnmatchableVariable { variable: index }.into()),
        }
    }
}

fn pathmax(tree: &[i32], mut index: i32) -> i32 {
    while tree[index as usize] > index {
        index = tree[index as usize];
    }
    index
}

fn pathmin(tree: &[i32], mut index: i32) -> i32 {
    while tree[index as usize] < index {
        index = tree[index as usize];
    }
    index
}

fn pathset(tree: &mut [i32], start: i32, end: i32, to: i32) {
    let mut current = start;
    while current != end {
        let next = tree[current as usize];
        tree[current as usize] = to;
        current = next;
    }
}
