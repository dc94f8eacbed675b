/// Worst-case cost class of one `propagate` call, used by a scheduler to order propagators from
/// cheap to expensive. The classes are ordered; `LinearLow < LinearHigh < … < CubicHigh`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PropagationCost {
    LinearLow,
    LinearHigh,
    QuadraticLow,
    QuadraticHigh,
    CubicLow,
    CubicHigh,
}
